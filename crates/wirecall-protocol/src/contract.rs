//! Declarative method contracts.
//!
//! A [`MethodSignature`] is the static description of one callable entry:
//! its RPC name, ordered parameter metadata, return shape, and whether it
//! tolerates undeclared parameters. The host's catalog and the client's
//! proxy table are both built from these.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The wire type a parameter slot accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKind {
    Bool,
    Integer,
    Float,
    String,
    Array,
    Object,
    /// Any JSON value, including null.
    Any,
}

impl ParamKind {
    /// Type-check a supplied value against this kind.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamKind::Bool => value.is_boolean(),
            ParamKind::Integer => value.is_i64() || value.is_u64(),
            ParamKind::Float => value.is_number(),
            ParamKind::String => value.is_string(),
            ParamKind::Array => value.is_array(),
            ParamKind::Object => value.is_object(),
            ParamKind::Any => true,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ParamKind::Bool => "bool",
            ParamKind::Integer => "integer",
            ParamKind::Float => "float",
            ParamKind::String => "string",
            ParamKind::Array => "array",
            ParamKind::Object => "object",
            ParamKind::Any => "any",
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub optional: bool,
    /// Substituted when an optional parameter is absent from the request.
    /// `None` means the slot defaults to JSON null.
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParamKind, default: Option<Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: true,
            default,
        }
    }

    /// The value bound when this parameter is absent.
    pub fn default_value(&self) -> Value {
        self.default.clone().unwrap_or(Value::Null)
    }
}

/// What the method returns, as seen by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnShape {
    /// No return value. A proxy invokes this as a notification.
    Void,
    /// A synchronous value.
    Value,
    /// An asynchronously produced value.
    Future,
}

/// The static description of one callable method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodSignature {
    pub name: String,
    pub params: Vec<ParamSpec>,
    pub returns: ReturnShape,
    pub allow_extra_params: bool,
}

impl MethodSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: ReturnShape::Future,
            allow_extra_params: false,
        }
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn required(self, name: impl Into<String>, kind: ParamKind) -> Self {
        self.param(ParamSpec::required(name, kind))
    }

    pub fn optional(self, name: impl Into<String>, kind: ParamKind, default: Option<Value>) -> Self {
        self.param(ParamSpec::optional(name, kind, default))
    }

    pub fn returns(mut self, shape: ReturnShape) -> Self {
        self.returns = shape;
        self
    }

    pub fn allow_extra(mut self) -> Self {
        self.allow_extra_params = true;
        self
    }

    /// Number of parameters that must be supplied.
    pub fn required_count(&self) -> usize {
        self.params.iter().filter(|p| !p.optional).count()
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Names of the required parameters, in declaration order.
    pub fn required_names(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|p| !p.optional)
            .map(|p| p.name.as_str())
    }

    /// Whether a declared caller-side signature resolves to this entry.
    /// Identity is name, total arity, and return shape.
    pub fn matches_declaration(&self, declared: &MethodSignature) -> bool {
        self.name == declared.name
            && self.arity() == declared.arity()
            && self.returns == declared.returns
    }

    /// Check structural invariants: parameter names unique, optional
    /// parameters after all required ones.
    pub fn validate(&self) -> Result<(), SignatureError> {
        let mut seen_optional = false;
        for (index, param) in self.params.iter().enumerate() {
            if self.params[..index].iter().any(|p| p.name == param.name) {
                return Err(SignatureError::DuplicateParam {
                    method: self.name.clone(),
                    param: param.name.clone(),
                });
            }
            if param.optional {
                seen_optional = true;
            } else if seen_optional {
                return Err(SignatureError::RequiredAfterOptional {
                    method: self.name.clone(),
                    param: param.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// A structurally invalid method signature.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("method '{method}' declares parameter '{param}' twice")]
    DuplicateParam { method: String, param: String },

    #[error("method '{method}' declares required parameter '{param}' after an optional one")]
    RequiredAfterOptional { method: String, param: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_checks() {
        assert!(ParamKind::Integer.accepts(&json!(3)));
        assert!(!ParamKind::Integer.accepts(&json!(3.5)));
        assert!(ParamKind::Float.accepts(&json!(3)));
        assert!(ParamKind::Any.accepts(&json!(null)));
        assert!(!ParamKind::String.accepts(&json!(1)));
    }

    #[test]
    fn test_validate_duplicate_param() {
        let signature = MethodSignature::new("f")
            .required("a", ParamKind::Integer)
            .required("a", ParamKind::Integer);
        assert_eq!(
            signature.validate(),
            Err(SignatureError::DuplicateParam {
                method: "f".into(),
                param: "a".into()
            })
        );
    }

    #[test]
    fn test_validate_required_after_optional() {
        let signature = MethodSignature::new("f")
            .optional("a", ParamKind::Integer, None)
            .required("b", ParamKind::Integer);
        assert!(matches!(
            signature.validate(),
            Err(SignatureError::RequiredAfterOptional { .. })
        ));
    }

    #[test]
    fn test_counts() {
        let signature = MethodSignature::new("f")
            .required("a", ParamKind::Integer)
            .optional("b", ParamKind::String, Some(json!("x")));
        assert_eq!(signature.required_count(), 1);
        assert_eq!(signature.arity(), 2);
        assert_eq!(signature.params[1].default_value(), json!("x"));
    }
}
