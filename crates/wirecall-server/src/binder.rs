//! The method binder: selects one overload for an inbound request and
//! produces its positional argument vector.

use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;
use wirecall_protocol::{ErrorObject, MethodSignature, RequestParams};

use crate::catalog::{BoundMethod, MethodCatalog};

/// A successful bind: the chosen overload and the decoded arguments, in
/// declaration order.
#[derive(Debug)]
pub struct Binding {
    pub method: Arc<BoundMethod>,
    pub args: Vec<Value>,
}

/// Why a request failed to bind. Converts directly to the protocol error
/// the pipeline answers with.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("method '{0}' not found")]
    MethodNotFound(String),

    #[error("invalid params: {message}")]
    InvalidParams {
        message: String,
        data: Option<Value>,
    },
}

impl BindError {
    fn invalid(message: impl Into<String>, data: Option<Value>) -> Self {
        BindError::InvalidParams {
            message: message.into(),
            data,
        }
    }

    pub fn to_error_object(&self) -> ErrorObject {
        match self {
            BindError::MethodNotFound(method) => ErrorObject::method_not_found(method),
            BindError::InvalidParams { message, data } => {
                ErrorObject::invalid_params(message.clone(), data.clone())
            }
        }
    }
}

/// How well a candidate fits the supplied params. Larger is better on
/// `matched`; smaller is better on `unmatched_optional`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fit {
    matched: usize,
    unmatched_optional: usize,
}

/// Select at most one overload and decode its arguments.
///
/// Admission and scoring are purely structural (arity and name presence);
/// type checking happens only on the winning candidate, so the same
/// `(catalog, method, params)` triple always yields the same descriptor or
/// the same error kind.
pub fn bind(
    catalog: &MethodCatalog,
    method: &str,
    params: Option<&RequestParams>,
) -> Result<Binding, BindError> {
    let overloads = catalog
        .overloads(method)
        .ok_or_else(|| BindError::MethodNotFound(method.to_string()))?;

    let mut best: Option<(Fit, &Arc<BoundMethod>)> = None;
    let mut tied = false;
    for candidate in overloads {
        let Some(fit) = admit(&candidate.signature, params) else {
            continue;
        };
        match &best {
            None => best = Some((fit, candidate)),
            Some((leader, _)) => {
                if fit.matched > leader.matched
                    || (fit.matched == leader.matched
                        && fit.unmatched_optional < leader.unmatched_optional)
                {
                    best = Some((fit, candidate));
                    tied = false;
                } else if fit == *leader {
                    tied = true;
                }
            }
        }
    }

    let Some((_, winner)) = best else {
        return Err(BindError::invalid(
            format!("no overload of '{method}' accepts the supplied params"),
            None,
        ));
    };
    if tied {
        return Err(BindError::invalid(
            format!("params match multiple overloads of '{method}'"),
            Some(json!({ "method": method })),
        ));
    }

    let args = decode_args(&winner.signature, params)?;
    Ok(Binding {
        method: winner.clone(),
        args,
    })
}

/// Structural admission per params shape. `None` = candidate rejected.
fn admit(signature: &MethodSignature, params: Option<&RequestParams>) -> Option<Fit> {
    match params {
        None | Some(RequestParams::Null) => (signature.required_count() == 0).then(|| Fit {
            matched: 0,
            unmatched_optional: signature.arity(),
        }),
        Some(RequestParams::Array(values)) => {
            let supplied = values.len();
            let enough = supplied >= signature.required_count();
            let not_too_many = signature.allow_extra_params || supplied <= signature.arity();
            (enough && not_too_many).then(|| {
                let matched = supplied.min(signature.arity());
                Fit {
                    matched,
                    unmatched_optional: signature.arity() - matched,
                }
            })
        }
        Some(RequestParams::Object(map)) => {
            let required_present = signature.required_names().all(|name| map.contains_key(name));
            let no_strays = signature.allow_extra_params
                || map
                    .keys()
                    .all(|name| signature.params.iter().any(|p| &p.name == name));
            (required_present && no_strays).then(|| {
                let matched = signature
                    .params
                    .iter()
                    .filter(|p| map.contains_key(&p.name))
                    .count();
                Fit {
                    matched,
                    unmatched_optional: signature
                        .params
                        .iter()
                        .filter(|p| p.optional && !map.contains_key(&p.name))
                        .count(),
                }
            })
        }
    }
}

/// Decode every declared slot of the winning candidate. Absent optionals take
/// their declared defaults; supplied values are type-checked against the
/// declared kind.
fn decode_args(
    signature: &MethodSignature,
    params: Option<&RequestParams>,
) -> Result<Vec<Value>, BindError> {
    let mut args = Vec::with_capacity(signature.arity());
    for (index, spec) in signature.params.iter().enumerate() {
        let supplied = match params {
            Some(RequestParams::Array(values)) => values.get(index),
            Some(RequestParams::Object(map)) => map.get(&spec.name),
            _ => None,
        };
        match supplied {
            Some(value) => {
                if !spec.kind.accepts(value) {
                    return Err(BindError::invalid(
                        format!(
                            "parameter '{}' expects {}, got {}",
                            spec.name,
                            spec.kind.name(),
                            json_type_name(value)
                        ),
                        Some(json!({ "parameter": spec.name, "expected": spec.kind.name() })),
                    ));
                }
                args.push(value.clone());
            }
            None => args.push(spec.default_value()),
        }
    }
    // Values beyond the declared parameters are admitted only under
    // allow_extra_params, and are dropped here.
    Ok(args)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
