//! The method catalog: from declarative service descriptors to an immutable
//! name → overload-set map.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use wirecall_protocol::{MethodSignature, SignatureError};

use crate::cancellation::CancellationHandle;
use crate::service::{FnFactory, ServiceError, ServiceFactory, ServiceInstance};
use crate::session::Session;

/// The future a method target resolves to.
pub type MethodFuture = BoxFuture<'static, Result<Value, ServiceError>>;

/// The opaque invoke handle of one catalog entry: given the service instance
/// and the bound call, produce the result.
pub type MethodTarget =
    Arc<dyn Fn(ServiceInstance, MethodCall) -> MethodFuture + Send + Sync>;

/// Everything a target receives besides the instance: the positional argument
/// vector the binder produced, the ambient session, and the request's
/// cancellation signal.
pub struct MethodCall {
    pub args: Vec<Value>,
    pub session: Session,
    pub cancel: CancellationHandle,
}

/// A declarative description of one service type: its name, the factory that
/// produces instances, and its callable entries.
///
/// This replaces attribute/reflection-driven registration: entries are
/// enumerated explicitly and walked at build time.
pub struct ServiceDescriptor {
    name: String,
    factory: Arc<dyn ServiceFactory>,
    entries: Vec<(MethodSignature, MethodTarget)>,
}

impl ServiceDescriptor {
    /// New descriptor with the default fresh-unit-instance factory. Services
    /// whose targets ignore the instance never need to replace it.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            factory: Arc::new(FnFactory::fresh(|| ())),
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the instance factory for this service.
    pub fn factory(mut self, factory: Arc<dyn ServiceFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Add a callable entry. The signature's name is the RPC name.
    pub fn method<F>(mut self, signature: MethodSignature, target: F) -> Self
    where
        F: Fn(ServiceInstance, MethodCall) -> MethodFuture + Send + Sync + 'static,
    {
        self.entries.push((signature, Arc::new(target)));
        self
    }

    /// Add a callable entry under an overridden RPC name.
    pub fn method_as<F>(self, rpc_name: impl Into<String>, mut signature: MethodSignature, target: F) -> Self
    where
        F: Fn(ServiceInstance, MethodCall) -> MethodFuture + Send + Sync + 'static,
    {
        signature.name = rpc_name.into();
        self.method(signature, target)
    }
}

/// One resolvable catalog entry.
pub struct BoundMethod {
    /// The owning service, for log correlation.
    pub service: Arc<str>,
    pub signature: MethodSignature,
    pub factory: Arc<dyn ServiceFactory>,
    pub target: MethodTarget,
}

impl std::fmt::Debug for BoundMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundMethod")
            .field("service", &self.service)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

/// The immutable method catalog a host dispatches against.
pub struct MethodCatalog {
    methods: HashMap<String, Vec<Arc<BoundMethod>>>,
}

impl MethodCatalog {
    /// Build a catalog from descriptors, validating every signature and
    /// rejecting overload sets without a deterministic discriminator.
    pub fn build(descriptors: Vec<ServiceDescriptor>) -> Result<Self, CatalogError> {
        let mut seen_services = BTreeSet::new();
        let mut methods: HashMap<String, Vec<Arc<BoundMethod>>> = HashMap::new();

        for descriptor in descriptors {
            if !seen_services.insert(descriptor.name.clone()) {
                return Err(CatalogError::DuplicateService(descriptor.name));
            }
            let service: Arc<str> = descriptor.name.into();
            for (signature, target) in descriptor.entries {
                signature.validate()?;
                methods.entry(signature.name.clone()).or_default().push(Arc::new(
                    BoundMethod {
                        service: service.clone(),
                        signature,
                        factory: descriptor.factory.clone(),
                        target,
                    },
                ));
            }
        }

        for (name, overloads) in &methods {
            for (i, a) in overloads.iter().enumerate() {
                for b in &overloads[i + 1..] {
                    if let Some(detail) = indistinguishable(&a.signature, &b.signature) {
                        return Err(CatalogError::AmbiguousOverload {
                            method: name.clone(),
                            detail,
                        });
                    }
                }
            }
        }

        debug!(methods = methods.len(), "built method catalog");
        Ok(Self { methods })
    }

    /// The overload set for a method name, in registration order.
    pub fn overloads(&self, method: &str) -> Option<&[Arc<BoundMethod>]> {
        self.methods.get(method).map(Vec::as_slice)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// Checks whether two overloads can ever tie under the binder's scoring, in
/// which case no deterministic discriminator exists.
fn indistinguishable(a: &MethodSignature, b: &MethodSignature) -> Option<String> {
    // Positional form: probe every supplied-argument count both candidates
    // admit and compare (matched, unmatched-optional) scores.
    let admits = |s: &MethodSignature, n: usize| {
        n >= s.required_count() && (s.allow_extra_params || n <= s.arity())
    };
    let score = |s: &MethodSignature, n: usize| {
        let matched = n.min(s.arity());
        (matched, s.arity() - matched)
    };
    for n in 0..=a.arity().max(b.arity()) + 1 {
        if admits(a, n) && admits(b, n) && score(a, n) == score(b, n) {
            return Some(format!("{n} positional argument(s) admit both overloads"));
        }
    }

    // Named form: identical required and optional name sets tie on any input
    // both admit.
    fn names(s: &MethodSignature, optional: bool) -> BTreeSet<&str> {
        s.params
            .iter()
            .filter(|p| p.optional == optional)
            .map(|p| p.name.as_str())
            .collect::<BTreeSet<_>>()
    }
    if names(a, false) == names(b, false) && names(a, true) == names(b, true) {
        return Some("identical parameter name sets".to_string());
    }

    None
}

/// Catalog construction failures.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("overloads of '{method}' cannot be deterministically disambiguated: {detail}")]
    AmbiguousOverload { method: String, detail: String },

    #[error("service '{0}' registered twice")]
    DuplicateService(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use wirecall_protocol::ParamKind;

    fn noop_target(_: ServiceInstance, _: MethodCall) -> MethodFuture {
        Box::pin(async { Ok(Value::Null) })
    }

    #[test]
    fn test_build_and_lookup() {
        let descriptor = ServiceDescriptor::new("math")
            .method(MethodSignature::new("add").required("a", ParamKind::Integer), noop_target)
            .method_as(
                "math.sub",
                MethodSignature::new("subtract").required("a", ParamKind::Integer),
                noop_target,
            );
        let catalog = MethodCatalog::build(vec![descriptor]).unwrap();
        assert_eq!(catalog.overloads("add").unwrap().len(), 1);
        assert!(catalog.overloads("subtract").is_none());
        assert!(catalog.overloads("math.sub").is_some());
    }

    #[test]
    fn test_arity_discriminated_overloads_allowed() {
        let descriptor = ServiceDescriptor::new("f")
            .method(MethodSignature::new("f").required("a", ParamKind::Integer), noop_target)
            .method(
                MethodSignature::new("f")
                    .required("a", ParamKind::Integer)
                    .required("b", ParamKind::Integer),
                noop_target,
            );
        assert!(MethodCatalog::build(vec![descriptor]).is_ok());
    }

    #[test]
    fn test_same_arity_overloads_rejected() {
        let descriptor = ServiceDescriptor::new("f")
            .method(MethodSignature::new("f").required("a", ParamKind::Integer), noop_target)
            .method(MethodSignature::new("f").required("x", ParamKind::String), noop_target);
        assert!(matches!(
            MethodCatalog::build(vec![descriptor]),
            Err(CatalogError::AmbiguousOverload { .. })
        ));
    }

    #[test]
    fn test_invalid_signature_rejected() {
        let descriptor = ServiceDescriptor::new("f").method(
            MethodSignature::new("f")
                .required("a", ParamKind::Integer)
                .required("a", ParamKind::Integer),
            noop_target,
        );
        assert!(matches!(
            MethodCatalog::build(vec![descriptor]),
            Err(CatalogError::Signature(_))
        ));
    }

    #[test]
    fn test_duplicate_service_rejected() {
        let result = MethodCatalog::build(vec![
            ServiceDescriptor::new("dup"),
            ServiceDescriptor::new("dup"),
        ]);
        assert!(matches!(result, Err(CatalogError::DuplicateService(_))));
    }
}
