//! Service instances, factories, and the domain error surface.

use std::any::Any;
use std::sync::Arc;

use thiserror::Error;
use wirecall_protocol::ErrorObject;

/// An opaque handle to one handler instance. Targets downcast it to their
/// concrete service type.
pub type ServiceInstance = Arc<dyn Any + Send + Sync>;

/// Produces the handler instance for one request.
///
/// The default factory creates a fresh instance per invocation; custom
/// factories may cache, pool, or inject dependencies. Factories are shared
/// and must be cheap to call on the request path.
pub trait ServiceFactory: Send + Sync {
    fn create(&self) -> ServiceInstance;
}

/// Factory over a plain closure. `FnFactory::fresh(MyService::default)`
/// yields the per-request-instance default behavior.
pub struct FnFactory<F>(F);

impl<F> FnFactory<F>
where
    F: Fn() -> ServiceInstance + Send + Sync,
{
    pub fn new(create: F) -> Self {
        Self(create)
    }
}

impl FnFactory<Box<dyn Fn() -> ServiceInstance + Send + Sync>> {
    /// Factory that builds a fresh `T` per invocation.
    pub fn fresh<T, C>(construct: C) -> Self
    where
        T: Any + Send + Sync,
        C: Fn() -> T + Send + Sync + 'static,
    {
        Self(Box::new(move || Arc::new(construct()) as ServiceInstance))
    }
}

impl<F> ServiceFactory for FnFactory<F>
where
    F: Fn() -> ServiceInstance + Send + Sync,
{
    fn create(&self) -> ServiceInstance {
        (self.0)()
    }
}

/// What a bound method returns on failure.
///
/// Handlers speak in domain terms; the pipeline owns the translation to
/// protocol error objects. A `Structured` error passes through verbatim; a
/// `Failure` becomes an internal error whose `data` carries the message when
/// the host is configured to propagate detail.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Structured(ErrorObject),

    #[error("{0}")]
    Failure(String),
}

impl From<ErrorObject> for ServiceError {
    fn from(error: ErrorObject) -> Self {
        ServiceError::Structured(error)
    }
}

impl From<String> for ServiceError {
    fn from(message: String) -> Self {
        ServiceError::Failure(message)
    }
}

impl From<&str> for ServiceError {
    fn from(message: &str) -> Self {
        ServiceError::Failure(message.to_string())
    }
}
