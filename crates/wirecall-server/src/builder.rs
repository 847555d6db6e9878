//! Host composition root.

use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::info;
use wirecall_framing::MessageObserver;

use crate::catalog::{CatalogError, MethodCatalog, ServiceDescriptor};
use crate::config::HostOptions;
use crate::host::RpcHost;
use crate::interceptor::{Interceptor, SyncAdapter, SyncInterceptor};
use crate::pipeline::Pipeline;
use crate::session::Session;

/// Builds a started [`RpcHost`] from services, interceptors, a session, and
/// options.
///
/// Registration-time problems are collected and reported together at
/// [`build`](Self::build) rather than panicking mid-chain.
pub struct RpcHostBuilder {
    services: Vec<ServiceDescriptor>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    session: Session,
    options: HostOptions,
    observer: Option<Arc<dyn MessageObserver>>,
    validation_errors: Vec<String>,
}

impl RpcHostBuilder {
    pub fn new() -> Self {
        Self {
            services: Vec::new(),
            interceptors: Vec::new(),
            session: Session::empty(),
            options: HostOptions::default(),
            observer: None,
            validation_errors: Vec::new(),
        }
    }

    /// Add a service type to the catalog-to-be.
    pub fn register(mut self, descriptor: ServiceDescriptor) -> Self {
        if self.services.iter().any(|s| s.name() == descriptor.name()) {
            self.validation_errors
                .push(format!("service '{}' registered twice", descriptor.name()));
        }
        self.services.push(descriptor);
        self
    }

    /// Append an interceptor. Interceptors run in registration order.
    pub fn intercept<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Append a synchronous interceptor, adapted onto a blocking worker.
    pub fn intercept_sync<S: SyncInterceptor + 'static>(mut self, interceptor: S) -> Self {
        self.interceptors.push(Arc::new(SyncAdapter(Arc::new(interceptor))));
        self
    }

    /// Set the ambient session value handed to every request.
    pub fn session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    pub fn options(mut self, options: HostOptions) -> Self {
        self.options = options;
        self
    }

    /// Attach a message observer to the outbound framed writer. It sees each
    /// serialized body before the bytes hit the stream.
    pub fn observe(mut self, observer: Arc<dyn MessageObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Build the catalog and start the host on a pair of byte streams.
    pub fn build<R, W>(self, reader: R, writer: W) -> Result<RpcHost, HostError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        if !self.validation_errors.is_empty() {
            return Err(HostError::Config(self.validation_errors.join("; ")));
        }

        let catalog = Arc::new(MethodCatalog::build(self.services)?);
        info!(
            methods = catalog.method_names().count(),
            interceptors = self.interceptors.len(),
            session = self.session.id(),
            "starting host"
        );
        let pipeline = Pipeline::new(
            self.interceptors,
            catalog,
            self.options.propagate_handler_exception_detail,
        );
        Ok(RpcHost::start(
            pipeline,
            self.session,
            self.options,
            self.observer,
            reader,
            writer,
        ))
    }
}

impl Default for RpcHostBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Host construction failures.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("invalid host configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
