//! The dispatch pipeline: the interceptor chain wrapped around the terminal
//! handler, plus response finalization.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};
use wirecall_protocol::ErrorObject;

use crate::binder::bind;
use crate::catalog::{MethodCall, MethodCatalog};
use crate::context::{RequestContext, RequestState};
use crate::interceptor::{Interceptor, Next};
use crate::service::ServiceError;

/// One immutable pipeline shared by every request on a host.
pub(crate) struct Pipeline {
    chain: Arc<[Arc<dyn Interceptor>]>,
    terminal: Arc<TerminalHandler>,
}

impl Pipeline {
    pub(crate) fn new(
        interceptors: Vec<Arc<dyn Interceptor>>,
        catalog: Arc<MethodCatalog>,
        propagate_detail: bool,
    ) -> Self {
        Self {
            chain: interceptors.into(),
            terminal: Arc::new(TerminalHandler {
                catalog,
                propagate_detail,
            }),
        }
    }

    /// Traverse the chain and settle the context in a terminal state.
    pub(crate) async fn run(&self, ctx: RequestContext) -> RequestContext {
        let next = Next {
            chain: self.chain.clone(),
            index: 0,
            terminal: self.terminal.clone(),
        };
        let mut ctx = next.run(ctx).await;

        if ctx.is_notification() {
            if ctx.take_response().is_some() {
                debug!(method = ctx.method(), "discarding response set for a notification");
            }
            ctx.finish(RequestState::Dropped);
        } else if ctx.has_response() {
            ctx.finish(RequestState::Responded);
        } else if ctx.cancel.is_cancelled() || ctx.state() == RequestState::Dropped {
            ctx.finish(RequestState::Dropped);
        } else {
            // An interceptor consumed the request without answering it.
            ctx.respond(Value::Null);
            ctx.finish(RequestState::Responded);
        }
        ctx
    }
}

/// Resolves a service instance, invokes the bound method, and writes the
/// result or error into the context.
pub(crate) struct TerminalHandler {
    catalog: Arc<MethodCatalog>,
    propagate_detail: bool,
}

impl TerminalHandler {
    pub(crate) async fn execute(&self, mut ctx: RequestContext) -> RequestContext {
        if ctx.cancel.is_cancelled() {
            debug!(method = ctx.method(), "cancelled before handler start");
            ctx.advance(RequestState::Dropped);
            return ctx;
        }

        let binding = match bind(&self.catalog, ctx.method(), ctx.params()) {
            Ok(binding) => binding,
            Err(error) => {
                if ctx.is_notification() {
                    warn!(method = ctx.method(), %error, "notification did not bind");
                } else {
                    ctx.respond_error(error.to_error_object());
                }
                return ctx;
            }
        };

        ctx.advance(RequestState::Bound);
        let instance = binding.method.factory.create();
        ctx.set_service(instance.clone());
        let call = MethodCall {
            args: binding.args,
            session: ctx.session.clone(),
            cancel: ctx.cancel.clone(),
        };

        debug!(
            method = ctx.method(),
            service = %binding.method.service,
            session = ctx.session.id(),
            "invoking handler"
        );
        ctx.advance(RequestState::Executing);

        let work = (binding.method.target)(instance, call);
        let outcome = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => None,
            outcome = work => Some(outcome),
        };

        match outcome {
            None => {
                debug!(method = ctx.method(), "cancelled during handler execution");
                ctx.advance(RequestState::Dropped);
            }
            Some(Ok(result)) => {
                if !ctx.is_notification() {
                    ctx.respond(result);
                }
            }
            Some(Err(error)) => self.fail(&mut ctx, error),
        }
        ctx
    }

    fn fail(&self, ctx: &mut RequestContext, error: ServiceError) {
        if ctx.is_notification() {
            warn!(method = ctx.method(), %error, "notification handler failed");
            return;
        }
        match error {
            ServiceError::Structured(error) => ctx.respond_error(error),
            ServiceError::Failure(message) => {
                let data = self.propagate_detail.then(|| json!(message));
                ctx.respond_error(ErrorObject::internal_error(data));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationHandle;
    use crate::catalog::{MethodFuture, ServiceDescriptor};
    use crate::service::ServiceInstance;
    use crate::session::Session;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wirecall_protocol::{JsonRpcNotification, JsonRpcRequest, MethodSignature, ParamKind};

    fn echo_target(_: ServiceInstance, call: MethodCall) -> MethodFuture {
        Box::pin(async move { Ok(call.args.into_iter().next().unwrap_or(Value::Null)) })
    }

    fn failing_target(_: ServiceInstance, _: MethodCall) -> MethodFuture {
        Box::pin(async { Err(ServiceError::Failure("boom".into())) })
    }

    fn test_pipeline(interceptors: Vec<Arc<dyn Interceptor>>, propagate: bool) -> Pipeline {
        let catalog = MethodCatalog::build(vec![ServiceDescriptor::new("test")
            .method(
                MethodSignature::new("echo").required("text", ParamKind::String),
                echo_target,
            )
            .method(MethodSignature::new("fail"), failing_target)])
        .unwrap();
        Pipeline::new(interceptors, Arc::new(catalog), propagate)
    }

    fn request(method: &str, params: Vec<Value>) -> RequestContext {
        let mut ctx = RequestContext::new(
            JsonRpcRequest::with_positional(1, method, params).into(),
            Session::empty(),
            CancellationHandle::new(),
        );
        ctx.advance(RequestState::Parsed);
        ctx
    }

    #[tokio::test]
    async fn test_terminal_invokes_handler() {
        let pipeline = test_pipeline(vec![], true);
        let ctx = pipeline.run(request("echo", vec![json!("hi")])).await;
        assert_eq!(ctx.state(), RequestState::Responded);
        assert_eq!(ctx.response().unwrap().result(), Some(&json!("hi")));
    }

    #[tokio::test]
    async fn test_unknown_method_answers_not_found() {
        let pipeline = test_pipeline(vec![], true);
        let ctx = pipeline.run(request("nope", vec![])).await;
        assert_eq!(ctx.response().unwrap().error_object().unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_failure_becomes_internal_error_with_detail() {
        let pipeline = test_pipeline(vec![], true);
        let ctx = pipeline.run(request("fail", vec![])).await;
        let error = ctx.response().unwrap().error_object().unwrap().clone();
        assert_eq!(error.code, -32603);
        assert_eq!(error.data, Some(json!("boom")));
    }

    #[tokio::test]
    async fn test_failure_detail_suppressed() {
        let pipeline = test_pipeline(vec![], false);
        let ctx = pipeline.run(request("fail", vec![])).await;
        let error = ctx.response().unwrap().error_object().unwrap().clone();
        assert_eq!(error.data, None);
    }

    struct ShortCircuit;

    #[async_trait]
    impl Interceptor for ShortCircuit {
        async fn invoke(&self, mut ctx: RequestContext, _next: Next) -> RequestContext {
            ctx.respond(json!({"ok": true}));
            ctx
        }
    }

    #[tokio::test]
    async fn test_interceptor_short_circuit_skips_terminal() {
        // "fail" would produce an internal error if the terminal ran.
        let pipeline = test_pipeline(vec![Arc::new(ShortCircuit)], true);
        let ctx = pipeline.run(request("fail", vec![])).await;
        assert_eq!(ctx.response().unwrap().result(), Some(&json!({"ok": true})));
    }

    struct Decline;

    #[async_trait]
    impl Interceptor for Decline {
        async fn invoke(&self, ctx: RequestContext, _next: Next) -> RequestContext {
            ctx
        }
    }

    #[tokio::test]
    async fn test_decline_yields_empty_response_for_request() {
        let pipeline = test_pipeline(vec![Arc::new(Decline)], true);
        let ctx = pipeline.run(request("echo", vec![json!("x")])).await;
        assert_eq!(ctx.response().unwrap().result(), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_decline_drops_notification() {
        let pipeline = test_pipeline(vec![Arc::new(Decline)], true);
        let mut ctx = RequestContext::new(
            JsonRpcNotification::new("echo", None).into(),
            Session::empty(),
            CancellationHandle::new(),
        );
        ctx.advance(RequestState::Parsed);
        let ctx = pipeline.run(ctx).await;
        assert_eq!(ctx.state(), RequestState::Dropped);
        assert!(ctx.response().is_none());
    }

    struct Order {
        tag: &'static str,
        log: Arc<std::sync::Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Interceptor for Order {
        async fn invoke(&self, ctx: RequestContext, next: Next) -> RequestContext {
            self.log.lock().unwrap().push(self.tag);
            next.run(ctx).await
        }
    }

    #[tokio::test]
    async fn test_registration_order() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let pipeline = test_pipeline(
            vec![
                Arc::new(Order { tag: "first", log: log.clone() }),
                Arc::new(Order { tag: "second", log: log.clone() }),
            ],
            true,
        );
        pipeline.run(request("echo", vec![json!("x")])).await;
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_cancelled_request_yields_no_response() {
        let pipeline = test_pipeline(vec![], true);
        let cancel = CancellationHandle::new();
        cancel.cancel();
        let mut ctx = RequestContext::new(
            JsonRpcRequest::with_positional(9, "echo", vec![json!("x")]).into(),
            Session::empty(),
            cancel,
        );
        ctx.advance(RequestState::Parsed);
        let ctx = pipeline.run(ctx).await;
        assert_eq!(ctx.state(), RequestState::Dropped);
        assert!(ctx.response().is_none());
    }

    #[tokio::test]
    async fn test_fresh_instance_per_request() {
        static CREATED: AtomicUsize = AtomicUsize::new(0);

        struct Counting;
        impl crate::service::ServiceFactory for Counting {
            fn create(&self) -> ServiceInstance {
                CREATED.fetch_add(1, Ordering::SeqCst);
                Arc::new(())
            }
        }

        let catalog = MethodCatalog::build(vec![ServiceDescriptor::new("svc")
            .factory(Arc::new(Counting))
            .method(MethodSignature::new("touch"), |_, _| {
                Box::pin(async { Ok(Value::Null) })
            })])
        .unwrap();
        let pipeline = Pipeline::new(vec![], Arc::new(catalog), true);

        pipeline.run(request("touch", vec![])).await;
        pipeline.run(request("touch", vec![])).await;
        assert_eq!(CREATED.load(Ordering::SeqCst), 2);
    }
}
