//! Interception: middleware composed around the terminal handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::error;
use wirecall_protocol::ErrorObject;

use crate::context::{RequestContext, RequestState};
use crate::pipeline::TerminalHandler;

/// A middleware element of the dispatch pipeline.
///
/// Interceptors run in registration order. Each receives the context by
/// value together with the continuation [`Next`]; it may mutate the context,
/// run the continuation (at most once — `Next` is consumed by value, so a
/// second invocation is unrepresentable), or decline it and return early.
/// Declining without filling the response slot yields a default empty
/// response for requests and a silent drop for notifications.
///
/// # Examples
///
/// ```rust,ignore
/// struct Logging;
///
/// #[async_trait]
/// impl Interceptor for Logging {
///     async fn invoke(&self, ctx: RequestContext, next: Next) -> RequestContext {
///         debug!(method = ctx.method(), "request in");
///         let ctx = next.run(ctx).await;
///         debug!(responded = ctx.has_response(), "request out");
///         ctx
///     }
/// }
/// ```
#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn invoke(&self, ctx: RequestContext, next: Next) -> RequestContext;
}

/// The continuation handed to an interceptor: the rest of the chain plus the
/// terminal handler. Consumed by [`run`](Self::run).
pub struct Next {
    pub(crate) chain: Arc<[Arc<dyn Interceptor>]>,
    pub(crate) index: usize,
    pub(crate) terminal: Arc<TerminalHandler>,
}

impl Next {
    /// Run the downstream chain to completion.
    pub async fn run(self, ctx: RequestContext) -> RequestContext {
        match self.chain.get(self.index).cloned() {
            Some(interceptor) => {
                let next = Next {
                    chain: self.chain,
                    index: self.index + 1,
                    terminal: self.terminal,
                };
                interceptor.invoke(ctx, next).await
            }
            None => self.terminal.execute(ctx).await,
        }
    }
}

/// A synchronous interceptor, adapted onto the async contract by running on
/// a blocking worker.
///
/// The worker thread is occupied for the lifetime of the call: invoking the
/// continuation through [`BlockingNext::run`] parks the worker until the
/// downstream chain completes. Requires the multi-threaded runtime.
pub trait SyncInterceptor: Send + Sync {
    fn invoke(&self, ctx: RequestContext, next: BlockingNext) -> RequestContext;
}

/// The blocking continuation handed to a [`SyncInterceptor`]. Consumed by
/// [`run`](Self::run), which drives the async chain via `Handle::block_on`.
pub struct BlockingNext {
    next: Next,
    handle: tokio::runtime::Handle,
}

impl BlockingNext {
    pub fn run(self, ctx: RequestContext) -> RequestContext {
        self.handle.block_on(self.next.run(ctx))
    }
}

/// Bridges a [`SyncInterceptor`] into the async chain.
pub(crate) struct SyncAdapter<S>(pub(crate) Arc<S>);

#[async_trait]
impl<S: SyncInterceptor + 'static> Interceptor for SyncAdapter<S> {
    async fn invoke(&self, ctx: RequestContext, next: Next) -> RequestContext {
        let inner = self.0.clone();
        let handle = tokio::runtime::Handle::current();

        // Keep enough of the request to answer if the worker panics.
        let envelope = ctx.envelope().clone();
        let session = ctx.session.clone();
        let cancel = ctx.cancel.clone();

        let joined = tokio::task::spawn_blocking(move || {
            inner.invoke(ctx, BlockingNext { next, handle })
        })
        .await;

        match joined {
            Ok(ctx) => ctx,
            Err(join_error) => {
                error!(error = %join_error, "synchronous interceptor panicked");
                let mut ctx = RequestContext::new(envelope, session, cancel);
                ctx.advance(RequestState::Parsed);
                if !ctx.is_notification() {
                    ctx.respond_error(ErrorObject::internal_error(Some(json!(
                        "interceptor panicked"
                    ))));
                }
                ctx
            }
        }
    }
}
