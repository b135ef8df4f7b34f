use crate::application_impl::SessionManager;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;
use tracing::trace;

/// Attaches the stored access token to outgoing requests.
///
/// An `Authorization` header set by the caller becomes the explicit bearer.
/// Requests with an explicit bearer, and requests to the reissue endpoint,
/// do not get the stored token. Without a stored token the request goes
/// out unauthenticated.
pub struct BearerAuth<S> {
    inner: S,
    session: Arc<SessionManager>,
}

impl<S> BearerAuth<S> {
    pub fn new(inner: S, session: Arc<SessionManager>) -> Self {
        Self { inner, session }
    }
}

#[async_trait::async_trait]
impl<S: RequestSender> RequestSender for BearerAuth<S> {
    async fn send(&self, mut ctx: RequestContext) -> Result<ApiResponse, RequestError> {
        let from_header = ctx.take_authorization();
        if ctx.bearer.is_none() {
            ctx.bearer = from_header;
        }
        if ctx.bearer.is_none() && !self.session.is_reissue_target(&ctx.url) {
            ctx.bearer = self.session.access_token().await?;
            trace!(request_id = %ctx.id, attached = ctx.bearer.is_some(), "bearer attachment");
        }
        self.inner.send(ctx).await
    }
}
