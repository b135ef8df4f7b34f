use crate::application_impl::SessionManager;
use crate::domain_model::*;
use crate::domain_port::*;
use reqwest::header::AUTHORIZATION;
use std::sync::Arc;
use tracing::{debug, info};

/// Retries a request once, with a reissued access token, when it fails
/// with an expiry status.
///
/// If the stored token was rotated while the request was in flight, the
/// retry uses it without another reissue. If the reissue itself fails the
/// session is ended and the original error is returned.
pub struct ReissueOnExpiry<S> {
    inner: S,
    session: Arc<SessionManager>,
}

impl<S> ReissueOnExpiry<S> {
    pub fn new(inner: S, session: Arc<SessionManager>) -> Self {
        Self { inner, session }
    }

    fn should_reissue(&self, ctx: &RequestContext, err: &RequestError) -> bool {
        let expired = err
            .status()
            .is_some_and(|status| self.session.expiry().is_expired(status));
        expired && !ctx.already_retried() && !self.session.is_reissue_target(&ctx.url)
    }

    /// The stored token the request will carry, when it carries no explicit one.
    async fn stored_bearer(&self, ctx: &RequestContext) -> Result<Option<String>, RequestError> {
        if ctx.bearer.is_some()
            || ctx.headers.contains_key(AUTHORIZATION)
            || self.session.is_reissue_target(&ctx.url)
        {
            return Ok(None);
        }
        Ok(self.session.access_token().await?)
    }

    /// A stored access token newer than `sent`, if one has replaced it.
    async fn rotated_since(&self, sent: Option<&str>) -> Option<String> {
        let sent = sent?;
        match self.session.access_token().await {
            Ok(Some(current)) if current != sent => Some(current),
            _ => None,
        }
    }
}

#[async_trait::async_trait]
impl<S: RequestSender> RequestSender for ReissueOnExpiry<S> {
    async fn send(&self, ctx: RequestContext) -> Result<ApiResponse, RequestError> {
        let original = ctx.clone();
        let sent = self.stored_bearer(&original).await?;
        let err = match self.inner.send(ctx).await {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };
        if !self.should_reissue(&original, &err) {
            return Err(err);
        }

        debug!(request_id = %original.id, status = ?err.status(), "access token expired");
        let access_token = match self.rotated_since(sent.as_deref()).await {
            Some(token) => {
                debug!(request_id = %original.id, "access token already rotated");
                token
            }
            None => match self.session.obtain_new_access_token().await {
                Ok(token) => token,
                Err(cause) => {
                    self.session.end_session(&cause).await;
                    return Err(err);
                }
            },
        };

        let Some(retry) = original.into_retry(access_token) else {
            return Err(err);
        };
        info!(request_id = %retry.id, "retrying request with reissued token");
        self.inner.send(retry).await
    }
}
