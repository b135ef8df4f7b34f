use crate::domain_model::*;
use crate::domain_port::StorageError;
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("request failed with status {status}")]
    Status { status: StatusCode, body: Vec<u8> },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("credential storage error: {0}")]
    Storage(#[from] StorageError),
}

impl RequestError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RequestError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Sends one request and returns a 2xx response, or the failure.
///
/// Non-2xx responses come back as [`RequestError::Status`]. Middleware
/// layers implement this trait by wrapping another sender.
#[async_trait::async_trait]
pub trait RequestSender: Send + Sync {
    async fn send(&self, ctx: RequestContext) -> Result<ApiResponse, RequestError>;
}

#[async_trait::async_trait]
impl<S: RequestSender + ?Sized> RequestSender for std::sync::Arc<S> {
    async fn send(&self, ctx: RequestContext) -> Result<ApiResponse, RequestError> {
        (**self).send(ctx).await
    }
}
