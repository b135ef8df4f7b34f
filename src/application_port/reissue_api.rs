use crate::domain_model::TokenPair;
use crate::domain_port::StorageError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ReissueError {
    #[error("no session: refresh token is missing")]
    NoSession,
    #[error("reissue response violates protocol: {0}")]
    Protocol(String),
    #[error("reissue transport error: {0}")]
    Transport(String),
    #[error("reissue call timed out")]
    Timeout,
    #[error("credential storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Exchanges a refresh token for a brand-new access/refresh pair.
#[async_trait::async_trait]
pub trait ReissueApi: Send + Sync {
    async fn reissue(&self, refresh_token: &str) -> Result<TokenPair, ReissueError>;
}
