use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Absolute URL of the reissue endpoint.
    pub reissue_url: Url,
    pub keys: StorageKeys,
    pub expiry: ExpiryPolicy,
    pub reissue_timeout: Duration,
}

impl SessionConfig {
    pub fn new(reissue_url: Url) -> Self {
        Self {
            reissue_url,
            keys: StorageKeys::default(),
            expiry: ExpiryPolicy::default(),
            reissue_timeout: DEFAULT_REISSUE_TIMEOUT,
        }
    }
}

/// The authenticated session: one credential store and one reissue
/// coordinator, shared by every request pipeline built on top of it.
pub struct SessionManager {
    credentials: Arc<CredentialStore>,
    coordinator: ReissueCoordinator,
    reissue_url: Url,
    expiry: ExpiryPolicy,
}

impl SessionManager {
    pub fn new(
        config: SessionConfig,
        storage: Arc<dyn KeyValueStore>,
        reissue_api: Arc<dyn ReissueApi>,
    ) -> Self {
        let credentials = Arc::new(CredentialStore::new(storage, config.keys));
        let coordinator =
            ReissueCoordinator::new(credentials.clone(), reissue_api, config.reissue_timeout);
        Self {
            credentials,
            coordinator,
            reissue_url: config.reissue_url,
            expiry: config.expiry,
        }
    }

    /// One-time load and legacy-key migration; call at startup.
    pub async fn initialize(&self) -> Result<(), StorageError> {
        self.credentials.initialize().await
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn expiry(&self) -> ExpiryPolicy {
        self.expiry
    }

    pub fn reissue_url(&self) -> &Url {
        &self.reissue_url
    }

    /// True when `url` addresses the reissue endpoint, ignoring query and fragment.
    pub fn is_reissue_target(&self, url: &Url) -> bool {
        url.scheme() == self.reissue_url.scheme()
            && url.host_str() == self.reissue_url.host_str()
            && url.port_or_known_default() == self.reissue_url.port_or_known_default()
            && url.path().trim_end_matches('/') == self.reissue_url.path().trim_end_matches('/')
    }

    /// Store the tokens returned by a login or signup.
    pub async fn establish(&self, tokens: &TokenPair) -> Result<(), StorageError> {
        self.credentials.replace(tokens).await?;
        info!("session established");
        Ok(())
    }

    pub async fn set_tokens(
        &self,
        access: Option<&str>,
        refresh: Option<&str>,
    ) -> Result<(), StorageError> {
        self.credentials.set_tokens(access, refresh).await
    }

    pub async fn access_token(&self) -> Result<Option<String>, StorageError> {
        self.credentials.access_token().await
    }

    pub async fn refresh_token(&self) -> Result<Option<String>, StorageError> {
        self.credentials.refresh_token().await
    }

    pub async fn is_logged_in(&self) -> Result<bool, StorageError> {
        self.credentials.is_logged_in().await
    }

    pub async fn sign_out(&self) -> Result<(), StorageError> {
        self.credentials.clear().await?;
        info!("signed out");
        Ok(())
    }

    pub async fn obtain_new_access_token(&self) -> Result<String, ReissueError> {
        self.coordinator.obtain_new_access_token().await
    }

    /// Drop the session after a reissue failure that cannot be recovered.
    pub async fn end_session(&self, cause: &ReissueError) {
        warn!(error = %cause, "session ended, clearing credentials");
        if let Err(e) = self.credentials.clear().await {
            warn!(error = %e, "failed to clear credentials");
        }
    }

    pub fn reissue_in_flight(&self) -> bool {
        self.coordinator.in_flight()
    }
}
