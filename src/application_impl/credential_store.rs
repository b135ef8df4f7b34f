use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

/// Normalized, durable storage of the session's access and refresh tokens.
///
/// An in-memory copy mirrors the durable store. Every mutation holds the
/// cache lock across the durable write and the cache update, so a reader
/// never observes one without the other.
pub struct CredentialStore {
    storage: Arc<dyn KeyValueStore>,
    keys: StorageKeys,
    cache: Mutex<Credential>,
    initialized: OnceCell<()>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, keys: StorageKeys) -> Self {
        Self {
            storage,
            keys,
            cache: Mutex::new(Credential::default()),
            initialized: OnceCell::new(),
        }
    }

    /// Load tokens from durable storage and migrate legacy keys.
    ///
    /// Runs at most once per instance; concurrent callers wait for the
    /// same run. A failed run is retried by the next caller.
    pub async fn initialize(&self) -> Result<(), StorageError> {
        self.initialized
            .get_or_try_init(|| self.load_and_migrate())
            .await?;
        Ok(())
    }

    async fn load_and_migrate(&self) -> Result<(), StorageError> {
        let mut cache = self.cache.lock().await;
        let mut loaded = Credential::default();

        for kind in [TokenKind::Access, TokenKind::Refresh] {
            let key = self.keys.canonical(kind);
            let Some(raw) = self.storage.get(key).await? else {
                continue;
            };
            match normalize_token(&raw) {
                Some(token) => {
                    if token != raw {
                        self.storage.set(key, &token).await?;
                    }
                    *loaded.slot_mut(kind) = Some(token);
                }
                None => self.storage.remove(key).await?,
            }
        }

        for legacy in &self.keys.legacy {
            if legacy.key == self.keys.access_token || legacy.key == self.keys.refresh_token {
                continue;
            }
            let Some(raw) = self.storage.get(&legacy.key).await? else {
                continue;
            };
            let slot = loaded.slot_mut(legacy.kind);
            if slot.is_none() {
                if let Some(token) = normalize_token(&raw) {
                    self.storage
                        .set(self.keys.canonical(legacy.kind), &token)
                        .await?;
                    debug!(legacy_key = %legacy.key, kind = ?legacy.kind, "migrated legacy token key");
                    *slot = Some(token);
                }
            }
            self.storage.remove(&legacy.key).await?;
        }

        debug!(
            has_access = loaded.access_token.is_some(),
            has_refresh = loaded.refresh_token.is_some(),
            "credential store initialized"
        );
        *cache = loaded;
        Ok(())
    }

    /// Write whichever tokens are given; `None` leaves that token untouched.
    ///
    /// A given value that normalizes to nothing (`"null"`, blank, ...)
    /// removes the stored token. If a write fails, slots already written
    /// are restored to their previous values and the cache is left as is.
    pub async fn set_tokens(
        &self,
        access: Option<&str>,
        refresh: Option<&str>,
    ) -> Result<(), StorageError> {
        self.initialize().await?;
        let mut cache = self.cache.lock().await;

        let mut written = Vec::new();
        for (kind, raw) in [(TokenKind::Access, access), (TokenKind::Refresh, refresh)] {
            let Some(raw) = raw else {
                continue;
            };
            let token = normalize_token(raw);
            if let Err(e) = self.write_slot(kind, token.as_deref()).await {
                self.roll_back(&cache, &written).await;
                return Err(e);
            }
            written.push((kind, token));
        }
        for (kind, token) in written {
            *cache.slot_mut(kind) = token;
        }
        Ok(())
    }

    async fn write_slot(&self, kind: TokenKind, token: Option<&str>) -> Result<(), StorageError> {
        let key = self.keys.canonical(kind);
        match token {
            Some(token) => self.storage.set(key, token).await,
            None => self.storage.remove(key).await,
        }
    }

    async fn roll_back(&self, previous: &Credential, written: &[(TokenKind, Option<String>)]) {
        for (kind, _) in written {
            if let Err(e) = self.write_slot(*kind, previous.slot(*kind)).await {
                warn!(error = %e, kind = ?kind, "failed to restore token after partial write");
            }
        }
    }

    /// Replace both tokens with a new pair.
    pub async fn replace(&self, pair: &TokenPair) -> Result<(), StorageError> {
        self.set_tokens(Some(pair.access_token.as_str()), Some(pair.refresh_token.as_str()))
            .await
    }

    pub async fn access_token(&self) -> Result<Option<String>, StorageError> {
        self.initialize().await?;
        Ok(self.cache.lock().await.access_token.clone())
    }

    pub async fn refresh_token(&self) -> Result<Option<String>, StorageError> {
        self.initialize().await?;
        Ok(self.cache.lock().await.refresh_token.clone())
    }

    pub async fn credential(&self) -> Result<Credential, StorageError> {
        self.initialize().await?;
        Ok(self.cache.lock().await.clone())
    }

    pub async fn is_logged_in(&self) -> Result<bool, StorageError> {
        Ok(self.access_token().await?.is_some())
    }

    pub async fn clear(&self) -> Result<(), StorageError> {
        self.initialize().await?;
        let mut cache = self.cache.lock().await;
        for kind in [TokenKind::Access, TokenKind::Refresh] {
            self.storage.remove(self.keys.canonical(kind)).await?;
            *cache.slot_mut(kind) = None;
        }
        Ok(())
    }
}
