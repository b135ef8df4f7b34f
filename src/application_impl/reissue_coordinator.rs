use crate::application_impl::CredentialStore;
use crate::application_port::*;
use crate::domain_model::*;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_REISSUE_TIMEOUT: Duration = Duration::from_secs(10);

type SharedReissue = Shared<BoxFuture<'static, Result<String, ReissueError>>>;

struct PendingReissue {
    generation: u64,
    future: SharedReissue,
}

type PendingSlot = Arc<Mutex<Option<PendingReissue>>>;

fn lock_slot(slot: &Mutex<Option<PendingReissue>>) -> MutexGuard<'_, Option<PendingReissue>> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// Collapses concurrent reissue triggers into one call to the reissue endpoint.
///
/// The pending slot is checked and filled under one lock with no await in
/// between; the shared future empties the slot itself once it settles.
pub struct ReissueCoordinator {
    credentials: Arc<CredentialStore>,
    api: Arc<dyn ReissueApi>,
    timeout: Duration,
    pending: PendingSlot,
    generation: AtomicU64,
}

impl ReissueCoordinator {
    pub fn new(
        credentials: Arc<CredentialStore>,
        api: Arc<dyn ReissueApi>,
        timeout: Duration,
    ) -> Self {
        Self {
            credentials,
            api,
            timeout,
            pending: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
        }
    }

    pub fn in_flight(&self) -> bool {
        lock_slot(&self.pending).is_some()
    }

    /// Resolve to a freshly issued access token, joining a reissue that is
    /// already in flight if there is one.
    pub async fn obtain_new_access_token(&self) -> Result<String, ReissueError> {
        let future = {
            let mut slot = lock_slot(&self.pending);
            match slot.as_ref() {
                Some(pending) => {
                    debug!(generation = pending.generation, "joining in-flight reissue");
                    pending.future.clone()
                }
                None => {
                    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                    let future = settle(
                        self.credentials.clone(),
                        self.api.clone(),
                        self.timeout,
                        self.pending.clone(),
                        generation,
                    )
                    .boxed()
                    .shared();
                    *slot = Some(PendingReissue {
                        generation,
                        future: future.clone(),
                    });
                    future
                }
            }
        };
        future.await
    }
}

async fn settle(
    credentials: Arc<CredentialStore>,
    api: Arc<dyn ReissueApi>,
    timeout: Duration,
    pending: PendingSlot,
    generation: u64,
) -> Result<String, ReissueError> {
    let result = exchange(&credentials, api.as_ref(), timeout).await;

    let mut slot = lock_slot(&pending);
    if slot.as_ref().is_some_and(|p| p.generation == generation) {
        *slot = None;
    }
    drop(slot);

    match &result {
        Ok(_) => info!(generation, "access token reissued"),
        Err(e) => warn!(generation, error = %e, "access token reissue failed"),
    }
    result
}

async fn exchange(
    credentials: &CredentialStore,
    api: &dyn ReissueApi,
    timeout: Duration,
) -> Result<String, ReissueError> {
    let Some(refresh_token) = credentials.refresh_token().await? else {
        credentials.clear().await?;
        return Err(ReissueError::NoSession);
    };

    info!("reissuing access token");
    let pair = match tokio::time::timeout(timeout, api.reissue(&refresh_token)).await {
        Ok(result) => result?,
        Err(_) => return Err(ReissueError::Timeout),
    };

    let access_token = normalize_token(&pair.access_token)
        .ok_or_else(|| ReissueError::Protocol("blank accessToken".to_string()))?;
    if normalize_token(&pair.refresh_token).is_none() {
        return Err(ReissueError::Protocol("blank refreshToken".to_string()));
    }

    credentials.replace(&pair).await?;
    Ok(access_token)
}
