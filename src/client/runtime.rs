use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_file::*;
use crate::infra_http::*;
use crate::infra_memory::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::Settings;
use std::sync::Arc;
use std::time::Duration;

/// A fully wired client: storage and reissue backends chosen from settings,
/// one session, one API client on top of it.
pub struct ClientRuntime {
    pub session: Arc<SessionManager>,
    pub api: Arc<ApiClient>,
}

impl ClientRuntime {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let mut http = reqwest::Client::builder();
        if let Some(secs) = settings.api.request_timeout_secs {
            http = http.timeout(Duration::from_secs(secs));
        }
        let http = http.build()?;

        let session = Arc::new(build_session(settings, http.clone()).await?);
        session.initialize().await?;

        let api = Arc::new(ApiClient::new(
            settings.base_url()?,
            session.clone(),
            ReqwestSender::new(http),
        ));

        info!(
            base_url = %api.base_url(),
            reissue_url = %session.reissue_url(),
            "client runtime ready"
        );
        Ok(Self { session, api })
    }
}

pub async fn build_storage(settings: &Settings) -> anyhow::Result<Arc<dyn KeyValueStore>> {
    let storage: Arc<dyn KeyValueStore> = match settings.storage.backend.as_str() {
        "memory" => Arc::new(MemoryKeyValueStore::new()),
        "file" => {
            let path = settings
                .storage
                .path
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("storage.path is required for the file backend"))?;
            Arc::new(FileKeyValueStore::new(path))
        }
        "redis" => {
            let url = settings
                .storage
                .redis_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("storage.redis_url is required for the redis backend"))?;
            Arc::new(RedisKeyValueStore::connect(url, settings.storage.prefix.clone()).await?)
        }
        other => return Err(anyhow::anyhow!("Unknown storage backend: {}", other)),
    };
    Ok(storage)
}

pub async fn build_session(
    settings: &Settings,
    http: reqwest::Client,
) -> anyhow::Result<SessionManager> {
    let config = settings.session_config()?;
    let storage = build_storage(settings).await?;

    let reissue_api: Arc<dyn ReissueApi> = match settings.session.reissue_backend.as_str() {
        "fake" => Arc::new(FakeReissueApi::new()),
        "http" => Arc::new(HttpReissueApi::new(
            http,
            ReissueEndpoint {
                url: config.reissue_url.clone(),
                refresh_header: settings.api.refresh_header.clone(),
                bearer_prefix: settings.api.refresh_header_bearer,
            },
        )),
        other => return Err(anyhow::anyhow!("Unknown reissue backend: {}", other)),
    };

    Ok(SessionManager::new(config, storage, reissue_api))
}
