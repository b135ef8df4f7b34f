//! Runs a throwaway backend with an expiring access token and drives the
//! session client against it.
//!
//! $ cargo run --bin session_demo -- --log-filter=wayfarer=debug,info

use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;
use warp::Filter;
use warp::http::StatusCode;
use wayfarer::application_impl::*;
use wayfarer::domain_model::*;
use wayfarer::infra_http::*;
use wayfarer::infra_memory::*;
use wayfarer::logger::*;
use wayfarer::settings::*;

#[derive(Default)]
struct DemoTokens {
    access: Option<String>,
    refresh: Option<String>,
    generation: u32,
    reissues: u32,
}

#[derive(Default)]
struct DemoBackend {
    tokens: Mutex<DemoTokens>,
}

impl DemoBackend {
    fn lock(&self) -> std::sync::MutexGuard<'_, DemoTokens> {
        self.tokens.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn login(&self) -> TokenPair {
        let mut tokens = self.lock();
        tokens.generation += 1;
        let pair = TokenPair::new(
            format!("access-{}", tokens.generation),
            format!("refresh-{}", tokens.generation),
        );
        tokens.access = Some(pair.access_token.clone());
        tokens.refresh = Some(pair.refresh_token.clone());
        pair
    }

    fn expire_access(&self) {
        self.lock().access = None;
    }

    fn revoke_refresh(&self) {
        self.lock().refresh = None;
    }

    fn reissues(&self) -> u32 {
        self.lock().reissues
    }

    fn reissue(&self, header: Option<String>) -> Option<TokenPair> {
        let presented = header.as_deref().and_then(normalize_token);
        {
            let tokens = self.lock();
            if presented.is_none() || presented != tokens.refresh {
                return None;
            }
        }
        let pair = self.login();
        self.lock().reissues += 1;
        Some(pair)
    }

    fn authorized(&self, header: Option<String>) -> bool {
        let presented = header.as_deref().and_then(normalize_token);
        presented.is_some() && presented == self.lock().access
    }
}

async fn handle_reissue(
    header: Option<String>,
    backend: Arc<DemoBackend>,
) -> Result<impl warp::Reply, Infallible> {
    // slow enough for concurrent expiries to pile up behind one call
    tokio::time::sleep(Duration::from_millis(100)).await;
    let reply = match backend.reissue(header) {
        Some(pair) => warp::reply::with_status(warp::reply::json(&pair), StatusCode::OK),
        None => warp::reply::with_status(
            warp::reply::json(&json!({ "error": "invalid refresh token" })),
            StatusCode::UNAUTHORIZED,
        ),
    };
    Ok(reply)
}

async fn serve(backend: Arc<DemoBackend>, cancel: CancellationToken) -> SocketAddr {
    let with_backend = warp::any().map(move || backend.clone());

    let reissue = warp::path!("auth" / "reissue")
        .and(warp::post())
        .and(warp::header::optional::<String>(DEFAULT_REFRESH_HEADER))
        .and(with_backend.clone())
        .and_then(handle_reissue);

    let trips = warp::path!("api" / "trips" / u32)
        .and(warp::get())
        .and(warp::header::optional::<String>("authorization"))
        .and(with_backend)
        .map(|id: u32, header: Option<String>, backend: Arc<DemoBackend>| {
            if backend.authorized(header) {
                warp::reply::with_status(
                    warp::reply::json(&json!({ "id": id, "title": format!("Trip {}", id) })),
                    StatusCode::OK,
                )
            } else {
                warp::reply::with_status(
                    warp::reply::json(&json!({ "error": "access token expired" })),
                    StatusCode::UNAUTHORIZED,
                )
            }
        });

    let (addr, server) = warp::serve(reissue.or(trips))
        .bind_with_graceful_shutdown(([127, 0, 0, 1], 0), async move {
            cancel.cancelled().await
        });
    tokio::spawn(server);
    addr
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let logger = Logger::new_bootstrap();
    let log_config = match cli.settings.as_deref() {
        Some(path) => Some(LogConfig::from_settings(
            &parse_settings(Some(path))?.log,
            cli.log_filter.as_deref(),
        )),
        None => cli.log_filter.clone().map(|filter| LogConfig { filter }),
    };
    if let Some(config) = log_config {
        logger.reload_from_config(&config)?;
    }

    let backend = Arc::new(DemoBackend::default());
    let cancel = CancellationToken::new();
    let addr = serve(backend.clone(), cancel.clone()).await;
    let base_url = Url::parse(&format!("http://{}/api", addr))?;
    let reissue_url = Url::parse(&format!("http://{}/auth/reissue", addr))?;

    let http = reqwest::Client::new();
    let session = Arc::new(SessionManager::new(
        SessionConfig::new(reissue_url.clone()),
        Arc::new(MemoryKeyValueStore::new()),
        Arc::new(HttpReissueApi::new(
            http.clone(),
            ReissueEndpoint::new(reissue_url),
        )),
    ));
    session.initialize().await?;
    let api = Arc::new(ApiClient::new(base_url, session.clone(), ReqwestSender::new(http)));

    session.establish(&backend.login()).await?;
    let trip: serde_json::Value = api.get_json("/trips/1").await?;
    info!(%trip, "fetched with the login token");

    backend.expire_access();
    let mut handles = Vec::new();
    for id in 2..5 {
        let api = api.clone();
        handles.push(tokio::spawn(async move {
            api.get_json::<serde_json::Value>(&format!("/trips/{}", id)).await
        }));
    }
    for handle in handles {
        let trip = handle.await??;
        info!(%trip, "fetched after expiry");
    }
    info!(reissues = backend.reissues(), "concurrent expiries handled");

    backend.expire_access();
    backend.revoke_refresh();
    match api.get_json::<serde_json::Value>("/trips/5").await {
        Ok(trip) => warn!(%trip, "revoked session still served"),
        Err(err) => info!(
            error = %err,
            logged_in = session.is_logged_in().await?,
            "request after revocation"
        ),
    }

    cancel.cancel();
    Ok(())
}
