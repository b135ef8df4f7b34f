use crate::application_impl::*;
use crate::domain_model::*;
use crate::domain_port::*;
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use url::Url;

/// Consumer-facing HTTP client bound to one session.
///
/// Every request goes through `ReissueOnExpiry<BearerAuth<transport>>`.
pub struct ApiClient {
    base_url: Url,
    session: Arc<SessionManager>,
    pipeline: Arc<dyn RequestSender>,
}

impl ApiClient {
    pub fn new<S>(base_url: Url, session: Arc<SessionManager>, transport: S) -> Self
    where
        S: RequestSender + 'static,
    {
        let pipeline = ReissueOnExpiry::new(
            BearerAuth::new(transport, session.clone()),
            session.clone(),
        );
        Self {
            base_url,
            session,
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `path` against the base URL; absolute URLs are used as is.
    pub fn url(&self, path: &str) -> Result<Url, RequestError> {
        if let Ok(url) = Url::parse(path) {
            return Ok(url);
        }
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| RequestError::InvalidRequest(format!("{}: {}", path, e)))
    }

    pub fn request(&self, method: Method, path: &str) -> Result<RequestContext, RequestError> {
        Ok(RequestContext::new(method, self.url(path)?))
    }

    pub async fn send(&self, ctx: RequestContext) -> Result<ApiResponse, RequestError> {
        self.pipeline.send(ctx).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RequestError> {
        let response = self.send(self.request(Method::GET, path)?).await?;
        decode(&response)
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, RequestError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::POST, path, body).await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, RequestError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::PUT, path, body).await
    }

    pub async fn patch_json<B, T>(&self, path: &str, body: &B) -> Result<T, RequestError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(Method::PATCH, path, body).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, RequestError> {
        self.send(self.request(Method::DELETE, path)?).await
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, RequestError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let ctx = self
            .request(method, path)?
            .json(body)
            .map_err(|e| RequestError::InvalidRequest(e.to_string()))?;
        let response = self.send(ctx).await?;
        decode(&response)
    }
}

fn decode<T: DeserializeOwned>(response: &ApiResponse) -> Result<T, RequestError> {
    if response.body.is_empty() {
        return serde_json::from_slice(b"null").map_err(|e| RequestError::Decode(e.to_string()));
    }
    response
        .json()
        .map_err(|e| RequestError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_port::ReissueError;
    use crate::infra_memory::MemoryKeyValueStore;
    use reqwest::StatusCode;
    use reqwest::header::HeaderMap;
    use std::sync::Mutex;
    use std::time::Duration;

    const REISSUE_URL: &str = "https://api.test/auth/reissue";

    /// Accepts only `valid_token`; anything else gets `reject_with`.
    struct TokenGate {
        valid_token: Mutex<Option<String>>,
        reject_with: StatusCode,
        seen: Mutex<Vec<(String, Option<String>)>>,
        delay: Duration,
        slow_path: Option<&'static str>,
    }

    impl TokenGate {
        fn new(valid_token: Option<&str>, reject_with: u16) -> Arc<Self> {
            Arc::new(Self {
                valid_token: Mutex::new(valid_token.map(str::to_owned)),
                reject_with: StatusCode::from_u16(reject_with).unwrap(),
                seen: Mutex::new(Vec::new()),
                delay: Duration::ZERO,
                slow_path: None,
            })
        }

        fn slow(valid_token: &str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                valid_token: Mutex::new(Some(valid_token.to_owned())),
                reject_with: StatusCode::UNAUTHORIZED,
                seen: Mutex::new(Vec::new()),
                delay,
                slow_path: None,
            })
        }

        /// Only requests to `path` are delayed.
        fn slow_on(valid_token: &str, path: &'static str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                valid_token: Mutex::new(Some(valid_token.to_owned())),
                reject_with: StatusCode::UNAUTHORIZED,
                seen: Mutex::new(Vec::new()),
                delay,
                slow_path: Some(path),
            })
        }

        fn seen_bearers(&self) -> Vec<Option<String>> {
            self.seen.lock().unwrap().iter().map(|(_, b)| b.clone()).collect()
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl RequestSender for TokenGate {
        async fn send(&self, ctx: RequestContext) -> Result<ApiResponse, RequestError> {
            self.seen
                .lock()
                .unwrap()
                .push((ctx.url.path().to_owned(), ctx.bearer.clone()));
            let delayed = self.slow_path.is_none_or(|p| ctx.url.path() == p);
            if delayed && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let valid = self.valid_token.lock().unwrap().clone();
            if valid.is_some() && ctx.bearer == valid {
                Ok(ApiResponse {
                    status: StatusCode::OK,
                    headers: HeaderMap::new(),
                    body: br#"{"ok":true}"#.to_vec(),
                })
            } else {
                Err(RequestError::Status {
                    status: self.reject_with,
                    body: Vec::new(),
                })
            }
        }
    }

    async fn client(
        gate: Arc<TokenGate>,
        fake: FakeReissueApi,
        tokens: (Option<&str>, Option<&str>),
        expiry: ExpiryPolicy,
    ) -> (ApiClient, Arc<FakeReissueApi>) {
        let mut config = SessionConfig::new(Url::parse(REISSUE_URL).unwrap());
        config.expiry = expiry;
        let fake = Arc::new(fake);
        let session = Arc::new(SessionManager::new(
            config,
            Arc::new(MemoryKeyValueStore::new()),
            fake.clone(),
        ));
        session.set_tokens(tokens.0, tokens.1).await.unwrap();
        let client = ApiClient::new(Url::parse("https://api.test/api").unwrap(), session, gate);
        (client, fake)
    }

    #[derive(Debug, serde::Deserialize)]
    struct Ack {
        ok: bool,
    }

    #[test]
    fn joins_paths_onto_base_url() {
        let session = Arc::new(SessionManager::new(
            SessionConfig::new(Url::parse(REISSUE_URL).unwrap()),
            Arc::new(MemoryKeyValueStore::new()),
            Arc::new(FakeReissueApi::new()),
        ));
        let client = ApiClient::new(
            Url::parse("https://api.test/api/").unwrap(),
            session,
            TokenGate::new(None, 401),
        );

        assert_eq!(client.url("/plans/1").unwrap().as_str(), "https://api.test/api/plans/1");
        assert_eq!(client.url("plans").unwrap().as_str(), "https://api.test/api/plans");
        assert_eq!(
            client.url("https://cdn.test/x").unwrap().as_str(),
            "https://cdn.test/x"
        );
    }

    #[tokio::test]
    async fn expired_request_is_retried_with_reissued_token() {
        let fake = FakeReissueApi::new();
        fake.push(Ok(TokenPair::new("xyz", "uvw")));
        let gate = TokenGate::new(Some("xyz"), 401);
        let (client, fake) =
            client(gate.clone(), fake, (Some("abc"), Some("def")), ExpiryPolicy::relaxed()).await;

        let body: Ack = client.get_json("/plans").await.unwrap();

        assert!(body.ok);
        assert_eq!(
            gate.seen_bearers(),
            vec![Some("abc".to_string()), Some("xyz".to_string())]
        );
        assert_eq!(fake.seen(), vec!["def".to_string()]);
        let session = client.session();
        assert_eq!(session.access_token().await.unwrap().as_deref(), Some("xyz"));
        assert_eq!(session.refresh_token().await.unwrap().as_deref(), Some("uvw"));
    }

    #[tokio::test]
    async fn retried_request_is_not_retried_again() {
        let gate = TokenGate::new(None, 401);
        let (client, fake) = client(
            gate.clone(),
            FakeReissueApi::new(),
            (Some("abc"), Some("def")),
            ExpiryPolicy::relaxed(),
        )
        .await;

        let err = client.delete("/plans/1").await.unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(gate.calls(), 2);
        assert_eq!(fake.calls(), 1);
        assert_eq!(
            client.session().access_token().await.unwrap().as_deref(),
            Some("fake-access-token:1")
        );
    }

    #[tokio::test]
    async fn missing_refresh_token_ends_session_with_original_error() {
        let gate = TokenGate::new(Some("never"), 401);
        let (client, fake) = client(
            gate.clone(),
            FakeReissueApi::new(),
            (Some("abc"), None),
            ExpiryPolicy::relaxed(),
        )
        .await;

        let err = client.get_json::<Ack>("/me").await.unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(fake.calls(), 0);
        assert_eq!(gate.calls(), 1);
        assert!(!client.session().is_logged_in().await.unwrap());
    }

    #[tokio::test]
    async fn failed_reissue_clears_credentials_and_returns_original_error() {
        let fake = FakeReissueApi::new();
        fake.push(Err(ReissueError::Transport("502".to_string())));
        let gate = TokenGate::new(Some("never"), 419);
        let (client, _) =
            client(gate.clone(), fake, (Some("abc"), Some("def")), ExpiryPolicy::relaxed()).await;

        let err = client.get_json::<Ack>("/me").await.unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::from_u16(419).unwrap()));
        let credential = client.session().credentials().credential().await.unwrap();
        assert_eq!(credential, Credential::default());
    }

    #[tokio::test]
    async fn non_expiry_errors_pass_through() {
        let gate = TokenGate::new(Some("never"), 500);
        let (client, fake) = client(
            gate.clone(),
            FakeReissueApi::new(),
            (Some("abc"), Some("def")),
            ExpiryPolicy::relaxed(),
        )
        .await;

        let err = client.get_json::<Ack>("/me").await.unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(fake.calls(), 0);
        assert!(client.session().is_logged_in().await.unwrap());
    }

    #[tokio::test]
    async fn forbidden_counts_as_expiry_only_when_relaxed() {
        let gate = TokenGate::new(Some("fake-access-token:1"), 403);
        let (strict, fake) = client(
            gate.clone(),
            FakeReissueApi::new(),
            (Some("abc"), Some("def")),
            ExpiryPolicy::strict(),
        )
        .await;
        let err = strict.get_json::<Ack>("/me").await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::FORBIDDEN));
        assert_eq!(fake.calls(), 0);

        let gate = TokenGate::new(Some("fake-access-token:1"), 403);
        let (relaxed, fake) = client(
            gate,
            FakeReissueApi::new(),
            (Some("abc"), Some("def")),
            ExpiryPolicy::relaxed(),
        )
        .await;
        let body: Ack = relaxed.get_json("/me").await.unwrap();
        assert!(body.ok);
        assert_eq!(fake.calls(), 1);
    }

    #[tokio::test]
    async fn reissue_endpoint_requests_are_exempt() {
        let gate = TokenGate::new(Some("abc"), 401);
        let (client, fake) = client(
            gate.clone(),
            FakeReissueApi::new(),
            (Some("abc"), Some("def")),
            ExpiryPolicy::relaxed(),
        )
        .await;

        let err = client.send(client.request(Method::POST, REISSUE_URL).unwrap()).await.unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(gate.seen_bearers(), vec![None]);
        assert_eq!(fake.calls(), 0);
        assert!(client.session().is_logged_in().await.unwrap());
    }

    #[tokio::test]
    async fn request_without_token_goes_out_unauthenticated() {
        let gate = TokenGate::new(Some("abc"), 404);
        let (client, _) = client(
            gate.clone(),
            FakeReissueApi::new(),
            (None, None),
            ExpiryPolicy::relaxed(),
        )
        .await;

        let err = client.get_json::<Ack>("/public").await.unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(gate.seen_bearers(), vec![None]);
    }

    #[tokio::test]
    async fn concurrent_expiries_share_one_reissue() {
        let gate = TokenGate::slow("fake-access-token:1", Duration::from_millis(20));
        let fake = FakeReissueApi::new().with_delay(Duration::from_millis(50));
        let (client, fake) =
            client(gate.clone(), fake, (Some("abc"), Some("def")), ExpiryPolicy::relaxed()).await;
        let client = Arc::new(client);

        let mut handles = Vec::new();
        for i in 0..4 {
            let client = client.clone();
            handles.push(tokio::spawn(async move {
                client.get_json::<Ack>(&format!("/plans/{}", i)).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().ok);
        }

        assert_eq!(fake.calls(), 1);
        let retries: Vec<_> = gate
            .seen_bearers()
            .into_iter()
            .filter(|b| b.as_deref() != Some("abc"))
            .collect();
        assert_eq!(retries.len(), 4);
        assert!(retries.iter().all(|b| b.as_deref() == Some("fake-access-token:1")));
    }

    #[tokio::test]
    async fn explicit_bearer_is_not_replaced() {
        let gate = TokenGate::new(Some("manual"), 401);
        let (client, _) = client(
            gate.clone(),
            FakeReissueApi::new(),
            (Some("abc"), Some("def")),
            ExpiryPolicy::relaxed(),
        )
        .await;

        let ctx = client.request(Method::GET, "/me").unwrap().bearer("manual");
        client.send(ctx).await.unwrap();

        assert_eq!(gate.seen_bearers(), vec![Some("manual".to_string())]);
    }

    #[tokio::test]
    async fn authorization_header_is_used_as_explicit_bearer() {
        let fake = FakeReissueApi::new();
        fake.push(Ok(TokenPair::new("xyz", "uvw")));
        let gate = TokenGate::new(Some("xyz"), 401);
        let (client, _) =
            client(gate.clone(), fake, (Some("abc"), Some("def")), ExpiryPolicy::relaxed()).await;

        let ctx = client.request(Method::GET, "/me").unwrap().header(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_static("Bearer caller"),
        );
        client.send(ctx).await.unwrap();

        assert_eq!(
            gate.seen_bearers(),
            vec![Some("caller".to_string()), Some("xyz".to_string())]
        );
    }

    #[tokio::test]
    async fn token_rotated_in_flight_is_reused_without_reissue() {
        let gate = TokenGate::slow_on("fake-access-token:1", "/api/slow", Duration::from_millis(100));
        let (client, fake) = client(
            gate.clone(),
            FakeReissueApi::new(),
            (Some("abc"), Some("def")),
            ExpiryPolicy::relaxed(),
        )
        .await;
        let client = Arc::new(client);

        let slow = {
            let client = client.clone();
            tokio::spawn(async move { client.get_json::<Ack>("/slow").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let fast: Ack = client.get_json("/fast").await.unwrap();
        let slow = slow.await.unwrap().unwrap();

        assert!(fast.ok && slow.ok);
        assert_eq!(fake.calls(), 1);
        assert_eq!(
            gate.seen_bearers(),
            vec![
                Some("abc".to_string()),
                Some("abc".to_string()),
                Some("fake-access-token:1".to_string()),
                Some("fake-access-token:1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn timed_out_reissue_ends_session_with_original_error() {
        let mut config = SessionConfig::new(Url::parse(REISSUE_URL).unwrap());
        config.reissue_timeout = Duration::from_millis(50);
        let fake = Arc::new(FakeReissueApi::new().with_delay(Duration::from_secs(5)));
        let session = Arc::new(SessionManager::new(
            config,
            Arc::new(MemoryKeyValueStore::new()),
            fake.clone(),
        ));
        session.set_tokens(Some("abc"), Some("def")).await.unwrap();
        let gate = TokenGate::new(Some("never"), 401);
        let client = ApiClient::new(Url::parse("https://api.test/api").unwrap(), session, gate.clone());

        let err = client.get_json::<Ack>("/me").await.unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(gate.calls(), 1);
        assert_eq!(
            client.session().credentials().credential().await.unwrap(),
            Credential::default()
        );
        assert!(!client.session().reissue_in_flight());
    }
}
