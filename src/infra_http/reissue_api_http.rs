use crate::application_port::*;
use crate::domain_model::*;
use reqwest::Client;
use serde_json::Value;
use url::Url;

pub const DEFAULT_REFRESH_HEADER: &str = "Authorization-Refresh";

#[derive(Debug, Clone)]
pub struct ReissueEndpoint {
    pub url: Url,
    /// Header carrying the refresh token; never `Authorization`.
    pub refresh_header: String,
    /// Send the refresh token as `Bearer <token>` rather than raw.
    pub bearer_prefix: bool,
}

impl ReissueEndpoint {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            refresh_header: DEFAULT_REFRESH_HEADER.to_string(),
            bearer_prefix: true,
        }
    }
}

/// Calls the backend's reissue endpoint: bodyless POST, refresh token in a
/// dedicated header, `{accessToken, refreshToken}` back.
pub struct HttpReissueApi {
    client: Client,
    endpoint: ReissueEndpoint,
}

impl HttpReissueApi {
    pub fn new(client: Client, endpoint: ReissueEndpoint) -> Self {
        Self { client, endpoint }
    }

    fn header_value(&self, refresh_token: &str) -> String {
        if self.endpoint.bearer_prefix {
            format!("Bearer {}", refresh_token)
        } else {
            refresh_token.to_owned()
        }
    }
}

fn required_token(body: &Value, field: &str) -> Result<String, ReissueError> {
    body.get(field)
        .and_then(Value::as_str)
        .and_then(normalize_token)
        .ok_or_else(|| ReissueError::Protocol(format!("missing {}", field)))
}

pub(crate) fn parse_reissue_body(raw: &[u8]) -> Result<TokenPair, ReissueError> {
    let body: Value = serde_json::from_slice(raw)
        .map_err(|e| ReissueError::Protocol(format!("body is not JSON: {}", e)))?;
    if !body.is_object() {
        return Err(ReissueError::Protocol("body is not a JSON object".to_string()));
    }
    Ok(TokenPair {
        access_token: required_token(&body, "accessToken")?,
        refresh_token: required_token(&body, "refreshToken")?,
    })
}

#[async_trait::async_trait]
impl ReissueApi for HttpReissueApi {
    async fn reissue(&self, refresh_token: &str) -> Result<TokenPair, ReissueError> {
        let response = self
            .client
            .post(self.endpoint.url.clone())
            .header(
                self.endpoint.refresh_header.as_str(),
                self.header_value(refresh_token),
            )
            .send()
            .await
            .map_err(|e| ReissueError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReissueError::Transport(format!(
                "reissue endpoint returned {}",
                status
            )));
        }

        let raw = response
            .bytes()
            .await
            .map_err(|e| ReissueError::Transport(e.to_string()))?;
        parse_reissue_body(&raw)
    }
}
