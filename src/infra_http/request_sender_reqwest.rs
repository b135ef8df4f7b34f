use crate::domain_model::*;
use crate::domain_port::*;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use tracing::debug;

/// Sends requests over `reqwest`, turning non-2xx responses into
/// [`RequestError::Status`].
#[derive(Debug, Clone)]
pub struct ReqwestSender {
    client: Client,
}

impl ReqwestSender {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl RequestSender for ReqwestSender {
    async fn send(&self, ctx: RequestContext) -> Result<ApiResponse, RequestError> {
        let RequestContext {
            id,
            method,
            url,
            mut headers,
            body,
            bearer,
            ..
        } = ctx;

        if let Some(token) = bearer {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| RequestError::InvalidRequest(e.to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }
        let mut builder = self.client.request(method.clone(), url.clone()).headers(headers);
        builder = match body {
            Some(RequestBody::Json(value)) => builder.json(&value),
            Some(RequestBody::Bytes(bytes)) => builder.body(bytes),
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| RequestError::Transport(e.to_string()))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| RequestError::Transport(e.to_string()))?
            .to_vec();
        debug!(request_id = %id, %method, %url, status = status.as_u16(), "response received");

        if !status.is_success() {
            return Err(RequestError::Status { status, body });
        }
        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}
