use crate::domain_model::normalize_token;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use url::Url;

const REQUEST_ID_ALPHABET: [char; 16] = [
    '1', '2', '3', '4', '5', '6', '7', '8', '9', '0', 'a', 'b', 'c', 'd', 'e', 'f',
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        RequestId(nanoid::nanoid!(10, &REQUEST_ID_ALPHABET))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(serde_json::Value),
    Bytes(Vec<u8>),
}

/// One logical HTTP call as it travels through the middleware chain.
///
/// `already_retried` can only go from false to true, through
/// [`RequestContext::into_retry`].
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub id: RequestId,
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
    /// Explicit bearer credential; when set, the stored access token is not consulted.
    pub bearer: Option<String>,
    already_retried: bool,
}

impl RequestContext {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            id: RequestId::generate(),
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            bearer: None,
            already_retried: false,
        }
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, serde_json::Error> {
        self.body = Some(RequestBody::Json(serde_json::to_value(body)?));
        Ok(self)
    }

    pub fn bytes(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(RequestBody::Bytes(body.into()));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// Remove every `Authorization` header, returning the normalized token
    /// of the first one.
    pub fn take_authorization(&mut self) -> Option<String> {
        let value = self.headers.remove(AUTHORIZATION)?;
        value.to_str().ok().and_then(normalize_token)
    }

    pub fn already_retried(&self) -> bool {
        self.already_retried
    }

    /// The single retry of this call, carrying `bearer`. `None` once the call
    /// has already been retried.
    pub fn into_retry(mut self, bearer: String) -> Option<Self> {
        if self.already_retried {
            return None;
        }
        self.already_retried = true;
        self.bearer = Some(bearer);
        Some(self)
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
