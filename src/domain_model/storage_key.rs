use crate::domain_model::TokenKind;
use serde::Deserialize;

pub const DEFAULT_ACCESS_TOKEN_KEY: &str = "auth:accessToken";
pub const DEFAULT_REFRESH_TOKEN_KEY: &str = "auth:refreshToken";

/// A key name used by an older client build, and the slot its value belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LegacyKey {
    pub key: String,
    pub kind: TokenKind,
}

impl LegacyKey {
    pub fn new(key: impl Into<String>, kind: TokenKind) -> Self {
        Self {
            key: key.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub access_token: String,
    pub refresh_token: String,
    pub legacy: Vec<LegacyKey>,
}

impl StorageKeys {
    pub fn canonical(&self, kind: TokenKind) -> &str {
        match kind {
            TokenKind::Access => &self.access_token,
            TokenKind::Refresh => &self.refresh_token,
        }
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            access_token: DEFAULT_ACCESS_TOKEN_KEY.to_string(),
            refresh_token: DEFAULT_REFRESH_TOKEN_KEY.to_string(),
            legacy: vec![
                LegacyKey::new("accessToken", TokenKind::Access),
                LegacyKey::new("access_token", TokenKind::Access),
                LegacyKey::new("ACCESS_TOKEN", TokenKind::Access),
                LegacyKey::new("refreshToken", TokenKind::Refresh),
                LegacyKey::new("refresh_token", TokenKind::Refresh),
                LegacyKey::new("REFRESH_TOKEN", TokenKind::Refresh),
            ],
        }
    }
}
