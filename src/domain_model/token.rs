use serde::{Deserialize, Serialize};

const QUOTE_CHARS: &[char] = &['"', '\'', '`'];
const BEARER_PREFIX: &str = "bearer ";

/// Normalize a raw token value into the bare token string.
///
/// Surrounding whitespace, surrounding quote characters and a `Bearer `
/// prefix (any case) are stripped until nothing changes. Empty results and
/// the literal strings `undefined` / `null` mean "no token".
pub fn normalize_token(raw: &str) -> Option<String> {
    let mut current = raw;
    loop {
        let before = current;

        current = current.trim();
        current = current.strip_prefix(QUOTE_CHARS).unwrap_or(current);
        current = current.strip_suffix(QUOTE_CHARS).unwrap_or(current);
        current = current.trim();
        if current.len() >= BEARER_PREFIX.len()
            && current.is_char_boundary(BEARER_PREFIX.len())
            && current[..BEARER_PREFIX.len()].eq_ignore_ascii_case(BEARER_PREFIX)
        {
            current = &current[BEARER_PREFIX.len()..];
        }

        if current == before {
            break;
        }
    }

    match current {
        "" | "undefined" | "null" => None,
        token => Some(token.to_owned()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Tokens of the current session, as held by the credential store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credential {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl Credential {
    pub fn is_logged_in(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn slot(&self, kind: TokenKind) -> Option<&str> {
        match kind {
            TokenKind::Access => self.access_token.as_deref(),
            TokenKind::Refresh => self.refresh_token.as_deref(),
        }
    }

    pub fn slot_mut(&mut self, kind: TokenKind) -> &mut Option<String> {
        match kind {
            TokenKind::Access => &mut self.access_token,
            TokenKind::Refresh => &mut self.refresh_token,
        }
    }
}

/// A freshly issued access/refresh pair (login, signup or reissue).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}
