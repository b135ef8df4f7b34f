use reqwest::StatusCode;

/// 419 "Page Expired", sent by some backends for stale sessions.
pub const STATUS_SESSION_EXPIRED: u16 = 419;

/// Decides which error statuses mean "the access token has expired".
///
/// 401 always counts. With `relaxed` set, 403 and 419 count too.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    pub relaxed: bool,
}

impl ExpiryPolicy {
    pub fn strict() -> Self {
        Self { relaxed: false }
    }

    pub fn relaxed() -> Self {
        Self { relaxed: true }
    }

    pub fn is_expired(&self, status: StatusCode) -> bool {
        match status.as_u16() {
            401 => true,
            403 | STATUS_SESSION_EXPIRED => self.relaxed,
            _ => false,
        }
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::relaxed()
    }
}
