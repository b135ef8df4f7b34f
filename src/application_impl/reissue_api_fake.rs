use crate::application_port::*;
use crate::domain_model::TokenPair;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Scriptable stand-in for the reissue endpoint.
///
/// Scripted outcomes are served first, in order. Once they run out every
/// call succeeds with `fake-access-token:<n>` / `fake-refresh-token:<n>`.
#[derive(Debug, Default)]
pub struct FakeReissueApi {
    scripted: Mutex<VecDeque<Result<TokenPair, ReissueError>>>,
    seen: Mutex<Vec<String>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl FakeReissueApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push(&self, outcome: Result<TokenPair, ReissueError>) {
        self.scripted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(outcome);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Refresh tokens received, in call order.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait::async_trait]
impl ReissueApi for FakeReissueApi {
    async fn reissue(&self, refresh_token: &str) -> Result<TokenPair, ReissueError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(refresh_token.to_owned());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let scripted = self
            .scripted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        scripted.unwrap_or_else(|| {
            Ok(TokenPair::new(
                format!("fake-access-token:{}", n),
                format!("fake-refresh-token:{}", n),
            ))
        })
    }
}
