//! Plan API port.
//!
//! Provides:
//! - `PlanFetcher` trait over `GET /subscription-plans/{id}`
//! - `HttpPlanFetcher` for production use
//! - `StubPlanFetcher` for testing without a backend

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::plan::Plan;

/// Errors from the plan endpoint. Every variant degrades to the Default
/// Policy inside the store; none escape to query consumers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("Plan endpoint returned status {0}")]
    Status(u16),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed plan payload: {0}")]
    Decode(String),
}

/// Supplier of the session's bearer token.
pub trait TokenProvider: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Fixed-token provider for tests and service accounts.
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// Provider for unauthenticated sessions.
    pub fn anonymous() -> Self {
        Self { token: None }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn bearer_token(&self) -> Option<String> {
        self.token.clone()
    }
}

/// Fetches the plan for a subscription id.
#[async_trait]
pub trait PlanFetcher: Send + Sync {
    async fn fetch_plan(&self, subscription_id: &str) -> Result<Plan, FetchError>;
}

/// HTTP implementation of the plan endpoint. The blocking request runs on
/// the runtime's blocking pool; the per-request timeout here bounds the
/// socket, while the store applies its own overall deadline on top.
pub struct HttpPlanFetcher {
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
    timeout: Duration,
}

impl HttpPlanFetcher {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            tokens,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn fetch_blocking(
        url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Plan, FetchError> {
        let mut request = ureq::get(url)
            .timeout(timeout)
            .set("Accept", "application/json");
        if let Some(token) = token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        let response = request.call().map_err(|e| match e {
            ureq::Error::Status(code, _) => FetchError::Status(code),
            ureq::Error::Transport(transport) => FetchError::Transport(transport.to_string()),
        })?;
        response
            .into_json::<Plan>()
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PlanFetcher for HttpPlanFetcher {
    async fn fetch_plan(&self, subscription_id: &str) -> Result<Plan, FetchError> {
        let url = format!("{}/subscription-plans/{}", self.base_url, subscription_id);
        let token = self.tokens.bearer_token();
        let timeout = self.timeout;
        tracing::debug!("Fetching plan from {}", url);
        tokio::task::spawn_blocking(move || Self::fetch_blocking(&url, token, timeout))
            .await
            .map_err(|e| FetchError::Transport(format!("Fetch task failed: {e}")))?
    }
}

/// Canned-response fetcher for tests and offline development. Records how
/// often it was called and can simulate a slow endpoint.
pub struct StubPlanFetcher {
    response: Mutex<Result<Plan, FetchError>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubPlanFetcher {
    pub fn returning(plan: Plan) -> Self {
        Self {
            response: Mutex::new(Ok(plan)),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: FetchError) -> Self {
        Self {
            response: Mutex::new(Err(error)),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Delay every response, for exercising overall-deadline behavior.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Replace the canned response for subsequent calls.
    pub fn set_response(&self, response: Result<Plan, FetchError>) {
        *self.response.lock() = response;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlanFetcher for StubPlanFetcher {
    async fn fetch_plan(&self, _subscription_id: &str) -> Result<Plan, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.response.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::PlanCode;

    #[test]
    fn test_static_token_provider() {
        let tokens = StaticTokenProvider::new("abc123");
        assert_eq!(tokens.bearer_token().as_deref(), Some("abc123"));
        assert!(StaticTokenProvider::anonymous().bearer_token().is_none());
    }

    #[test]
    fn test_http_fetcher_trims_trailing_slash() {
        let fetcher = HttpPlanFetcher::new(
            "https://api.rentora.app/",
            Arc::new(StaticTokenProvider::anonymous()),
        );
        assert_eq!(fetcher.base_url, "https://api.rentora.app");
    }

    #[tokio::test]
    async fn test_stub_fetcher_counts_calls() {
        let plan = Plan {
            plan_code: PlanCode::Professional,
            ..Plan::default()
        };
        let stub = StubPlanFetcher::returning(plan.clone());

        assert_eq!(stub.calls(), 0);
        let fetched = stub.fetch_plan("sub-1").await.unwrap();
        assert_eq!(fetched, plan);
        let _ = stub.fetch_plan("sub-1").await.unwrap();
        assert_eq!(stub.calls(), 2);
    }

    #[tokio::test]
    async fn test_stub_fetcher_replays_failure() {
        let stub = StubPlanFetcher::failing(FetchError::Status(503));
        let err = stub.fetch_plan("sub-1").await.unwrap_err();
        assert!(matches!(err, FetchError::Status(503)));

        stub.set_response(Ok(Plan::default()));
        assert!(stub.fetch_plan("sub-1").await.is_ok());
    }
}
