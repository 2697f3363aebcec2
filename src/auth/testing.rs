//! In-memory identity provider for listener and flow tests

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::provider::{ExchangeResult, IdentityProvider, ProviderError, TokenCheck};

pub struct MockProvider {
    valid_code: String,
    token: String,
    delay: Duration,
    token_active: bool,
    exchanges: AtomicUsize,
    checks: AtomicUsize,
}

impl MockProvider {
    /// Accepts only `valid_code`, which exchanges for `token`
    pub fn new(valid_code: &str, token: &str) -> Arc<Self> {
        Arc::new(Self {
            valid_code: valid_code.to_string(),
            token: token.to_string(),
            delay: Duration::ZERO,
            token_active: true,
            exchanges: AtomicUsize::new(0),
            checks: AtomicUsize::new(0),
        })
    }

    pub fn with_delay(self: Arc<Self>, delay: Duration) -> Arc<Self> {
        let mut this = Arc::try_unwrap(self).unwrap_or_else(|_| panic!("provider already shared"));
        this.delay = delay;
        Arc::new(this)
    }

    /// Make every token check fail
    pub fn with_inactive_token(self: Arc<Self>) -> Arc<Self> {
        let mut this = Arc::try_unwrap(self).unwrap_or_else(|_| panic!("provider already shared"));
        this.token_active = false;
        Arc::new(this)
    }

    pub fn exchange_calls(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    pub fn check_calls(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for MockProvider {
    async fn exchange_code(&self, code: &str) -> Result<ExchangeResult, ProviderError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if code != self.valid_code {
            return Err(ProviderError::Rejected {
                status: "ValidationError".to_string(),
                summary: "Invalid code".to_string(),
            });
        }

        Ok(ExchangeResult {
            token: self.token.clone(),
            identity: "pui_test".to_string(),
            owner: "tester@example.com".to_string(),
            email: "tester@example.com".to_string(),
            expire: None,
        })
    }

    async fn check_token(&self, token: &str) -> Result<TokenCheck, ProviderError> {
        self.checks.fetch_add(1, Ordering::SeqCst);

        if !self.token_active || token != self.token {
            return Err(ProviderError::Rejected {
                status: "InvalidToken".to_string(),
                summary: "Token is invalid".to_string(),
            });
        }

        Ok(TokenCheck {
            id: "pmt_test".to_string(),
            token_type: "user".to_string(),
            identity: "pui_test".to_string(),
            owner: "tester@example.com".to_string(),
            email: "tester@example.com".to_string(),
            life: Some(3600),
            expire: None,
            created_at: None,
            scopes: None,
            profile: HashMap::new(),
        })
    }
}

/// Whether `addr` can be bound again within about a second
pub async fn port_released(addr: SocketAddr) -> bool {
    for _ in 0..50 {
        if tokio::net::TcpListener::bind(addr).await.is_ok() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
