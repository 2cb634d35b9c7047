//! OAuth2 client-credentials cache for bearer-token gateways.
//!
//! One cache instance lives inside each adapter that authenticates with a
//! bearer token. The cached token is refreshed when missing or within a
//! 60-second safety margin of expiry. The refresh runs under an async mutex
//! held for the whole exchange, so concurrent fan-out branches can never
//! trigger more than one exchange; late arrivals observe the fresh token.

use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::http::ProviderHttpClient;
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Seconds before expiry at which a token is treated as stale.
const EXPIRY_SAFETY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: Option<String>,
}

/// Result of one client-credentials exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: u64,
}

/// The exchange itself, separated so tests can count invocations.
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange(&self) -> PaymentResult<TokenGrant>;
}

/// Production exchange against the gateway's token endpoint.
pub struct ClientCredentialsExchange {
    config: OAuthConfig,
    http: ProviderHttpClient,
    provider: String,
}

impl ClientCredentialsExchange {
    pub fn new(provider: impl Into<String>, config: OAuthConfig, http: ProviderHttpClient) -> Self {
        Self {
            config,
            http,
            provider: provider.into(),
        }
    }
}

#[async_trait]
impl TokenExchange for ClientCredentialsExchange {
    async fn exchange(&self) -> PaymentResult<TokenGrant> {
        let basic = base64::engine::general_purpose::STANDARD.encode(format!(
            "{}:{}",
            self.config.client_id, self.config.client_secret
        ));
        let auth_header = format!("Basic {}", basic);

        let mut body = serde_json::json!({ "grant_type": "client_credentials" });
        if let Some(scope) = &self.config.scope {
            body["scope"] = serde_json::json!(scope);
        }

        self.http
            .request_json::<TokenGrant>(
                reqwest::Method::POST,
                &self.config.token_url,
                &self.provider,
                None,
                Some(&body),
                &[
                    ("Authorization", auth_header.as_str()),
                    ("Content-Type", "application/json"),
                ],
            )
            .await
            .map_err(|e| PaymentError::TokenAcquisitionError {
                provider: self.provider.clone(),
                message: e.to_string(),
            })
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - ChronoDuration::seconds(EXPIRY_SAFETY_MARGIN_SECS) > now
    }
}

/// Expiry-aware token holder with a single-flight refresh guard.
pub struct CredentialCache {
    provider: String,
    exchanger: Arc<dyn TokenExchange>,
    state: Mutex<Option<CachedToken>>,
}

impl CredentialCache {
    pub fn new(provider: impl Into<String>, exchanger: Arc<dyn TokenExchange>) -> Self {
        Self {
            provider: provider.into(),
            exchanger,
            state: Mutex::new(None),
        }
    }

    /// Return a valid bearer token, refreshing it when missing or stale.
    pub async fn get_token(&self) -> PaymentResult<String> {
        let mut state = self.state.lock().await;

        let now = Utc::now();
        if let Some(cached) = state.as_ref() {
            if cached.is_fresh(now) {
                debug!(provider = %self.provider, "reusing cached credential");
                return Ok(cached.access_token.clone());
            }
        }

        // Mutex stays held across the exchange: at most one refresh in
        // flight, waiters pick up the replaced token.
        let grant = self.exchanger.exchange().await?;
        let cached = CachedToken {
            access_token: grant.access_token.clone(),
            expires_at: now + ChronoDuration::seconds(grant.expires_in as i64),
        };
        info!(
            provider = %self.provider,
            expires_in = grant.expires_in,
            "credential refreshed"
        );
        *state = Some(cached);
        Ok(grant.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingExchange {
        calls: AtomicU32,
        expires_in: u64,
    }

    #[async_trait]
    impl TokenExchange for CountingExchange {
        async fn exchange(&self) -> PaymentResult<TokenGrant> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            // Slow enough that concurrent callers overlap the refresh window.
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok(TokenGrant {
                access_token: format!("token-{}", call),
                expires_in: self.expires_in,
            })
        }
    }

    struct FailingExchange;

    #[async_trait]
    impl TokenExchange for FailingExchange {
        async fn exchange(&self) -> PaymentResult<TokenGrant> {
            Err(PaymentError::TokenAcquisitionError {
                provider: "swiftpay".to_string(),
                message: "HTTP 500".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn concurrent_callers_trigger_a_single_refresh() {
        let exchanger = Arc::new(CountingExchange {
            calls: AtomicU32::new(0),
            expires_in: 3600,
        });
        let cache = Arc::new(CredentialCache::new("swiftpay", exchanger.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.get_token().await }));
        }
        for handle in handles {
            let token = handle.await.expect("task").expect("token");
            assert_eq!(token, "token-1");
        }
        assert_eq!(exchanger.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_token_is_replaced() {
        let exchanger = Arc::new(CountingExchange {
            calls: AtomicU32::new(0),
            // Expires inside the safety margin, so every call refreshes.
            expires_in: 10,
        });
        let cache = CredentialCache::new("swiftpay", exchanger.clone());

        assert_eq!(cache.get_token().await.unwrap(), "token-1");
        assert_eq!(cache.get_token().await.unwrap(), "token-2");
        assert_eq!(exchanger.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fresh_token_is_reused() {
        let exchanger = Arc::new(CountingExchange {
            calls: AtomicU32::new(0),
            expires_in: 3600,
        });
        let cache = CredentialCache::new("swiftpay", exchanger.clone());

        let first = cache.get_token().await.unwrap();
        let second = cache.get_token().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(exchanger.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exchange_failure_surfaces_as_token_error() {
        let cache = CredentialCache::new("swiftpay", Arc::new(FailingExchange));
        let err = cache.get_token().await.unwrap_err();
        assert!(matches!(err, PaymentError::TokenAcquisitionError { .. }));
    }
}
