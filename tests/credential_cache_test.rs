use async_trait::async_trait;
use paylink_backend::payments::credentials::{CredentialCache, TokenExchange, TokenGrant};
use paylink_backend::payments::error::{PaymentError, PaymentResult};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

struct SlowExchange {
    calls: AtomicU32,
}

#[async_trait]
impl TokenExchange for SlowExchange {
    async fn exchange(&self) -> PaymentResult<TokenGrant> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        Ok(TokenGrant {
            access_token: format!("grant-{}", call),
            expires_in: 900,
        })
    }
}

#[tokio::test]
async fn a_burst_of_callers_performs_exactly_one_exchange() {
    let exchange = Arc::new(SlowExchange {
        calls: AtomicU32::new(0),
    });
    let cache = Arc::new(CredentialCache::new("swiftpay", exchange.clone()));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move { cache.get_token().await }));
    }

    for handle in handles {
        let token = handle.await.unwrap().unwrap();
        assert_eq!(token, "grant-1");
    }
    assert_eq!(exchange.calls.load(Ordering::SeqCst), 1);
}

struct FlakyExchange {
    calls: AtomicU32,
}

#[async_trait]
impl TokenExchange for FlakyExchange {
    async fn exchange(&self) -> PaymentResult<TokenGrant> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == 1 {
            Err(PaymentError::TokenAcquisitionError {
                provider: "swiftpay".to_string(),
                message: "HTTP 503".to_string(),
            })
        } else {
            Ok(TokenGrant {
                access_token: "grant-after-retry".to_string(),
                expires_in: 900,
            })
        }
    }
}

#[tokio::test]
async fn a_failed_exchange_does_not_poison_the_cache() {
    let exchange = Arc::new(FlakyExchange {
        calls: AtomicU32::new(0),
    });
    let cache = CredentialCache::new("swiftpay", exchange.clone());

    let err = cache.get_token().await.unwrap_err();
    assert!(matches!(err, PaymentError::TokenAcquisitionError { .. }));

    // The next caller triggers a fresh exchange and succeeds.
    let token = cache.get_token().await.unwrap();
    assert_eq!(token, "grant-after-retry");
    assert_eq!(exchange.calls.load(Ordering::SeqCst), 2);
}
