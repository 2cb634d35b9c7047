use crate::payments::error::{PaymentError, PaymentResult};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::warn;

/// Shared outbound HTTP client for provider adapters.
///
/// Every request carries a hard timeout. 5xx and 429 responses retry with
/// exponential backoff up to `max_retries`; 404/410 surface as
/// `PaymentError::NotFound` so revoke paths can treat an already-gone link
/// as a successful expiry.
#[derive(Clone)]
pub struct ProviderHttpClient {
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

/// Outcome of a single attempt, before the retry policy is applied.
enum Attempt {
    Done(String),
    Fatal(PaymentError),
    Retry(PaymentError),
}

impl ProviderHttpClient {
    pub fn new(timeout: Duration, max_retries: u32) -> PaymentResult<Self> {
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("failed to initialize HTTP client: {}", e),
                })?;

        Ok(Self {
            client,
            timeout,
            max_retries,
        })
    }

    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        provider: &str,
        bearer_token: Option<&str>,
        body: Option<&JsonValue>,
        extra_headers: &[(&str, &str)],
    ) -> PaymentResult<T> {
        let text = self
            .request_with_retries(method, url, provider, bearer_token, body, extra_headers)
            .await?;
        serde_json::from_str::<T>(&text).map_err(|e| PaymentError::ProviderError {
            provider: provider.to_string(),
            message: format!("invalid provider JSON response: {}", e),
            provider_code: None,
            retryable: false,
        })
    }

    /// Issue a request where only success matters, e.g. a DELETE against a
    /// payment link.
    pub async fn request_no_content(
        &self,
        method: Method,
        url: &str,
        provider: &str,
        bearer_token: Option<&str>,
        body: Option<&JsonValue>,
        extra_headers: &[(&str, &str)],
    ) -> PaymentResult<()> {
        self.request_with_retries(method, url, provider, bearer_token, body, extra_headers)
            .await
            .map(drop)
    }

    async fn request_with_retries(
        &self,
        method: Method,
        url: &str,
        provider: &str,
        bearer_token: Option<&str>,
        body: Option<&JsonValue>,
        extra_headers: &[(&str, &str)],
    ) -> PaymentResult<String> {
        let mut attempt = 0;
        loop {
            let outcome = self
                .attempt_once(method.clone(), url, provider, bearer_token, body, extra_headers)
                .await;

            match outcome {
                Attempt::Done(text) => return Ok(text),
                Attempt::Fatal(err) => return Err(err),
                Attempt::Retry(err) => {
                    if attempt >= self.max_retries {
                        return Err(err);
                    }
                    warn!(
                        provider = provider,
                        attempt = attempt + 1,
                        error = %err,
                        "provider request failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt_once(
        &self,
        method: Method,
        url: &str,
        provider: &str,
        bearer_token: Option<&str>,
        body: Option<&JsonValue>,
        extra_headers: &[(&str, &str)],
    ) -> Attempt {
        let mut request = self.client.request(method, url).timeout(self.timeout);
        if let Some(token) = bearer_token {
            request = request.bearer_auth(token);
        }
        for (name, value) in extra_headers {
            request = request.header(*name, *value);
        }
        if let Some(payload) = body {
            request = request.json(payload);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                return Attempt::Retry(PaymentError::NetworkError {
                    message: format!("provider request failed: {}", e),
                })
            }
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status.is_success() {
            return Attempt::Done(text);
        }

        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Attempt::Fatal(PaymentError::NotFound {
                provider: provider.to_string(),
                reference: url.to_string(),
            });
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Attempt::Retry(PaymentError::RateLimitError {
                message: "provider rate limit exceeded".to_string(),
                retry_after_seconds: None,
            });
        }

        let err = PaymentError::ProviderError {
            provider: provider.to_string(),
            message: format!("HTTP {}: {}", status, text),
            provider_code: Some(status.as_u16().to_string()),
            retryable: status.is_server_error(),
        };
        if status.is_server_error() {
            Attempt::Retry(err)
        } else {
            Attempt::Fatal(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn client_construction_succeeds_with_sane_settings() {
        let client = ProviderHttpClient::new(Duration::from_secs(10), 2);
        assert!(client.is_ok());
    }
}
