use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::types::{CheckoutOrder, LinkResult, ProviderName, RawStatus};
use async_trait::async_trait;

/// Common capability set every gateway adapter implements.
///
/// `create_link` is called at most once per order per adapter by the fan-out;
/// ordinary business rejections come back as `Err` and are recorded as failed
/// payment attempts, never propagated to the order-intake caller.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a customer-facing payment link/session for the order.
    async fn create_link(&self, order: &CheckoutOrder) -> PaymentResult<LinkResult>;

    /// Poll the provider-native status for a previously created link.
    async fn check_status(&self, external_ref: &str) -> PaymentResult<RawStatus>;

    /// Cancel a still-live link. Only meaningful for gateways whose links
    /// represent a cancelable authorization; the default rejects the call.
    async fn revoke(&self, external_ref: &str) -> PaymentResult<()> {
        let _ = external_ref;
        Err(PaymentError::RevokeUnsupported {
            provider: self.name().as_str().to_string(),
        })
    }

    fn name(&self) -> ProviderName;

    /// Whether `revoke` has a real implementation; gates expiry-revoke
    /// scheduling.
    fn supports_revoke(&self) -> bool {
        false
    }
}
