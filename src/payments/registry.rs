use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentProvider;
use crate::payments::providers::{
    CardGateProvider, CoinPayProvider, LinkPayProvider, SwiftPayProvider, WalletGoProvider,
};
use crate::payments::types::ProviderName;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub enabled_providers: Vec<ProviderName>,
}

impl RegistryConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let enabled_raw = std::env::var("ENABLED_PAYMENT_PROVIDERS")
            .unwrap_or_else(|_| "linkpay,swiftpay,cardgate,walletgo,coinpay".to_string());
        let mut enabled_providers = Vec::new();
        for part in enabled_raw.split(',') {
            let value = part.trim();
            if value.is_empty() {
                continue;
            }
            let provider = ProviderName::from_str(value)?;
            if !enabled_providers.contains(&provider) {
                enabled_providers.push(provider);
            }
        }

        if enabled_providers.is_empty() {
            return Err(PaymentError::ValidationError {
                message: "at least one payment provider must be enabled".to_string(),
                field: Some("ENABLED_PAYMENT_PROVIDERS".to_string()),
            });
        }

        Ok(Self { enabled_providers })
    }
}

/// Closed set of constructed gateway adapters, selected by configuration.
///
/// Built once at startup; the fan-out and the reconciliation worker share it
/// through an `Arc`.
pub struct ProviderRegistry {
    order: Vec<ProviderName>,
    providers: HashMap<ProviderName, Arc<dyn PaymentProvider>>,
}

impl ProviderRegistry {
    /// Construct every enabled adapter from its environment configuration.
    pub fn from_env() -> PaymentResult<Self> {
        let config = RegistryConfig::from_env()?;
        let mut providers: Vec<Arc<dyn PaymentProvider>> = Vec::new();
        for name in &config.enabled_providers {
            let provider: Arc<dyn PaymentProvider> = match name {
                ProviderName::LinkPay => Arc::new(LinkPayProvider::from_env()?),
                ProviderName::SwiftPay => Arc::new(SwiftPayProvider::from_env()?),
                ProviderName::CardGate => Arc::new(CardGateProvider::from_env()?),
                ProviderName::WalletGo => Arc::new(WalletGoProvider::from_env()?),
                ProviderName::CoinPay => Arc::new(CoinPayProvider::from_env()?),
            };
            providers.push(provider);
        }
        info!(
            enabled = ?config.enabled_providers,
            "payment provider registry initialized"
        );
        Ok(Self::with_providers(providers))
    }

    /// Build a registry from pre-constructed adapters (tests, custom wiring).
    pub fn with_providers(providers: Vec<Arc<dyn PaymentProvider>>) -> Self {
        let mut order = Vec::new();
        let mut map = HashMap::new();
        for provider in providers {
            let name = provider.name();
            if map.insert(name, provider).is_none() {
                order.push(name);
            }
        }
        Self {
            order,
            providers: map,
        }
    }

    pub fn get(&self, name: ProviderName) -> PaymentResult<Arc<dyn PaymentProvider>> {
        self.providers
            .get(&name)
            .cloned()
            .ok_or(PaymentError::ValidationError {
                message: format!("provider {} is disabled", name),
                field: Some("provider".to_string()),
            })
    }

    pub fn enabled(&self) -> &[ProviderName] {
        &self.order
    }

    /// Adapters in configured order, for fan-out.
    pub fn iter(&self) -> impl Iterator<Item = Arc<dyn PaymentProvider>> + '_ {
        self.order
            .iter()
            .filter_map(move |name| self.providers.get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::types::{CheckoutOrder, LinkResult, RawStatus};
    use async_trait::async_trait;
    use chrono::Utc;

    struct StubProvider(ProviderName);

    #[async_trait]
    impl PaymentProvider for StubProvider {
        async fn create_link(&self, order: &CheckoutOrder) -> PaymentResult<LinkResult> {
            Ok(LinkResult {
                url: "https://example.com".to_string(),
                external_ref: None,
                raw_status: "Created".to_string(),
                expires_at: None,
                amount_submitted: order.amount.clone(),
            })
        }

        async fn check_status(&self, _external_ref: &str) -> PaymentResult<RawStatus> {
            Ok(RawStatus {
                provider: self.0,
                payment_status: "Created".to_string(),
                link_status: None,
                observed_at: Utc::now(),
            })
        }

        fn name(&self) -> ProviderName {
            self.0
        }
    }

    #[test]
    fn registry_preserves_configured_order() {
        let registry = ProviderRegistry::with_providers(vec![
            Arc::new(StubProvider(ProviderName::CoinPay)),
            Arc::new(StubProvider(ProviderName::LinkPay)),
        ]);
        assert_eq!(
            registry.enabled(),
            &[ProviderName::CoinPay, ProviderName::LinkPay]
        );
    }

    #[test]
    fn disabled_provider_is_an_error() {
        let registry =
            ProviderRegistry::with_providers(vec![Arc::new(StubProvider(ProviderName::LinkPay))]);
        assert!(registry.get(ProviderName::LinkPay).is_ok());
        assert!(registry.get(ProviderName::CardGate).is_err());
    }
}
