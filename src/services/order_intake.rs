//! Transactional order intake.
//!
//! Validates the request, allocates the next order number inside the insert
//! transaction, stores the signed status token with the order, and hands the
//! committed order to the fan-out as a spawned background task. The caller
//! gets the token and order number immediately; payment-link availability is
//! eventually consistent through polling.

use crate::config::OrderConfig;
use crate::database::order_repository::{NewOrder, OrderRecord, OrderRepository};
use crate::database::payment_repository::{ActiveLink, PaymentRepository};
use crate::error::{AppError, AppErrorKind, DomainError, ValidationError};
use crate::services::fanout::FanOutOrchestrator;
use crate::services::order_token::{OrderTokenSigner, TokenError};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::{Arc, OnceLock};
use tracing::{error, info};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub total: Option<BigDecimal>,
    pub phone: Option<String>,
    pub product_description: Option<String>,
    pub quantity: Option<i32>,
    pub delivery_method: Option<String>,
    pub delivery_address: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedOrder {
    pub token: String,
    #[serde(rename = "orderNumber")]
    pub order_number: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("static regex")
    })
}

/// Check mandatory fields and shape; returns the repository row on success.
/// Nothing is persisted when this fails.
pub fn validate_request(
    request: &CreateOrderRequest,
    currency: &str,
) -> Result<NewOrder, AppError> {
    let name = request
        .name
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            AppError::new(AppErrorKind::Validation(ValidationError::MissingField {
                field: "name".to_string(),
            }))
        })?;

    let email = request
        .email
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            AppError::new(AppErrorKind::Validation(ValidationError::MissingField {
                field: "email".to_string(),
            }))
        })?;
    if !email_regex().is_match(email) {
        return Err(AppError::new(AppErrorKind::Validation(
            ValidationError::InvalidEmail {
                email: email.to_string(),
            },
        )));
    }

    let total = request.total.clone().ok_or_else(|| {
        AppError::new(AppErrorKind::Validation(ValidationError::MissingField {
            field: "total".to_string(),
        }))
    })?;
    if total <= BigDecimal::from(0) {
        return Err(AppError::new(AppErrorKind::Validation(
            ValidationError::InvalidAmount {
                amount: total.to_string(),
                reason: "must be greater than zero".to_string(),
            },
        )));
    }

    Ok(NewOrder {
        customer_name: name.to_string(),
        email: email.to_string(),
        phone: request.phone.clone(),
        product_description: request.product_description.clone(),
        quantity: request.quantity,
        delivery_method: request.delivery_method.clone(),
        delivery_address: request.delivery_address.clone(),
        scheduled_for: request.scheduled_for,
        message: request.message.clone(),
        total_amount: total,
        currency: currency.to_string(),
    })
}

pub struct OrderIntakeService {
    pool: PgPool,
    orders: OrderRepository,
    payments: PaymentRepository,
    signer: OrderTokenSigner,
    config: OrderConfig,
    fanout: Arc<FanOutOrchestrator>,
}

impl OrderIntakeService {
    pub fn new(
        pool: PgPool,
        signer: OrderTokenSigner,
        config: OrderConfig,
        fanout: Arc<FanOutOrchestrator>,
    ) -> Self {
        Self {
            orders: OrderRepository::new(pool.clone()),
            payments: PaymentRepository::new(pool.clone()),
            pool,
            signer,
            config,
            fanout,
        }
    }

    /// Create an order and trigger the payment fan-out.
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<CreatedOrder, AppError> {
        let new_order = validate_request(&request, &self.config.currency)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(crate::database::error::DatabaseError::from_sqlx)?;

        let seq = self
            .orders
            .allocate_next_seq(&mut *tx, self.config.number_base)
            .await?;
        let order_number = format!("{}-{}", self.config.number_prefix, seq);
        let now = Utc::now();
        let token = self.signer.issue(&order_number, &new_order.email, now);

        let record = self
            .orders
            .insert(&mut *tx, &new_order, seq, &order_number, &token)
            .await?;

        tx.commit()
            .await
            .map_err(crate::database::error::DatabaseError::from_sqlx)?;

        info!(
            order = %record.order_number,
            total = %record.total_amount,
            "order created"
        );

        self.spawn_fanout(record.clone());

        Ok(CreatedOrder {
            token: record.status_token,
            order_number: record.order_number,
            created_at: record.created_at,
        })
    }

    /// Fan-out runs after commit as a background task; its failures surface
    /// as failed payment rows and log lines, never as an intake error.
    fn spawn_fanout(&self, order: OrderRecord) {
        let fanout = self.fanout.clone();
        tokio::spawn(async move {
            let order_number = order.order_number.clone();
            let summary = fanout.dispatch(&order).await;
            if summary.succeeded == 0 {
                error!(
                    order = %order_number,
                    failed = summary.failed,
                    "fan-out produced no usable payment link"
                );
            }
        });
    }

    /// Payment links for the customer status endpoint, keyed by the signed
    /// token.
    pub async fn payment_links_for_token(
        &self,
        token: &str,
    ) -> Result<Vec<ActiveLink>, AppError> {
        let now = Utc::now();
        let claims = self.signer.verify(token, now).map_err(|e| match e {
            TokenError::Expired { order_number } => {
                AppError::new(AppErrorKind::Domain(DomainError::TokenExpired { order_number }))
            }
            other => AppError::new(AppErrorKind::Domain(DomainError::TokenInvalid {
                reason: other.to_string(),
            })),
        })?;

        let order = self
            .orders
            .find_by_number(&claims.order_number)
            .await?
            .ok_or_else(|| {
                AppError::new(AppErrorKind::Domain(DomainError::OrderNotFound {
                    reference: claims.order_number.clone(),
                }))
            })?;

        // The stored token must match: a token issued for a deleted and
        // re-created number cannot leak another customer's links.
        if order.status_token != token {
            return Err(AppError::new(AppErrorKind::Domain(
                DomainError::TokenInvalid {
                    reason: "token does not match order".to_string(),
                },
            )));
        }

        Ok(self.payments.active_links_for_order(order.id, now).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateOrderRequest {
        CreateOrderRequest {
            name: Some("Kari Nordmann".to_string()),
            email: Some("kari@example.com".to_string()),
            total: Some(BigDecimal::from(450)),
            phone: Some("+4740000000".to_string()),
            product_description: Some("2x birthday cake".to_string()),
            quantity: Some(2),
            delivery_method: Some("pickup".to_string()),
            delivery_address: None,
            scheduled_for: None,
            message: None,
        }
    }

    #[test]
    fn valid_request_passes() {
        let order = validate_request(&request(), "NOK").expect("should validate");
        assert_eq!(order.customer_name, "Kari Nordmann");
        assert_eq!(order.currency, "NOK");
        assert_eq!(order.total_amount, BigDecimal::from(450));
    }

    #[test]
    fn missing_name_is_rejected() {
        let mut req = request();
        req.name = None;
        let err = validate_request(&req, "NOK").unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut req = request();
        req.name = Some("   ".to_string());
        assert!(validate_request(&req, "NOK").is_err());
    }

    #[test]
    fn malformed_email_is_rejected() {
        let mut req = request();
        req.email = Some("not-an-email".to_string());
        let err = validate_request(&req, "NOK").unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn missing_total_is_rejected() {
        let mut req = request();
        req.total = None;
        assert!(validate_request(&req, "NOK").is_err());
    }

    #[test]
    fn non_positive_total_is_rejected() {
        let mut req = request();
        req.total = Some(BigDecimal::from(0));
        assert!(validate_request(&req, "NOK").is_err());
    }
}
