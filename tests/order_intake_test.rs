use bigdecimal::BigDecimal;
use paylink_backend::services::order_intake::{validate_request, CreateOrderRequest};
use paylink_backend::services::order_token::{OrderTokenSigner, TokenError};
use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;

fn valid_request() -> CreateOrderRequest {
    CreateOrderRequest {
        name: Some("Ola Nordmann".to_string()),
        email: Some("ola@example.com".to_string()),
        total: Some(BigDecimal::from(350)),
        phone: None,
        product_description: Some("catering platter".to_string()),
        quantity: Some(1),
        delivery_method: Some("delivery".to_string()),
        delivery_address: Some("Storgata 1, Oslo".to_string()),
        scheduled_for: Some(Utc::now() + ChronoDuration::days(2)),
        message: Some("ring the bell".to_string()),
    }
}

#[test]
fn complete_request_is_accepted() {
    let order = validate_request(&valid_request(), "NOK").expect("should validate");
    assert_eq!(order.email, "ola@example.com");
    assert_eq!(order.currency, "NOK");
    assert_eq!(order.delivery_address.as_deref(), Some("Storgata 1, Oslo"));
}

#[test]
fn each_mandatory_field_is_enforced() {
    let mut missing_name = valid_request();
    missing_name.name = None;
    assert_eq!(
        validate_request(&missing_name, "NOK").unwrap_err().status_code(),
        400
    );

    let mut missing_email = valid_request();
    missing_email.email = None;
    assert_eq!(
        validate_request(&missing_email, "NOK").unwrap_err().status_code(),
        400
    );

    let mut missing_total = valid_request();
    missing_total.total = None;
    assert_eq!(
        validate_request(&missing_total, "NOK").unwrap_err().status_code(),
        400
    );
}

#[test]
fn optional_fields_may_be_absent() {
    let request = CreateOrderRequest {
        name: Some("Ola Nordmann".to_string()),
        email: Some("ola@example.com".to_string()),
        total: Some(BigDecimal::from(100)),
        phone: None,
        product_description: None,
        quantity: None,
        delivery_method: None,
        delivery_address: None,
        scheduled_for: None,
        message: None,
    };
    assert!(validate_request(&request, "NOK").is_ok());
}

#[test]
fn negative_total_is_rejected() {
    let mut request = valid_request();
    request.total = Some(BigDecimal::from(-5));
    assert!(validate_request(&request, "NOK").is_err());
}

#[test]
fn status_token_round_trips_through_issue_and_verify() {
    let signer = OrderTokenSigner::new(
        b"an-integration-test-secret-value".to_vec(),
        Duration::from_secs(3600),
    );
    let now = Utc::now();
    let token = signer.issue("TO-2318", "ola@example.com", now);

    let claims = signer.verify(&token, now).expect("fresh token verifies");
    assert_eq!(claims.order_number, "TO-2318");

    // Within the window it still verifies, past the window it does not.
    assert!(signer
        .verify(&token, now + ChronoDuration::minutes(59))
        .is_ok());
    assert!(matches!(
        signer.verify(&token, now + ChronoDuration::minutes(61)),
        Err(TokenError::Expired { .. })
    ));
}
