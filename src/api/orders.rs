//! Customer-facing order and payment-status routes.

use crate::error::AppError;
use crate::middleware::error::get_request_id_from_headers;
use crate::services::order_intake::{CreateOrderRequest, CreatedOrder, OrderIntakeService};
use crate::services::reconciliation::ReconciliationService;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct OrdersState {
    pub intake: Arc<OrderIntakeService>,
    pub reconciliation: Arc<ReconciliationService>,
}

pub fn router(state: OrdersState) -> Router {
    Router::new()
        .route("/create", post(create_order))
        .route("/payment-status/{token}", get(payment_status))
        .route("/check-payment-status/{payment_id}", get(check_payment_status))
        .with_state(state)
}

async fn create_order(
    State(state): State<OrdersState>,
    headers: HeaderMap,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreatedOrder>), AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let created = state
        .intake
        .create_order(payload)
        .await
        .map_err(|e| attach_request_id(e, request_id))?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn payment_status(
    State(state): State<OrdersState>,
    headers: HeaderMap,
    Path(token): Path<String>,
) -> Result<Json<JsonValue>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let links = state
        .intake
        .payment_links_for_token(&token)
        .await
        .map_err(|e| attach_request_id(e, request_id))?;

    if links.is_empty() {
        return Ok(Json(json!({ "status": "pending" })));
    }

    let mut body = serde_json::Map::new();
    for link in links {
        body.insert(
            link.provider,
            json!({
                "url": link.link_url,
                "expiresAt": link.expires_at,
            }),
        );
    }
    Ok(Json(JsonValue::Object(body)))
}

#[derive(Debug, Serialize)]
struct ManualCheckResponse {
    #[serde(rename = "paymentId")]
    payment_id: Uuid,
    status: String,
}

async fn check_payment_status(
    State(state): State<OrdersState>,
    headers: HeaderMap,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<ManualCheckResponse>, AppError> {
    let request_id = get_request_id_from_headers(&headers);
    let status = state
        .reconciliation
        .manual_check(payment_id)
        .await
        .map_err(|e| attach_request_id(e, request_id))?;

    Ok(Json(ManualCheckResponse {
        payment_id,
        status: status.as_str().to_string(),
    }))
}

fn attach_request_id(err: AppError, request_id: Option<String>) -> AppError {
    match request_id {
        Some(id) => err.with_request_id(id),
        None => err,
    }
}
