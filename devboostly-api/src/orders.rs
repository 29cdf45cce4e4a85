use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use devboostly_order::orchestrator::payment_message;
use devboostly_order::{CheckoutRequest, LegKind, Order, PaymentSession};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::{error::AppError, middleware::AuthSession, state::AppState};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    pub order_id: Option<Uuid>,
    pub payment_intent_id: String,
}

/// An order after one of its legs was paid.
#[derive(Debug, Serialize)]
pub struct PaymentConfirmation {
    #[serde(flatten)]
    pub order: Order,
    pub message: &'static str,
}

impl PaymentConfirmation {
    pub fn new(order: Order, leg: LegKind) -> Self {
        let message = payment_message(&order, leg);
        Self { order, message }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/{id}", get(get_order))
        .route("/orders/{id}/pay-deposit", post(pay_deposit))
        .route("/orders/{id}/confirm-deposit", post(confirm_deposit))
        .route("/orders/{id}/pay-balance", post(pay_balance))
        .route("/orders/{id}/confirm-balance", post(confirm_balance))
        .route("/orders/{id}/cancel", post(cancel_order))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /orders
async fn create_order(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Json(payload): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let order = state.orchestrator.create_order(&session, payload).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders
async fn list_orders(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.orchestrator.list_orders(&session).await?))
}

/// GET /orders/{id}
async fn get_order(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.orchestrator.get_order(&session, order_id).await?))
}

/// POST /orders/{id}/pay-deposit
async fn pay_deposit(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(order_id): Path<Uuid>,
) -> Result<Json<PaymentSession>, AppError> {
    Ok(Json(state.orchestrator.init_deposit_payment(&session, order_id).await?))
}

/// POST /orders/{id}/pay-balance
async fn pay_balance(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(order_id): Path<Uuid>,
) -> Result<Json<PaymentSession>, AppError> {
    Ok(Json(state.orchestrator.init_balance_payment(&session, order_id).await?))
}

fn check_body_order(path_id: Uuid, payload: &ConfirmPaymentRequest) -> Result<(), AppError> {
    match payload.order_id {
        Some(body_id) if body_id != path_id => Err(AppError::ValidationError(
            "orderId does not match the order in the URL".to_string(),
        )),
        _ => Ok(()),
    }
}

/// POST /orders/{id}/confirm-deposit
async fn confirm_deposit(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> Result<Json<PaymentConfirmation>, AppError> {
    check_body_order(order_id, &payload)?;
    let order = state.orchestrator
        .confirm_deposit_payment(&session, order_id, &payload.payment_intent_id)
        .await?;
    Ok(Json(PaymentConfirmation::new(order, LegKind::Deposit)))
}

/// POST /orders/{id}/confirm-balance
async fn confirm_balance(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<ConfirmPaymentRequest>,
) -> Result<Json<PaymentConfirmation>, AppError> {
    check_body_order(order_id, &payload)?;
    let order = state.orchestrator
        .confirm_balance_payment(&session, order_id, &payload.payment_intent_id)
        .await?;
    Ok(Json(PaymentConfirmation::new(order, LegKind::Balance)))
}

/// POST /orders/{id}/cancel
async fn cancel_order(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.orchestrator.cancel_order(&session, order_id).await?))
}
