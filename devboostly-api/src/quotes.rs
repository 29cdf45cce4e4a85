use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use devboostly_order::orchestrator::payment_message;
use devboostly_order::{LegKind, Order, PaymentSession, Quote, QuoteRequest};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::{error::AppError, middleware::AuthSession, state::AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptQuoteRequest {
    pub payment_intent_id: String,
}

#[derive(Debug, Serialize)]
pub struct AcceptQuoteResponse {
    pub quote: Quote,
    pub order: Order,
    pub message: &'static str,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/quotes", post(request_quote).get(list_quotes))
        .route("/quotes/{id}", get(get_quote))
        .route("/quotes/{id}/init-payment", post(init_payment))
        .route("/quotes/{id}/accept", post(accept_quote))
}

/// POST /quotes. Open to anonymous visitors.
async fn request_quote(
    State(state): State<AppState>,
    session: Option<AuthSession>,
    Json(payload): Json<QuoteRequest>,
) -> Result<(StatusCode, Json<Quote>), AppError> {
    let session = session.map(|AuthSession(s)| s);
    let quote = state.desk.request_quote(session.as_ref(), payload).await?;
    Ok((StatusCode::CREATED, Json(quote)))
}

async fn list_quotes(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> Result<Json<Vec<Quote>>, AppError> {
    Ok(Json(state.orchestrator.list_quotes(&session).await?))
}

async fn get_quote(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(quote_id): Path<Uuid>,
) -> Result<Json<Quote>, AppError> {
    Ok(Json(state.orchestrator.get_quote(&session, quote_id).await?))
}

async fn init_payment(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(quote_id): Path<Uuid>,
) -> Result<Json<PaymentSession>, AppError> {
    Ok(Json(state.orchestrator.init_quote_payment(&session, quote_id).await?))
}

async fn accept_quote(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(quote_id): Path<Uuid>,
    Json(payload): Json<AcceptQuoteRequest>,
) -> Result<Json<AcceptQuoteResponse>, AppError> {
    let acceptance = state.orchestrator
        .accept_quote_and_pay(&session, quote_id, &payload.payment_intent_id)
        .await?;
    let message = payment_message(&acceptance.order, LegKind::Deposit);
    Ok(Json(AcceptQuoteResponse {
        quote: acceptance.quote,
        order: acceptance.order,
        message,
    }))
}
