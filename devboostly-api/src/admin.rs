use axum::{
    extract::{Path, Query, State},
    routing::{get, patch, post},
    Json, Router,
};
use devboostly_order::{
    DashboardStats, Order, OrderStatus, Quote, QuoteReview, ServiceError, Ticket, TicketStatus, User,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::AppError, state::AppState, tickets};

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StatusFilter {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTicketStatusRequest {
    pub status: TicketStatus,
}

/// Mounted under `/admin` behind `admin_auth_middleware`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/orders", get(list_orders))
        .route("/orders/{id}/status", patch(update_order_status))
        .route("/quotes", get(list_quotes))
        .route("/quotes/{id}/review", post(review_quote))
        .route("/tickets", get(list_tickets))
        .route("/tickets/{id}/status", patch(update_ticket_status))
        .route("/tickets/{id}/messages", post(tickets::reply))
        .route("/stats", get(stats))
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    let users = state.store.list_users().await.map_err(ServiceError::from)?;
    Ok(Json(users))
}

/// GET /admin/orders?status=processing
async fn list_orders(
    State(state): State<AppState>,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<Vec<Order>>, AppError> {
    let status = filter.status
        .map(|s| OrderStatus::parse(&s).ok_or_else(|| AppError::ValidationError(format!("Unknown order status: {}", s))))
        .transpose()?;
    Ok(Json(state.orchestrator.list_all_orders(status).await?))
}

async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state.orchestrator.advance_status(order_id, payload.status).await?;
    tracing::info!("Order {} moved to {} by staff", order.number, order.status.as_str());
    Ok(Json(order))
}

async fn list_quotes(State(state): State<AppState>) -> Result<Json<Vec<Quote>>, AppError> {
    Ok(Json(state.orchestrator.list_all_quotes().await?))
}

async fn review_quote(
    State(state): State<AppState>,
    Path(quote_id): Path<Uuid>,
    Json(review): Json<QuoteReview>,
) -> Result<Json<Quote>, AppError> {
    Ok(Json(state.orchestrator.review_quote(quote_id, review).await?))
}

async fn list_tickets(
    State(state): State<AppState>,
    Query(filter): Query<StatusFilter>,
) -> Result<Json<Vec<Ticket>>, AppError> {
    let status = filter.status
        .map(|s| TicketStatus::parse(&s).ok_or_else(|| AppError::ValidationError(format!("Unknown ticket status: {}", s))))
        .transpose()?;
    Ok(Json(state.desk.list_all_tickets(status).await?))
}

async fn update_ticket_status(
    State(state): State<AppState>,
    Path(ticket_id): Path<Uuid>,
    Json(payload): Json<UpdateTicketStatusRequest>,
) -> Result<Json<Ticket>, AppError> {
    Ok(Json(state.desk.set_ticket_status(ticket_id, payload.status).await?))
}

async fn stats(State(state): State<AppState>) -> Result<Json<DashboardStats>, AppError> {
    Ok(Json(DashboardStats::collect(state.store.as_ref()).await?))
}
