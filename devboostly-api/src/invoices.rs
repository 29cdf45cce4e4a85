use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use devboostly_order::Invoice;
use uuid::Uuid;
use crate::{error::AppError, middleware::AuthSession, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/invoices", get(list_invoices))
        .route("/invoices/{id}", get(get_invoice))
}

async fn list_invoices(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> Result<Json<Vec<Invoice>>, AppError> {
    Ok(Json(state.orchestrator.list_invoices(&session).await?))
}

async fn get_invoice(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<Invoice>, AppError> {
    Ok(Json(state.orchestrator.get_invoice(&session, invoice_id).await?))
}
