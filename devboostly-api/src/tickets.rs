use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use devboostly_order::{NewTicket, Ticket};
use serde::Deserialize;
use uuid::Uuid;
use crate::{error::AppError, middleware::AuthSession, state::AppState};

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub body: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tickets", post(open_ticket).get(list_tickets))
        .route("/tickets/{id}", get(get_ticket))
        .route("/tickets/{id}/messages", post(reply))
}

async fn open_ticket(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Json(payload): Json<NewTicket>,
) -> Result<(StatusCode, Json<Ticket>), AppError> {
    let ticket = state.desk.open_ticket(&session, payload).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

async fn list_tickets(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
) -> Result<Json<Vec<Ticket>>, AppError> {
    Ok(Json(state.desk.list_tickets(&session).await?))
}

async fn get_ticket(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<Ticket>, AppError> {
    Ok(Json(state.desk.get_ticket(&session, ticket_id).await?))
}

/// POST /tickets/{id}/messages. Also mounted under /admin for staff replies.
pub(crate) async fn reply(
    State(state): State<AppState>,
    AuthSession(session): AuthSession,
    Path(ticket_id): Path<Uuid>,
    Json(payload): Json<ReplyRequest>,
) -> Result<Json<Ticket>, AppError> {
    Ok(Json(state.desk.reply(&session, ticket_id, payload.body).await?))
}
