use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use devboostly_order::ReconcileOutcome;
use devboostly_store::stripe::{verify_webhook_signature, WebhookEvent};
use crate::{error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/webhooks/stripe", post(handle_stripe_webhook))
}

/// POST /webhooks/stripe
///
/// Only the intent id is taken from the payload; the orchestrator re-fetches
/// the intent from the gateway before acting on it. Errors make Stripe retry.
async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    if let Some(secret) = &state.webhook_secret {
        let signature = headers
            .get("Stripe-Signature")
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::ValidationError("Missing Stripe-Signature header".to_string()))?;
        verify_webhook_signature(&body, signature, secret).map_err(|reason| {
            tracing::warn!("Rejected webhook: {}", reason);
            AppError::ValidationError(reason.to_string())
        })?;
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::ValidationError(format!("Invalid webhook payload: {}", e)))?;

    if event.kind != "payment_intent.succeeded" {
        tracing::debug!("Ignoring webhook {} of type {}", event.id, event.kind);
        return Ok(StatusCode::OK);
    }
    let Some(intent_id) = event.payment_intent_id() else {
        return Err(AppError::ValidationError("Webhook event has no payment intent".to_string()));
    };

    tracing::info!("Received webhook {} for intent {}", event.id, intent_id);
    match state.orchestrator.reconcile_intent(intent_id).await? {
        ReconcileOutcome::OrderLegPaid { order_id, leg } => {
            tracing::info!("Order {} {} leg settled via webhook", order_id, leg.as_str());
        }
        ReconcileOutcome::QuoteAccepted { quote_id, order_id } => {
            tracing::info!("Quote {} accepted via webhook as order {}", quote_id, order_id);
        }
        ReconcileOutcome::Unmatched | ReconcileOutcome::Ignored => {}
    }

    Ok(StatusCode::OK)
}
