use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use devboostly_core::GatewayError;
use devboostly_order::ServiceError;
use serde_json::json;

pub const RECONCILIATION_MESSAGE: &str =
    "Your payment was received but your order could not be recorded. Our team has been notified and will contact you; please keep the payment reference.";

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    /// The gateway refused the payment; the message is safe to show.
    PaymentError { message: String, code: String },
    GatewayUnavailable(String),
    /// Captured money without a recorded order.
    PaymentPending { payment_intent_id: String },
    TooManyRequests,
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            AppError::AuthorizationError(_) => StatusCode::FORBIDDEN,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFoundError(_) => StatusCode::NOT_FOUND,
            AppError::ConflictError(_) => StatusCode::CONFLICT,
            AppError::PaymentError { .. } => StatusCode::PAYMENT_REQUIRED,
            AppError::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            AppError::PaymentPending { .. }
            | AppError::InternalServerError(_)
            | AppError::Anyhow(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::AuthenticationError(msg) => json!({ "error": msg, "code": "unauthorized" }),
            AppError::AuthorizationError(msg) => json!({ "error": msg, "code": "forbidden" }),
            AppError::ValidationError(msg) => json!({ "error": msg, "code": "validation_error" }),
            AppError::NotFoundError(msg) => json!({ "error": msg, "code": "not_found" }),
            AppError::ConflictError(msg) => json!({ "error": msg, "code": "conflict" }),
            AppError::PaymentError { message, code } => json!({ "error": message, "code": code }),
            AppError::GatewayUnavailable(msg) => {
                tracing::error!("Payment gateway unavailable: {}", msg);
                json!({ "error": "Payment service unavailable, please retry shortly", "code": "gateway_unavailable" })
            }
            AppError::PaymentPending { payment_intent_id } => json!({
                "error": RECONCILIATION_MESSAGE,
                "code": "payment_captured_order_pending",
                "reference": payment_intent_id,
            }),
            AppError::TooManyRequests => json!({ "error": "Rate limit exceeded", "code": "rate_limited" }),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                json!({ "error": "Internal Server Error", "code": "internal_error" })
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {:#}", err);
                json!({ "error": "Internal Server Error", "code": "internal_error" })
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(msg) => AppError::ValidationError(msg),
            ServiceError::Conflict(msg) => AppError::ConflictError(msg),
            ServiceError::NotFound(what) => AppError::NotFoundError(format!("{} not found", what)),
            ServiceError::Forbidden(msg) => AppError::AuthorizationError(msg),
            ServiceError::Gateway(GatewayError::Declined { message, .. }) => AppError::PaymentError {
                message,
                code: "payment_declined".to_string(),
            },
            ServiceError::Gateway(GatewayError::UnknownIntent(id)) => AppError::PaymentError {
                message: format!("Unknown payment {}", id),
                code: "payment_intent_unknown".to_string(),
            },
            ServiceError::Gateway(err @ (GatewayError::Unavailable(_) | GatewayError::Protocol(_))) => {
                AppError::GatewayUnavailable(err.to_string())
            }
            // Already logged on the reconciliation target by the orchestrator.
            ServiceError::Reconciliation { payment_intent_id, .. } => AppError::PaymentPending { payment_intent_id },
            ServiceError::Store(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}
