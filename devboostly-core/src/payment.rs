use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use chrono::{DateTime, Utc};

/// Intent lifecycle as reported by the provider. Names follow Stripe's wire format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Succeeded,
    Canceled,
}

impl PaymentStatus {
    /// An intent the customer can still complete. A failed card attempt drops the intent
    /// back to `RequiresPaymentMethod`, so it stays usable with another card.
    pub fn is_outstanding(&self) -> bool {
        !matches!(self, PaymentStatus::Succeeded | PaymentStatus::Canceled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::RequiresPaymentMethod => "requires_payment_method",
            PaymentStatus::RequiresConfirmation => "requires_confirmation",
            PaymentStatus::RequiresAction => "requires_action",
            PaymentStatus::Processing => "processing",
            PaymentStatus::RequiresCapture => "requires_capture",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Canceled => "canceled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String, // Provider's ID (e.g., pi_123)
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub client_secret: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Human-readable reason of the last failed attempt, when the provider gives one.
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PaymentIntent {
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct CreateIntentRequest {
    pub amount: i64,
    pub currency: String,
    /// Replaying a key returns the intent created by the first call instead of a new one.
    pub idempotency_key: String,
    pub description: Option<String>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The provider refused the operation; `message` is meant for the customer.
    #[error("{message}")]
    Declined {
        code: Option<String>,
        message: String,
    },

    #[error("Payment intent not found: {0}")]
    UnknownIntent(String),

    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),

    #[error("Unexpected payment gateway response: {0}")]
    Protocol(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent with the provider
    async fn create_intent(&self, request: CreateIntentRequest) -> Result<PaymentIntent, GatewayError>;

    /// Retrieve intent status
    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError>;

    /// Confirm an intent with a payment method token (server-side confirmation)
    async fn confirm_intent(
        &self,
        intent_id: &str,
        payment_method: &str,
    ) -> Result<PaymentIntent, GatewayError>;

    /// Cancel an intent that will not be completed
    async fn cancel_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError>;
}
