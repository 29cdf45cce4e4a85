use crate::payment::{CreateIntentRequest, GatewayError, PaymentGateway, PaymentIntent, PaymentStatus};
use async_trait::async_trait;
use devboostly_shared::money::MIN_CHARGE_CENTS;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Payment method token that always succeeds.
pub const CARD_OK: &str = "pm_card_visa";
/// Payment method token that is always declined.
pub const CARD_DECLINED: &str = "pm_card_chargeDeclined";

#[derive(Default)]
struct MockState {
    intents: HashMap<String, PaymentIntent>,
    idempotency: HashMap<String, String>,
    fail_next_create: Option<GatewayError>,
    created: usize,
}

/// In-process gateway used in development (`payment.provider = "mock"`) and tests.
///
/// Honors idempotency keys like the real provider and understands the
/// `pm_card_visa` / `pm_card_chargeDeclined` test tokens.
#[derive(Default)]
pub struct MockGateway {
    state: Mutex<MockState>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `create_intent` call fails with `error`.
    pub async fn fail_next_create(&self, error: GatewayError) {
        self.state.lock().await.fail_next_create = Some(error);
    }

    /// Number of distinct intents minted so far.
    pub async fn created_count(&self) -> usize {
        self.state.lock().await.created
    }

    /// Force an intent into a given status, e.g. to simulate a webhook-only success.
    pub async fn set_status(&self, intent_id: &str, status: PaymentStatus) -> Result<(), GatewayError> {
        let mut state = self.state.lock().await;
        let intent = state.intents.get_mut(intent_id)
            .ok_or_else(|| GatewayError::UnknownIntent(intent_id.to_string()))?;
        intent.status = status;
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_intent(&self, request: CreateIntentRequest) -> Result<PaymentIntent, GatewayError> {
        let mut state = self.state.lock().await;

        if let Some(error) = state.fail_next_create.take() {
            return Err(error);
        }
        if request.amount < MIN_CHARGE_CENTS {
            return Err(GatewayError::Declined {
                code: Some("amount_too_small".to_string()),
                message: format!("Amount must be at least {} cents", MIN_CHARGE_CENTS),
            });
        }

        if let Some(existing) = state.idempotency.get(&request.idempotency_key) {
            if let Some(intent) = state.intents.get(existing) {
                return Ok(intent.clone());
            }
        }

        let id = format!("pi_mock_{}", Uuid::new_v4().simple());
        let intent = PaymentIntent {
            id: id.clone(),
            amount: request.amount,
            currency: request.currency,
            status: PaymentStatus::RequiresPaymentMethod,
            client_secret: Some(format!("{}_secret_{}", id, Uuid::new_v4().simple())),
            metadata: request.metadata,
            last_error: None,
            created_at: chrono::Utc::now(),
        };

        state.idempotency.insert(request.idempotency_key, id.clone());
        state.intents.insert(id, intent.clone());
        state.created += 1;
        Ok(intent)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        let state = self.state.lock().await;
        state.intents.get(intent_id)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownIntent(intent_id.to_string()))
    }

    async fn confirm_intent(
        &self,
        intent_id: &str,
        payment_method: &str,
    ) -> Result<PaymentIntent, GatewayError> {
        let mut state = self.state.lock().await;
        let intent = state.intents.get_mut(intent_id)
            .ok_or_else(|| GatewayError::UnknownIntent(intent_id.to_string()))?;

        match intent.status {
            PaymentStatus::Succeeded => return Ok(intent.clone()),
            PaymentStatus::Canceled => {
                return Err(GatewayError::Declined {
                    code: Some("payment_intent_unexpected_state".to_string()),
                    message: "This payment has been canceled".to_string(),
                });
            }
            _ => {}
        }

        if payment_method == CARD_DECLINED {
            intent.status = PaymentStatus::RequiresPaymentMethod;
            intent.last_error = Some("Your card was declined.".to_string());
            tracing::info!("Mock payment DECLINED for intent {}", intent_id);
            return Err(GatewayError::Declined {
                code: Some("card_declined".to_string()),
                message: "Your card was declined.".to_string(),
            });
        }

        intent.status = PaymentStatus::Succeeded;
        intent.last_error = None;
        tracing::info!("Mock payment SUCCEEDED for intent {}", intent_id);
        Ok(intent.clone())
    }

    async fn cancel_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        let mut state = self.state.lock().await;
        let intent = state.intents.get_mut(intent_id)
            .ok_or_else(|| GatewayError::UnknownIntent(intent_id.to_string()))?;

        if intent.status == PaymentStatus::Succeeded {
            return Err(GatewayError::Declined {
                code: Some("payment_intent_unexpected_state".to_string()),
                message: "A succeeded payment cannot be canceled".to_string(),
            });
        }
        intent.status = PaymentStatus::Canceled;
        Ok(intent.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(key: &str, amount: i64) -> CreateIntentRequest {
        CreateIntentRequest {
            amount,
            currency: "eur".to_string(),
            idempotency_key: key.to_string(),
            description: None,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_idempotency_key_returns_same_intent() {
        let gateway = MockGateway::new();
        let first = gateway.create_intent(request("order-1-deposit", 23960)).await.unwrap();
        let second = gateway.create_intent(request("order-1-deposit", 23960)).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.client_secret, second.client_secret);
        assert_eq!(gateway.created_count().await, 1);
    }

    #[tokio::test]
    async fn test_declined_card_keeps_intent_usable() {
        let gateway = MockGateway::new();
        let intent = gateway.create_intent(request("k", 1000)).await.unwrap();

        let err = gateway.confirm_intent(&intent.id, CARD_DECLINED).await.unwrap_err();
        assert_eq!(err.to_string(), "Your card was declined.");
        let after = gateway.retrieve_intent(&intent.id).await.unwrap();
        assert!(after.status.is_outstanding());

        let ok = gateway.confirm_intent(&intent.id, CARD_OK).await.unwrap();
        assert_eq!(ok.status, PaymentStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_injected_failure_only_hits_once() {
        let gateway = MockGateway::new();
        gateway.fail_next_create(GatewayError::Unavailable("boom".into())).await;

        assert!(gateway.create_intent(request("a", 100)).await.is_err());
        assert!(gateway.create_intent(request("a", 100)).await.is_ok());
    }

    #[tokio::test]
    async fn test_amount_below_minimum_is_declined() {
        let gateway = MockGateway::new();
        let err = gateway.create_intent(request("k", MIN_CHARGE_CENTS - 1)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Declined { code: Some(ref c), .. } if c == "amount_too_small"));
        assert!(gateway.create_intent(request("k", MIN_CHARGE_CENTS)).await.is_ok());
    }

    #[tokio::test]
    async fn test_succeeded_intent_cannot_be_canceled() {
        let gateway = MockGateway::new();
        let intent = gateway.create_intent(request("k", 100)).await.unwrap();
        gateway.confirm_intent(&intent.id, CARD_OK).await.unwrap();

        assert!(gateway.cancel_intent(&intent.id).await.is_err());
    }
}
