//! Stripe PaymentIntents over the REST API (no SDK dependency).

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use devboostly_core::{CreateIntentRequest, GatewayError, PaymentGateway, PaymentIntent, PaymentStatus};
use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

/// Webhooks signed longer ago than this are refused.
const WEBHOOK_TOLERANCE_SECONDS: i64 = 300;

#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl StripeGateway {
    pub fn new(secret_key: &str, api_base: &str, timeout_seconds: u64) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            secret_key: secret_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.api_base, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<PaymentIntent, GatewayError> {
        let response = request
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        if status.is_success() {
            let intent: StripeIntent = serde_json::from_str(&body)
                .map_err(|e| GatewayError::Protocol(format!("Invalid payment intent body: {}", e)))?;
            return Ok(intent.into());
        }

        Err(map_error(status, &body))
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(&self, request: CreateIntentRequest) -> Result<PaymentIntent, GatewayError> {
        let mut form: Vec<(String, String)> = vec![
            ("amount".to_string(), request.amount.to_string()),
            ("currency".to_string(), request.currency.clone()),
            ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
        ];
        if let Some(description) = &request.description {
            form.push(("description".to_string(), description.clone()));
        }
        for (key, value) in &request.metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }

        let intent = self
            .send(
                self.client
                    .post(self.url("payment_intents"))
                    .header("Idempotency-Key", &request.idempotency_key)
                    .form(&form),
            )
            .await?;

        info!("Stripe intent {} ready for {} {}", intent.id, intent.amount, intent.currency);
        Ok(intent)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        self.send(self.client.get(self.url(&format!("payment_intents/{}", intent_id))))
            .await
    }

    async fn confirm_intent(&self, intent_id: &str, payment_method: &str) -> Result<PaymentIntent, GatewayError> {
        self.send(
            self.client
                .post(self.url(&format!("payment_intents/{}/confirm", intent_id)))
                .form(&[("payment_method", payment_method)]),
        )
        .await
    }

    async fn cancel_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        self.send(self.client.post(self.url(&format!("payment_intents/{}/cancel", intent_id))))
            .await
    }
}

#[derive(Debug, Deserialize)]
struct StripeIntent {
    id: String,
    amount: i64,
    currency: String,
    status: PaymentStatus,
    client_secret: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
    last_payment_error: Option<StripeErrorBody>,
    created: i64,
}

impl From<StripeIntent> for PaymentIntent {
    fn from(intent: StripeIntent) -> Self {
        PaymentIntent {
            id: intent.id,
            amount: intent.amount,
            currency: intent.currency,
            status: intent.status,
            client_secret: intent.client_secret,
            metadata: intent.metadata,
            last_error: intent.last_payment_error.and_then(|e| e.message),
            created_at: unix_time(intent.created),
        }
    }
}

fn unix_time(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0).single().unwrap_or_else(Utc::now)
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<String>,
    decline_code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

fn map_error(status: StatusCode, body: &str) -> GatewayError {
    let error = match serde_json::from_str::<StripeErrorEnvelope>(body) {
        Ok(envelope) => envelope.error,
        Err(_) => {
            return if status.is_server_error() {
                GatewayError::Unavailable(format!("Stripe returned {}", status))
            } else {
                GatewayError::Protocol(format!("Stripe returned {}: {}", status, body))
            };
        }
    };

    if status == StatusCode::NOT_FOUND || error.code.as_deref() == Some("resource_missing") {
        return GatewayError::UnknownIntent(error.message.unwrap_or_default());
    }
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return GatewayError::Unavailable(error.message.unwrap_or_else(|| status.to_string()));
    }

    match error.kind.as_deref() {
        Some("card_error") | Some("invalid_request_error") => GatewayError::Declined {
            code: error.decline_code.or(error.code),
            message: error.message.unwrap_or_else(|| "Payment declined".to_string()),
        },
        other => {
            warn!("Unexpected Stripe error type {:?} ({})", other, status);
            GatewayError::Protocol(error.message.unwrap_or_else(|| status.to_string()))
        }
    }
}

/// Verify a `Stripe-Signature` header (HMAC-SHA256 over `"{t}.{payload}"`).
pub fn verify_webhook_signature(payload: &[u8], sig_header: &str, secret: &str) -> Result<(), &'static str> {
    verify_webhook_signature_at(payload, sig_header, secret, Utc::now().timestamp())
}

fn verify_webhook_signature_at(payload: &[u8], sig_header: &str, secret: &str, now: i64) -> Result<(), &'static str> {
    let mut timestamp = "";
    let mut signatures = Vec::new();
    for part in sig_header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signatures.push(v);
        }
    }

    if timestamp.is_empty() || signatures.is_empty() {
        return Err("Invalid Stripe-Signature header");
    }

    let payload = std::str::from_utf8(payload).map_err(|_| "Webhook payload is not UTF-8")?;
    let signed_payload = format!("{}.{}", timestamp, payload);

    // Stripe sends several v1 entries while a secret is being rolled.
    let matched = signatures.iter().any(|signature| {
        let Ok(sig_bytes) = hex::decode(signature) else {
            return false;
        };
        let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(signed_payload.as_bytes());
        mac.verify_slice(&sig_bytes).is_ok()
    });
    if !matched {
        return Err("Webhook signature mismatch");
    }

    let ts: i64 = timestamp.parse().map_err(|_| "Invalid timestamp")?;
    if (now - ts).abs() > WEBHOOK_TOLERANCE_SECONDS {
        return Err("Webhook timestamp too old");
    }

    Ok(())
}

/// The part of a Stripe event the webhook endpoint cares about.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

impl WebhookEvent {
    /// Intent id for `payment_intent.*` events.
    pub fn payment_intent_id(&self) -> Option<&str> {
        if !self.kind.starts_with("payment_intent.") {
            return None;
        }
        self.data.object.get("id").and_then(|id| id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    fn sign(payload: &str, timestamp: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{}.{}", timestamp, payload).as_bytes());
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_valid_signature() {
        let payload = r#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;
        let header = sign(payload, 1_700_000_000);
        assert!(verify_webhook_signature_at(payload.as_bytes(), &header, SECRET, 1_700_000_060).is_ok());
    }

    #[test]
    fn test_rolled_secret_signatures() {
        let payload = "{}";
        let header = format!("{},v1={}", sign(payload, 1_700_000_000), "00".repeat(32));
        assert!(verify_webhook_signature_at(payload.as_bytes(), &header, SECRET, 1_700_000_000).is_ok());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let header = sign(r#"{"amount":100}"#, 1_700_000_000);
        let result = verify_webhook_signature_at(br#"{"amount":1}"#, &header, SECRET, 1_700_000_000);
        assert_eq!(result, Err("Webhook signature mismatch"));
    }

    #[test]
    fn test_replayed_signature_rejected() {
        let payload = "{}";
        let header = sign(payload, 1_700_000_000);
        let result = verify_webhook_signature_at(payload.as_bytes(), &header, SECRET, 1_700_000_000 + 301);
        assert_eq!(result, Err("Webhook timestamp too old"));
    }

    #[test]
    fn test_malformed_header() {
        assert_eq!(
            verify_webhook_signature_at(b"{}", "v1=abcd", SECRET, 0),
            Err("Invalid Stripe-Signature header")
        );
    }

    #[test]
    fn test_intent_body() {
        let body = r#"{
            "id": "pi_123",
            "object": "payment_intent",
            "amount": 23960,
            "currency": "eur",
            "status": "requires_payment_method",
            "client_secret": "pi_123_secret_abc",
            "metadata": {"order_id": "42", "leg": "deposit"},
            "last_payment_error": {"type": "card_error", "code": "card_declined", "message": "Your card was declined."},
            "created": 1700000000
        }"#;
        let intent: PaymentIntent = serde_json::from_str::<StripeIntent>(body).unwrap().into();

        assert_eq!(intent.amount, 23960);
        assert_eq!(intent.status, PaymentStatus::RequiresPaymentMethod);
        assert_eq!(intent.metadata_value("leg"), Some("deposit"));
        assert_eq!(intent.last_error.as_deref(), Some("Your card was declined."));
        assert_eq!(intent.created_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_error_mapping() {
        let declined = r#"{"error":{"type":"card_error","code":"card_declined","decline_code":"insufficient_funds","message":"Your card has insufficient funds."}}"#;
        assert_eq!(
            map_error(StatusCode::PAYMENT_REQUIRED, declined),
            GatewayError::Declined {
                code: Some("insufficient_funds".to_string()),
                message: "Your card has insufficient funds.".to_string(),
            }
        );

        let missing = r#"{"error":{"type":"invalid_request_error","code":"resource_missing","message":"No such payment_intent: 'pi_x'"}}"#;
        assert!(matches!(map_error(StatusCode::NOT_FOUND, missing), GatewayError::UnknownIntent(_)));

        assert!(matches!(
            map_error(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>"),
            GatewayError::Unavailable(_)
        ));
        assert!(matches!(
            map_error(StatusCode::UNAUTHORIZED, r#"{"error":{"type":"authentication_error","message":"Invalid API Key"}}"#),
            GatewayError::Protocol(_)
        ));
    }

    #[test]
    fn test_webhook_event_intent_id() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{"id":"evt_1","type":"payment_intent.succeeded","data":{"object":{"id":"pi_123","amount":100}}}"#,
        )
        .unwrap();
        assert_eq!(event.payment_intent_id(), Some("pi_123"));

        let other: WebhookEvent = serde_json::from_str(
            r#"{"id":"evt_2","type":"customer.created","data":{"object":{"id":"cus_1"}}}"#,
        )
        .unwrap();
        assert_eq!(other.payment_intent_id(), None);
    }
}
