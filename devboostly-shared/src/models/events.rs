use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderCreatedEvent {
    pub order_id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub quote_id: Option<Uuid>,
    pub amount_cents: i64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct PaymentConfirmedEvent {
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub leg: String, // "deposit" | "balance"
    pub amount_cents: i64,
    pub payment_intent_id: String,
    pub fully_paid: bool,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct QuoteAcceptedEvent {
    pub quote_id: Uuid,
    pub order_id: Uuid,
    pub payment_intent_id: String,
    pub timestamp: i64,
}

/// The customer was charged but the local write that should follow did not land.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ReconciliationRequiredEvent {
    pub payment_intent_id: String,
    pub order_id: Option<Uuid>,
    pub quote_id: Option<Uuid>,
    pub amount_cents: i64,
    pub reason: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    OrderCreated(OrderCreatedEvent),
    PaymentConfirmed(PaymentConfirmedEvent),
    QuoteAccepted(QuoteAcceptedEvent),
    ReconciliationRequired(ReconciliationRequiredEvent),
}

impl DomainEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            DomainEvent::OrderCreated(_) => "order.created",
            DomainEvent::PaymentConfirmed(_) => "payment.confirmed",
            DomainEvent::QuoteAccepted(_) => "quote.accepted",
            DomainEvent::ReconciliationRequired(_) => "payment.reconciliation_required",
        }
    }

    /// Partition key: everything about one order lands on the same partition.
    pub fn key(&self) -> String {
        match self {
            DomainEvent::OrderCreated(e) => e.order_id.to_string(),
            DomainEvent::PaymentConfirmed(e) => e.order_id.to_string(),
            DomainEvent::QuoteAccepted(e) => e.order_id.to_string(),
            DomainEvent::ReconciliationRequired(e) => e.payment_intent_id.clone(),
        }
    }
}
