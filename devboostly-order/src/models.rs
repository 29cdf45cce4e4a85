use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use devboostly_catalog::{PaymentPlan, PricingError, ProductType};
use devboostly_shared::Masked;

/// Order status in the project lifecycle (driven by payments and staff)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(OrderStatus::Pending),
            "paid" => Some(OrderStatus::Paid),
            "processing" => Some(OrderStatus::Processing),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

/// How much of the order has been collected
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum OrderPaymentStatus {
    Unpaid,
    DepositPaid,
    Paid,
}

impl OrderPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderPaymentStatus::Unpaid => "unpaid",
            OrderPaymentStatus::DepositPaid => "deposit_paid",
            OrderPaymentStatus::Paid => "paid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unpaid" => Some(OrderPaymentStatus::Unpaid),
            "deposit_paid" => Some(OrderPaymentStatus::DepositPaid),
            "paid" => Some(OrderPaymentStatus::Paid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LegKind {
    Deposit,
    Balance,
}

impl LegKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegKind::Deposit => "deposit",
            LegKind::Balance => "balance",
        }
    }
}

/// Where an order sits in the payment state machine. Derived from the stored fields,
/// never persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentPhase {
    Created,
    DepositPending,
    DepositPaid,
    BalanceEligible,
    BalancePending,
    FullyPaid,
    Cancelled,
}

/// One collectable part of the total
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLeg {
    pub amount: i64,
    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_intent_id: Option<String>,
}

impl PaymentLeg {
    pub fn new(amount: i64) -> Self {
        Self {
            amount,
            paid: false,
            paid_at: None,
            payment_intent_id: None,
        }
    }

    /// An intent has been opened for this leg and not settled yet.
    pub fn is_pending(&self) -> bool {
        !self.paid && self.payment_intent_id.is_some()
    }
}

/// Snapshot of what was bought, frozen at order time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub item_id: String,
    pub item_type: ProductType,
    pub name: String,
    pub price: i64,
    /// Name and price came from the client, not from the catalog.
    #[serde(default)]
    pub ephemeral: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetails {
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub description: String,
    pub deadline: Option<String>,
    pub existing_website: Option<String>,
    pub notes: Option<String>,
}

impl ProjectDetails {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.project_name.trim().is_empty() {
            missing.push("projectDetails.projectName");
        }
        if self.description.trim().is_empty() {
            missing.push("projectDetails.description");
        }
        missing
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BillingInfo {
    #[serde(default)]
    pub full_name: String,
    pub email: Masked<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub vat_number: Option<String>,
}

impl BillingInfo {
    /// Fields a checkout must provide. Quote orders inherit a contact-only snapshot.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        fn blank(value: &Option<String>) -> bool {
            value.as_deref().map(str::trim).unwrap_or("").is_empty()
        }

        let mut missing = Vec::new();
        if self.full_name.trim().is_empty() {
            missing.push("billingInfo.fullName");
        }
        if !self.email.expose().contains('@') {
            missing.push("billingInfo.email");
        }
        if blank(&self.address) {
            missing.push("billingInfo.address");
        }
        if blank(&self.city) {
            missing.push("billingInfo.city");
        }
        if blank(&self.postal_code) {
            missing.push("billingInfo.postalCode");
        }
        if blank(&self.country) {
            missing.push("billingInfo.country");
        }
        missing
    }
}

/// Everything needed to build a fresh order
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub number: String,
    pub customer_id: Uuid,
    pub quote_id: Option<Uuid>,
    pub item: OrderItem,
    pub currency: String,
    pub deposit_percent: u8,
    pub project_details: ProjectDetails,
    pub billing_info: BillingInfo,
}

/// A customer's purchase and its two payment legs. Serializes with its computed `phase`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub number: String,
    pub customer_id: Uuid,
    pub quote_id: Option<Uuid>,
    pub item: OrderItem,
    pub amount: i64,
    pub currency: String,
    pub deposit: PaymentLeg,
    pub balance: PaymentLeg,
    pub payment_status: OrderPaymentStatus,
    pub status: OrderStatus,
    pub project_details: ProjectDetails,
    pub billing_info: BillingInfo,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of applying a confirmed payment to a leg
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegUpdate {
    Applied,
    /// The same intent was already recorded; nothing changed.
    AlreadyApplied,
}

impl Serialize for Order {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Order", 17)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("number", &self.number)?;
        state.serialize_field("customerId", &self.customer_id)?;
        state.serialize_field("quoteId", &self.quote_id)?;
        state.serialize_field("item", &self.item)?;
        state.serialize_field("amount", &self.amount)?;
        state.serialize_field("currency", &self.currency)?;
        state.serialize_field("deposit", &self.deposit)?;
        state.serialize_field("balance", &self.balance)?;
        state.serialize_field("paymentStatus", &self.payment_status)?;
        state.serialize_field("status", &self.status)?;
        state.serialize_field("phase", &self.phase())?;
        state.serialize_field("projectDetails", &self.project_details)?;
        state.serialize_field("billingInfo", &self.billing_info)?;
        state.serialize_field("version", &self.version)?;
        state.serialize_field("createdAt", &self.created_at)?;
        state.serialize_field("updatedAt", &self.updated_at)?;
        state.end()
    }
}

impl Order {
    pub fn new(new: NewOrder) -> Result<Self, PricingError> {
        let now = Utc::now();
        let amount = new.item.price;
        let split = new.item.item_type.payment_plan().split(amount, new.deposit_percent)?;

        Ok(Self {
            id: Uuid::new_v4(),
            number: new.number,
            customer_id: new.customer_id,
            quote_id: new.quote_id,
            item: new.item,
            amount,
            currency: new.currency,
            deposit: PaymentLeg::new(split.deposit_cents),
            balance: PaymentLeg::new(split.balance_cents),
            payment_status: OrderPaymentStatus::Unpaid,
            status: OrderStatus::Pending,
            project_details: new.project_details,
            billing_info: new.billing_info,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn plan(&self) -> PaymentPlan {
        self.item.item_type.payment_plan()
    }

    pub fn has_balance_leg(&self) -> bool {
        self.plan() == PaymentPlan::Split && self.balance.amount > 0
    }

    pub fn leg(&self, kind: LegKind) -> &PaymentLeg {
        match kind {
            LegKind::Deposit => &self.deposit,
            LegKind::Balance => &self.balance,
        }
    }

    fn leg_mut(&mut self, kind: LegKind) -> &mut PaymentLeg {
        match kind {
            LegKind::Deposit => &mut self.deposit,
            LegKind::Balance => &mut self.balance,
        }
    }

    /// Which leg, if any, was (or is being) paid with this intent
    pub fn leg_for_intent(&self, intent_id: &str) -> Option<LegKind> {
        if self.deposit.payment_intent_id.as_deref() == Some(intent_id) {
            Some(LegKind::Deposit)
        } else if self.balance.payment_intent_id.as_deref() == Some(intent_id) {
            Some(LegKind::Balance)
        } else {
            None
        }
    }

    pub fn phase(&self) -> PaymentPhase {
        if self.status == OrderStatus::Cancelled {
            return PaymentPhase::Cancelled;
        }
        if !self.deposit.paid {
            return if self.deposit.is_pending() {
                PaymentPhase::DepositPending
            } else {
                PaymentPhase::Created
            };
        }
        if !self.has_balance_leg() || self.balance.paid {
            return PaymentPhase::FullyPaid;
        }
        if self.status == OrderStatus::Completed {
            return if self.balance.is_pending() {
                PaymentPhase::BalancePending
            } else {
                PaymentPhase::BalanceEligible
            };
        }
        PaymentPhase::DepositPaid
    }

    pub fn check_deposit_payable(&self) -> Result<(), TransitionError> {
        if self.status == OrderStatus::Cancelled {
            return Err(TransitionError::NotPayable("Order is cancelled".to_string()));
        }
        if self.deposit.paid || self.payment_status != OrderPaymentStatus::Unpaid {
            return Err(TransitionError::AlreadyPaid(LegKind::Deposit));
        }
        Ok(())
    }

    pub fn check_balance_payable(&self) -> Result<(), TransitionError> {
        if !self.has_balance_leg() {
            return Err(TransitionError::NotPayable("Order has no balance to pay".to_string()));
        }
        if self.balance.paid {
            return Err(TransitionError::AlreadyPaid(LegKind::Balance));
        }
        if !self.deposit.paid {
            return Err(TransitionError::NotPayable("Deposit has not been paid".to_string()));
        }
        if self.status != OrderStatus::Completed {
            return Err(TransitionError::NotPayable(format!(
                "Balance can only be paid once the project is completed (status: {})",
                self.status.as_str()
            )));
        }
        Ok(())
    }

    pub fn check_payable(&self, kind: LegKind) -> Result<(), TransitionError> {
        match kind {
            LegKind::Deposit => self.check_deposit_payable(),
            LegKind::Balance => self.check_balance_payable(),
        }
    }

    /// Associate a gateway intent with a leg (replacing a dead one).
    pub fn attach_intent(&mut self, kind: LegKind, intent_id: String) {
        self.leg_mut(kind).payment_intent_id = Some(intent_id);
        self.updated_at = Utc::now();
    }

    /// Record a gateway-confirmed payment on a leg.
    ///
    /// Recording the same intent twice is a no-op; any other intent is rejected.
    pub fn record_leg_paid(
        &mut self,
        kind: LegKind,
        intent_id: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<LegUpdate, TransitionError> {
        let leg = self.leg(kind);
        if leg.payment_intent_id.as_deref() != Some(intent_id) {
            return Err(TransitionError::IntentMismatch {
                leg: kind,
                expected: leg.payment_intent_id.clone(),
                got: intent_id.to_string(),
            });
        }
        if leg.paid {
            return Ok(LegUpdate::AlreadyApplied);
        }
        self.check_payable(kind)?;

        let full_plan = !self.has_balance_leg();
        let leg = self.leg_mut(kind);
        leg.paid = true;
        leg.paid_at = Some(paid_at);

        match kind {
            LegKind::Deposit => {
                self.payment_status = if full_plan {
                    OrderPaymentStatus::Paid
                } else {
                    OrderPaymentStatus::DepositPaid
                };
                if self.status == OrderStatus::Pending {
                    self.status = OrderStatus::Paid;
                }
            }
            LegKind::Balance => {
                self.payment_status = OrderPaymentStatus::Paid;
            }
        }
        self.updated_at = Utc::now();
        Ok(LegUpdate::Applied)
    }

    /// Cancel before any money was collected. Returns false if already cancelled.
    pub fn cancel(&mut self) -> Result<bool, TransitionError> {
        if self.status == OrderStatus::Cancelled {
            return Ok(false);
        }
        if self.deposit.paid {
            return Err(TransitionError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: "cancelled".to_string(),
            });
        }
        self.status = OrderStatus::Cancelled;
        self.updated_at = Utc::now();
        Ok(true)
    }
}

/// Illegal state changes on orders, quotes and tickets
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: String,
        to: String,
    },

    #[error("The {} has already been paid", .0.as_str())]
    AlreadyPaid(LegKind),

    #[error("{0}")]
    NotPayable(String),

    #[error("Payment {got} does not belong to this order's {}", .leg.as_str())]
    IntentMismatch {
        leg: LegKind,
        expected: Option<String>,
        got: String,
    },

    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceKind {
    Deposit,
    Balance,
    /// Packs: the whole amount in one go.
    Full,
}

impl InvoiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceKind::Deposit => "deposit",
            InvoiceKind::Balance => "balance",
            InvoiceKind::Full => "full",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "deposit" => Some(InvoiceKind::Deposit),
            "balance" => Some(InvoiceKind::Balance),
            "full" => Some(InvoiceKind::Full),
            _ => None,
        }
    }

    pub fn for_leg(order: &Order, leg: LegKind) -> Self {
        match leg {
            LegKind::Deposit if !order.has_balance_leg() => InvoiceKind::Full,
            LegKind::Deposit => InvoiceKind::Deposit,
            LegKind::Balance => InvoiceKind::Balance,
        }
    }
}

/// Billing document for one paid leg. Read-only for clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: Uuid,
    pub number: String,
    pub order_id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub kind: InvoiceKind,
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub payment_intent_id: Option<String>,
    pub issued_at: DateTime<Utc>,
}

impl Invoice {
    pub fn for_leg(order: &Order, leg: LegKind, number: String) -> Self {
        let kind = InvoiceKind::for_leg(order, leg);
        let label = match kind {
            InvoiceKind::Deposit => "Deposit",
            InvoiceKind::Balance => "Balance",
            InvoiceKind::Full => "Payment",
        };
        let paid = order.leg(leg);
        Self {
            id: Uuid::new_v4(),
            number,
            order_id: order.id,
            order_number: order.number.clone(),
            customer_id: order.customer_id,
            kind,
            amount: paid.amount,
            currency: order.currency.clone(),
            description: format!("{} - {} (order {})", label, order.item.name, order.number),
            payment_intent_id: paid.payment_intent_id.clone(),
            issued_at: paid.paid_at.unwrap_or_else(Utc::now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_for(item_type: ProductType, price: i64) -> Order {
        Order::new(NewOrder {
            number: "ORD-2026-0001".to_string(),
            customer_id: Uuid::new_v4(),
            quote_id: None,
            item: OrderItem {
                item_id: "site-vitrine".to_string(),
                item_type,
                name: "Site vitrine".to_string(),
                price,
                ephemeral: false,
            },
            currency: "eur".to_string(),
            deposit_percent: 40,
            project_details: ProjectDetails {
                project_name: "Bakery".to_string(),
                description: "Showcase site".to_string(),
                ..Default::default()
            },
            billing_info: BillingInfo {
                full_name: "Jeanne Martin".to_string(),
                email: Masked::new("jeanne@example.com".to_string()),
                company: None,
                address: Some("1 rue de la Paix".to_string()),
                city: Some("Paris".to_string()),
                postal_code: Some("75002".to_string()),
                country: Some("FR".to_string()),
                vat_number: None,
            },
        })
        .unwrap()
    }

    #[test]
    fn test_offer_split() {
        let order = order_for(ProductType::Offer, 59900);
        assert_eq!(order.deposit.amount, 23960);
        assert_eq!(order.balance.amount, 35940);
        assert_eq!(order.deposit.amount + order.balance.amount, order.amount);
        assert_eq!(order.phase(), PaymentPhase::Created);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, OrderPaymentStatus::Unpaid);
    }

    #[test]
    fn test_pack_deposit_settles_everything() {
        let mut order = order_for(ProductType::Pack, 12900);
        assert_eq!(order.deposit.amount, 12900);
        assert_eq!(order.balance.amount, 0);

        order.attach_intent(LegKind::Deposit, "pi_1".into());
        assert_eq!(order.phase(), PaymentPhase::DepositPending);
        assert_eq!(order.record_leg_paid(LegKind::Deposit, "pi_1", Utc::now()), Ok(LegUpdate::Applied));

        assert_eq!(order.payment_status, OrderPaymentStatus::Paid);
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.phase(), PaymentPhase::FullyPaid);
        assert!(order.check_balance_payable().is_err());
    }

    #[test]
    fn test_full_split_lifecycle() {
        let mut order = order_for(ProductType::Offer, 59900);
        order.attach_intent(LegKind::Deposit, "pi_dep".into());
        order.record_leg_paid(LegKind::Deposit, "pi_dep", Utc::now()).unwrap();
        assert_eq!(order.payment_status, OrderPaymentStatus::DepositPaid);
        assert_eq!(order.phase(), PaymentPhase::DepositPaid);

        // deliverable not complete yet
        order.status = OrderStatus::Processing;
        assert!(matches!(order.check_balance_payable(), Err(TransitionError::NotPayable(_))));

        order.status = OrderStatus::Completed;
        assert_eq!(order.phase(), PaymentPhase::BalanceEligible);
        order.attach_intent(LegKind::Balance, "pi_bal".into());
        assert_eq!(order.phase(), PaymentPhase::BalancePending);
        order.record_leg_paid(LegKind::Balance, "pi_bal", Utc::now()).unwrap();

        assert_eq!(order.payment_status, OrderPaymentStatus::Paid);
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.phase(), PaymentPhase::FullyPaid);
    }

    #[test]
    fn test_record_is_idempotent_and_rejects_foreign_intents() {
        let mut order = order_for(ProductType::Offer, 59900);
        order.attach_intent(LegKind::Deposit, "pi_dep".into());

        let before = order.clone();
        let err = order.record_leg_paid(LegKind::Deposit, "pi_other", Utc::now()).unwrap_err();
        assert!(matches!(err, TransitionError::IntentMismatch { .. }));
        assert_eq!(order, before);

        let paid_at = Utc::now();
        order.record_leg_paid(LegKind::Deposit, "pi_dep", paid_at).unwrap();
        let once = order.clone();
        assert_eq!(order.record_leg_paid(LegKind::Deposit, "pi_dep", Utc::now()), Ok(LegUpdate::AlreadyApplied));
        assert_eq!(order, once);
        assert_eq!(order.deposit.paid_at, Some(paid_at));
    }

    #[test]
    fn test_balance_before_deposit_is_rejected() {
        let mut order = order_for(ProductType::Offer, 59900);
        order.status = OrderStatus::Completed;
        order.attach_intent(LegKind::Balance, "pi_bal".into());
        let err = order.record_leg_paid(LegKind::Balance, "pi_bal", Utc::now()).unwrap_err();
        assert_eq!(err, TransitionError::NotPayable("Deposit has not been paid".to_string()));
        assert!(!order.balance.paid);
    }

    #[test]
    fn test_cancel_only_before_payment() {
        let mut order = order_for(ProductType::Offer, 59900);
        assert_eq!(order.cancel(), Ok(true));
        assert_eq!(order.cancel(), Ok(false));
        assert_eq!(order.phase(), PaymentPhase::Cancelled);
        assert!(order.check_deposit_payable().is_err());

        let mut paid = order_for(ProductType::Offer, 59900);
        paid.attach_intent(LegKind::Deposit, "pi".into());
        paid.record_leg_paid(LegKind::Deposit, "pi", Utc::now()).unwrap();
        assert!(paid.cancel().is_err());
    }

    #[test]
    fn test_validation_lists_missing_fields() {
        let mut order = order_for(ProductType::Offer, 100);
        order.project_details.description = "  ".into();
        order.billing_info.city = None;
        order.billing_info.email = Masked::new("nope".into());

        assert_eq!(order.project_details.missing_fields(), vec!["projectDetails.description"]);
        assert_eq!(order.billing_info.missing_fields(), vec!["billingInfo.email", "billingInfo.city"]);
    }

    #[test]
    fn test_invoice_kind_follows_plan() {
        let mut pack = order_for(ProductType::Pack, 12900);
        pack.attach_intent(LegKind::Deposit, "pi".into());
        pack.record_leg_paid(LegKind::Deposit, "pi", Utc::now()).unwrap();
        let invoice = Invoice::for_leg(&pack, LegKind::Deposit, "INV-2026-0001".into());
        assert_eq!(invoice.kind, InvoiceKind::Full);
        assert_eq!(invoice.amount, 12900);
        assert_eq!(invoice.payment_intent_id.as_deref(), Some("pi"));

        let offer = order_for(ProductType::Offer, 59900);
        assert_eq!(InvoiceKind::for_leg(&offer, LegKind::Deposit), InvoiceKind::Deposit);
        assert_eq!(InvoiceKind::for_leg(&offer, LegKind::Balance), InvoiceKind::Balance);
    }

    #[test]
    fn test_json_shape() {
        let order = order_for(ProductType::Offer, 59900);
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["paymentStatus"], "unpaid");
        assert_eq!(json["deposit"]["amount"], 23960);
        assert_eq!(json["deposit"]["paid"], false);
        assert_eq!(json["item"]["itemType"], "offer");
        assert_eq!(json["billingInfo"]["email"], "jeanne@example.com");
        assert_eq!(json["phase"], "CREATED");

        let back: Order = serde_json::from_value(json).unwrap();
        assert_eq!(back, order);
    }

    #[test]
    fn test_unchargeable_totals_are_refused() {
        let new = |price: i64| {
            let mut order = order_for(ProductType::Offer, 59900);
            order.item.price = price;
            NewOrder {
                number: order.number,
                customer_id: order.customer_id,
                quote_id: None,
                item: order.item,
                currency: order.currency,
                deposit_percent: 40,
                project_details: order.project_details,
                billing_info: order.billing_info,
            }
        };
        assert_eq!(Order::new(new(1)).unwrap_err(), PricingError::BelowMinimumCharge { leg: "deposit", cents: 0 });
        assert_eq!(Order::new(new(i64::MAX / 20)).unwrap_err(), PricingError::OutOfRange(i64::MAX / 20));
    }
}
