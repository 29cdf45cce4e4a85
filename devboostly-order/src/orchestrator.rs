use crate::account::Session;
use crate::error::{ServiceError, ServiceResult};
use crate::manager::{OrderManager, MAX_WRITE_ATTEMPTS};
use crate::models::{
    BillingInfo, Invoice, InvoiceKind, LegKind, LegUpdate, NewOrder, Order, OrderItem, OrderPaymentStatus,
    OrderStatus, ProjectDetails, TransitionError,
};
use crate::numbering::{format_number, SequenceKind};
use crate::quote::{Quote, QuoteReview, QuoteStatus};
use crate::repository::Store;
use chrono::{Datelike, Utc};
use devboostly_catalog::{Catalog, CatalogError, PaymentPlan, ProductType, DEFAULT_DEPOSIT_PERCENT};
use devboostly_core::{
    CreateIntentRequest, EventPublisher, GatewayError, PaymentGateway, PaymentIntent, PaymentStatus,
};
use devboostly_shared::models::events::{
    OrderCreatedEvent, PaymentConfirmedEvent, QuoteAcceptedEvent, ReconciliationRequiredEvent,
};
use devboostly_shared::models::DomainEvent;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Tracing target watched by the on-call alerting.
pub const RECONCILIATION_TARGET: &str = "devboostly::reconciliation";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub currency: String,
    pub deposit_percent: u8,
    pub allow_ephemeral_items: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            currency: "eur".to_string(),
            deposit_percent: DEFAULT_DEPOSIT_PERCENT,
            allow_ephemeral_items: true,
        }
    }
}

/// Checkout form
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub item_id: String,
    pub item_type: ProductType,
    pub item_name: Option<String>,
    pub item_price: Option<i64>,
    #[serde(default)]
    pub project_details: ProjectDetails,
    pub billing_info: BillingInfo,
}

/// What the browser needs to collect a card payment
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSession {
    pub client_secret: String,
    pub payment_intent_id: String,
    pub amount: i64,
    pub currency: String,
}

impl PaymentSession {
    fn from_intent(intent: PaymentIntent) -> ServiceResult<Self> {
        let client_secret = intent.client_secret.ok_or_else(|| {
            GatewayError::Protocol(format!("Payment intent {} has no client secret", intent.id))
        })?;
        Ok(Self {
            client_secret,
            payment_intent_id: intent.id,
            amount: intent.amount,
            currency: intent.currency,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuoteAcceptance {
    pub quote: Quote,
    pub order: Order,
}

/// What a gateway notification led to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Not succeeded, or unknown to the gateway.
    Ignored,
    OrderLegPaid { order_id: Uuid, leg: LegKind },
    QuoteAccepted { quote_id: Uuid, order_id: Uuid },
    /// Succeeded but owned by nothing we know; flagged for a human.
    Unmatched,
}

/// Customer-facing confirmation text for a paid leg.
pub fn payment_message(order: &Order, leg: LegKind) -> &'static str {
    match leg {
        LegKind::Deposit if !order.has_balance_leg() => "Payment received, your order is fully paid",
        LegKind::Deposit => "Deposit received, we are starting on your project",
        LegKind::Balance => "Balance received, your order is fully paid",
    }
}

/// Owns the order payment lifecycle: checkout, deposit and balance legs, quote acceptance
/// and gateway reconciliation.
pub struct PaymentOrchestrator {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    events: Arc<dyn EventPublisher>,
    catalog: Arc<Catalog>,
    manager: OrderManager,
    config: OrchestratorConfig,
}

impl PaymentOrchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        events: Arc<dyn EventPublisher>,
        catalog: Arc<Catalog>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            manager: OrderManager::new(store.clone()),
            store,
            gateway,
            events,
            catalog,
            config,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    // ---------------------------------------------------------------- checkout

    #[tracing::instrument(skip(self, session, request), fields(user_id = %session.user_id, item_id = %request.item_id))]
    pub async fn create_order(&self, session: &Session, request: CheckoutRequest) -> ServiceResult<Order> {
        let item = self.resolve_item(&request)?;
        item.item_type.payment_plan().split(item.price, self.config.deposit_percent)?;

        let mut missing = request.project_details.missing_fields();
        missing.extend(request.billing_info.missing_fields());
        if !missing.is_empty() {
            return Err(ServiceError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let number = self.next_number(SequenceKind::Order).await?;
        let order = Order::new(NewOrder {
            number,
            customer_id: session.user_id,
            quote_id: None,
            item,
            currency: self.config.currency.clone(),
            deposit_percent: self.config.deposit_percent,
            project_details: request.project_details,
            billing_info: request.billing_info,
        })?;
        self.store.insert_order(&order).await?;

        tracing::info!(
            "Order {} created for {} ({} cents, deposit {})",
            order.number, order.item.item_id, order.amount, order.deposit.amount
        );
        self.publish(order_created(&order)).await;
        Ok(order)
    }

    fn resolve_item(&self, request: &CheckoutRequest) -> ServiceResult<OrderItem> {
        if request.item_type == ProductType::Quote {
            return Err(ServiceError::Validation(
                "Quote orders are created by accepting the quote".to_string(),
            ));
        }

        match self.catalog.resolve(&request.item_id, request.item_type) {
            Ok(product) => Ok(OrderItem {
                item_id: product.id.clone(),
                item_type: product.product_type,
                name: product.name.clone(),
                price: product.price_cents,
                ephemeral: false,
            }),
            Err(CatalogError::NotFound(_)) if self.config.allow_ephemeral_items => {
                let name = request.item_name.as_deref().map(str::trim).unwrap_or("");
                let price = request.item_price.unwrap_or(0);
                if name.is_empty() || price <= 0 {
                    return Err(ServiceError::Validation(format!(
                        "Unknown item {}: itemName and a positive itemPrice are required",
                        request.item_id
                    )));
                }
                tracing::warn!(
                    "Accepting ephemeral item {} ({} cents) not present in the catalog",
                    request.item_id, price
                );
                Ok(OrderItem {
                    item_id: request.item_id.clone(),
                    item_type: request.item_type,
                    name: name.to_string(),
                    price,
                    ephemeral: true,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    // ---------------------------------------------------------------- order legs

    pub async fn init_deposit_payment(&self, session: &Session, order_id: Uuid) -> ServiceResult<PaymentSession> {
        self.init_leg_payment(session, order_id, LegKind::Deposit).await
    }

    pub async fn init_balance_payment(&self, session: &Session, order_id: Uuid) -> ServiceResult<PaymentSession> {
        self.init_leg_payment(session, order_id, LegKind::Balance).await
    }

    pub async fn confirm_deposit_payment(
        &self,
        session: &Session,
        order_id: Uuid,
        payment_intent_id: &str,
    ) -> ServiceResult<Order> {
        self.owned_order(session, order_id).await?;
        self.confirm_leg(order_id, LegKind::Deposit, payment_intent_id).await
    }

    pub async fn confirm_balance_payment(
        &self,
        session: &Session,
        order_id: Uuid,
        payment_intent_id: &str,
    ) -> ServiceResult<Order> {
        self.owned_order(session, order_id).await?;
        self.confirm_leg(order_id, LegKind::Balance, payment_intent_id).await
    }

    /// Open (or reuse) the gateway intent for one leg of an order.
    #[tracing::instrument(skip(self, session), fields(leg = kind.as_str()))]
    async fn init_leg_payment(&self, session: &Session, order_id: Uuid, kind: LegKind) -> ServiceResult<PaymentSession> {
        let mut order = self.owned_order(session, order_id).await?;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            order.check_payable(kind)?;
            let leg = order.leg(kind).clone();

            if let Some(existing) = &leg.payment_intent_id {
                if let Some(intent) = self.reusable_intent(existing, leg.amount).await? {
                    tracing::debug!("Reusing outstanding intent {} for order {}", intent.id, order.number);
                    return PaymentSession::from_intent(intent);
                }
            }

            let scope = format!("order-{}-{}", order.id, kind.as_str());
            let intent = self.gateway.create_intent(CreateIntentRequest {
                amount: leg.amount,
                currency: order.currency.clone(),
                idempotency_key: idempotency_key(&scope, leg.amount, leg.payment_intent_id.as_deref()),
                description: Some(format!("{} - {} ({})", leg_label(&order, kind), order.item.name, order.number)),
                metadata: HashMap::from([
                    ("order_id".to_string(), order.id.to_string()),
                    ("order_number".to_string(), order.number.clone()),
                    ("customer_id".to_string(), order.customer_id.to_string()),
                    ("leg".to_string(), kind.as_str().to_string()),
                ]),
            }).await?;

            let expected = order.version;
            let mut updated = order.clone();
            updated.attach_intent(kind, intent.id.clone());
            updated.version += 1;

            match self.store.update_order(&updated, expected).await {
                Ok(true) => {
                    tracing::info!("Opened {} intent {} for order {}", kind.as_str(), intent.id, order.number);
                    return PaymentSession::from_intent(intent);
                }
                Ok(false) => {
                    order = self.load_order(order_id).await?;
                    if order.leg(kind).payment_intent_id.as_deref() == Some(intent.id.as_str()) {
                        return PaymentSession::from_intent(intent);
                    }
                    // a concurrent init won with a different intent; ours must not stay chargeable
                    self.release_intent(&intent.id).await;
                }
                Err(err) => {
                    self.release_intent(&intent.id).await;
                    return Err(err.into());
                }
            }
        }
        Err(concurrent_update())
    }

    /// Apply a gateway-confirmed payment to an order leg. Converges under retries and races.
    #[tracing::instrument(skip(self), fields(leg = kind.as_str()))]
    async fn confirm_leg(&self, order_id: Uuid, kind: LegKind, payment_intent_id: &str) -> ServiceResult<Order> {
        let mut order = self.load_order(order_id).await?;

        let leg = order.leg(kind);
        if leg.payment_intent_id.as_deref() != Some(payment_intent_id) {
            return Err(TransitionError::IntentMismatch {
                leg: kind,
                expected: leg.payment_intent_id.clone(),
                got: payment_intent_id.to_string(),
            }.into());
        }
        if leg.paid {
            return Ok(order);
        }

        let intent = self.gateway.retrieve_intent(payment_intent_id).await?;
        ensure_succeeded(&intent, order.leg(kind).amount)?;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let expected = order.version;
            let mut updated = order.clone();
            match updated.record_leg_paid(kind, payment_intent_id, Utc::now()) {
                Ok(LegUpdate::AlreadyApplied) => return Ok(order),
                Ok(LegUpdate::Applied) => {}
                Err(err) if order.status == OrderStatus::Cancelled => {
                    return Err(self.reconciliation(
                        payment_intent_id,
                        Some(order.id),
                        None,
                        intent.amount,
                        err.to_string(),
                    ).await);
                }
                Err(err) => return Err(err.into()),
            }
            updated.version += 1;

            match self.store.update_order(&updated, expected).await {
                Ok(true) => {
                    tracing::info!(
                        "Order {} {} paid with {} ({})",
                        updated.number, kind.as_str(), payment_intent_id, updated.payment_status.as_str()
                    );
                    self.after_leg_paid(&updated, kind).await;
                    return Ok(updated);
                }
                Ok(false) => order = self.load_order(order_id).await?,
                Err(err) => {
                    return Err(self.reconciliation(
                        payment_intent_id,
                        Some(order.id),
                        None,
                        intent.amount,
                        err.to_string(),
                    ).await);
                }
            }
        }
        Err(concurrent_update())
    }

    async fn after_leg_paid(&self, order: &Order, kind: LegKind) {
        if let Err(err) = self.issue_invoice(order, kind).await {
            tracing::warn!("Failed to issue {} invoice for order {}: {}", kind.as_str(), order.number, err);
        }
        let leg = order.leg(kind);
        self.publish(DomainEvent::PaymentConfirmed(PaymentConfirmedEvent {
            order_id: order.id,
            customer_id: order.customer_id,
            leg: kind.as_str().to_string(),
            amount_cents: leg.amount,
            payment_intent_id: leg.payment_intent_id.clone().unwrap_or_default(),
            fully_paid: order.payment_status == OrderPaymentStatus::Paid,
            timestamp: Utc::now().timestamp(),
        })).await;
    }

    /// One invoice per (order, kind); a second call returns `None`.
    async fn issue_invoice(&self, order: &Order, leg: LegKind) -> ServiceResult<Option<Invoice>> {
        let kind = InvoiceKind::for_leg(order, leg);
        let existing = self.store.list_invoices_for_order(order.id).await?;
        if existing.iter().any(|i| i.kind == kind) {
            return Ok(None);
        }

        let number = self.next_number(SequenceKind::Invoice).await?;
        let invoice = Invoice::for_leg(order, leg, number);
        if !self.store.insert_invoice(&invoice).await? {
            return Ok(None);
        }
        tracing::info!("Invoice {} issued for order {} ({})", invoice.number, order.number, kind.as_str());
        Ok(Some(invoice))
    }

    /// Cancel before any money is collected. Idempotent.
    #[tracing::instrument(skip(self, session))]
    pub async fn cancel_order(&self, session: &Session, order_id: Uuid) -> ServiceResult<Order> {
        self.owned_order(session, order_id).await?;
        self.cancel(order_id).await
    }

    async fn cancel(&self, order_id: Uuid) -> ServiceResult<Order> {
        let mut order = self.load_order(order_id).await?;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            if order.status != OrderStatus::Cancelled && !order.deposit.paid {
                if let Some(intent_id) = &order.deposit.payment_intent_id {
                    match self.gateway.retrieve_intent(intent_id).await {
                        Ok(intent) if intent.status == PaymentStatus::Succeeded => {
                            return Err(ServiceError::Conflict(format!(
                                "Payment {} already went through, confirm it instead of cancelling",
                                intent_id
                            )));
                        }
                        Ok(_) | Err(GatewayError::UnknownIntent(_)) => {}
                        Err(err) => return Err(err.into()),
                    }
                }
            }

            let expected = order.version;
            let mut updated = order.clone();
            if !updated.cancel()? {
                return Ok(order);
            }
            updated.version += 1;

            if self.store.update_order(&updated, expected).await? {
                tracing::info!("Order {} cancelled", updated.number);
                if let Some(intent_id) = &updated.deposit.payment_intent_id {
                    self.release_intent(intent_id).await;
                }
                return Ok(updated);
            }
            order = self.load_order(order_id).await?;
        }
        Err(concurrent_update())
    }

    /// Staff status change. `cancelled` goes through the pre-payment cancellation path.
    pub async fn advance_status(&self, order_id: Uuid, status: OrderStatus) -> ServiceResult<Order> {
        match status {
            OrderStatus::Cancelled => self.cancel(order_id).await,
            OrderStatus::Pending => Err(ServiceError::Validation(
                "Orders cannot be moved back to pending".to_string(),
            )),
            _ => self.manager.advance_status(order_id, status).await,
        }
    }

    // ---------------------------------------------------------------- quotes

    #[tracing::instrument(skip(self, session))]
    pub async fn init_quote_payment(&self, session: &Session, quote_id: Uuid) -> ServiceResult<PaymentSession> {
        let mut quote = self.visible_quote(session, quote_id).await?;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let amount = quote.payable_amount()?;
            let deposit = self.quote_deposit(amount)?;

            if let Some(existing) = &quote.payment_intent_id {
                if let Some(intent) = self.reusable_intent(existing, deposit).await? {
                    return PaymentSession::from_intent(intent);
                }
            }

            let scope = format!("quote-{}-deposit", quote.id);
            let customer_id = quote.customer_id.unwrap_or(session.user_id);
            let intent = self.gateway.create_intent(CreateIntentRequest {
                amount: deposit,
                currency: self.config.currency.clone(),
                idempotency_key: idempotency_key(&scope, deposit, quote.payment_intent_id.as_deref()),
                description: Some(format!("Deposit - {} ({})", quote.project_type, quote.number)),
                metadata: HashMap::from([
                    ("quote_id".to_string(), quote.id.to_string()),
                    ("quote_number".to_string(), quote.number.clone()),
                    ("customer_id".to_string(), customer_id.to_string()),
                    ("leg".to_string(), LegKind::Deposit.as_str().to_string()),
                ]),
            }).await?;

            let expected = quote.version;
            let mut updated = quote.clone();
            updated.payment_intent_id = Some(intent.id.clone());
            updated.updated_at = Utc::now();
            updated.version += 1;

            match self.store.update_quote(&updated, expected).await {
                Ok(true) => {
                    tracing::info!("Opened deposit intent {} for quote {}", intent.id, quote.number);
                    return PaymentSession::from_intent(intent);
                }
                Ok(false) => {
                    quote = self.load_quote(quote_id).await?;
                    if quote.payment_intent_id.as_deref() == Some(intent.id.as_str()) {
                        return PaymentSession::from_intent(intent);
                    }
                    self.release_intent(&intent.id).await;
                }
                Err(err) => {
                    self.release_intent(&intent.id).await;
                    return Err(err.into());
                }
            }
        }
        Err(concurrent_update())
    }

    /// Record the paid deposit as an order, then mark the quote accepted.
    #[tracing::instrument(skip(self, session))]
    pub async fn accept_quote_and_pay(
        &self,
        session: &Session,
        quote_id: Uuid,
        payment_intent_id: &str,
    ) -> ServiceResult<QuoteAcceptance> {
        let quote = self.visible_quote(session, quote_id).await?;
        let customer_id = quote.customer_id.unwrap_or(session.user_id);
        self.accept_quote(quote, customer_id, payment_intent_id).await
    }

    async fn accept_quote(
        &self,
        quote: Quote,
        customer_id: Uuid,
        payment_intent_id: &str,
    ) -> ServiceResult<QuoteAcceptance> {
        if let Some(acceptance) = self.existing_acceptance(&quote, payment_intent_id).await? {
            return Ok(acceptance);
        }
        if quote.payment_intent_id.as_deref() != Some(payment_intent_id) {
            return Err(ServiceError::Validation(format!(
                "Payment {} does not belong to quote {}",
                payment_intent_id, quote.number
            )));
        }

        let intent = self.gateway.retrieve_intent(payment_intent_id).await?;
        if intent.metadata_value("quote_id") != Some(quote.id.to_string().as_str()) {
            return Err(ServiceError::Validation(format!(
                "Payment {} was not opened for quote {}",
                payment_intent_id, quote.number
            )));
        }
        let priced = quote.payable_amount()
            .map_err(ServiceError::from)
            .and_then(|amount| Ok((amount, self.quote_deposit(amount)?)));
        let (amount, deposit) = match priced {
            Ok(priced) => priced,
            Err(err) if intent.status == PaymentStatus::Succeeded => {
                return Err(self.reconciliation(
                    payment_intent_id, None, Some(quote.id), intent.amount, err.to_string(),
                ).await);
            }
            Err(err) => return Err(err),
        };
        ensure_succeeded(&intent, deposit)?;

        // From here on the customer has been charged.
        let (order, created) = match self.store.find_order_by_intent(payment_intent_id).await {
            Ok(Some(order)) => (order, false),
            Ok(None) => match self.insert_quote_order(&quote, customer_id, amount, payment_intent_id).await {
                Ok(order) => (order, true),
                Err(ServiceError::Conflict(_)) => {
                    match self.store.find_order_by_intent(payment_intent_id).await {
                        Ok(Some(order)) => (order, false),
                        _ => {
                            return Err(self.reconciliation(
                                payment_intent_id, None, Some(quote.id), intent.amount,
                                "Concurrent order for this payment could not be found".to_string(),
                            ).await);
                        }
                    }
                }
                Err(err) => {
                    return Err(self.reconciliation(
                        payment_intent_id, None, Some(quote.id), intent.amount, err.to_string(),
                    ).await);
                }
            },
            Err(err) => {
                return Err(self.reconciliation(
                    payment_intent_id, None, Some(quote.id), intent.amount, err.to_string(),
                ).await);
            }
        };

        if created {
            self.publish(order_created(&order)).await;
            self.after_leg_paid(&order, LegKind::Deposit).await;
        } else if let Err(err) = self.issue_invoice(&order, LegKind::Deposit).await {
            tracing::warn!("Failed to issue deposit invoice for order {}: {}", order.number, err);
        }

        let mut current = quote;
        for _ in 0..MAX_WRITE_ATTEMPTS {
            if let Some(acceptance) = self.existing_acceptance(&current, payment_intent_id).await? {
                return Ok(acceptance);
            }

            let expected = current.version;
            let mut updated = current.clone();
            if let Err(err) = updated.accept(order.id, customer_id) {
                return Err(self.reconciliation(
                    payment_intent_id, Some(order.id), Some(current.id), intent.amount, err.to_string(),
                ).await);
            }
            updated.version += 1;

            match self.store.update_quote(&updated, expected).await {
                Ok(true) => {
                    tracing::info!("Quote {} accepted, order {}", updated.number, order.number);
                    self.publish(DomainEvent::QuoteAccepted(QuoteAcceptedEvent {
                        quote_id: updated.id,
                        order_id: order.id,
                        payment_intent_id: payment_intent_id.to_string(),
                        timestamp: Utc::now().timestamp(),
                    })).await;
                    return Ok(QuoteAcceptance { quote: updated, order });
                }
                Ok(false) => current = self.load_quote(current.id).await?,
                Err(err) => {
                    return Err(self.reconciliation(
                        payment_intent_id, Some(order.id), Some(current.id), intent.amount, err.to_string(),
                    ).await);
                }
            }
        }
        Err(concurrent_update())
    }

    /// An accepted quote answers with its pair when asked again with the same payment.
    async fn existing_acceptance(&self, quote: &Quote, payment_intent_id: &str) -> ServiceResult<Option<QuoteAcceptance>> {
        if quote.status != QuoteStatus::Accepted {
            return Ok(None);
        }
        let order = match quote.order_id {
            Some(order_id) => self.store.get_order(order_id).await?,
            None => None,
        };
        match order {
            Some(order) if order.deposit.payment_intent_id.as_deref() == Some(payment_intent_id) => {
                Ok(Some(QuoteAcceptance { quote: quote.clone(), order }))
            }
            _ => Err(ServiceError::Conflict(format!("Quote {} has already been accepted", quote.number))),
        }
    }

    async fn insert_quote_order(
        &self,
        quote: &Quote,
        customer_id: Uuid,
        amount: i64,
        payment_intent_id: &str,
    ) -> ServiceResult<Order> {
        let number = self.next_number(SequenceKind::Order).await?;
        let mut order = Order::new(NewOrder {
            number,
            customer_id,
            quote_id: Some(quote.id),
            item: OrderItem {
                item_id: quote.number.clone(),
                item_type: ProductType::Quote,
                name: format!("{} ({})", quote.project_type, quote.number),
                price: amount,
                ephemeral: false,
            },
            currency: self.config.currency.clone(),
            deposit_percent: self.config.deposit_percent,
            project_details: ProjectDetails {
                project_name: quote.project_type.clone(),
                description: quote.description.clone(),
                deadline: None,
                existing_website: None,
                notes: quote.staff_notes.clone(),
            },
            billing_info: BillingInfo {
                full_name: quote.contact.name.clone(),
                email: quote.contact.email.clone(),
                company: quote.contact.company.clone(),
                address: None,
                city: None,
                postal_code: None,
                country: None,
                vat_number: None,
            },
        })?;
        order.attach_intent(LegKind::Deposit, payment_intent_id.to_string());
        order.record_leg_paid(LegKind::Deposit, payment_intent_id, Utc::now())?;

        self.store.insert_order(&order).await?;
        tracing::info!("Order {} created from quote {}", order.number, quote.number);
        Ok(order)
    }

    /// Staff decision on a quote. Repricing or rejecting releases the stale deposit intent.
    pub async fn review_quote(&self, quote_id: Uuid, review: QuoteReview) -> ServiceResult<Quote> {
        if let QuoteReview::Send { proposed_amount, .. } = &review {
            self.quote_deposit(*proposed_amount)?;
        }
        let mut quote = self.load_quote(quote_id).await?;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let expected = quote.version;
            let mut updated = quote.clone();
            let stale_intent = updated.review(review.clone())?;
            updated.version += 1;

            if self.store.update_quote(&updated, expected).await? {
                tracing::info!("Quote {} is now {}", updated.number, updated.status.as_str());
                if let Some(intent_id) = stale_intent {
                    self.release_intent(&intent_id).await;
                }
                return Ok(updated);
            }
            quote = self.load_quote(quote_id).await?;
        }
        Err(concurrent_update())
    }

    // ---------------------------------------------------------------- webhooks

    /// Bring local state in line with what the gateway says about an intent.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile_intent(&self, payment_intent_id: &str) -> ServiceResult<ReconcileOutcome> {
        let intent = match self.gateway.retrieve_intent(payment_intent_id).await {
            Ok(intent) => intent,
            Err(GatewayError::UnknownIntent(_)) => {
                tracing::debug!("Ignoring unknown intent {}", payment_intent_id);
                return Ok(ReconcileOutcome::Ignored);
            }
            Err(err) => return Err(err.into()),
        };
        if intent.status != PaymentStatus::Succeeded {
            return Ok(ReconcileOutcome::Ignored);
        }

        if let Some(order) = self.store.find_order_by_intent(payment_intent_id).await? {
            if let Some(leg) = order.leg_for_intent(payment_intent_id) {
                self.confirm_leg(order.id, leg, payment_intent_id).await?;
                return Ok(ReconcileOutcome::OrderLegPaid { order_id: order.id, leg });
            }
        }

        let quote_id = intent.metadata_value("quote_id").and_then(|v| Uuid::parse_str(v).ok());
        if let Some(quote_id) = quote_id {
            if let Some(quote) = self.store.get_quote(quote_id).await? {
                let customer_id = quote.customer_id.or_else(|| {
                    intent.metadata_value("customer_id").and_then(|v| Uuid::parse_str(v).ok())
                });
                if let Some(customer_id) = customer_id {
                    match self.accept_quote(quote, customer_id, payment_intent_id).await {
                        Ok(acceptance) => {
                            return Ok(ReconcileOutcome::QuoteAccepted {
                                quote_id: acceptance.quote.id,
                                order_id: acceptance.order.id,
                            });
                        }
                        // a stale or repriced quote will never take this payment
                        Err(ServiceError::Validation(reason)) | Err(ServiceError::Conflict(reason)) => {
                            self.reconciliation(payment_intent_id, None, Some(quote_id), intent.amount, reason).await;
                            return Ok(ReconcileOutcome::Unmatched);
                        }
                        Err(err) => return Err(err),
                    }
                }
            }
        }

        self.reconciliation(
            payment_intent_id,
            None,
            quote_id,
            intent.amount,
            "Succeeded payment matches no order or quote".to_string(),
        ).await;
        Ok(ReconcileOutcome::Unmatched)
    }

    // ---------------------------------------------------------------- reads

    pub async fn list_orders(&self, session: &Session) -> ServiceResult<Vec<Order>> {
        Ok(self.store.list_orders_for_customer(session.user_id).await?)
    }

    pub async fn get_order(&self, session: &Session, order_id: Uuid) -> ServiceResult<Order> {
        self.owned_order(session, order_id).await
    }

    pub async fn list_all_orders(&self, status: Option<OrderStatus>) -> ServiceResult<Vec<Order>> {
        self.manager.list_orders(status).await
    }

    pub async fn list_quotes(&self, session: &Session) -> ServiceResult<Vec<Quote>> {
        Ok(self.store.list_quotes_for_customer(session.user_id, &session.email).await?)
    }

    pub async fn get_quote(&self, session: &Session, quote_id: Uuid) -> ServiceResult<Quote> {
        self.visible_quote(session, quote_id).await
    }

    pub async fn list_all_quotes(&self) -> ServiceResult<Vec<Quote>> {
        Ok(self.store.list_quotes().await?)
    }

    pub async fn list_invoices(&self, session: &Session) -> ServiceResult<Vec<Invoice>> {
        Ok(self.store.list_invoices_for_customer(session.user_id).await?)
    }

    pub async fn get_invoice(&self, session: &Session, invoice_id: Uuid) -> ServiceResult<Invoice> {
        match self.store.get_invoice(invoice_id).await? {
            Some(invoice) if session.is_admin() || invoice.customer_id == session.user_id => Ok(invoice),
            _ => Err(ServiceError::NotFound(format!("Invoice {}", invoice_id))),
        }
    }

    // ---------------------------------------------------------------- helpers

    async fn load_order(&self, order_id: Uuid) -> ServiceResult<Order> {
        self.manager.get_order(order_id).await
    }

    /// Other customers' orders are reported as missing.
    async fn owned_order(&self, session: &Session, order_id: Uuid) -> ServiceResult<Order> {
        let order = self.load_order(order_id).await?;
        if !session.is_admin() && order.customer_id != session.user_id {
            return Err(ServiceError::NotFound(format!("Order {}", order_id)));
        }
        Ok(order)
    }

    async fn load_quote(&self, quote_id: Uuid) -> ServiceResult<Quote> {
        self.store.get_quote(quote_id).await?
            .ok_or_else(|| ServiceError::NotFound(format!("Quote {}", quote_id)))
    }

    async fn visible_quote(&self, session: &Session, quote_id: Uuid) -> ServiceResult<Quote> {
        let quote = self.load_quote(quote_id).await?;
        if !quote.is_visible_to(session) {
            return Err(ServiceError::NotFound(format!("Quote {}", quote_id)));
        }
        Ok(quote)
    }

    fn quote_deposit(&self, amount: i64) -> ServiceResult<i64> {
        Ok(PaymentPlan::Split.split(amount, self.config.deposit_percent)?.deposit_cents)
    }

    async fn next_number(&self, kind: SequenceKind) -> ServiceResult<String> {
        let year = Utc::now().year();
        let seq = self.store.next_value(kind, year).await?;
        Ok(format_number(kind, year, seq))
    }

    /// A stored intent that can still be handed to the customer for this amount.
    async fn reusable_intent(&self, intent_id: &str, amount: i64) -> ServiceResult<Option<PaymentIntent>> {
        let intent = match self.gateway.retrieve_intent(intent_id).await {
            Ok(intent) => intent,
            Err(GatewayError::UnknownIntent(_)) => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        if intent.status == PaymentStatus::Succeeded {
            return Err(ServiceError::Conflict(format!(
                "Payment {} has already succeeded and only needs to be confirmed",
                intent.id
            )));
        }
        if intent.status.is_outstanding() && intent.amount == amount {
            return Ok(Some(intent));
        }
        if intent.status.is_outstanding() {
            self.release_intent(&intent.id).await;
        }
        Ok(None)
    }

    async fn release_intent(&self, intent_id: &str) {
        match self.gateway.cancel_intent(intent_id).await {
            Ok(_) => tracing::debug!("Released payment intent {}", intent_id),
            Err(err) => tracing::warn!("Could not cancel payment intent {}: {}", intent_id, err),
        }
    }

    async fn publish(&self, event: DomainEvent) {
        if let Err(err) = self.events.publish(&event).await {
            tracing::warn!("Failed to publish {} event: {}", event.topic(), err);
        }
    }

    /// Money moved but our records did not follow. Alert and hand the caller a support reference.
    async fn reconciliation(
        &self,
        payment_intent_id: &str,
        order_id: Option<Uuid>,
        quote_id: Option<Uuid>,
        amount_cents: i64,
        reason: String,
    ) -> ServiceError {
        tracing::error!(
            target: RECONCILIATION_TARGET,
            payment_intent_id,
            order_id = ?order_id,
            quote_id = ?quote_id,
            amount_cents,
            "Payment captured but local state was not updated: {}",
            reason
        );
        self.publish(DomainEvent::ReconciliationRequired(ReconciliationRequiredEvent {
            payment_intent_id: payment_intent_id.to_string(),
            order_id,
            quote_id,
            amount_cents,
            reason: reason.clone(),
            timestamp: Utc::now().timestamp(),
        })).await;
        ServiceError::Reconciliation {
            payment_intent_id: payment_intent_id.to_string(),
            reason,
        }
    }
}

/// Deterministic per (entity, leg, amount, previous intent): replays of the same attempt
/// get the same intent back from the gateway.
fn idempotency_key(scope: &str, amount: i64, previous_intent: Option<&str>) -> String {
    format!("{}-{}:{}", scope, amount, previous_intent.unwrap_or("initial"))
}

fn ensure_succeeded(intent: &PaymentIntent, expected_amount: i64) -> ServiceResult<()> {
    if intent.status != PaymentStatus::Succeeded {
        let detail = intent.last_error.as_deref().map(|e| format!(": {}", e)).unwrap_or_default();
        return Err(ServiceError::Validation(format!(
            "Payment {} has not succeeded (status {}){}",
            intent.id,
            intent.status.as_str(),
            detail
        )));
    }
    if intent.amount != expected_amount {
        return Err(ServiceError::Validation(format!(
            "Payment {} is for {} cents, expected {}",
            intent.id, intent.amount, expected_amount
        )));
    }
    Ok(())
}

fn leg_label(order: &Order, kind: LegKind) -> &'static str {
    match InvoiceKind::for_leg(order, kind) {
        InvoiceKind::Deposit => "Deposit",
        InvoiceKind::Balance => "Balance",
        InvoiceKind::Full => "Payment",
    }
}

fn order_created(order: &Order) -> DomainEvent {
    DomainEvent::OrderCreated(OrderCreatedEvent {
        order_id: order.id,
        order_number: order.number.clone(),
        customer_id: order.customer_id,
        quote_id: order.quote_id,
        amount_cents: order.amount,
        timestamp: Utc::now().timestamp(),
    })
}

fn concurrent_update() -> ServiceError {
    ServiceError::Conflict("The record was modified concurrently, please retry".to_string())
}
