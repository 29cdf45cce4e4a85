use async_trait::async_trait;
use chrono::{DateTime, Utc};
use devboostly_order::models::{
    BillingInfo, Invoice, InvoiceKind, Order, OrderItem, OrderPaymentStatus, OrderStatus, PaymentLeg,
    ProjectDetails,
};
use devboostly_order::repository::{InvoiceRepository, OrderRepository, RepoResult};
use sqlx::types::Json;
use uuid::Uuid;
use crate::database::{corrupt, db_error, DbClient};

const ORDER_COLUMNS: &str = "id, number, customer_id, quote_id, item, amount, currency, \
    deposit_amount, deposit_paid, deposit_paid_at, deposit_intent_id, \
    balance_amount, balance_paid, balance_paid_at, balance_intent_id, \
    payment_status, status, project_details, billing_info, version, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    number: String,
    customer_id: Uuid,
    quote_id: Option<Uuid>,
    item: Json<OrderItem>,
    amount: i64,
    currency: String,
    deposit_amount: i64,
    deposit_paid: bool,
    deposit_paid_at: Option<DateTime<Utc>>,
    deposit_intent_id: Option<String>,
    balance_amount: i64,
    balance_paid: bool,
    balance_paid_at: Option<DateTime<Utc>>,
    balance_intent_id: Option<String>,
    payment_status: String,
    status: String,
    project_details: Json<ProjectDetails>,
    billing_info: Json<BillingInfo>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = devboostly_order::RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let payment_status = OrderPaymentStatus::parse(&row.payment_status)
            .ok_or_else(|| corrupt("orders.payment_status", &row.payment_status))?;
        let status = OrderStatus::parse(&row.status)
            .ok_or_else(|| corrupt("orders.status", &row.status))?;

        Ok(Order {
            id: row.id,
            number: row.number,
            customer_id: row.customer_id,
            quote_id: row.quote_id,
            item: row.item.0,
            amount: row.amount,
            currency: row.currency,
            deposit: PaymentLeg {
                amount: row.deposit_amount,
                paid: row.deposit_paid,
                paid_at: row.deposit_paid_at,
                payment_intent_id: row.deposit_intent_id,
            },
            balance: PaymentLeg {
                amount: row.balance_amount,
                paid: row.balance_paid,
                paid_at: row.balance_paid_at,
                payment_intent_id: row.balance_intent_id,
            },
            payment_status,
            status,
            project_details: row.project_details.0,
            billing_info: row.billing_info.0,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn to_orders(rows: Vec<OrderRow>) -> RepoResult<Vec<Order>> {
    rows.into_iter().map(Order::try_from).collect()
}

#[async_trait]
impl OrderRepository for DbClient {
    async fn insert_order(&self, order: &Order) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, number, customer_id, quote_id, item, amount, currency,
                deposit_amount, deposit_paid, deposit_paid_at, deposit_intent_id,
                balance_amount, balance_paid, balance_paid_at, balance_intent_id,
                payment_status, status, project_details, billing_info, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
            "#,
        )
        .bind(order.id)
        .bind(&order.number)
        .bind(order.customer_id)
        .bind(order.quote_id)
        .bind(Json(&order.item))
        .bind(order.amount)
        .bind(&order.currency)
        .bind(order.deposit.amount)
        .bind(order.deposit.paid)
        .bind(order.deposit.paid_at)
        .bind(&order.deposit.payment_intent_id)
        .bind(order.balance.amount)
        .bind(order.balance.paid)
        .bind(order.balance.paid_at)
        .bind(&order.balance.payment_intent_id)
        .bind(order.payment_status.as_str())
        .bind(order.status.as_str())
        .bind(Json(&order.project_details))
        .bind(Json(&order.billing_info))
        .bind(order.version)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> RepoResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(Order::try_from).transpose()
    }

    async fn update_order(&self, order: &Order, expected_version: i64) -> RepoResult<bool> {
        // Item, amounts, project and billing details are immutable after creation.
        let result = sqlx::query(
            r#"
            UPDATE orders SET
                deposit_paid = $3, deposit_paid_at = $4, deposit_intent_id = $5,
                balance_paid = $6, balance_paid_at = $7, balance_intent_id = $8,
                payment_status = $9, status = $10, version = $11, updated_at = $12
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(order.id)
        .bind(expected_version)
        .bind(order.deposit.paid)
        .bind(order.deposit.paid_at)
        .bind(&order.deposit.payment_intent_id)
        .bind(order.balance.paid)
        .bind(order.balance.paid_at)
        .bind(&order.balance.payment_intent_id)
        .bind(order.payment_status.as_str())
        .bind(order.status.as_str())
        .bind(order.version)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_order_by_intent(&self, payment_intent_id: &str) -> RepoResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE deposit_intent_id = $1 OR balance_intent_id = $1 LIMIT 1",
            ORDER_COLUMNS
        ))
        .bind(payment_intent_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        row.map(Order::try_from).transpose()
    }

    async fn list_orders_for_customer(&self, customer_id: Uuid) -> RepoResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE customer_id = $1 ORDER BY created_at DESC",
            ORDER_COLUMNS
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        to_orders(rows)
    }

    async fn list_orders(&self) -> RepoResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!("SELECT {} FROM orders ORDER BY created_at DESC", ORDER_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        to_orders(rows)
    }
}

#[derive(sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    number: String,
    order_id: Uuid,
    order_number: String,
    customer_id: Uuid,
    kind: String,
    amount: i64,
    currency: String,
    description: String,
    payment_intent_id: Option<String>,
    issued_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = devboostly_order::RepositoryError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        let kind = InvoiceKind::parse(&row.kind).ok_or_else(|| corrupt("invoices.kind", &row.kind))?;
        Ok(Invoice {
            id: row.id,
            number: row.number,
            order_id: row.order_id,
            order_number: row.order_number,
            customer_id: row.customer_id,
            kind,
            amount: row.amount,
            currency: row.currency,
            description: row.description,
            payment_intent_id: row.payment_intent_id,
            issued_at: row.issued_at,
        })
    }
}

#[async_trait]
impl InvoiceRepository for DbClient {
    async fn insert_invoice(&self, invoice: &Invoice) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO invoices (
                id, number, order_id, order_number, customer_id, kind, amount, currency,
                description, payment_intent_id, issued_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (order_id, kind) DO NOTHING
            "#,
        )
        .bind(invoice.id)
        .bind(&invoice.number)
        .bind(invoice.order_id)
        .bind(&invoice.order_number)
        .bind(invoice.customer_id)
        .bind(invoice.kind.as_str())
        .bind(invoice.amount)
        .bind(&invoice.currency)
        .bind(&invoice.description)
        .bind(&invoice.payment_intent_id)
        .bind(invoice.issued_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_invoice(&self, id: Uuid) -> RepoResult<Option<Invoice>> {
        let row = sqlx::query_as::<_, InvoiceRow>("SELECT * FROM invoices WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(Invoice::try_from).transpose()
    }

    async fn list_invoices_for_order(&self, order_id: Uuid) -> RepoResult<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, InvoiceRow>("SELECT * FROM invoices WHERE order_id = $1 ORDER BY issued_at DESC")
            .bind(order_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        rows.into_iter().map(Invoice::try_from).collect()
    }

    async fn list_invoices_for_customer(&self, customer_id: Uuid) -> RepoResult<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, InvoiceRow>("SELECT * FROM invoices WHERE customer_id = $1 ORDER BY issued_at DESC")
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        rows.into_iter().map(Invoice::try_from).collect()
    }
}
