use async_trait::async_trait;
use uuid::Uuid;
use crate::account::User;
use crate::models::{Invoice, Order};
use crate::numbering::SequenceKind;
use crate::quote::Quote;
use crate::ticket::Ticket;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Unique constraint hit (email, deposit intent, invoice per leg, ...)
    #[error("Duplicate {0}")]
    Duplicate(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Order persistence. `update_order` is a compare-and-swap on `version`.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Fails with `Duplicate` when another order already holds the same deposit intent.
    async fn insert_order(&self, order: &Order) -> RepoResult<()>;

    async fn get_order(&self, id: Uuid) -> RepoResult<Option<Order>>;

    /// Writes `order` only if the stored version still equals `expected_version`.
    /// Returns false when someone else won the race.
    async fn update_order(&self, order: &Order, expected_version: i64) -> RepoResult<bool>;

    async fn find_order_by_intent(&self, payment_intent_id: &str) -> RepoResult<Option<Order>>;

    async fn list_orders_for_customer(&self, customer_id: Uuid) -> RepoResult<Vec<Order>>;

    async fn list_orders(&self) -> RepoResult<Vec<Order>>;
}

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    async fn insert_quote(&self, quote: &Quote) -> RepoResult<()>;

    async fn get_quote(&self, id: Uuid) -> RepoResult<Option<Quote>>;

    async fn update_quote(&self, quote: &Quote, expected_version: i64) -> RepoResult<bool>;

    /// Quotes owned by the customer, plus anonymous ones sent from the same email.
    async fn list_quotes_for_customer(&self, customer_id: Uuid, email: &str) -> RepoResult<Vec<Quote>>;

    async fn list_quotes(&self) -> RepoResult<Vec<Quote>>;
}

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Returns false if an invoice of the same kind already exists for the order.
    async fn insert_invoice(&self, invoice: &Invoice) -> RepoResult<bool>;

    async fn get_invoice(&self, id: Uuid) -> RepoResult<Option<Invoice>>;

    async fn list_invoices_for_order(&self, order_id: Uuid) -> RepoResult<Vec<Invoice>>;

    async fn list_invoices_for_customer(&self, customer_id: Uuid) -> RepoResult<Vec<Invoice>>;
}

#[async_trait]
pub trait TicketRepository: Send + Sync {
    async fn insert_ticket(&self, ticket: &Ticket) -> RepoResult<()>;

    async fn get_ticket(&self, id: Uuid) -> RepoResult<Option<Ticket>>;

    async fn update_ticket(&self, ticket: &Ticket, expected_version: i64) -> RepoResult<bool>;

    async fn list_tickets_for_customer(&self, customer_id: Uuid) -> RepoResult<Vec<Ticket>>;

    async fn list_tickets(&self) -> RepoResult<Vec<Ticket>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Duplicate` if the email is taken.
    async fn insert_user(&self, user: &User) -> RepoResult<()>;

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;

    async fn list_users(&self) -> RepoResult<Vec<User>>;
}

#[async_trait]
pub trait SequenceRepository: Send + Sync {
    /// Atomically allocate the next number in the (kind, year) counter, starting at 1.
    async fn next_value(&self, kind: SequenceKind, year: i32) -> RepoResult<i64>;
}

/// Everything the services need from storage.
pub trait Store:
    OrderRepository + QuoteRepository + InvoiceRepository + TicketRepository + UserRepository + SequenceRepository
{
}

impl<T> Store for T where
    T: OrderRepository + QuoteRepository + InvoiceRepository + TicketRepository + UserRepository + SequenceRepository
{
}
