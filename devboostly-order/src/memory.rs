use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;
use crate::account::User;
use crate::models::{Invoice, Order};
use crate::numbering::SequenceKind;
use crate::quote::Quote;
use crate::repository::*;
use crate::ticket::Ticket;

#[derive(Default)]
struct Tables {
    orders: HashMap<Uuid, Order>,
    quotes: HashMap<Uuid, Quote>,
    invoices: HashMap<Uuid, Invoice>,
    tickets: HashMap<Uuid, Ticket>,
    users: HashMap<Uuid, User>,
    sequences: HashMap<(SequenceKind, i32), i64>,
}

/// Process-local store used when no database is configured, and in tests.
///
/// Enforces the same uniqueness rules as the Postgres schema.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    fail_order_writes: AtomicBool,
    fail_quote_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every order insert/update fail with a storage error.
    pub fn fail_order_writes(&self, fail: bool) {
        self.fail_order_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every quote insert/update fail with a storage error.
    pub fn fail_quote_writes(&self, fail: bool) {
        self.fail_quote_writes.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, table: &str) -> RepoResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(RepositoryError::Storage(format!("{} table unavailable", table)));
        }
        Ok(())
    }
}

fn newest_first<T>(mut items: Vec<T>, key: impl Fn(&T) -> chrono::DateTime<chrono::Utc>) -> Vec<T> {
    items.sort_by_key(|item| std::cmp::Reverse(key(item)));
    items
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert_order(&self, order: &Order) -> RepoResult<()> {
        Self::check(&self.fail_order_writes, "orders")?;
        let mut tables = self.tables.write().await;

        if tables.orders.contains_key(&order.id) {
            return Err(RepositoryError::Duplicate(format!("order {}", order.id)));
        }
        if let Some(intent) = &order.deposit.payment_intent_id {
            if tables.orders.values().any(|o| o.deposit.payment_intent_id.as_ref() == Some(intent)) {
                return Err(RepositoryError::Duplicate(format!("deposit intent {}", intent)));
            }
        }
        tables.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> RepoResult<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn update_order(&self, order: &Order, expected_version: i64) -> RepoResult<bool> {
        Self::check(&self.fail_order_writes, "orders")?;
        let mut tables = self.tables.write().await;

        let Some(current) = tables.orders.get(&order.id) else {
            return Ok(false);
        };
        if current.version != expected_version {
            return Ok(false);
        }
        if let Some(intent) = &order.deposit.payment_intent_id {
            let taken = tables.orders.values()
                .any(|o| o.id != order.id && o.deposit.payment_intent_id.as_ref() == Some(intent));
            if taken {
                return Err(RepositoryError::Duplicate(format!("deposit intent {}", intent)));
            }
        }
        tables.orders.insert(order.id, order.clone());
        Ok(true)
    }

    async fn find_order_by_intent(&self, payment_intent_id: &str) -> RepoResult<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables.orders.values()
            .find(|o| o.leg_for_intent(payment_intent_id).is_some())
            .cloned())
    }

    async fn list_orders_for_customer(&self, customer_id: Uuid) -> RepoResult<Vec<Order>> {
        let tables = self.tables.read().await;
        let orders = tables.orders.values().filter(|o| o.customer_id == customer_id).cloned().collect();
        Ok(newest_first(orders, |o: &Order| o.created_at))
    }

    async fn list_orders(&self) -> RepoResult<Vec<Order>> {
        let orders = self.tables.read().await.orders.values().cloned().collect();
        Ok(newest_first(orders, |o: &Order| o.created_at))
    }
}

#[async_trait]
impl QuoteRepository for InMemoryStore {
    async fn insert_quote(&self, quote: &Quote) -> RepoResult<()> {
        Self::check(&self.fail_quote_writes, "quotes")?;
        let mut tables = self.tables.write().await;
        if tables.quotes.contains_key(&quote.id) {
            return Err(RepositoryError::Duplicate(format!("quote {}", quote.id)));
        }
        tables.quotes.insert(quote.id, quote.clone());
        Ok(())
    }

    async fn get_quote(&self, id: Uuid) -> RepoResult<Option<Quote>> {
        Ok(self.tables.read().await.quotes.get(&id).cloned())
    }

    async fn update_quote(&self, quote: &Quote, expected_version: i64) -> RepoResult<bool> {
        Self::check(&self.fail_quote_writes, "quotes")?;
        let mut tables = self.tables.write().await;
        match tables.quotes.get(&quote.id) {
            Some(current) if current.version == expected_version => {
                tables.quotes.insert(quote.id, quote.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_quotes_for_customer(&self, customer_id: Uuid, email: &str) -> RepoResult<Vec<Quote>> {
        let tables = self.tables.read().await;
        let quotes = tables.quotes.values()
            .filter(|q| match q.customer_id {
                Some(owner) => owner == customer_id,
                None => q.contact.email.expose().eq_ignore_ascii_case(email),
            })
            .cloned()
            .collect();
        Ok(newest_first(quotes, |q: &Quote| q.created_at))
    }

    async fn list_quotes(&self) -> RepoResult<Vec<Quote>> {
        let quotes = self.tables.read().await.quotes.values().cloned().collect();
        Ok(newest_first(quotes, |q: &Quote| q.created_at))
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryStore {
    async fn insert_invoice(&self, invoice: &Invoice) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        let exists = tables.invoices.values()
            .any(|i| i.order_id == invoice.order_id && i.kind == invoice.kind);
        if exists {
            return Ok(false);
        }
        tables.invoices.insert(invoice.id, invoice.clone());
        Ok(true)
    }

    async fn get_invoice(&self, id: Uuid) -> RepoResult<Option<Invoice>> {
        Ok(self.tables.read().await.invoices.get(&id).cloned())
    }

    async fn list_invoices_for_order(&self, order_id: Uuid) -> RepoResult<Vec<Invoice>> {
        let tables = self.tables.read().await;
        let invoices = tables.invoices.values().filter(|i| i.order_id == order_id).cloned().collect();
        Ok(newest_first(invoices, |i: &Invoice| i.issued_at))
    }

    async fn list_invoices_for_customer(&self, customer_id: Uuid) -> RepoResult<Vec<Invoice>> {
        let tables = self.tables.read().await;
        let invoices = tables.invoices.values().filter(|i| i.customer_id == customer_id).cloned().collect();
        Ok(newest_first(invoices, |i: &Invoice| i.issued_at))
    }
}

#[async_trait]
impl TicketRepository for InMemoryStore {
    async fn insert_ticket(&self, ticket: &Ticket) -> RepoResult<()> {
        self.tables.write().await.tickets.insert(ticket.id, ticket.clone());
        Ok(())
    }

    async fn get_ticket(&self, id: Uuid) -> RepoResult<Option<Ticket>> {
        Ok(self.tables.read().await.tickets.get(&id).cloned())
    }

    async fn update_ticket(&self, ticket: &Ticket, expected_version: i64) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.tickets.get(&ticket.id) {
            Some(current) if current.version == expected_version => {
                tables.tickets.insert(ticket.id, ticket.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_tickets_for_customer(&self, customer_id: Uuid) -> RepoResult<Vec<Ticket>> {
        let tables = self.tables.read().await;
        let tickets = tables.tickets.values().filter(|t| t.customer_id == customer_id).cloned().collect();
        Ok(newest_first(tickets, |t: &Ticket| t.updated_at))
    }

    async fn list_tickets(&self) -> RepoResult<Vec<Ticket>> {
        let tickets = self.tables.read().await.tickets.values().cloned().collect();
        Ok(newest_first(tickets, |t: &Ticket| t.updated_at))
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn insert_user(&self, user: &User) -> RepoResult<()> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(RepositoryError::Duplicate(format!("email {}", user.email)));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email.eq_ignore_ascii_case(email.trim())).cloned())
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let users = self.tables.read().await.users.values().cloned().collect();
        Ok(newest_first(users, |u: &User| u.created_at))
    }
}

#[async_trait]
impl SequenceRepository for InMemoryStore {
    async fn next_value(&self, kind: SequenceKind, year: i32) -> RepoResult<i64> {
        let mut tables = self.tables.write().await;
        let counter = tables.sequences.entry((kind, year)).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}
