use async_trait::async_trait;
use chrono::{DateTime, Utc};
use devboostly_order::quote::{Quote, QuoteContact, QuoteStatus};
use devboostly_order::repository::{QuoteRepository, RepoResult, RepositoryError, TicketRepository};
use devboostly_order::ticket::{Ticket, TicketCategory, TicketMessage, TicketPriority, TicketStatus};
use sqlx::types::Json;
use uuid::Uuid;
use crate::database::{corrupt, db_error, DbClient};

#[derive(sqlx::FromRow)]
struct QuoteRow {
    id: Uuid,
    number: String,
    customer_id: Option<Uuid>,
    contact: Json<QuoteContact>,
    project_type: String,
    description: String,
    budget: Option<String>,
    status: String,
    proposed_amount: Option<i64>,
    staff_notes: Option<String>,
    payment_intent_id: Option<String>,
    order_id: Option<Uuid>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<QuoteRow> for Quote {
    type Error = RepositoryError;

    fn try_from(row: QuoteRow) -> Result<Self, Self::Error> {
        let status = QuoteStatus::parse(&row.status).ok_or_else(|| corrupt("quotes.status", &row.status))?;
        Ok(Quote {
            id: row.id,
            number: row.number,
            customer_id: row.customer_id,
            contact: row.contact.0,
            project_type: row.project_type,
            description: row.description,
            budget: row.budget,
            status,
            proposed_amount: row.proposed_amount,
            staff_notes: row.staff_notes,
            payment_intent_id: row.payment_intent_id,
            order_id: row.order_id,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn to_quotes(rows: Vec<QuoteRow>) -> RepoResult<Vec<Quote>> {
    rows.into_iter().map(Quote::try_from).collect()
}

const QUOTE_COLUMNS: &str = "id, number, customer_id, contact, project_type, description, budget, status, \
    proposed_amount, staff_notes, payment_intent_id, order_id, version, created_at, updated_at";

#[async_trait]
impl QuoteRepository for DbClient {
    async fn insert_quote(&self, quote: &Quote) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO quotes (
                id, number, customer_id, contact, contact_email, project_type, description, budget,
                status, proposed_amount, staff_notes, payment_intent_id, order_id, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(quote.id)
        .bind(&quote.number)
        .bind(quote.customer_id)
        .bind(Json(&quote.contact))
        .bind(quote.contact.email.expose())
        .bind(&quote.project_type)
        .bind(&quote.description)
        .bind(&quote.budget)
        .bind(quote.status.as_str())
        .bind(quote.proposed_amount)
        .bind(&quote.staff_notes)
        .bind(&quote.payment_intent_id)
        .bind(quote.order_id)
        .bind(quote.version)
        .bind(quote.created_at)
        .bind(quote.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn get_quote(&self, id: Uuid) -> RepoResult<Option<Quote>> {
        let row = sqlx::query_as::<_, QuoteRow>(&format!("SELECT {} FROM quotes WHERE id = $1", QUOTE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(Quote::try_from).transpose()
    }

    async fn update_quote(&self, quote: &Quote, expected_version: i64) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE quotes SET
                customer_id = $3, status = $4, proposed_amount = $5, staff_notes = $6,
                payment_intent_id = $7, order_id = $8, version = $9, updated_at = $10
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(quote.id)
        .bind(expected_version)
        .bind(quote.customer_id)
        .bind(quote.status.as_str())
        .bind(quote.proposed_amount)
        .bind(&quote.staff_notes)
        .bind(&quote.payment_intent_id)
        .bind(quote.order_id)
        .bind(quote.version)
        .bind(quote.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_quotes_for_customer(&self, customer_id: Uuid, email: &str) -> RepoResult<Vec<Quote>> {
        let rows = sqlx::query_as::<_, QuoteRow>(&format!(
            "SELECT {} FROM quotes \
             WHERE customer_id = $1 OR (customer_id IS NULL AND LOWER(contact_email) = LOWER($2)) \
             ORDER BY created_at DESC",
            QUOTE_COLUMNS
        ))
        .bind(customer_id)
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        to_quotes(rows)
    }

    async fn list_quotes(&self) -> RepoResult<Vec<Quote>> {
        let rows = sqlx::query_as::<_, QuoteRow>(&format!("SELECT {} FROM quotes ORDER BY created_at DESC", QUOTE_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        to_quotes(rows)
    }
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: Uuid,
    customer_id: Uuid,
    order_id: Option<Uuid>,
    subject: String,
    category: String,
    priority: String,
    status: String,
    messages: Json<Vec<TicketMessage>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = RepositoryError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        Ok(Ticket {
            id: row.id,
            customer_id: row.customer_id,
            order_id: row.order_id,
            subject: row.subject,
            category: TicketCategory::parse(&row.category)
                .ok_or_else(|| corrupt("tickets.category", &row.category))?,
            priority: TicketPriority::parse(&row.priority)
                .ok_or_else(|| corrupt("tickets.priority", &row.priority))?,
            status: TicketStatus::parse(&row.status).ok_or_else(|| corrupt("tickets.status", &row.status))?,
            messages: row.messages.0,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl TicketRepository for DbClient {
    async fn insert_ticket(&self, ticket: &Ticket) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tickets (
                id, customer_id, order_id, subject, category, priority, status, messages, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(ticket.id)
        .bind(ticket.customer_id)
        .bind(ticket.order_id)
        .bind(&ticket.subject)
        .bind(ticket.category.as_str())
        .bind(ticket.priority.as_str())
        .bind(ticket.status.as_str())
        .bind(Json(&ticket.messages))
        .bind(ticket.version)
        .bind(ticket.created_at)
        .bind(ticket.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn get_ticket(&self, id: Uuid) -> RepoResult<Option<Ticket>> {
        let row = sqlx::query_as::<_, TicketRow>("SELECT * FROM tickets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(Ticket::try_from).transpose()
    }

    async fn update_ticket(&self, ticket: &Ticket, expected_version: i64) -> RepoResult<bool> {
        // The whole thread is rewritten; the version check keeps concurrent replies from clobbering each other.
        let result = sqlx::query(
            r#"
            UPDATE tickets SET
                status = $3, priority = $4, messages = $5, version = $6, updated_at = $7
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(ticket.id)
        .bind(expected_version)
        .bind(ticket.status.as_str())
        .bind(ticket.priority.as_str())
        .bind(Json(&ticket.messages))
        .bind(ticket.version)
        .bind(ticket.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_tickets_for_customer(&self, customer_id: Uuid) -> RepoResult<Vec<Ticket>> {
        let rows = sqlx::query_as::<_, TicketRow>(
            "SELECT * FROM tickets WHERE customer_id = $1 ORDER BY updated_at DESC",
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        rows.into_iter().map(Ticket::try_from).collect()
    }

    async fn list_tickets(&self) -> RepoResult<Vec<Ticket>> {
        let rows = sqlx::query_as::<_, TicketRow>("SELECT * FROM tickets ORDER BY updated_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        rows.into_iter().map(Ticket::try_from).collect()
    }
}
