use crate::account::Session;
use crate::error::{ServiceError, ServiceResult};
use crate::manager::MAX_WRITE_ATTEMPTS;
use crate::numbering::{format_number, SequenceKind};
use crate::quote::{Quote, QuoteRequest};
use crate::repository::Store;
use crate::ticket::{NewTicket, Ticket, TicketStatus};
use chrono::{Datelike, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Customer contact points that do not move money: quote requests and support tickets.
pub struct ServiceDesk {
    store: Arc<dyn Store>,
}

impl ServiceDesk {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Public form; a signed-in requester owns the quote straight away.
    pub async fn request_quote(&self, session: Option<&Session>, request: QuoteRequest) -> ServiceResult<Quote> {
        let missing = request.missing_fields();
        if !missing.is_empty() {
            return Err(ServiceError::Validation(format!("Missing required fields: {}", missing.join(", "))));
        }

        let year = Utc::now().year();
        let seq = self.store.next_value(SequenceKind::Quote, year).await?;
        let quote = Quote::new(format_number(SequenceKind::Quote, year, seq), session.map(|s| s.user_id), request);
        self.store.insert_quote(&quote).await?;

        tracing::info!("Quote request {} received ({})", quote.number, quote.project_type);
        Ok(quote)
    }

    pub async fn open_ticket(&self, session: &Session, new: NewTicket) -> ServiceResult<Ticket> {
        if let Some(order_id) = new.order_id {
            let owned = self.store.get_order(order_id).await?
                .is_some_and(|o| o.customer_id == session.user_id);
            if !owned {
                return Err(ServiceError::NotFound(format!("Order {}", order_id)));
            }
        }

        let ticket = Ticket::open(session.user_id, new)?;
        self.store.insert_ticket(&ticket).await?;
        tracing::info!("Ticket {} opened ({}, {})", ticket.id, ticket.category.as_str(), ticket.priority.as_str());
        Ok(ticket)
    }

    pub async fn list_tickets(&self, session: &Session) -> ServiceResult<Vec<Ticket>> {
        Ok(self.store.list_tickets_for_customer(session.user_id).await?)
    }

    /// Staff view, optionally narrowed to one status
    pub async fn list_all_tickets(&self, status: Option<TicketStatus>) -> ServiceResult<Vec<Ticket>> {
        let tickets = self.store.list_tickets().await?;
        Ok(match status {
            Some(status) => tickets.into_iter().filter(|t| t.status == status).collect(),
            None => tickets,
        })
    }

    pub async fn get_ticket(&self, session: &Session, ticket_id: Uuid) -> ServiceResult<Ticket> {
        match self.store.get_ticket(ticket_id).await? {
            Some(ticket) if ticket.is_visible_to(session) => Ok(ticket),
            _ => Err(ServiceError::NotFound(format!("Ticket {}", ticket_id))),
        }
    }

    pub async fn reply(&self, session: &Session, ticket_id: Uuid, body: String) -> ServiceResult<Ticket> {
        let mut ticket = self.get_ticket(session, ticket_id).await?;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let expected = ticket.version;
            let mut updated = ticket.clone();
            updated.reply(session, body.clone())?;
            updated.version += 1;

            if self.store.update_ticket(&updated, expected).await? {
                return Ok(updated);
            }
            ticket = self.get_ticket(session, ticket_id).await?;
        }
        Err(ServiceError::Conflict("Ticket was modified concurrently, please retry".to_string()))
    }

    pub async fn set_ticket_status(&self, ticket_id: Uuid, status: TicketStatus) -> ServiceResult<Ticket> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let ticket = self.store.get_ticket(ticket_id).await?
                .ok_or_else(|| ServiceError::NotFound(format!("Ticket {}", ticket_id)))?;
            if ticket.status == status {
                return Ok(ticket);
            }

            let expected = ticket.version;
            let mut updated = ticket;
            updated.set_status(status)?;
            updated.version += 1;

            if self.store.update_ticket(&updated, expected).await? {
                tracing::info!("Ticket {} is now {}", updated.id, status.as_str());
                return Ok(updated);
            }
        }
        Err(ServiceError::Conflict("Ticket was modified concurrently, please retry".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Role;
    use crate::memory::InMemoryStore;
    use crate::ticket::{TicketCategory, TicketPriority};
    use devboostly_shared::Masked;

    fn client() -> Session {
        Session { user_id: Uuid::new_v4(), email: "paul@example.com".into(), role: Role::Client }
    }

    fn staff() -> Session {
        Session { user_id: Uuid::new_v4(), email: "staff@devboostly.fr".into(), role: Role::Admin }
    }

    fn new_ticket() -> NewTicket {
        NewTicket {
            subject: "Broken contact form".into(),
            category: TicketCategory::Technical,
            priority: TicketPriority::High,
            message: "The form returns an error".into(),
            order_id: None,
        }
    }

    #[tokio::test]
    async fn test_quote_numbers_are_sequential() {
        let desk = ServiceDesk::new(Arc::new(InMemoryStore::new()));
        let request = QuoteRequest {
            name: "Paul".into(),
            email: Masked::new("paul@example.com".into()),
            phone: None,
            company: None,
            project_type: "Site vitrine".into(),
            description: "Five pages".into(),
            budget: None,
        };

        let first = desk.request_quote(None, request.clone()).await.unwrap();
        let second = desk.request_quote(Some(&client()), request).await.unwrap();
        let year = Utc::now().year();
        assert_eq!(first.number, format!("QUO-{}-0001", year));
        assert_eq!(second.number, format!("QUO-{}-0002", year));
        assert!(first.customer_id.is_none());
        assert!(second.customer_id.is_some());
    }

    #[tokio::test]
    async fn test_ticket_conversation() {
        let desk = ServiceDesk::new(Arc::new(InMemoryStore::new()));
        let client = client();
        let ticket = desk.open_ticket(&client, new_ticket()).await.unwrap();

        let ticket = desk.reply(&staff(), ticket.id, "Fixed, can you check?".into()).await.unwrap();
        assert_eq!(ticket.status, TicketStatus::Answered);
        let ticket = desk.reply(&client, ticket.id, "Still broken on mobile".into()).await.unwrap();
        assert_eq!(ticket.status, TicketStatus::Pending);
        assert_eq!(ticket.version, 2);

        desk.set_ticket_status(ticket.id, TicketStatus::Resolved).await.unwrap();
        let err = desk.reply(&client, ticket.id, "hello?".into()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_tickets_are_private() {
        let desk = ServiceDesk::new(Arc::new(InMemoryStore::new()));
        let ticket = desk.open_ticket(&client(), new_ticket()).await.unwrap();

        let err = desk.get_ticket(&client(), ticket.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert!(desk.get_ticket(&staff(), ticket.id).await.is_ok());
    }
}
