use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use crate::account::Session;
use crate::models::TransitionError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TicketCategory {
    Billing,
    Technical,
    Project,
    Other,
}

impl TicketCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketCategory::Billing => "billing",
            TicketCategory::Technical => "technical",
            TicketCategory::Project => "project",
            TicketCategory::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "billing" => Some(TicketCategory::Billing),
            "technical" => Some(TicketCategory::Technical),
            "project" => Some(TicketCategory::Project),
            "other" => Some(TicketCategory::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Normal => "normal",
            TicketPriority::High => "high",
            TicketPriority::Urgent => "urgent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(TicketPriority::Low),
            "normal" => Some(TicketPriority::Normal),
            "high" => Some(TicketPriority::High),
            "urgent" => Some(TicketPriority::Urgent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    Pending,
    Answered,
    Resolved,
    Refunded,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::Pending => "pending",
            TicketStatus::Answered => "answered",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Refunded => "refunded",
            TicketStatus::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(TicketStatus::Open),
            "pending" => Some(TicketStatus::Pending),
            "answered" => Some(TicketStatus::Answered),
            "resolved" => Some(TicketStatus::Resolved),
            "refunded" => Some(TicketStatus::Refunded),
            "closed" => Some(TicketStatus::Closed),
            _ => None,
        }
    }

    /// No further replies once the conversation is settled.
    pub fn is_locked(&self) -> bool {
        matches!(self, TicketStatus::Resolved | TicketStatus::Refunded | TicketStatus::Closed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthorRole {
    Client,
    Staff,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TicketMessage {
    pub id: Uuid,
    pub author_id: Uuid,
    pub author_role: AuthorRole,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTicket {
    #[serde(default)]
    pub subject: String,
    pub category: TicketCategory,
    #[serde(default)]
    pub priority: TicketPriority,
    #[serde(default)]
    pub message: String,
    pub order_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub order_id: Option<Uuid>,
    pub subject: String,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub messages: Vec<TicketMessage>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    pub fn open(customer_id: Uuid, new: NewTicket) -> Result<Self, TransitionError> {
        if new.subject.trim().is_empty() {
            return Err(TransitionError::Rejected("Subject is required".to_string()));
        }
        if new.message.trim().is_empty() {
            return Err(TransitionError::Rejected("Message is required".to_string()));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            customer_id,
            order_id: new.order_id,
            subject: new.subject.trim().to_string(),
            category: new.category,
            priority: new.priority,
            status: TicketStatus::Open,
            messages: vec![TicketMessage {
                id: Uuid::new_v4(),
                author_id: customer_id,
                author_role: AuthorRole::Client,
                body: new.message,
                created_at: now,
            }],
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_visible_to(&self, session: &Session) -> bool {
        session.is_admin() || self.customer_id == session.user_id
    }

    pub fn reply(&mut self, author: &Session, body: String) -> Result<&TicketMessage, TransitionError> {
        if self.status.is_locked() {
            return Err(TransitionError::Rejected(format!(
                "Ticket is {} and no longer accepts replies",
                self.status.as_str()
            )));
        }
        if body.trim().is_empty() {
            return Err(TransitionError::Rejected("Message is required".to_string()));
        }

        let author_role = if author.is_admin() { AuthorRole::Staff } else { AuthorRole::Client };
        self.status = match author_role {
            AuthorRole::Staff => TicketStatus::Answered,
            // a fresh ticket stays open until staff picks it up
            AuthorRole::Client if self.status == TicketStatus::Open => TicketStatus::Open,
            AuthorRole::Client => TicketStatus::Pending,
        };

        let now = Utc::now();
        self.messages.push(TicketMessage {
            id: Uuid::new_v4(),
            author_id: author.user_id,
            author_role,
            body,
            created_at: now,
        });
        self.updated_at = now;
        Ok(&self.messages[self.messages.len() - 1])
    }

    /// Staff status change. Locked tickets can only move between locked states.
    pub fn set_status(&mut self, status: TicketStatus) -> Result<(), TransitionError> {
        if self.status == TicketStatus::Closed && status != TicketStatus::Closed {
            return Err(TransitionError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: status.as_str().to_string(),
            });
        }
        self.status = status;
        self.updated_at = Utc::now();
        Ok(())
    }
}
