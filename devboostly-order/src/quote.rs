use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use devboostly_shared::Masked;
use crate::account::Session;
use crate::models::TransitionError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Pending,
    Reviewed,
    Sent,
    Accepted,
    Rejected,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteStatus::Pending => "pending",
            QuoteStatus::Reviewed => "reviewed",
            QuoteStatus::Sent => "sent",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(QuoteStatus::Pending),
            "reviewed" => Some(QuoteStatus::Reviewed),
            "sent" => Some(QuoteStatus::Sent),
            "accepted" => Some(QuoteStatus::Accepted),
            "rejected" => Some(QuoteStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QuoteStatus::Accepted | QuoteStatus::Rejected)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuoteContact {
    pub name: String,
    pub email: Masked<String>,
    pub phone: Option<Masked<String>>,
    pub company: Option<String>,
}

/// Public quote request form
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    #[serde(default)]
    pub name: String,
    pub email: Masked<String>,
    pub phone: Option<Masked<String>>,
    pub company: Option<String>,
    #[serde(default)]
    pub project_type: String,
    #[serde(default)]
    pub description: String,
    pub budget: Option<String>,
}

impl QuoteRequest {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if !self.email.expose().contains('@') {
            missing.push("email");
        }
        if self.project_type.trim().is_empty() {
            missing.push("projectType");
        }
        if self.description.trim().is_empty() {
            missing.push("description");
        }
        missing
    }
}

/// Staff decision on a quote
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum QuoteReview {
    MarkReviewed {
        notes: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Send {
        proposed_amount: i64,
        notes: Option<String>,
    },
    Reject {
        notes: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub id: Uuid,
    pub number: String,
    pub customer_id: Option<Uuid>,
    pub contact: QuoteContact,
    pub project_type: String,
    pub description: String,
    pub budget: Option<String>,
    pub status: QuoteStatus,
    pub proposed_amount: Option<i64>,
    pub staff_notes: Option<String>,
    /// Deposit intent opened for the accept flow
    pub payment_intent_id: Option<String>,
    pub order_id: Option<Uuid>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    pub fn new(number: String, customer_id: Option<Uuid>, request: QuoteRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            number,
            customer_id,
            contact: QuoteContact {
                name: request.name.trim().to_string(),
                email: Masked::new(request.email.expose().trim().to_lowercase()),
                phone: request.phone,
                company: request.company,
            },
            project_type: request.project_type.trim().to_string(),
            description: request.description,
            budget: request.budget,
            status: QuoteStatus::Pending,
            proposed_amount: None,
            staff_notes: None,
            payment_intent_id: None,
            order_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Owner, matching contact email for anonymous requests, or staff.
    pub fn is_visible_to(&self, session: &Session) -> bool {
        if session.is_admin() {
            return true;
        }
        match self.customer_id {
            Some(customer_id) => customer_id == session.user_id,
            None => self.contact.email.expose().eq_ignore_ascii_case(&session.email),
        }
    }

    /// The amount the customer can accept, if the quote is in an acceptable state.
    pub fn payable_amount(&self) -> Result<i64, TransitionError> {
        if !matches!(self.status, QuoteStatus::Sent | QuoteStatus::Reviewed) {
            return Err(TransitionError::NotPayable(format!(
                "Quote cannot be paid in status {}",
                self.status.as_str()
            )));
        }
        match self.proposed_amount {
            Some(amount) if amount > 0 => Ok(amount),
            _ => Err(TransitionError::NotPayable("Quote has no proposed amount yet".to_string())),
        }
    }

    /// Apply a staff decision. Returns an outstanding deposit intent that no longer
    /// matches the proposal and should be canceled at the gateway.
    pub fn review(&mut self, review: QuoteReview) -> Result<Option<String>, TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: review_target(&review).as_str().to_string(),
            });
        }

        let mut stale_intent = None;
        match review {
            QuoteReview::MarkReviewed { notes } => {
                if self.status != QuoteStatus::Pending {
                    return Err(TransitionError::InvalidTransition {
                        from: self.status.as_str().to_string(),
                        to: "reviewed".to_string(),
                    });
                }
                self.status = QuoteStatus::Reviewed;
                self.staff_notes = notes.or(self.staff_notes.take());
            }
            QuoteReview::Send { proposed_amount, notes } => {
                if proposed_amount <= 0 {
                    return Err(TransitionError::Rejected("Proposed amount must be positive".to_string()));
                }
                if self.proposed_amount != Some(proposed_amount) {
                    stale_intent = self.payment_intent_id.take();
                }
                self.proposed_amount = Some(proposed_amount);
                self.status = QuoteStatus::Sent;
                self.staff_notes = notes.or(self.staff_notes.take());
            }
            QuoteReview::Reject { notes } => {
                stale_intent = self.payment_intent_id.take();
                self.status = QuoteStatus::Rejected;
                self.staff_notes = notes.or(self.staff_notes.take());
            }
        }
        self.updated_at = Utc::now();
        Ok(stale_intent)
    }

    /// Flip to accepted once the order exists.
    pub fn accept(&mut self, order_id: Uuid, customer_id: Uuid) -> Result<(), TransitionError> {
        self.payable_amount()?;
        self.status = QuoteStatus::Accepted;
        self.order_id = Some(order_id);
        self.customer_id.get_or_insert(customer_id);
        self.updated_at = Utc::now();
        Ok(())
    }
}

fn review_target(review: &QuoteReview) -> QuoteStatus {
    match review {
        QuoteReview::MarkReviewed { .. } => QuoteStatus::Reviewed,
        QuoteReview::Send { .. } => QuoteStatus::Sent,
        QuoteReview::Reject { .. } => QuoteStatus::Rejected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Role;

    fn quote() -> Quote {
        Quote::new("QUO-2026-0001".into(), None, QuoteRequest {
            name: "Paul".into(),
            email: Masked::new(" Paul@Example.com ".into()),
            phone: None,
            company: Some("Atelier".into()),
            project_type: "E-commerce".into(),
            description: "Shop with 200 products".into(),
            budget: Some("3000-5000".into()),
        })
    }

    #[test]
    fn test_review_flow() {
        let mut quote = quote();
        assert!(quote.payable_amount().is_err());

        quote.review(QuoteReview::MarkReviewed { notes: None }).unwrap();
        assert_eq!(quote.status, QuoteStatus::Reviewed);
        // reviewed but not priced yet
        assert!(quote.payable_amount().is_err());

        quote.review(QuoteReview::Send { proposed_amount: 450000, notes: Some("v1".into()) }).unwrap();
        assert_eq!(quote.status, QuoteStatus::Sent);
        assert_eq!(quote.payable_amount(), Ok(450000));
    }

    #[test]
    fn test_repricing_releases_outstanding_intent() {
        let mut quote = quote();
        quote.review(QuoteReview::Send { proposed_amount: 450000, notes: None }).unwrap();
        quote.payment_intent_id = Some("pi_old".into());

        // same amount keeps the intent
        assert_eq!(quote.review(QuoteReview::Send { proposed_amount: 450000, notes: None }), Ok(None));
        assert_eq!(quote.payment_intent_id.as_deref(), Some("pi_old"));

        assert_eq!(
            quote.review(QuoteReview::Send { proposed_amount: 400000, notes: None }),
            Ok(Some("pi_old".to_string()))
        );
        assert!(quote.payment_intent_id.is_none());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut quote = quote();
        quote.review(QuoteReview::Reject { notes: Some("out of scope".into()) }).unwrap();
        assert!(quote.review(QuoteReview::Send { proposed_amount: 1000, notes: None }).is_err());
        assert!(quote.accept(Uuid::new_v4(), Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_accept_binds_customer() {
        let mut quote = quote();
        quote.review(QuoteReview::Send { proposed_amount: 100000, notes: None }).unwrap();
        let (order_id, customer_id) = (Uuid::new_v4(), Uuid::new_v4());
        quote.accept(order_id, customer_id).unwrap();

        assert_eq!(quote.status, QuoteStatus::Accepted);
        assert_eq!(quote.order_id, Some(order_id));
        assert_eq!(quote.customer_id, Some(customer_id));
    }

    #[test]
    fn test_visibility_by_contact_email() {
        let quote = quote();
        let owner = Session { user_id: Uuid::new_v4(), email: "paul@example.com".into(), role: Role::Client };
        let stranger = Session { user_id: Uuid::new_v4(), email: "eve@example.com".into(), role: Role::Client };
        let staff = Session { user_id: Uuid::new_v4(), email: "staff@devboostly.fr".into(), role: Role::Admin };

        assert!(quote.is_visible_to(&owner));
        assert!(!quote.is_visible_to(&stranger));
        assert!(quote.is_visible_to(&staff));
    }

    #[test]
    fn test_review_json() {
        let review: QuoteReview = serde_json::from_str(r#"{"action":"send","proposedAmount":250000}"#).unwrap();
        assert_eq!(review, QuoteReview::Send { proposed_amount: 250000, notes: None });
    }
}
