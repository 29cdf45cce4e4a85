pub mod account;
pub mod desk;
pub mod error;
pub mod manager;
pub mod memory;
pub mod models;
pub mod numbering;
pub mod orchestrator;
pub mod quote;
pub mod repository;
pub mod stats;
pub mod ticket;

pub use account::{Role, Session, User};
pub use desk::ServiceDesk;
pub use error::{ServiceError, ServiceResult};
pub use manager::OrderManager;
pub use memory::InMemoryStore;
pub use models::{
    BillingInfo, Invoice, InvoiceKind, LegKind, Order, OrderItem, OrderPaymentStatus, OrderStatus,
    PaymentLeg, PaymentPhase, ProjectDetails, TransitionError,
};
pub use orchestrator::{
    CheckoutRequest, OrchestratorConfig, PaymentOrchestrator, PaymentSession, QuoteAcceptance,
    ReconcileOutcome,
};
pub use quote::{Quote, QuoteRequest, QuoteReview, QuoteStatus};
pub use repository::{RepoResult, RepositoryError, Store};
pub use stats::DashboardStats;
pub use ticket::{NewTicket, Ticket, TicketStatus};
