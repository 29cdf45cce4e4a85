pub mod events;
pub mod mock_gateway;
pub mod payment;

pub use events::{EventPublisher, NoopPublisher, RecordingPublisher};
pub use mock_gateway::MockGateway;
pub use payment::{CreateIntentRequest, GatewayError, PaymentGateway, PaymentIntent, PaymentStatus};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal service error: {0}")]
    InternalError(String),
    #[error("Event delivery failed: {0}")]
    EventDelivery(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
