pub mod auth;
pub mod resiliency;

pub use auth::{admin_auth_middleware, session_middleware, AuthSession, Claims};
pub use resiliency::{circuit_breaker_middleware, rate_limit_middleware};
