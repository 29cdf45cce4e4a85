use std::sync::Arc;
use std::time::Duration;
use devboostly_catalog::Catalog;
use devboostly_core::{EventPublisher, PaymentGateway};
use devboostly_order::{OrchestratorConfig, PaymentOrchestrator, ServiceDesk, Store};
use devboostly_store::{DbClient, RedisClient};
use crate::middleware::resiliency::CircuitBreaker;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
    /// Registering with this email grants the admin role.
    pub bootstrap_admin_email: Option<String>,
}

pub struct ResiliencyState {
    /// Guards the endpoints that create or confirm intents at the gateway.
    pub payment_cb: CircuitBreaker,
}

impl Default for ResiliencyState {
    fn default() -> Self {
        Self {
            payment_cb: CircuitBreaker::new("payment-gateway", 5, Duration::from_secs(30)),
        }
    }
}

#[derive(Clone)]
pub struct RateLimit {
    pub redis: Arc<RedisClient>,
    pub per_minute: i64,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub desk: Arc<ServiceDesk>,
    /// Only set when running against Postgres; used by the health check.
    pub db: Option<Arc<DbClient>>,
    pub rate_limit: Option<RateLimit>,
    pub auth: AuthConfig,
    pub webhook_secret: Option<String>,
    /// Empty allows any origin
    pub cors_origins: Vec<String>,
    pub resiliency: Arc<ResiliencyState>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        events: Arc<dyn EventPublisher>,
        catalog: Catalog,
        checkout: OrchestratorConfig,
        auth: AuthConfig,
    ) -> Self {
        let orchestrator = PaymentOrchestrator::new(store.clone(), gateway, events, Arc::new(catalog), checkout);
        Self {
            desk: Arc::new(ServiceDesk::new(store.clone())),
            orchestrator: Arc::new(orchestrator),
            store,
            db: None,
            rate_limit: None,
            auth,
            webhook_secret: None,
            cors_origins: Vec::new(),
            resiliency: Arc::new(ResiliencyState::default()),
        }
    }

    pub fn with_db(mut self, db: Arc<DbClient>) -> Self {
        self.db = Some(db);
        self
    }

    pub fn with_rate_limit(mut self, redis: Arc<RedisClient>, per_minute: i64) -> Self {
        self.rate_limit = Some(RateLimit { redis, per_minute });
        self
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }

    pub fn with_webhook_secret(mut self, secret: Option<String>) -> Self {
        self.webhook_secret = secret;
        self
    }
}
