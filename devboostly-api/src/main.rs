use std::sync::Arc;
use std::net::SocketAddr;
use anyhow::Context;
use devboostly_api::{app, state::{AppState, AuthConfig}};
use devboostly_catalog::Catalog;
use devboostly_core::{EventPublisher, MockGateway, NoopPublisher, PaymentGateway};
use devboostly_order::{InMemoryStore, OrchestratorConfig, Store};
use devboostly_store::app_config::{Config, PaymentProvider};
use devboostly_store::{DbClient, EventProducer, RedisClient, StripeGateway};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "devboostly_api=debug,devboostly_order=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Devboostly API on port {}", config.server.port);

    // Storage
    let mut db_client = None;
    let store: Arc<dyn Store> = match &config.database {
        Some(database) => {
            let db = DbClient::new(&database.url, database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            let db = Arc::new(db);
            db_client = Some(db.clone());
            db
        }
        None => {
            tracing::warn!("No [database] configured, using the in-memory store; data is lost on restart");
            Arc::new(InMemoryStore::new())
        }
    };

    // Payment gateway
    let gateway: Arc<dyn PaymentGateway> = match config.payment.provider {
        PaymentProvider::Stripe => {
            let secret_key = config.payment.secret_key.as_deref()
                .context("payment.secret_key is required for the stripe provider")?;
            Arc::new(
                StripeGateway::new(secret_key, &config.payment.api_base, config.payment.timeout_seconds)
                    .context("Failed to build Stripe client")?,
            )
        }
        PaymentProvider::Mock => {
            tracing::warn!("Using the mock payment gateway; no real charges are made");
            Arc::new(MockGateway::new())
        }
    };

    // Kafka Connection
    let events: Arc<dyn EventPublisher> = match &config.kafka {
        Some(kafka) => Arc::new(EventProducer::new(&kafka.brokers).context("Failed to create Kafka producer")?),
        None => Arc::new(NoopPublisher),
    };

    let checkout = OrchestratorConfig {
        currency: config.payment.currency.clone(),
        deposit_percent: config.checkout.deposit_percent,
        allow_ephemeral_items: config.checkout.allow_ephemeral_items,
    };

    let mut app_state = AppState::new(
        store,
        gateway,
        events,
        Catalog::from_config(config.catalog.clone()),
        checkout,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
            bootstrap_admin_email: config.auth.bootstrap_admin_email.clone(),
        },
    )
    .with_cors_origins(config.server.cors_origins.clone())
    .with_webhook_secret(config.payment.webhook_secret.clone());

    if let Some(db) = db_client {
        app_state = app_state.with_db(db);
    }

    // Redis Connection
    if let Some(redis) = &config.redis {
        let redis_client = RedisClient::new(&redis.url).await.context("Failed to connect to Redis")?;
        if let Err(e) = redis_client.ping().await {
            tracing::warn!("Redis not reachable yet, rate limiting fails open: {}", e);
        }
        app_state = app_state.with_rate_limit(Arc::new(redis_client), redis.rate_limit_per_minute);
    }

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.context("Failed to bind")?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>()
    ).await?;

    Ok(())
}
