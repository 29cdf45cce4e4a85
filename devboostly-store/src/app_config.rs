use devboostly_catalog::{CatalogConfig, PaymentPlan, DEFAULT_DEPOSIT_PERCENT};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    /// No database means the in-memory store (development only).
    pub database: Option<DatabaseConfig>,
    /// Enables rate limiting when present.
    pub redis: Option<RedisConfig>,
    /// Enables domain event publishing when present.
    pub kafka: Option<KafkaConfig>,
    pub auth: AuthConfig,
    pub payment: PaymentConfig,
    #[serde(default)]
    pub checkout: CheckoutConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
}

fn default_rate_limit() -> i64 { 120 }

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
    /// Registering with this email grants the admin role.
    pub bootstrap_admin_email: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Stripe,
    Mock,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    pub provider: PaymentProvider,
    pub secret_key: Option<String>,
    /// When set, webhook calls must carry a valid `Stripe-Signature`.
    pub webhook_secret: Option<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_api_base() -> String { "https://api.stripe.com".to_string() }
fn default_currency() -> String { "eur".to_string() }
fn default_timeout() -> u64 { 10 }

#[derive(Debug, Deserialize, Clone)]
pub struct CheckoutConfig {
    #[serde(default = "default_deposit_percent")]
    pub deposit_percent: u8,
    #[serde(default = "default_true")]
    pub allow_ephemeral_items: bool,
}

fn default_deposit_percent() -> u8 { DEFAULT_DEPOSIT_PERCENT }
fn default_true() -> bool { true }

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            deposit_percent: DEFAULT_DEPOSIT_PERCENT,
            allow_ephemeral_items: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // DEVBOOSTLY__PAYMENT__SECRET_KEY=sk_live_... sets payment.secret_key
            .add_source(config::Environment::with_prefix("DEVBOOSTLY").separator("__"))
            .build()?;

        let config: Config = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.payment.provider == PaymentProvider::Stripe && self.payment.secret_key.is_none() {
            return Err(config::ConfigError::Message(
                "payment.secret_key is required when payment.provider = \"stripe\"".to_string(),
            ));
        }
        if self.checkout.deposit_percent == 0 || self.checkout.deposit_percent > 100 {
            return Err(config::ConfigError::Message(
                "checkout.deposit_percent must be between 1 and 100".to_string(),
            ));
        }
        if self.auth.jwt_secret.len() < 16 {
            return Err(config::ConfigError::Message(
                "auth.jwt_secret must be at least 16 characters".to_string(),
            ));
        }

        let offers = self.catalog.offers.iter().map(|entry| (entry, PaymentPlan::Split));
        let packs = self.catalog.packs.iter().map(|entry| (entry, PaymentPlan::Full));
        for (entry, plan) in offers.chain(packs) {
            if let Err(e) = plan.split(entry.price_cents, self.checkout.deposit_percent) {
                return Err(config::ConfigError::Message(format!("catalog item {}: {}", entry.id, e)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Result<Config, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    const MINIMAL: &str = r#"
        [server]
        port = 8080

        [auth]
        jwt_secret = "change-me-change-me"
        jwt_expiration_seconds = 86400

        [payment]
        provider = "mock"
    "#;

    #[test]
    fn test_optional_sections_default() {
        let config = parse(MINIMAL).unwrap();
        assert!(config.database.is_none());
        assert!(config.redis.is_none());
        assert_eq!(config.checkout.deposit_percent, 40);
        assert!(config.checkout.allow_ephemeral_items);
        assert_eq!(config.payment.currency, "eur");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_stripe_requires_secret() {
        let config = parse(&MINIMAL.replace("\"mock\"", "\"stripe\"")).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shipped_defaults() {
        let config = parse(include_str!("../../config/default.toml")).unwrap();
        assert!(config.auth.bootstrap_admin_email.is_none());
        assert_eq!(config.payment.provider, PaymentProvider::Mock);
        assert_eq!(config.catalog.offers.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unchargeable_catalog_price_is_rejected() {
        let toml = format!(
            "{}\n[[catalog.offers]]\nid = \"tiny\"\nname = \"Tiny\"\nprice_cents = 100\n",
            MINIMAL
        );
        let config = parse(&toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_catalog_section() {
        let toml = format!(
            "{}\n[[catalog.offers]]\nid = \"site-vitrine\"\nname = \"Site vitrine\"\nprice_cents = 59900\n",
            MINIMAL
        );
        let config = parse(&toml).unwrap();
        assert_eq!(config.catalog.offers.len(), 1);
        assert_eq!(config.catalog.offers[0].price_cents, 59900);
    }
}
