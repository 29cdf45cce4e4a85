pub mod app_config;
pub mod database;
pub mod events;
pub mod order_repo;
pub mod quote_repo;
pub mod redis_repo;
pub mod stripe;
pub mod user_repo;

pub use database::DbClient;
pub use events::EventProducer;
pub use redis_repo::RedisClient;
pub use stripe::StripeGateway;
