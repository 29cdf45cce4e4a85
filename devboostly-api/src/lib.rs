use axum::{
    http::{HeaderValue, Method},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod auth;
pub mod catalog;
pub mod error;
pub mod health;
pub mod invoices;
pub mod middleware;
pub mod orders;
pub mod quotes;
pub mod state;
pub mod tickets;
pub mod webhooks;

pub use state::AppState;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| o.parse::<HeaderValue>().ok()))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ])
}

pub fn app(state: AppState) -> Router {
    let admin = admin::routes()
        .route_layer(axum::middleware::from_fn(middleware::admin_auth_middleware));

    let api = Router::new()
        .merge(auth::routes())
        .merge(catalog::routes())
        .merge(orders::routes())
        .merge(quotes::routes())
        .merge(invoices::routes())
        .merge(tickets::routes())
        .merge(webhooks::routes())
        .merge(health::routes())
        .nest("/admin", admin);

    // Outermost last: trace, cors, session, rate limit, circuit breaker.
    Router::new()
        .nest("/api", api)
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::circuit_breaker_middleware))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::rate_limit_middleware))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::session_middleware))
        .layer(cors_layer(&state.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
