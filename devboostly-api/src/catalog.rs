use axum::{extract::State, routing::get, Json, Router};
use devboostly_catalog::Product;
use serde::Serialize;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub offers: Vec<Product>,
    pub packs: Vec<Product>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/catalog", get(list_catalog))
}

/// GET /catalog
async fn list_catalog(State(state): State<AppState>) -> Json<CatalogResponse> {
    let catalog = state.orchestrator.catalog();
    Json(CatalogResponse {
        offers: catalog.offers().into_iter().cloned().collect(),
        packs: catalog.packs().into_iter().cloned().collect(),
    })
}
