//! Axum router wiring for the scrape port.

use axum::{routing::get, Router};

use crate::{app_state::AppState, ops};

pub fn build_router(state: AppState) -> Router {
    let scrape_path = state.cfg().scrape.path.clone();
    Router::new()
        .route(ops::HEALTHZ_PATH, get(ops::healthz))
        .route(ops::READYZ_PATH, get(ops::readyz))
        .route(&scrape_path, get(ops::scrape))
        .with_state(state)
}
