//! Device linkage and catalog routes
//!
//! Both services share the single MongoDB store held in the state.

use axum::Router;
use domain_devices::{CatalogService, LinkageService, handlers};

use crate::state::AppState;

pub fn links(state: &AppState) -> Router {
    handlers::links_router(LinkageService::from_shared(state.store.clone()))
}

pub fn catalog(state: &AppState) -> Router {
    handlers::catalog_router(CatalogService::from_shared(state.store.clone()))
}
