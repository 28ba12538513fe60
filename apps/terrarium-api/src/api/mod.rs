//! API routes module
//!
//! Everything under `/links` and `/catalog` sits behind the JWT principal
//! layer; `/ready` stays public for orchestrators.

pub mod devices;
pub mod health;

use axum::{Router, middleware};
use axum_helpers::jwt_auth_middleware;

use crate::state::AppState;

/// Create all API routes
/// Note: These are nested under /api by axum_helpers::create_router
pub fn routes(state: &AppState) -> Router {
    let protected = Router::new()
        .nest("/links", devices::links(state))
        .nest("/catalog", devices::catalog(state))
        .layer(middleware::from_fn_with_state(
            state.auth.clone(),
            jwt_auth_middleware,
        ));

    protected.merge(health::router(state.clone()))
}
