//! Application state management.
//!
//! Shared by every route builder; all fields are cheap to clone.

use std::sync::Arc;

use axum_helpers::JwtAuth;
use domain_devices::MongoLinkageStore;
use mongodb::Client;

#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded from environment variables
    pub config: crate::config::Config,
    /// MongoDB client (cloneable, shares underlying connection pool)
    pub mongo_client: Client,
    /// Catalog entries and device links, shared by the linkage and catalog services
    pub store: Arc<MongoLinkageStore>,
    /// Verifies bearer tokens on every `/api/links` and `/api/catalog` request
    pub auth: JwtAuth,
}
