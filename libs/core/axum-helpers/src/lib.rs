//! # Axum Helpers
//!
//! Building blocks shared by the HTTP services.
//!
//! - **[`auth`]**: bearer-token principal provider (JWT) and role extractors
//! - **[`server`]**: router with API docs, health endpoint, graceful shutdown
//! - **[`http`]**: security headers
//! - **[`errors`]**: `AppError` and the JSON error envelope
//! - **[`extractors`]**: UUID path and validated JSON extractors
//!
//! ```ignore
//! use axum_helpers::{JwtAuth, JwtConfig, jwt_auth_middleware, server::create_router};
//!
//! let auth = JwtAuth::new(&JwtConfig::from_env()?);
//! let api = Router::new()
//!     .nest("/links", links_router)
//!     .layer(axum::middleware::from_fn_with_state(auth, jwt_auth_middleware));
//! let router = create_router::<ApiDoc>(api)?;
//! ```

pub mod auth;
pub mod errors;
pub mod extractors;
pub mod http;
pub mod server;

pub use auth::{JwtAuth, JwtClaims, JwtConfig, Principal, RequireAdmin, Role, jwt_auth_middleware};

pub use server::{
    HealthResponse, ShutdownCoordinator, create_production_app, create_router, health_router,
    shutdown_signal,
};

pub use http::security_headers;

pub use errors::{AppError, ErrorCode, ErrorResponse};

pub use extractors::{UuidPath, ValidatedJson};
