//! Principal provider.
//!
//! Bearer JWTs are verified by [`jwt_auth_middleware`], which stores a
//! [`Principal`] in the request extensions. Handlers take [`Principal`] or
//! [`RequireAdmin`] as extractors; role checks never happen inside handlers.
//!
//! ```ignore
//! use axum_helpers::auth::{JwtAuth, JwtConfig, Principal, jwt_auth_middleware};
//! use core_config::FromEnv;
//!
//! let auth = JwtAuth::new(&JwtConfig::from_env()?);
//!
//! async fn whoami(principal: Principal) -> String {
//!     principal.id.to_string()
//! }
//!
//! let app = Router::new()
//!     .route("/whoami", get(whoami))
//!     .layer(axum::middleware::from_fn_with_state(auth, jwt_auth_middleware));
//! ```

pub mod config;
pub mod jwt;
pub mod middleware;
pub mod principal;

pub use config::JwtConfig;
pub use jwt::{JwtAuth, JwtClaims, Role};
pub use middleware::jwt_auth_middleware;
pub use principal::{Principal, RequireAdmin};
