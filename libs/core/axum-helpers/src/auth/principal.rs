//! The authenticated caller as seen by handlers.

use super::jwt::Role;
use crate::errors::AppError;
use axum::{extract::FromRequestParts, http::request::Parts};
use serde::Serialize;
use uuid::Uuid;

/// Identity resolved by [`super::jwt_auth_middleware`]. Handlers trust it verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .copied()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

/// A [`Principal`] holding the admin role; anyone else gets 403.
#[derive(Debug, Clone, Copy)]
pub struct RequireAdmin(pub Principal);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request_parts(parts, state).await?;
        if !principal.is_admin() {
            tracing::info!(user_id = %principal.id, "Admin-only route refused");
            return Err(AppError::Forbidden("Administrator role required".to_string()));
        }
        Ok(RequireAdmin(principal))
    }
}
