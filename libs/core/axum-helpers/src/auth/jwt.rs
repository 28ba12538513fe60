use super::config::JwtConfig;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Caller role. Any role the platform does not know about is treated as a plain owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[serde(other)]
    Owner,
}

/// Claims accepted from bearer tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// User id
    pub sub: String,
    #[serde(default = "default_role")]
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

fn default_role() -> Role {
    Role::Owner
}

/// Stateless HS256 signer and verifier.
#[derive(Clone)]
pub struct JwtAuth {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtAuth {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            ttl: Duration::seconds(config.token_ttl_secs),
        }
    }

    /// Mint a token for `user_id`. Login lives in another service; this is
    /// used by tooling and tests.
    pub fn create_token(&self, user_id: Uuid, role: Role) -> eyre::Result<String> {
        self.create_token_with_ttl(user_id, role, self.ttl)
    }

    pub fn create_token_with_ttl(
        &self,
        user_id: Uuid,
        role: Role,
        ttl: Duration,
    ) -> eyre::Result<String> {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: user_id.to_string(),
            role,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Check signature and expiry and return the claims.
    pub fn verify_token(&self, token: &str) -> eyre::Result<JwtClaims> {
        let data = decode::<JwtClaims>(token, &self.decoding, &Validation::new(Algorithm::HS256))?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> JwtAuth {
        JwtAuth::new(&JwtConfig::new("this-is-a-valid-secret-with-32-chars!").unwrap())
    }

    #[test]
    fn test_token_carries_subject_and_role() {
        let auth = auth();
        let user = Uuid::now_v7();

        let token = auth.create_token(user, Role::Admin).unwrap();
        let claims = auth.verify_token(&token).unwrap();

        assert_eq!(claims.sub, user.to_string());
        assert_eq!(claims.role, Role::Admin);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let auth = auth();
        let token = auth
            .create_token_with_ttl(Uuid::now_v7(), Role::Owner, Duration::seconds(-3600))
            .unwrap();

        assert!(auth.verify_token(&token).is_err());
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let other = JwtAuth::new(&JwtConfig::new("another-secret-that-is-long-enough!!").unwrap());
        let token = other.create_token(Uuid::now_v7(), Role::Owner).unwrap();

        assert!(auth().verify_token(&token).is_err());
    }

    #[test]
    fn test_unknown_role_maps_to_owner() {
        let role: Role = serde_json::from_str(r#""cliente""#).unwrap();
        assert_eq!(role, Role::Owner);
        let role: Role = serde_json::from_str(r#""admin""#).unwrap();
        assert_eq!(role, Role::Admin);
    }
}
