//! JWT settings loaded through `core_config::FromEnv`.

use core_config::{ConfigError, FromEnv, env_parse, env_required};

const MIN_SECRET_LEN: usize = 32;

/// JWT verification settings.
///
/// - `JWT_SECRET` (required, at least 32 characters)
/// - `JWT_TTL_SECS` (default 900), lifetime of tokens minted by [`super::JwtAuth::create_token`]
#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub secret: String,
    pub token_ttl_secs: i64,
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>) -> Result<Self, ConfigError> {
        let secret = secret.into();
        check_secret(&secret)?;
        Ok(Self {
            secret,
            token_ttl_secs: 900,
        })
    }

    pub fn with_ttl(mut self, token_ttl_secs: i64) -> Self {
        self.token_ttl_secs = token_ttl_secs;
        self
    }
}

impl FromEnv for JwtConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let config = Self::new(env_required("JWT_SECRET")?)?;
        let ttl = env_parse("JWT_TTL_SECS", config.token_ttl_secs)?;
        Ok(config.with_ttl(ttl))
    }
}

fn check_secret(secret: &str) -> Result<(), ConfigError> {
    if secret.len() < MIN_SECRET_LEN {
        return Err(ConfigError::ParseError {
            key: "JWT_SECRET".to_string(),
            details: format!(
                "must be at least {} characters (got {}). Generate one with: openssl rand -base64 32",
                MIN_SECRET_LEN,
                secret.len()
            ),
        });
    }
    Ok(())
}
