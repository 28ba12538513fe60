//! Shared configuration primitives.
//!
//! Every service composes its own `Config` out of the pieces here:
//! [`Environment`] for the deployment mode, [`AppInfo`] for build metadata,
//! [`server::ServerConfig`] for the listener and [`FromEnv`] implementations
//! provided by the libraries it links (MongoDB, JWT, ...).

pub mod server;
pub mod tracing;

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// Configuration error type
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable '{0}' is required but not set")]
    MissingEnvVar(String),

    #[error("Failed to parse environment variable '{key}': {details}")]
    ParseError { key: String, details: String },
}

/// Deployment mode, read from `APP_ENV`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        if app_env.eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// Name and version of the running binary, reported by `/health`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AppInfo {
    pub name: &'static str,
    pub version: &'static str,
}

/// Builds an [`AppInfo`] from the calling crate's Cargo metadata.
///
/// ```
/// let info = core_config::app_info!();
/// assert_eq!(info.name, "core_config");
/// ```
#[macro_export]
macro_rules! app_info {
    () => {
        $crate::AppInfo {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        }
    };
}

/// Trait for configuration that can be loaded from environment variables
pub trait FromEnv: Sized {
    fn from_env() -> Result<Self, ConfigError>;
}

/// Read `key`, falling back to `default` when unset.
pub fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read `key` or fail with [`ConfigError::MissingEnvVar`].
pub fn env_required(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Read the first of `keys` that is set.
pub fn env_first_of(keys: &[&str]) -> Result<String, ConfigError> {
    keys.iter()
        .find_map(|key| env::var(key).ok())
        .ok_or_else(|| ConfigError::MissingEnvVar(keys.join(" or ")))
}

/// Parse `key` into `T`, using `default` when the variable is unset.
pub fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            key: key.to_string(),
            details: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_defaults_to_development() {
        temp_env::with_var_unset("APP_ENV", || {
            let env = Environment::from_env();
            assert_eq!(env, Environment::Development);
            assert!(env.is_development());
            assert!(!env.is_production());
        });
    }

    #[test]
    fn test_environment_production_case_insensitive() {
        for value in ["production", "PRODUCTION", "Production"] {
            temp_env::with_var("APP_ENV", Some(value), || {
                assert_eq!(Environment::from_env(), Environment::Production);
            });
        }
    }

    #[test]
    fn test_environment_unknown_defaults_to_development() {
        temp_env::with_var("APP_ENV", Some("staging"), || {
            assert_eq!(Environment::from_env(), Environment::Development);
        });
    }

    #[test]
    fn test_app_info_macro_uses_crate_metadata() {
        let info = app_info!();
        assert_eq!(info.name, "core_config");
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_env_required_missing() {
        temp_env::with_var_unset("TERRARIUM_MISSING_REQUIRED", || {
            let err = env_required("TERRARIUM_MISSING_REQUIRED").unwrap_err();
            assert!(err.to_string().contains("TERRARIUM_MISSING_REQUIRED"));
            assert!(err.to_string().contains("required"));
        });
    }

    #[test]
    fn test_env_first_of_prefers_earlier_keys() {
        temp_env::with_vars(
            [("TERRARIUM_PRIMARY", Some("a")), ("TERRARIUM_FALLBACK", Some("b"))],
            || {
                let value = env_first_of(&["TERRARIUM_PRIMARY", "TERRARIUM_FALLBACK"]).unwrap();
                assert_eq!(value, "a");
            },
        );

        temp_env::with_vars(
            [("TERRARIUM_PRIMARY", None), ("TERRARIUM_FALLBACK", Some("b"))],
            || {
                let value = env_first_of(&["TERRARIUM_PRIMARY", "TERRARIUM_FALLBACK"]).unwrap();
                assert_eq!(value, "b");
            },
        );
    }

    #[test]
    fn test_env_first_of_reports_all_keys() {
        temp_env::with_vars_unset(["TERRARIUM_PRIMARY", "TERRARIUM_FALLBACK"], || {
            let err = env_first_of(&["TERRARIUM_PRIMARY", "TERRARIUM_FALLBACK"]).unwrap_err();
            assert!(err
                .to_string()
                .contains("TERRARIUM_PRIMARY or TERRARIUM_FALLBACK"));
        });
    }

    #[test]
    fn test_env_parse_default_and_override() {
        temp_env::with_var_unset("TERRARIUM_POOL", || {
            assert_eq!(env_parse("TERRARIUM_POOL", 7u32).unwrap(), 7);
        });
        temp_env::with_var("TERRARIUM_POOL", Some(" 42 "), || {
            assert_eq!(env_parse("TERRARIUM_POOL", 7u32).unwrap(), 42);
        });
    }

    #[test]
    fn test_env_parse_invalid_value() {
        temp_env::with_var("TERRARIUM_POOL", Some("many"), || {
            let err = env_parse("TERRARIUM_POOL", 7u32).unwrap_err();
            assert!(matches!(err, ConfigError::ParseError { ref key, .. } if key == "TERRARIUM_POOL"));
        });
    }
}
