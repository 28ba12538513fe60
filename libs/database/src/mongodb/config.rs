#[cfg(feature = "config")]
use core_config::{ConfigError, FromEnv, env_first_of, env_parse};

/// MongoDB connection settings.
///
/// ```ignore
/// use database::mongodb::MongoConfig;
///
/// let config = MongoConfig::with_database("mongodb://localhost:27017/?replicaSet=rs0", "terrarium")
///     .with_app_name("terrarium-api");
/// ```
#[derive(Clone, Debug)]
pub struct MongoConfig {
    /// `mongodb://[user:pass@]host[:port][/db][?options]`
    pub url: String,
    pub database: String,
    /// Reported to the server in connection handshakes.
    pub app_name: Option<String>,
    pub max_pool_size: u32,
    pub min_pool_size: u32,
    pub connect_timeout_secs: u64,
    pub server_selection_timeout_secs: u64,
    /// Refuse to start against a standalone server.
    pub require_transactions: bool,
}

impl MongoConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_database(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn with_pool_size(mut self, max_pool_size: u32, min_pool_size: u32) -> Self {
        self.max_pool_size = max_pool_size;
        self.min_pool_size = min_pool_size;
        self
    }

    pub fn allow_standalone(mut self) -> Self {
        self.require_transactions = false;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn database(&self) -> &str {
        &self.database
    }
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            url: "mongodb://localhost:27017".to_string(),
            database: "terrarium".to_string(),
            app_name: None,
            max_pool_size: 100,
            min_pool_size: 5,
            connect_timeout_secs: 10,
            server_selection_timeout_secs: 30,
            require_transactions: true,
        }
    }
}

/// Environment variables:
/// - `MONGODB_URL` or `MONGO_URL` (required)
/// - `MONGODB_DATABASE` or `MONGO_DATABASE` (required)
/// - `MONGODB_APP_NAME`
/// - `MONGODB_MAX_POOL_SIZE` (default 100), `MONGODB_MIN_POOL_SIZE` (default 5)
/// - `MONGODB_CONNECT_TIMEOUT_SECS` (default 10)
/// - `MONGODB_SERVER_SELECTION_TIMEOUT_SECS` (default 30)
/// - `MONGODB_REQUIRE_TRANSACTIONS` (default true)
#[cfg(feature = "config")]
impl FromEnv for MongoConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            url: env_first_of(&["MONGODB_URL", "MONGO_URL"])?,
            database: env_first_of(&["MONGODB_DATABASE", "MONGO_DATABASE"])?,
            app_name: std::env::var("MONGODB_APP_NAME").ok(),
            max_pool_size: env_parse("MONGODB_MAX_POOL_SIZE", defaults.max_pool_size)?,
            min_pool_size: env_parse("MONGODB_MIN_POOL_SIZE", defaults.min_pool_size)?,
            connect_timeout_secs: env_parse(
                "MONGODB_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout_secs,
            )?,
            server_selection_timeout_secs: env_parse(
                "MONGODB_SERVER_SELECTION_TIMEOUT_SECS",
                defaults.server_selection_timeout_secs,
            )?,
            require_transactions: env_parse(
                "MONGODB_REQUIRE_TRANSACTIONS",
                defaults.require_transactions,
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mongo_config_builders() {
        let config = MongoConfig::with_database("mongodb://db:27017", "terrarium_test")
            .with_app_name("terrarium-api")
            .with_pool_size(20, 2)
            .allow_standalone();

        assert_eq!(config.url(), "mongodb://db:27017");
        assert_eq!(config.database(), "terrarium_test");
        assert_eq!(config.app_name.as_deref(), Some("terrarium-api"));
        assert_eq!((config.max_pool_size, config.min_pool_size), (20, 2));
        assert!(!config.require_transactions);
    }

    #[test]
    fn test_mongo_config_requires_transactions_by_default() {
        assert!(MongoConfig::new("mongodb://localhost:27017").require_transactions);
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_mongo_config_from_env_fallback_names() {
        temp_env::with_vars(
            [
                ("MONGODB_URL", None::<&str>),
                ("MONGO_URL", Some("mongodb://fallback:27017")),
                ("MONGODB_DATABASE", None::<&str>),
                ("MONGO_DATABASE", Some("fallbackdb")),
                ("MONGODB_REQUIRE_TRANSACTIONS", Some("false")),
            ],
            || {
                let config = MongoConfig::from_env().unwrap();
                assert_eq!(config.url, "mongodb://fallback:27017");
                assert_eq!(config.database, "fallbackdb");
                assert!(!config.require_transactions);
            },
        );
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_mongo_config_from_env_missing_url() {
        temp_env::with_vars(
            [
                ("MONGODB_URL", None::<&str>),
                ("MONGO_URL", None::<&str>),
                ("MONGODB_DATABASE", Some("terrarium")),
            ],
            || {
                let err = MongoConfig::from_env().unwrap_err();
                assert!(err.to_string().contains("MONGODB_URL or MONGO_URL"));
            },
        );
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_mongo_config_from_env_bad_pool_size() {
        temp_env::with_vars(
            [
                ("MONGODB_URL", Some("mongodb://localhost:27017")),
                ("MONGODB_DATABASE", Some("terrarium")),
                ("MONGODB_MAX_POOL_SIZE", Some("lots")),
            ],
            || {
                let err = MongoConfig::from_env().unwrap_err();
                assert!(err.to_string().contains("MONGODB_MAX_POOL_SIZE"));
            },
        );
    }
}
