use axum_helpers::JwtConfig;
use core_config::{AppInfo, FromEnv, app_info, server::ServerConfig};
use database::mongodb::MongoConfig;

pub use core_config::Environment;

/// Application configuration, composed from the shared config components.
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub mongodb: MongoConfig,
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    pub environment: Environment,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let mongodb = MongoConfig::from_env()?;
        let server = ServerConfig::from_env()?;
        let jwt = JwtConfig::from_env()?;

        Ok(Self {
            app: app_info!(),
            mongodb,
            server,
            jwt,
            environment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "terrarium-test-secret-with-32-characters";

    #[test]
    fn test_config_from_env() {
        temp_env::with_vars(
            [
                ("MONGODB_URL", Some("mongodb://localhost:27017/?replicaSet=rs0")),
                ("MONGODB_DATABASE", Some("terrarium_test")),
                ("JWT_SECRET", Some(SECRET)),
                ("PORT", Some("9090")),
                ("APP_ENV", None),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.mongodb.database(), "terrarium_test");
                assert_eq!(config.server.port, 9090);
                assert_eq!(config.app.name, "terrarium_api");
                assert!(config.environment.is_development());
            },
        );
    }

    #[test]
    fn test_config_requires_jwt_secret() {
        temp_env::with_vars(
            [
                ("MONGODB_URL", Some("mongodb://localhost:27017")),
                ("MONGODB_DATABASE", Some("terrarium_test")),
                ("JWT_SECRET", None::<&str>),
            ],
            || {
                assert!(Config::from_env().is_err());
            },
        );
    }

    #[test]
    fn test_config_rejects_short_jwt_secret() {
        temp_env::with_vars(
            [
                ("MONGODB_URL", Some("mongodb://localhost:27017")),
                ("MONGODB_DATABASE", Some("terrarium_test")),
                ("JWT_SECRET", Some("too-short")),
            ],
            || {
                assert!(Config::from_env().is_err());
            },
        );
    }
}
