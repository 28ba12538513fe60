//! Database connectivity shared by the services.
//!
//! # Features
//!
//! - `mongodb` (default) - MongoDB client setup, health checks and topology probing
//! - `config` - `core_config::FromEnv` support for [`mongodb::MongoConfig`]
//!
//! ```ignore
//! use database::mongodb::{MongoConfig, connect_from_config_with_retry};
//!
//! let config = MongoConfig::with_database("mongodb://localhost:27017/?replicaSet=rs0", "terrarium");
//! let client = connect_from_config_with_retry(&config, None).await?;
//! let db = client.database(config.database());
//! ```

pub mod common;

#[cfg(feature = "mongodb")]
pub mod mongodb;

pub use common::RetryConfig;
