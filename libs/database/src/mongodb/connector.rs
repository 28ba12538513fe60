use mongodb::{Client, bson::doc, options::ClientOptions};
use std::time::Duration;
use tracing::{info, instrument, warn};

use super::MongoConfig;
use super::health::topology;
use crate::common::{RetryConfig, retry, retry_with_backoff};

#[derive(Debug, thiserror::Error)]
pub enum MongoError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Multi-document transactions need a replica set or sharded cluster.
    #[error("MongoDB deployment does not support transactions: {0}")]
    TransactionsUnsupported(String),
}

/// Connect with default pool settings and verify the server answers `ping`.
pub async fn connect(url: &str) -> Result<Client, MongoError> {
    connect_from_config(&MongoConfig::new(url).allow_standalone()).await
}

/// Connect using `config`.
///
/// When `config.require_transactions` is set the deployment is probed with
/// `hello` and a standalone server is rejected.
#[instrument(skip(config), fields(database = %config.database))]
pub async fn connect_from_config(config: &MongoConfig) -> Result<Client, MongoError> {
    let mut options = ClientOptions::parse(&config.url).await?;

    options.max_pool_size = Some(config.max_pool_size);
    options.min_pool_size = Some(config.min_pool_size);
    options.connect_timeout = Some(Duration::from_secs(config.connect_timeout_secs));
    options.server_selection_timeout =
        Some(Duration::from_secs(config.server_selection_timeout_secs));
    options.app_name = config.app_name.clone();

    let client = Client::with_options(options)?;

    client
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await
        .map_err(|e| MongoError::ConnectionFailed(e.to_string()))?;

    let topology = topology(&client).await?;
    if !topology.supports_transactions() {
        if config.require_transactions {
            return Err(MongoError::TransactionsUnsupported(topology.to_string()));
        }
        warn!(%topology, "Connected to a deployment without transaction support");
    }

    info!(%topology, "Connected to MongoDB");
    Ok(client)
}

/// [`connect`] with exponential backoff; `None` uses [`RetryConfig::default`].
pub async fn connect_with_retry(
    url: &str,
    retry_config: Option<RetryConfig>,
) -> Result<Client, MongoError> {
    match retry_config {
        Some(config) => retry_with_backoff(|| connect(url), config).await,
        None => retry(|| connect(url)).await,
    }
}

/// [`connect_from_config`] with exponential backoff.
///
/// A deployment that cannot run transactions is not retried.
pub async fn connect_from_config_with_retry(
    config: &MongoConfig,
    retry_config: Option<RetryConfig>,
) -> Result<Client, MongoError> {
    let attempt = move || async move {
        match connect_from_config(config).await {
            Err(MongoError::TransactionsUnsupported(detail)) => Ok(Err(detail)),
            other => other.map(Ok),
        }
    };

    let outcome = match retry_config {
        Some(policy) => retry_with_backoff(attempt, policy).await?,
        None => retry(attempt).await?,
    };

    outcome.map_err(MongoError::TransactionsUnsupported)
}
