use axum_helpers::JwtAuth;
use axum_helpers::server::{create_production_app, health_router};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_devices::MongoLinkageStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;

    init_tracing(&config.environment);

    info!(
        database = config.mongodb.database(),
        "Connecting to MongoDB"
    );

    // Refuses deployments without transaction support unless explicitly allowed
    let mongo_client =
        database::mongodb::connect_from_config_with_retry(&config.mongodb, None).await?;
    let db = mongo_client.database(config.mongodb.database());

    let store = Arc::new(MongoLinkageStore::new(mongo_client.clone(), &db));
    store.init_indexes().await?;

    info!(
        "Successfully connected to MongoDB database: {}",
        config.mongodb.database()
    );

    let auth = JwtAuth::new(&config.jwt);
    let state = AppState {
        config,
        mongo_client,
        store,
        auth,
    };

    let api_routes = api::routes(&state);

    let router = axum_helpers::create_router::<openapi::ApiDoc>(api_routes)?;

    let app = router.merge(health_router(state.config.app.clone()));

    info!("Starting Terrarium API with graceful shutdown (30s timeout)");

    let mongo_client = state.mongo_client.clone();
    create_production_app(
        app,
        &state.config.server,
        Duration::from_secs(30),
        async move {
            info!("Shutting down: closing MongoDB connections");
            mongo_client.shutdown().await;
            info!("MongoDB connection closed successfully");
        },
    )
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("Terrarium API shutdown complete");
    Ok(())
}
