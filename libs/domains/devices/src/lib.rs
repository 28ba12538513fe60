//! Devices Domain
//!
//! Links IoT terrarium devices (device-capable catalog entries) to their
//! owners. A device has at most one owner; binding, activation and release
//! update the link and the catalog entry together inside one transaction.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints (/links, /catalog)
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Service   │  ← Linkage rules, transaction scope
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │ Repository  │  ← Store traits + MongoDB / in-memory backends
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← CatalogEntry, DeviceLink, LinkView, DTOs
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use domain_devices::{
//!     handlers,
//!     mongodb::MongoLinkageStore,
//!     service::{CatalogService, LinkageService},
//! };
//! use mongodb::Client;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Transactions need a replica set
//! let client = Client::with_uri_str("mongodb://localhost:27017/?replicaSet=rs0").await?;
//! let db = client.database("terrarium");
//!
//! let store = Arc::new(MongoLinkageStore::new(client, &db));
//! store.init_indexes().await?;
//!
//! let links = handlers::links_router(LinkageService::from_shared(store.clone()));
//! let catalog = handlers::catalog_router(CatalogService::from_shared(store));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod mongodb;
pub mod repository;
pub mod service;

pub use error::{DeviceError, DeviceResult};
pub use handlers::{ApiDoc, CatalogApiDoc, catalog_router, links_router};
pub use memory::InMemoryLinkageStore;
pub use models::{
    Availability, BindDevice, CatalogEntry, DeviceLink, DeviceSummary, LinkStatus, LinkView,
    RegisterEntry, SetActive,
};
pub use crate::mongodb::MongoLinkageStore;
pub use repository::{
    CatalogRepository, DeviceLinkStore, DeviceRegistry, LinkageStore, Transactional,
};
pub use service::{CatalogService, LinkageService};
