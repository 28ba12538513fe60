//! Storage contracts.
//!
//! Every mutating call takes the caller's transaction context (`&mut Self::Tx`)
//! so the catalog write and the link write of one operation commit or roll
//! back together. Listing and lookup calls outside a transaction read the
//! latest committed state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DeviceResult;
use crate::models::{CatalogEntry, DeviceLink};

/// A store that can open atomic units of work.
///
/// Dropping a `Tx` without committing discards its writes.
#[async_trait]
pub trait Transactional: Send + Sync + 'static {
    type Tx: Send;

    async fn begin(&self) -> DeviceResult<Self::Tx>;

    async fn commit(&self, tx: Self::Tx) -> DeviceResult<()>;

    async fn abort(&self, tx: Self::Tx) -> DeviceResult<()>;
}

/// Device side of the catalog, as seen by the linkage service.
#[async_trait]
pub trait DeviceRegistry: Transactional {
    async fn find_by_id(&self, tx: &mut Self::Tx, id: Uuid) -> DeviceResult<Option<CatalogEntry>>;

    /// Set `assigned` and the owner back-reference. Fails with `DeviceNotFound`.
    async fn mark_assigned(&self, tx: &mut Self::Tx, id: Uuid, owner: Uuid) -> DeviceResult<()>;

    /// Returns false when the entry no longer exists.
    async fn clear_assigned(&self, tx: &mut Self::Tx, id: Uuid) -> DeviceResult<bool>;

    /// Returns false when the entry no longer exists.
    async fn set_active_state(&self, tx: &mut Self::Tx, id: Uuid, active: bool)
    -> DeviceResult<bool>;
}

/// Owner to device links.
#[async_trait]
pub trait DeviceLinkStore: Transactional {
    async fn find_for_owner_device(
        &self,
        tx: &mut Self::Tx,
        owner: Uuid,
        device: Uuid,
    ) -> DeviceResult<Option<DeviceLink>>;

    async fn find_by_device(&self, tx: &mut Self::Tx, device: Uuid)
    -> DeviceResult<Option<DeviceLink>>;

    /// Insert a new link. A second link for the same device fails with `AlreadyLinked`.
    async fn insert(&self, tx: &mut Self::Tx, link: &DeviceLink) -> DeviceResult<()>;

    /// Apply the active flag to the link `id` owned by `owner`; `None` if there is none.
    async fn update_active(
        &self,
        tx: &mut Self::Tx,
        id: Uuid,
        owner: Uuid,
        active: bool,
        at: DateTime<Utc>,
    ) -> DeviceResult<Option<DeviceLink>>;

    /// Delete the link `id` owned by `owner`, returning it.
    async fn delete_owned(
        &self,
        tx: &mut Self::Tx,
        id: Uuid,
        owner: Uuid,
    ) -> DeviceResult<Option<DeviceLink>>;

    /// Links of one owner, newest first.
    async fn list_for_owner(&self, owner: Uuid) -> DeviceResult<Vec<DeviceLink>>;

    /// Every link, newest first.
    async fn list_all(&self) -> DeviceResult<Vec<DeviceLink>>;

    async fn is_linked(&self, device: Uuid) -> DeviceResult<bool>;
}

/// Catalog entries outside any transaction.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Persist a new entry. A reused `device_identifier` fails with `DuplicateIdentifier`.
    async fn create(&self, entry: CatalogEntry) -> DeviceResult<CatalogEntry>;

    async fn get_by_id(&self, id: Uuid) -> DeviceResult<Option<CatalogEntry>>;

    /// Entries for the given ids; unknown ids are skipped.
    async fn get_many(&self, ids: Vec<Uuid>) -> DeviceResult<Vec<CatalogEntry>>;

    async fn exists_by_identifier(&self, identifier: &str) -> DeviceResult<bool>;
}

/// Everything the linkage service needs from one backend.
pub trait LinkageStore: DeviceRegistry + DeviceLinkStore + CatalogRepository {}

impl<T> LinkageStore for T where T: DeviceRegistry + DeviceLinkStore + CatalogRepository {}
