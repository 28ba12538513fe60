//! Linkage and catalog services - business rules over the stores

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::{DeviceError, DeviceResult};
use crate::models::{Availability, CatalogEntry, DeviceLink, LinkView, RegisterEntry};
use crate::repository::{
    CatalogRepository, DeviceLinkStore, DeviceRegistry, LinkageStore, Transactional,
};

/// Bind, activate and unbind devices for their owners.
///
/// Each mutating operation runs its body inside one transaction: the body's
/// result decides between commit and abort, so every early return rolls back.
pub struct LinkageService<S: LinkageStore> {
    store: Arc<S>,
}

impl<S: LinkageStore> Clone for LinkageService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LinkageStore> LinkageService<S> {
    pub fn new(store: S) -> Self {
        Self::from_shared(Arc::new(store))
    }

    /// Share one store with other services.
    pub fn from_shared(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn finish<T>(&self, tx: S::Tx, result: DeviceResult<T>) -> DeviceResult<T> {
        match result {
            Ok(value) => {
                self.store.commit(tx).await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(abort_err) = self.store.abort(tx).await {
                    warn!(error = %abort_err, "Failed to abort transaction");
                }
                Err(err)
            }
        }
    }

    /// Bind `device_id` to `owner`. The new link starts inactive.
    #[instrument(skip(self))]
    pub async fn bind(&self, owner: Uuid, device_id: Option<Uuid>) -> DeviceResult<DeviceLink> {
        let device = device_id.ok_or(DeviceError::MissingInput)?;

        let mut tx = self.store.begin().await?;
        let result = self.bind_in(&mut tx, owner, device).await;
        let link = self.finish(tx, result).await.map_err(|err| match err {
            // The concurrent winner holds the device
            DeviceError::WriteConflict(_) => DeviceError::AlreadyLinked(device),
            other => other,
        })?;

        info!(link_id = %link.id, %owner, %device, "Device linked");
        Ok(link)
    }

    async fn bind_in(&self, tx: &mut S::Tx, owner: Uuid, device: Uuid) -> DeviceResult<DeviceLink> {
        if self
            .store
            .find_for_owner_device(tx, owner, device)
            .await?
            .is_some()
        {
            return Err(DeviceError::AlreadyLinked(device));
        }

        let entry = self
            .store
            .find_by_id(tx, device)
            .await?
            .ok_or(DeviceError::DeviceNotFound(device))?;

        if !entry.is_device {
            return Err(DeviceError::NotADevice(device));
        }

        if self.store.find_by_device(tx, device).await?.is_some() {
            return Err(DeviceError::AlreadyLinked(device));
        }

        let link = DeviceLink::new(owner, &entry);
        self.store.insert(tx, &link).await?;
        self.store.mark_assigned(tx, device, owner).await?;
        Ok(link)
    }

    /// Switch a link on or off. Links of other owners are reported as not found.
    #[instrument(skip(self))]
    pub async fn set_active(
        &self,
        link_id: Uuid,
        owner: Uuid,
        active: bool,
    ) -> DeviceResult<DeviceLink> {
        let mut tx = self.store.begin().await?;
        let result = self.set_active_in(&mut tx, link_id, owner, active).await;
        let link = self.finish(tx, result).await?;

        info!(%link_id, %owner, active, "Device link state changed");
        Ok(link)
    }

    async fn set_active_in(
        &self,
        tx: &mut S::Tx,
        link_id: Uuid,
        owner: Uuid,
        active: bool,
    ) -> DeviceResult<DeviceLink> {
        let link = self
            .store
            .update_active(tx, link_id, owner, active, Utc::now())
            .await?
            .ok_or(DeviceError::LinkNotFound)?;

        if !self.store.set_active_state(tx, link.device, active).await? {
            warn!(%link_id, device_id = %link.device, "Linked catalog entry is missing, device state not updated");
        }
        Ok(link)
    }

    /// Remove a link and free its device for any owner.
    #[instrument(skip(self))]
    pub async fn unbind(&self, link_id: Uuid, owner: Uuid) -> DeviceResult<DeviceLink> {
        let mut tx = self.store.begin().await?;
        let result = self.unbind_in(&mut tx, link_id, owner).await;
        let link = self.finish(tx, result).await?;

        info!(%link_id, %owner, device_id = %link.device, "Device unlinked");
        Ok(link)
    }

    async fn unbind_in(&self, tx: &mut S::Tx, link_id: Uuid, owner: Uuid) -> DeviceResult<DeviceLink> {
        let link = self
            .store
            .delete_owned(tx, link_id, owner)
            .await?
            .ok_or(DeviceError::LinkNotFound)?;

        let deactivated = self.store.set_active_state(tx, link.device, false).await?;
        let released = self.store.clear_assigned(tx, link.device).await?;
        if !(deactivated && released) {
            warn!(%link_id, device_id = %link.device, "Linked catalog entry is missing, nothing to release");
        }
        Ok(link)
    }

    /// The owner's links joined with their catalog entries, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_owner(&self, owner: Uuid) -> DeviceResult<Vec<LinkView>> {
        let links = self.store.list_for_owner(owner).await?;
        self.join(links).await
    }

    /// Every link of every owner, newest first.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> DeviceResult<Vec<DeviceLink>> {
        self.store.list_all().await
    }

    /// Whether a device entry can still be bound.
    #[instrument(skip(self))]
    pub async fn check_availability(&self, device_id: Uuid) -> DeviceResult<Availability> {
        let entry = self
            .store
            .get_by_id(device_id)
            .await?
            .ok_or(DeviceError::DeviceNotFound(device_id))?;

        if !entry.is_device {
            return Err(DeviceError::NotADevice(device_id));
        }

        let linked = self.store.is_linked(device_id).await?;
        Ok(Availability {
            device_id,
            device_identifier: entry.device_identifier,
            available: !linked,
        })
    }

    async fn join(&self, links: Vec<DeviceLink>) -> DeviceResult<Vec<LinkView>> {
        let ids = links.iter().map(|l| l.device).collect();
        let entries: HashMap<Uuid, CatalogEntry> = self
            .store
            .get_many(ids)
            .await?
            .into_iter()
            .map(|e| (e.id, e))
            .collect();

        let views = links
            .iter()
            .map(|link| {
                let entry = entries.get(&link.device);
                if entry.is_none() {
                    warn!(link_id = %link.id, device_id = %link.device, "Link references a missing catalog entry");
                }
                LinkView::joined(link, entry)
            })
            .collect();
        Ok(views)
    }
}

/// Catalog registration and lookup.
pub struct CatalogService<R: CatalogRepository> {
    repository: Arc<R>,
}

impl<R: CatalogRepository> Clone for CatalogService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R: CatalogRepository> CatalogService<R> {
    pub fn new(repository: R) -> Self {
        Self::from_shared(Arc::new(repository))
    }

    pub fn from_shared(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Register a catalog entry. Device entries need a unique hardware identifier.
    #[instrument(skip(self, input), fields(entry_name = %input.name))]
    pub async fn register_entry(&self, input: RegisterEntry) -> DeviceResult<CatalogEntry> {
        input
            .validate()
            .map_err(|e| DeviceError::Validation(e.to_string()))?;

        let entry = CatalogEntry::new(input);

        if let Some(ref identifier) = entry.device_identifier {
            if self.repository.exists_by_identifier(identifier).await? {
                return Err(DeviceError::DuplicateIdentifier(identifier.clone()));
            }
        }

        self.repository.create(entry).await
    }

    #[instrument(skip(self))]
    pub async fn get_entry(&self, id: Uuid) -> DeviceResult<CatalogEntry> {
        self.repository
            .get_by_id(id)
            .await?
            .ok_or(DeviceError::DeviceNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryLinkageStore;
    use crate::models::LinkStatus;
    use crate::repository::MockCatalogRepository;

    struct Fixture {
        store: Arc<InMemoryLinkageStore>,
        linkage: LinkageService<InMemoryLinkageStore>,
        catalog: CatalogService<InMemoryLinkageStore>,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(InMemoryLinkageStore::new());
            Self {
                linkage: LinkageService::from_shared(Arc::clone(&store)),
                catalog: CatalogService::from_shared(Arc::clone(&store)),
                store,
            }
        }

        async fn device(&self, identifier: &str) -> CatalogEntry {
            self.catalog
                .register_entry(RegisterEntry {
                    name: format!("Terrario {identifier}"),
                    description: "Smart terrarium".to_string(),
                    is_device: true,
                    device_identifier: Some(identifier.to_string()),
                })
                .await
                .unwrap()
        }

        async fn plain_entry(&self) -> CatalogEntry {
            self.catalog
                .register_entry(RegisterEntry {
                    name: "Sustrato de coco".to_string(),
                    description: String::new(),
                    is_device: false,
                    device_identifier: None,
                })
                .await
                .unwrap()
        }

        async fn entry(&self, id: Uuid) -> CatalogEntry {
            self.catalog.get_entry(id).await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_bind_creates_inactive_link_and_assigns_device() {
        let fx = Fixture::new();
        let d1 = fx.device("TRR-0001").await;
        let u1 = Uuid::now_v7();

        let link = fx.linkage.bind(u1, Some(d1.id)).await.unwrap();

        assert_eq!(link.owner, u1);
        assert_eq!(link.device, d1.id);
        assert!(!link.active);
        assert!(link.last_activated_at.is_none());

        let entry = fx.entry(d1.id).await;
        assert!(entry.assigned);
        assert_eq!(entry.assigned_owner, Some(u1));
    }

    #[tokio::test]
    async fn test_bind_by_second_owner_is_rejected_without_changes() {
        let fx = Fixture::new();
        let d1 = fx.device("TRR-0002").await;
        let (u1, u2) = (Uuid::now_v7(), Uuid::now_v7());
        fx.linkage.bind(u1, Some(d1.id)).await.unwrap();
        let before = fx.entry(d1.id).await;

        let err = fx.linkage.bind(u2, Some(d1.id)).await.unwrap_err();

        assert!(matches!(err, DeviceError::AlreadyLinked(id) if id == d1.id));
        assert_eq!(fx.store.link_count().await, 1);
        assert_eq!(fx.entry(d1.id).await, before);
        assert!(fx.linkage.list_for_owner(u2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bind_same_device_twice_by_same_owner_is_rejected() {
        let fx = Fixture::new();
        let d1 = fx.device("TRR-0003").await;
        let u1 = Uuid::now_v7();
        fx.linkage.bind(u1, Some(d1.id)).await.unwrap();

        let err = fx.linkage.bind(u1, Some(d1.id)).await.unwrap_err();
        assert!(matches!(err, DeviceError::AlreadyLinked(_)));
    }

    #[tokio::test]
    async fn test_set_active_sets_timestamp_and_device_state() {
        let fx = Fixture::new();
        let d1 = fx.device("TRR-0004").await;
        let u1 = Uuid::now_v7();
        let link = fx.linkage.bind(u1, Some(d1.id)).await.unwrap();

        let active = fx.linkage.set_active(link.id, u1, true).await.unwrap();
        assert!(active.active);
        assert!(active.last_activated_at.is_some());
        assert!(fx.entry(d1.id).await.active);

        let inactive = fx.linkage.set_active(link.id, u1, false).await.unwrap();
        assert!(!inactive.active);
        assert!(inactive.last_activated_at.is_none());
        assert!(!fx.entry(d1.id).await.active);
    }

    #[tokio::test]
    async fn test_unbind_deletes_link_and_releases_device() {
        let fx = Fixture::new();
        let d1 = fx.device("TRR-0005").await;
        let u1 = Uuid::now_v7();
        let link = fx.linkage.bind(u1, Some(d1.id)).await.unwrap();
        fx.linkage.set_active(link.id, u1, true).await.unwrap();

        let removed = fx.linkage.unbind(link.id, u1).await.unwrap();

        assert_eq!(removed.id, link.id);
        assert_eq!(fx.store.link_count().await, 0);
        let entry = fx.entry(d1.id).await;
        assert!(!entry.active);
        assert!(!entry.assigned);
        assert_eq!(entry.assigned_owner, None);
    }

    #[tokio::test]
    async fn test_unbound_device_can_be_bound_by_another_owner() {
        let fx = Fixture::new();
        let d1 = fx.device("TRR-0006").await;
        let (u1, u2) = (Uuid::now_v7(), Uuid::now_v7());
        let link = fx.linkage.bind(u1, Some(d1.id)).await.unwrap();
        fx.linkage.unbind(link.id, u1).await.unwrap();

        let relinked = fx.linkage.bind(u2, Some(d1.id)).await.unwrap();

        assert_eq!(relinked.owner, u2);
        assert_eq!(fx.entry(d1.id).await.assigned_owner, Some(u2));
    }

    #[tokio::test]
    async fn test_bind_without_device_is_missing_input() {
        let fx = Fixture::new();
        fx.device("TRR-0007").await;

        let err = fx.linkage.bind(Uuid::now_v7(), None).await.unwrap_err();

        assert!(matches!(err, DeviceError::MissingInput));
        assert_eq!(fx.store.link_count().await, 0);
    }

    #[tokio::test]
    async fn test_bind_unknown_device_is_not_found() {
        let fx = Fixture::new();
        let missing = Uuid::now_v7();

        let err = fx.linkage.bind(Uuid::now_v7(), Some(missing)).await.unwrap_err();
        assert!(matches!(err, DeviceError::DeviceNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn test_bind_plain_entry_is_not_a_device() {
        let fx = Fixture::new();
        let plain = fx.plain_entry().await;

        let err = fx.linkage.bind(Uuid::now_v7(), Some(plain.id)).await.unwrap_err();

        assert!(matches!(err, DeviceError::NotADevice(_)));
        assert!(!fx.entry(plain.id).await.assigned);
    }

    #[tokio::test]
    async fn test_foreign_link_behaves_like_missing_link() {
        let fx = Fixture::new();
        let d1 = fx.device("TRR-0008").await;
        let (u1, u2) = (Uuid::now_v7(), Uuid::now_v7());
        let link = fx.linkage.bind(u1, Some(d1.id)).await.unwrap();

        let foreign = fx.linkage.set_active(link.id, u2, true).await.unwrap_err();
        let missing = fx
            .linkage
            .set_active(Uuid::now_v7(), u2, true)
            .await
            .unwrap_err();
        assert_eq!(foreign.to_string(), missing.to_string());
        assert!(matches!(foreign, DeviceError::LinkNotFound));

        let foreign = fx.linkage.unbind(link.id, u2).await.unwrap_err();
        assert!(matches!(foreign, DeviceError::LinkNotFound));

        let views = fx.linkage.list_for_owner(u1).await.unwrap();
        assert_eq!(views.len(), 1);
        assert!(!views[0].active);
        assert!(!fx.entry(d1.id).await.active);
    }

    #[tokio::test]
    async fn test_failed_bind_leaves_both_stores_untouched() {
        let fx = Fixture::new();
        let d1 = fx.device("TRR-0009").await;
        let before = fx.entry(d1.id).await;
        fx.store.fail_next_mark_assigned();

        let err = fx.linkage.bind(Uuid::now_v7(), Some(d1.id)).await.unwrap_err();

        assert!(matches!(err, DeviceError::Database(_)));
        assert_eq!(fx.store.link_count().await, 0);
        assert_eq!(fx.entry(d1.id).await, before);
        assert!(fx.linkage.check_availability(d1.id).await.unwrap().available);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_binds_have_a_single_winner() {
        let fx = Fixture::new();
        let d1 = fx.device("TRR-0010").await;
        let device = d1.id;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let linkage = fx.linkage.clone();
                tokio::spawn(async move { linkage.bind(Uuid::now_v7(), Some(device)).await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(err) => assert!(matches!(err, DeviceError::AlreadyLinked(_))),
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(fx.store.link_count().await, 1);
        assert!(fx.entry(d1.id).await.assigned);
    }

    #[tokio::test]
    async fn test_listing_is_newest_first_and_repeatable() {
        let fx = Fixture::new();
        let u1 = Uuid::now_v7();
        let first = fx.device("TRR-0011").await;
        let second = fx.device("TRR-0012").await;
        fx.linkage.bind(u1, Some(first.id)).await.unwrap();
        fx.linkage.bind(u1, Some(second.id)).await.unwrap();
        fx.linkage.bind(Uuid::now_v7(), Some(fx.device("TRR-0013").await.id)).await.unwrap();

        let views = fx.linkage.list_for_owner(u1).await.unwrap();
        let again = fx.linkage.list_for_owner(u1).await.unwrap();

        assert_eq!(views, again);
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].device_id, second.id);
        assert_eq!(views[1].device_id, first.id);
        assert_eq!(views[0].status, LinkStatus::Ok);
        assert_eq!(
            views[0].device.as_ref().map(|d| d.name.as_str()),
            Some("Terrario TRR-0012")
        );
    }

    #[tokio::test]
    async fn test_listing_flags_links_to_missing_entries() {
        let fx = Fixture::new();
        let u1 = Uuid::now_v7();
        let kept = fx.device("TRR-0014").await;
        let gone = fx.device("TRR-0015").await;
        fx.linkage.bind(u1, Some(kept.id)).await.unwrap();
        let orphan = fx.linkage.bind(u1, Some(gone.id)).await.unwrap();
        fx.store.remove_entry(gone.id).await;

        let views = fx.linkage.list_for_owner(u1).await.unwrap();

        assert_eq!(views.len(), 2);
        let degraded = views.iter().find(|v| v.link_id == orphan.id).unwrap();
        assert_eq!(degraded.status, LinkStatus::DeviceMissing);
        assert!(degraded.device.is_none());

        // Unbinding the orphan still succeeds
        fx.linkage.unbind(orphan.id, u1).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_all_spans_owners() {
        let fx = Fixture::new();
        let a = fx.device("TRR-0016").await;
        let b = fx.device("TRR-0017").await;
        fx.linkage.bind(Uuid::now_v7(), Some(a.id)).await.unwrap();
        let newest = fx.linkage.bind(Uuid::now_v7(), Some(b.id)).await.unwrap();

        let all = fx.linkage.list_all().await.unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, newest.id);
    }

    #[tokio::test]
    async fn test_availability_tracks_links() {
        let fx = Fixture::new();
        let d1 = fx.device("TRR-0018").await;
        let u1 = Uuid::now_v7();

        let before = fx.linkage.check_availability(d1.id).await.unwrap();
        assert!(before.available);
        assert_eq!(before.device_identifier.as_deref(), Some("TRR-0018"));

        fx.linkage.bind(u1, Some(d1.id)).await.unwrap();
        assert!(!fx.linkage.check_availability(d1.id).await.unwrap().available);

        let plain = fx.plain_entry().await;
        assert!(matches!(
            fx.linkage.check_availability(plain.id).await,
            Err(DeviceError::NotADevice(_))
        ));
        assert!(matches!(
            fx.linkage.check_availability(Uuid::now_v7()).await,
            Err(DeviceError::DeviceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_register_rejects_taken_identifier_before_insert() {
        let mut mock_repo = MockCatalogRepository::new();
        mock_repo
            .expect_exists_by_identifier()
            .with(mockall::predicate::eq("TRR-0100"))
            .returning(|_| Ok(true));
        mock_repo.expect_create().never();

        let service = CatalogService::new(mock_repo);
        let err = service
            .register_entry(RegisterEntry {
                name: "Terrario".to_string(),
                description: String::new(),
                is_device: true,
                device_identifier: Some(" TRR-0100 ".to_string()),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DeviceError::DuplicateIdentifier(ref id) if id == "TRR-0100"));
    }

    #[tokio::test]
    async fn test_register_plain_entry_skips_identifier_check() {
        let mut mock_repo = MockCatalogRepository::new();
        mock_repo.expect_exists_by_identifier().never();
        mock_repo.expect_create().times(1).returning(Ok);

        let service = CatalogService::new(mock_repo);
        let entry = service
            .register_entry(RegisterEntry {
                name: "Lámpara UVB".to_string(),
                description: String::new(),
                is_device: false,
                device_identifier: Some("ignored".to_string()),
            })
            .await
            .unwrap();

        assert!(!entry.is_device);
        assert_eq!(entry.device_identifier, None);
    }

    #[tokio::test]
    async fn test_register_device_without_identifier_is_invalid() {
        let mut mock_repo = MockCatalogRepository::new();
        mock_repo.expect_create().never();

        let service = CatalogService::new(mock_repo);
        let err = service
            .register_entry(RegisterEntry {
                name: "Terrario".to_string(),
                description: String::new(),
                is_device: true,
                device_identifier: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DeviceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_get_entry_maps_missing_to_not_found() {
        let mut mock_repo = MockCatalogRepository::new();
        let id = Uuid::now_v7();
        mock_repo
            .expect_get_by_id()
            .with(mockall::predicate::eq(id))
            .returning(|_| Ok(None));

        let service = CatalogService::new(mock_repo);
        assert!(matches!(
            service.get_entry(id).await,
            Err(DeviceError::DeviceNotFound(missing)) if missing == id
        ));
    }
}
