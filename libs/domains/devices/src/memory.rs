//! In-memory backend (for development/testing)
//!
//! A transaction holds the store lock for its whole lifetime and works on a
//! staged copy of the state, so transactions are serializable and an
//! uncommitted transaction leaves nothing behind.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
#[cfg(test)]
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::{DeviceError, DeviceResult};
use crate::models::{CatalogEntry, DeviceLink};
use crate::repository::{CatalogRepository, DeviceLinkStore, DeviceRegistry, Transactional};

#[derive(Debug, Default, Clone)]
struct MemoryState {
    entries: HashMap<Uuid, CatalogEntry>,
    links: HashMap<Uuid, DeviceLink>,
}

impl MemoryState {
    fn sorted_links<F>(&self, keep: F) -> Vec<DeviceLink>
    where
        F: Fn(&DeviceLink) -> bool,
    {
        let mut links: Vec<DeviceLink> = self.links.values().filter(|l| keep(l)).cloned().collect();
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        links
    }
}

/// Open transaction on [`InMemoryLinkageStore`].
pub struct MemoryTx {
    committed: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryLinkageStore {
    state: Arc<Mutex<MemoryState>>,
    #[cfg(test)]
    fail_mark_assigned: Arc<AtomicBool>,
}

impl InMemoryLinkageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `mark_assigned` fail after the link insert has been staged.
    #[cfg(test)]
    pub(crate) fn fail_next_mark_assigned(&self) {
        self.fail_mark_assigned.store(true, Ordering::SeqCst);
    }

    /// Remove a catalog entry without touching links that reference it.
    pub async fn remove_entry(&self, id: Uuid) -> Option<CatalogEntry> {
        self.state.lock().await.entries.remove(&id)
    }

    pub async fn link_count(&self) -> usize {
        self.state.lock().await.links.len()
    }
}

#[async_trait]
impl Transactional for InMemoryLinkageStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> DeviceResult<MemoryTx> {
        let committed = Arc::clone(&self.state).lock_owned().await;
        let staged = committed.clone();
        Ok(MemoryTx { committed, staged })
    }

    async fn commit(&self, tx: MemoryTx) -> DeviceResult<()> {
        let MemoryTx {
            mut committed,
            staged,
        } = tx;
        *committed = staged;
        Ok(())
    }

    async fn abort(&self, tx: MemoryTx) -> DeviceResult<()> {
        drop(tx);
        Ok(())
    }
}

#[async_trait]
impl DeviceRegistry for InMemoryLinkageStore {
    async fn find_by_id(&self, tx: &mut MemoryTx, id: Uuid) -> DeviceResult<Option<CatalogEntry>> {
        Ok(tx.staged.entries.get(&id).cloned())
    }

    async fn mark_assigned(&self, tx: &mut MemoryTx, id: Uuid, owner: Uuid) -> DeviceResult<()> {
        #[cfg(test)]
        if self.fail_mark_assigned.swap(false, Ordering::SeqCst) {
            return Err(DeviceError::Database("injected mark_assigned failure".to_string()));
        }

        let entry = tx
            .staged
            .entries
            .get_mut(&id)
            .ok_or(DeviceError::DeviceNotFound(id))?;
        entry.assigned = true;
        entry.assigned_owner = Some(owner);
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn clear_assigned(&self, tx: &mut MemoryTx, id: Uuid) -> DeviceResult<bool> {
        Ok(match tx.staged.entries.get_mut(&id) {
            Some(entry) => {
                entry.assigned = false;
                entry.assigned_owner = None;
                entry.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn set_active_state(&self, tx: &mut MemoryTx, id: Uuid, active: bool) -> DeviceResult<bool> {
        Ok(match tx.staged.entries.get_mut(&id) {
            Some(entry) => {
                entry.active = active;
                entry.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }
}

#[async_trait]
impl DeviceLinkStore for InMemoryLinkageStore {
    async fn find_for_owner_device(
        &self,
        tx: &mut MemoryTx,
        owner: Uuid,
        device: Uuid,
    ) -> DeviceResult<Option<DeviceLink>> {
        Ok(tx
            .staged
            .links
            .values()
            .find(|l| l.owner == owner && l.device == device)
            .cloned())
    }

    async fn find_by_device(&self, tx: &mut MemoryTx, device: Uuid) -> DeviceResult<Option<DeviceLink>> {
        Ok(tx.staged.links.values().find(|l| l.device == device).cloned())
    }

    async fn insert(&self, tx: &mut MemoryTx, link: &DeviceLink) -> DeviceResult<()> {
        // Same rule as the unique index on `device`
        if tx.staged.links.values().any(|l| l.device == link.device) {
            return Err(DeviceError::AlreadyLinked(link.device));
        }
        tx.staged.links.insert(link.id, link.clone());
        Ok(())
    }

    async fn update_active(
        &self,
        tx: &mut MemoryTx,
        id: Uuid,
        owner: Uuid,
        active: bool,
        at: DateTime<Utc>,
    ) -> DeviceResult<Option<DeviceLink>> {
        Ok(match tx.staged.links.get_mut(&id) {
            Some(link) if link.owner == owner => {
                *link = link.clone().with_active(active, at);
                Some(link.clone())
            }
            _ => None,
        })
    }

    async fn delete_owned(&self, tx: &mut MemoryTx, id: Uuid, owner: Uuid) -> DeviceResult<Option<DeviceLink>> {
        match tx.staged.links.get(&id) {
            Some(link) if link.owner == owner => Ok(tx.staged.links.remove(&id)),
            _ => Ok(None),
        }
    }

    async fn list_for_owner(&self, owner: Uuid) -> DeviceResult<Vec<DeviceLink>> {
        let state = self.state.lock().await;
        Ok(state.sorted_links(|l| l.owner == owner))
    }

    async fn list_all(&self) -> DeviceResult<Vec<DeviceLink>> {
        let state = self.state.lock().await;
        Ok(state.sorted_links(|_| true))
    }

    async fn is_linked(&self, device: Uuid) -> DeviceResult<bool> {
        let state = self.state.lock().await;
        Ok(state.links.values().any(|l| l.device == device))
    }
}

#[async_trait]
impl CatalogRepository for InMemoryLinkageStore {
    async fn create(&self, entry: CatalogEntry) -> DeviceResult<CatalogEntry> {
        let mut state = self.state.lock().await;

        if let Some(ref identifier) = entry.device_identifier {
            let taken = state
                .entries
                .values()
                .any(|e| e.device_identifier.as_ref() == Some(identifier));
            if taken {
                return Err(DeviceError::DuplicateIdentifier(identifier.clone()));
            }
        }

        state.entries.insert(entry.id, entry.clone());
        tracing::info!(entry_id = %entry.id, is_device = entry.is_device, "Catalog entry created");
        Ok(entry)
    }

    async fn get_by_id(&self, id: Uuid) -> DeviceResult<Option<CatalogEntry>> {
        let state = self.state.lock().await;
        Ok(state.entries.get(&id).cloned())
    }

    async fn get_many(&self, ids: Vec<Uuid>) -> DeviceResult<Vec<CatalogEntry>> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.entries.get(id).cloned())
            .collect())
    }

    async fn exists_by_identifier(&self, identifier: &str) -> DeviceResult<bool> {
        let state = self.state.lock().await;
        Ok(state
            .entries
            .values()
            .any(|e| e.device_identifier.as_deref() == Some(identifier)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RegisterEntry;

    fn device(identifier: &str) -> CatalogEntry {
        CatalogEntry::new(RegisterEntry {
            name: "Terrario Smart".to_string(),
            description: String::new(),
            is_device: true,
            device_identifier: Some(identifier.to_string()),
        })
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let store = InMemoryLinkageStore::new();
        let entry = store.create(device("TRR-0100")).await.unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            let link = DeviceLink::new(Uuid::now_v7(), &entry);
            store.insert(&mut tx, &link).await.unwrap();
            store.mark_assigned(&mut tx, entry.id, link.owner).await.unwrap();
        }

        assert_eq!(store.link_count().await, 0);
        assert!(!store.get_by_id(entry.id).await.unwrap().unwrap().assigned);
    }

    #[tokio::test]
    async fn test_commit_publishes_staged_writes() {
        let store = InMemoryLinkageStore::new();
        let entry = store.create(device("TRR-0101")).await.unwrap();
        let owner = Uuid::now_v7();

        let mut tx = store.begin().await.unwrap();
        store.insert(&mut tx, &DeviceLink::new(owner, &entry)).await.unwrap();
        store.mark_assigned(&mut tx, entry.id, owner).await.unwrap();
        store.commit(tx).await.unwrap();

        assert_eq!(store.list_for_owner(owner).await.unwrap().len(), 1);
        let stored = store.get_by_id(entry.id).await.unwrap().unwrap();
        assert_eq!(stored.assigned_owner, Some(owner));
    }

    #[tokio::test]
    async fn test_second_link_for_device_is_rejected() {
        let store = InMemoryLinkageStore::new();
        let entry = store.create(device("TRR-0102")).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        store.insert(&mut tx, &DeviceLink::new(Uuid::now_v7(), &entry)).await.unwrap();
        let err = store
            .insert(&mut tx, &DeviceLink::new(Uuid::now_v7(), &entry))
            .await
            .unwrap_err();

        assert!(matches!(err, DeviceError::AlreadyLinked(id) if id == entry.id));
    }

    #[tokio::test]
    async fn test_duplicate_identifier_is_rejected() {
        let store = InMemoryLinkageStore::new();
        store.create(device("TRR-0103")).await.unwrap();

        let err = store.create(device("TRR-0103")).await.unwrap_err();
        assert!(matches!(err, DeviceError::DuplicateIdentifier(ref id) if id == "TRR-0103"));
        assert!(store.exists_by_identifier("TRR-0103").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_requires_matching_owner() {
        let store = InMemoryLinkageStore::new();
        let entry = store.create(device("TRR-0104")).await.unwrap();
        let owner = Uuid::now_v7();
        let link = DeviceLink::new(owner, &entry);

        let mut tx = store.begin().await.unwrap();
        store.insert(&mut tx, &link).await.unwrap();

        let foreign = store
            .update_active(&mut tx, link.id, Uuid::now_v7(), true, Utc::now())
            .await
            .unwrap();
        assert!(foreign.is_none());

        let own = store
            .update_active(&mut tx, link.id, owner, true, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert!(own.active);
        assert!(own.last_activated_at.is_some());

        let off = store
            .update_active(&mut tx, link.id, owner, false, Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert!(!off.active);
        assert_eq!(off.last_activated_at, None);
        assert_eq!(tx.staged.links.get(&link.id), Some(&off));
    }
}
