//! MongoDB backend for the linkage stores
//!
//! Mutations run inside a `ClientSession` transaction with snapshot reads and
//! majority writes; a unique index on `device_links.device` decides concurrent
//! binds of the same device.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    Client, ClientSession, Collection, Database, IndexModel,
    bson::{Binary, Bson, Document, doc, spec::BinarySubtype, to_bson},
    options::{IndexOptions, ReadConcern, ReturnDocument, WriteConcern},
};
use tracing::instrument;
use uuid::Uuid;

use crate::error::{DeviceError, DeviceResult, is_duplicate_key};
use crate::models::{CatalogEntry, DeviceLink};
use crate::repository::{CatalogRepository, DeviceLinkStore, DeviceRegistry, Transactional};

pub const ENTRIES_COLLECTION: &str = "catalog_entries";
pub const LINKS_COLLECTION: &str = "device_links";

/// Catalog entries and device links in one database.
#[derive(Clone)]
pub struct MongoLinkageStore {
    client: Client,
    entries: Collection<CatalogEntry>,
    links: Collection<DeviceLink>,
}

impl MongoLinkageStore {
    /// `db` must belong to `client`; sessions are opened on the client.
    pub fn new(client: Client, db: &Database) -> Self {
        Self {
            client,
            entries: db.collection::<CatalogEntry>(ENTRIES_COLLECTION),
            links: db.collection::<DeviceLink>(LINKS_COLLECTION),
        }
    }

    /// Create the indexes the linkage rules depend on. Idempotent.
    pub async fn init_indexes(&self) -> DeviceResult<()> {
        let link_indexes = vec![
            // One link per device
            IndexModel::builder()
                .keys(doc! { "device": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .name("idx_device_unique".to_string())
                        .build(),
                )
                .build(),
            IndexModel::builder()
                .keys(doc! { "owner": 1 })
                .options(IndexOptions::builder().name("idx_owner".to_string()).build())
                .build(),
        ];

        let entry_indexes = vec![
            IndexModel::builder()
                .keys(doc! { "device_identifier": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .sparse(true)
                        .name("idx_device_identifier_unique".to_string())
                        .build(),
                )
                .build(),
        ];

        self.links.create_indexes(link_indexes).await?;
        self.entries.create_indexes(entry_indexes).await?;
        tracing::info!("Linkage indexes created successfully");
        Ok(())
    }
}

/// `Uuid` fields reach the server as generic binary (the driver serializes
/// documents non-human-readably), so filters must use the same form.
fn uuid_bson(id: &Uuid) -> Bson {
    Bson::Binary(Binary {
        subtype: BinarySubtype::Generic,
        bytes: id.as_bytes().to_vec(),
    })
}

fn id_filter(id: Uuid) -> Document {
    doc! { "_id": uuid_bson(&id) }
}

/// Matches link `id` only when `owner` holds it.
fn owned_filter(id: Uuid, owner: Uuid) -> Document {
    doc! { "_id": uuid_bson(&id), "owner": uuid_bson(&owner) }
}

fn assign_update(owner: Uuid, at: DateTime<Utc>) -> Document {
    doc! {
        "$set": {
            "assigned": true,
            "assigned_owner": uuid_bson(&owner),
            "updated_at": to_bson(&at).unwrap_or(Bson::Null),
        }
    }
}

fn newest_first() -> Document {
    doc! { "_id": -1 }
}

#[async_trait]
impl Transactional for MongoLinkageStore {
    type Tx = ClientSession;

    async fn begin(&self) -> DeviceResult<ClientSession> {
        let mut session = self
            .client
            .start_session()
            .await
            .map_err(DeviceError::transaction)?;

        session
            .start_transaction()
            .read_concern(ReadConcern::snapshot())
            .write_concern(WriteConcern::majority())
            .await
            .map_err(DeviceError::transaction)?;

        Ok(session)
    }

    async fn commit(&self, mut tx: ClientSession) -> DeviceResult<()> {
        tx.commit_transaction()
            .await
            .map_err(DeviceError::transaction)
    }

    async fn abort(&self, mut tx: ClientSession) -> DeviceResult<()> {
        tx.abort_transaction()
            .await
            .map_err(DeviceError::transaction)
    }
}

#[async_trait]
impl DeviceRegistry for MongoLinkageStore {
    #[instrument(skip(self, tx))]
    async fn find_by_id(
        &self,
        tx: &mut ClientSession,
        id: Uuid,
    ) -> DeviceResult<Option<CatalogEntry>> {
        let entry = self.entries.find_one(id_filter(id)).session(&mut *tx).await?;
        Ok(entry)
    }

    #[instrument(skip(self, tx))]
    async fn mark_assigned(&self, tx: &mut ClientSession, id: Uuid, owner: Uuid) -> DeviceResult<()> {
        let result = self
            .entries
            .update_one(id_filter(id), assign_update(owner, Utc::now()))
            .session(&mut *tx)
            .await?;

        if result.matched_count == 0 {
            return Err(DeviceError::DeviceNotFound(id));
        }
        Ok(())
    }

    #[instrument(skip(self, tx))]
    async fn clear_assigned(&self, tx: &mut ClientSession, id: Uuid) -> DeviceResult<bool> {
        let update = doc! {
            "$set": {
                "assigned": false,
                "assigned_owner": Bson::Null,
                "updated_at": to_bson(&Utc::now()).unwrap_or(Bson::Null),
            }
        };

        let result = self
            .entries
            .update_one(id_filter(id), update)
            .session(&mut *tx)
            .await?;
        Ok(result.matched_count > 0)
    }

    #[instrument(skip(self, tx))]
    async fn set_active_state(
        &self,
        tx: &mut ClientSession,
        id: Uuid,
        active: bool,
    ) -> DeviceResult<bool> {
        let update = doc! {
            "$set": {
                "active": active,
                "updated_at": to_bson(&Utc::now()).unwrap_or(Bson::Null),
            }
        };

        let result = self
            .entries
            .update_one(id_filter(id), update)
            .session(&mut *tx)
            .await?;
        Ok(result.matched_count > 0)
    }
}

#[async_trait]
impl DeviceLinkStore for MongoLinkageStore {
    #[instrument(skip(self, tx))]
    async fn find_for_owner_device(
        &self,
        tx: &mut ClientSession,
        owner: Uuid,
        device: Uuid,
    ) -> DeviceResult<Option<DeviceLink>> {
        let filter = doc! { "owner": uuid_bson(&owner), "device": uuid_bson(&device) };
        let link = self.links.find_one(filter).session(&mut *tx).await?;
        Ok(link)
    }

    #[instrument(skip(self, tx))]
    async fn find_by_device(
        &self,
        tx: &mut ClientSession,
        device: Uuid,
    ) -> DeviceResult<Option<DeviceLink>> {
        let filter = doc! { "device": uuid_bson(&device) };
        let link = self.links.find_one(filter).session(&mut *tx).await?;
        Ok(link)
    }

    #[instrument(skip(self, tx, link), fields(link_id = %link.id, device = %link.device))]
    async fn insert(&self, tx: &mut ClientSession, link: &DeviceLink) -> DeviceResult<()> {
        match self.links.insert_one(link).session(&mut *tx).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(DeviceError::AlreadyLinked(link.device)),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, tx))]
    async fn update_active(
        &self,
        tx: &mut ClientSession,
        id: Uuid,
        owner: Uuid,
        active: bool,
        at: DateTime<Utc>,
    ) -> DeviceResult<Option<DeviceLink>> {
        let update = doc! {
            "$set": {
                "active": active,
                "last_activated_at": to_bson(&active.then_some(at)).unwrap_or(Bson::Null),
            }
        };

        let link = self
            .links
            .find_one_and_update(owned_filter(id, owner), update)
            .return_document(ReturnDocument::After)
            .session(&mut *tx)
            .await?;
        Ok(link)
    }

    #[instrument(skip(self, tx))]
    async fn delete_owned(
        &self,
        tx: &mut ClientSession,
        id: Uuid,
        owner: Uuid,
    ) -> DeviceResult<Option<DeviceLink>> {
        let link = self
            .links
            .find_one_and_delete(owned_filter(id, owner))
            .session(&mut *tx)
            .await?;
        Ok(link)
    }

    #[instrument(skip(self))]
    async fn list_for_owner(&self, owner: Uuid) -> DeviceResult<Vec<DeviceLink>> {
        let cursor = self
            .links
            .find(doc! { "owner": uuid_bson(&owner) })
            .sort(newest_first())
            .await?;
        Ok(cursor.try_collect().await?)
    }

    #[instrument(skip(self))]
    async fn list_all(&self) -> DeviceResult<Vec<DeviceLink>> {
        let cursor = self.links.find(doc! {}).sort(newest_first()).await?;
        Ok(cursor.try_collect().await?)
    }

    #[instrument(skip(self))]
    async fn is_linked(&self, device: Uuid) -> DeviceResult<bool> {
        let count = self
            .links
            .count_documents(doc! { "device": uuid_bson(&device) })
            .limit(1)
            .await?;
        Ok(count > 0)
    }
}

#[async_trait]
impl CatalogRepository for MongoLinkageStore {
    #[instrument(skip(self, entry), fields(entry_name = %entry.name))]
    async fn create(&self, entry: CatalogEntry) -> DeviceResult<CatalogEntry> {
        match self.entries.insert_one(&entry).await {
            Ok(_) => {
                tracing::info!(entry_id = %entry.id, is_device = entry.is_device, "Catalog entry created");
                Ok(entry)
            }
            Err(e) if is_duplicate_key(&e) => Err(DeviceError::DuplicateIdentifier(
                entry.device_identifier.unwrap_or_default(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn get_by_id(&self, id: Uuid) -> DeviceResult<Option<CatalogEntry>> {
        let entry = self.entries.find_one(id_filter(id)).await?;
        Ok(entry)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn get_many(&self, ids: Vec<Uuid>) -> DeviceResult<Vec<CatalogEntry>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Bson> = ids.iter().map(uuid_bson).collect();
        let cursor = self.entries.find(doc! { "_id": { "$in": ids } }).await?;
        Ok(cursor.try_collect().await?)
    }

    #[instrument(skip(self))]
    async fn exists_by_identifier(&self, identifier: &str) -> DeviceResult<bool> {
        let count = self
            .entries
            .count_documents(doc! { "device_identifier": identifier })
            .limit(1)
            .await?;
        Ok(count > 0)
    }
}
