use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Catalog entry, optionally a physical terrarium device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CatalogEntry {
    /// Unique identifier (stored as _id in MongoDB)
    #[serde(rename = "_id", alias = "id")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Only device entries can be linked to an owner
    #[serde(default)]
    pub is_device: bool,
    /// Stable hardware id; omitted for non-devices so the sparse index skips them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_identifier: Option<String>,
    /// True while a link references this entry
    #[serde(default)]
    pub assigned: bool,
    /// Owner of the current link. Lookup only; the link is authoritative.
    #[serde(default)]
    pub assigned_owner: Option<Uuid>,
    /// Device-level activity state, mirrored from the link
    #[serde(default)]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogEntry {
    pub fn new(input: RegisterEntry) -> Self {
        let now = Utc::now();
        let device_identifier = if input.is_device {
            input
                .device_identifier
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
        } else {
            None
        };

        Self {
            id: Uuid::now_v7(),
            name: input.name.trim().to_string(),
            description: input.description,
            is_device: input.is_device,
            device_identifier,
            assigned: false,
            assigned_owner: None,
            active: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The binding of one owner to one device entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeviceLink {
    #[serde(rename = "_id", alias = "id")]
    pub id: Uuid,
    pub owner: Uuid,
    /// CatalogEntry id; unique across all links
    pub device: Uuid,
    /// Hardware id copied from the entry at bind time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_identifier: Option<String>,
    #[serde(default)]
    pub active: bool,
    /// Set when the link becomes active, cleared when it is deactivated
    #[serde(default)]
    pub last_activated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DeviceLink {
    /// New inactive link. Ids are UUIDv7, so they sort by creation time.
    pub fn new(owner: Uuid, entry: &CatalogEntry) -> Self {
        Self {
            id: Uuid::now_v7(),
            owner,
            device: entry.id,
            device_identifier: entry.device_identifier.clone(),
            active: false,
            last_activated_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_active(mut self, active: bool, at: DateTime<Utc>) -> Self {
        self.active = active;
        self.last_activated_at = active.then_some(at);
        self
    }
}

/// Whether a listed link could be joined with its catalog entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LinkStatus {
    Ok,
    /// The referenced catalog entry no longer exists
    DeviceMissing,
}

/// Display fields of the linked entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeviceSummary {
    pub name: String,
    pub description: String,
    pub device_identifier: Option<String>,
    pub active: bool,
}

impl From<&CatalogEntry> for DeviceSummary {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            name: entry.name.clone(),
            description: entry.description.clone(),
            device_identifier: entry.device_identifier.clone(),
            active: entry.active,
        }
    }
}

/// A link joined with its catalog entry, as returned to the owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LinkView {
    pub link_id: Uuid,
    pub device_id: Uuid,
    pub active: bool,
    pub last_activated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub status: LinkStatus,
    /// Absent when `status` is `device_missing`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceSummary>,
}

impl LinkView {
    pub fn joined(link: &DeviceLink, entry: Option<&CatalogEntry>) -> Self {
        Self {
            link_id: link.id,
            device_id: link.device,
            active: link.active,
            last_activated_at: link.last_activated_at,
            created_at: link.created_at,
            status: if entry.is_some() {
                LinkStatus::Ok
            } else {
                LinkStatus::DeviceMissing
            },
            device: entry.map(DeviceSummary::from),
        }
    }
}

/// Body of `POST /links`.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct BindDevice {
    /// Catalog entry to bind; absence is rejected with MISSING_INPUT
    #[serde(default)]
    pub device_id: Option<Uuid>,
}

/// Body of `PATCH /links/{id}`.
#[derive(Debug, Clone, Copy, Deserialize, Validate, ToSchema)]
pub struct SetActive {
    pub active: bool,
}

/// Body of `POST /catalog`.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_device_identifier"))]
pub struct RegisterEntry {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: String,
    #[serde(default)]
    pub is_device: bool,
    /// Required when `is_device` is true
    #[serde(default)]
    #[validate(length(max = 64))]
    pub device_identifier: Option<String>,
}

fn validate_device_identifier(input: &RegisterEntry) -> Result<(), ValidationError> {
    let present = input
        .device_identifier
        .as_deref()
        .is_some_and(|id| !id.trim().is_empty());

    if input.is_device && !present {
        let mut err = ValidationError::new("device_identifier_required");
        err.message = Some("device_identifier is required for IoT devices".into());
        return Err(err);
    }
    Ok(())
}

/// Answer of the availability check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Availability {
    pub device_id: Uuid,
    pub device_identifier: Option<String>,
    pub available: bool,
}
