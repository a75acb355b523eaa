//! The [`StoredResource`] type: a FHIR resource plus its persistence
//! metadata.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::naming;

/// A FHIR resource as it exists in a resource table: the canonical blob
/// plus the metadata columns kept alongside it.
///
/// `content` is the resource's canonical form as originally received,
/// except that `meta.versionId` / `meta.lastUpdated` are overwritten from
/// `version_id` / `last_updated` whenever a `StoredResource` is produced for
/// a caller (see [`StoredResource::with_meta_overwritten`]) — clients can
/// never mutate version or timestamp through a write.
#[derive(Debug, Clone)]
pub struct StoredResource {
    resource_type: String,
    id: String,
    version_id: u64,
    created_at: DateTime<Utc>,
    last_updated: DateTime<Utc>,
    content: Value,
}

impl StoredResource {
    /// Constructs a stored resource. `content` should already carry
    /// `resourceType`/`id` consistent with the other fields.
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        version_id: u64,
        created_at: DateTime<Utc>,
        last_updated: DateTime<Utc>,
        content: Value,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            version_id,
            created_at,
            last_updated,
            content,
        }
    }

    /// The FHIR resource type.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// The resource's logical id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The current version id (1-based, strictly increasing per instance).
    pub fn version_id(&self) -> u64 {
        self.version_id
    }

    /// When this instance's row was first inserted.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When this row was last written (create/update/patch/delete).
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// Borrows the resource content with version/timestamp fields
    /// overwritten to match the authoritative columns.
    pub fn content(&self) -> Value {
        let mut content = self.content.clone();
        if let Some(obj) = content.as_object_mut() {
            let meta = obj
                .entry("meta")
                .or_insert_with(|| Value::Object(Default::default()));
            if let Some(meta_obj) = meta.as_object_mut() {
                meta_obj.insert(
                    "versionId".to_string(),
                    Value::String(self.version_id.to_string()),
                );
                meta_obj.insert(
                    "lastUpdated".to_string(),
                    Value::String(naming::format_last_updated(self.last_updated)),
                );
            }
        }
        content
    }

    /// The raw content as stored, without the meta overwrite — used only
    /// when writing the canonical blob back to the database.
    pub fn raw_content(&self) -> &Value {
        &self.content
    }
}
