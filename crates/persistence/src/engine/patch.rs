//! Patch engine (C8, `PATCH /{Type}/{id}`).
//!
//! Two request shapes are accepted: a plain JSON object, merged over the
//! stored resource one field deep (request keys overwrite, absent keys are
//! left alone — the literal behaviour FHIR merge-patch callers expect), and
//! a JSON Patch document (RFC 6902, a JSON array of operations), applied
//! with [`json_patch`]. Either way the result becomes a full replacement
//! body and flows through [`super::update::apply_replace`], so versioning,
//! re-extraction, and rollback behave exactly as they do for `PUT`.

use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::history::HistoryOperation;
use crate::types::StoredResource;

use super::update::apply_replace;
use super::Store;

/// A parsed `PATCH` request body.
pub enum PatchInput {
    /// A plain JSON object: merged one level deep over the stored resource.
    Merge(Value),
    /// An RFC 6902 JSON Patch document.
    JsonPatch(json_patch::Patch),
}

impl PatchInput {
    /// Classifies a raw request body: a JSON array is a JSON Patch document,
    /// anything else must be a merge object.
    pub fn from_body(body: Value) -> StoreResult<Self> {
        if body.is_array() {
            let ops: json_patch::Patch = serde_json::from_value(body)
                .map_err(|e| StoreError::InvalidInput(format!("invalid JSON Patch document: {e}")))?;
            Ok(Self::JsonPatch(ops))
        } else if body.is_object() {
            Ok(Self::Merge(body))
        } else {
            Err(StoreError::InvalidInput(
                "PATCH body must be a JSON object or a JSON Patch array".to_string(),
            ))
        }
    }
}

pub(super) async fn patch(
    store: &Store,
    resource_type: &str,
    id: &str,
    input: PatchInput,
) -> StoreResult<StoredResource> {
    let existing_row = store
        .fetch_row(resource_type, id)
        .await?
        .ok_or_else(|| StoreError::not_found(resource_type, id))?;
    let current = super::row_to_resource(resource_type, &existing_row)?;
    let mut merged = current.raw_content().clone();

    match input {
        PatchInput::Merge(patch_body) => {
            let patch_obj = patch_body
                .as_object()
                .ok_or_else(|| StoreError::InvalidInput("merge patch body must be a JSON object".to_string()))?;
            let target = merged
                .as_object_mut()
                .ok_or_else(|| StoreError::Internal("stored resource is not a JSON object".to_string()))?;
            for (key, value) in patch_obj {
                target.insert(key.clone(), value.clone());
            }
        }
        PatchInput::JsonPatch(ops) => {
            json_patch::patch(&mut merged, &ops).map_err(|e| StoreError::InvalidInput(format!("invalid JSON Patch: {e}")))?;
        }
    }

    merged
        .as_object_mut()
        .ok_or_else(|| StoreError::Internal("patched resource is not a JSON object".to_string()))?
        .insert("id".to_string(), Value::String(id.to_string()));

    apply_replace(store, resource_type, id, merged, HistoryOperation::Patch).await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use crate::backends::sqlite::SqliteBackend;
    use crate::engine::{PatchInput, Store, StoreConfig};

    async fn store() -> Store {
        let backend = Arc::new(SqliteBackend::in_memory().unwrap());
        let store = Store::new(backend, StoreConfig::default());
        store.bootstrap().await.unwrap();
        store
    }

    #[tokio::test]
    async fn merge_patch_overwrites_top_level_keys_only() {
        let store = store().await;
        let created = store
            .create(
                "Patient",
                json!({"resourceType": "Patient", "gender": "male", "name": [{"family": "Doe"}]}),
            )
            .await
            .unwrap();
        let patched = store
            .patch(
                "Patient",
                created.id(),
                PatchInput::from_body(json!({"gender": "female"})).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(patched.content()["gender"], "female");
        assert_eq!(patched.content()["name"][0]["family"], "Doe");
        assert_eq!(patched.version_id(), 2);
    }

    #[tokio::test]
    async fn json_patch_array_applies_rfc6902_operations() {
        let store = store().await;
        let created = store
            .create("Patient", json!({"resourceType": "Patient", "gender": "male"}))
            .await
            .unwrap();
        let ops = json!([{"op": "replace", "path": "/gender", "value": "other"}]);
        let patched = store
            .patch("Patient", created.id(), PatchInput::from_body(ops).unwrap())
            .await
            .unwrap();
        assert_eq!(patched.content()["gender"], "other");
    }
}
