//! The per-request compensating-transaction controller (C7).
//!
//! There is no multi-statement database transaction wrapping a write: each
//! statement (blob upsert, column upsert, edge insert, history append)
//! commits as it runs. Instead, every write operation builds a
//! [`TransactionContext`] up front — a record of what would need to be
//! undone — and, if a later step fails, drives the context's rollback
//! protocol to restore the prior state statement by statement. A rollback
//! step that itself fails is logged and the remaining steps still run, so
//! one stuck statement doesn't leave the rest of the compensation undone.

use crate::error::StoreResult;
use crate::references::ReferenceEdge;
use crate::types::StoredResource;

/// What kind of write this context is compensating for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    /// A brand new resource: rollback means deleting everything that was
    /// written, since nothing existed before.
    Create,
    /// A replace of an existing resource: rollback means restoring the
    /// prior row, prior edges, and removing the new history entry.
    Update,
    /// A delete of an existing resource: rollback means re-inserting the
    /// backup row and every backed-up edge.
    Delete,
}

/// Accumulated undo state for one write operation.
pub struct TransactionContext {
    kind: TransactionKind,
    resource_type: String,
    id: String,
    /// The version id this operation assigned (create/update) or removed
    /// (delete).
    version_id: u64,
    /// Edge primary keys inserted by this operation (create/update),
    /// pending rollback-time deletion.
    inserted_edge_ids: Vec<i64>,
    /// The resource row as it stood before this operation (update/delete
    /// only).
    backup_resource: Option<StoredResource>,
    /// Edges as they stood before this operation (update/delete only).
    backup_edges: Vec<ReferenceEdge>,
    committed: bool,
}

impl TransactionContext {
    /// Starts a context for a create: there is no prior state to back up.
    pub fn for_create(resource_type: impl Into<String>, id: impl Into<String>, version_id: u64) -> Self {
        Self {
            kind: TransactionKind::Create,
            resource_type: resource_type.into(),
            id: id.into(),
            version_id,
            inserted_edge_ids: Vec::new(),
            backup_resource: None,
            backup_edges: Vec::new(),
            committed: false,
        }
    }

    /// Starts a context for an update, capturing the resource's prior row
    /// and prior outgoing edges.
    pub fn for_update(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        version_id: u64,
        backup_resource: StoredResource,
        backup_edges: Vec<ReferenceEdge>,
    ) -> Self {
        Self {
            kind: TransactionKind::Update,
            resource_type: resource_type.into(),
            id: id.into(),
            version_id,
            inserted_edge_ids: Vec::new(),
            backup_resource: Some(backup_resource),
            backup_edges,
            committed: false,
        }
    }

    /// Starts a context for a delete, capturing the resource's last live
    /// row and its outgoing edges.
    pub fn for_delete(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        version_id: u64,
        backup_resource: StoredResource,
        backup_edges: Vec<ReferenceEdge>,
    ) -> Self {
        Self {
            kind: TransactionKind::Delete,
            resource_type: resource_type.into(),
            id: id.into(),
            version_id,
            inserted_edge_ids: Vec::new(),
            backup_resource: Some(backup_resource),
            backup_edges,
            committed: false,
        }
    }

    /// Records an edge id inserted during this operation, so rollback
    /// knows to delete it.
    pub fn record_inserted_edge(&mut self, edge_id: i64) {
        self.inserted_edge_ids.push(edge_id);
    }

    /// Marks the operation as having fully succeeded; rollback becomes a
    /// no-op from this point.
    pub fn commit(mut self) {
        self.committed = true;
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version_id(&self) -> u64 {
        self.version_id
    }

    /// Extracts every field by value for rollback, bypassing the `Drop`
    /// impl's "dropped without commit" warning since rollback is itself the
    /// explicit handling the warning exists to detect the absence of.
    fn take_parts(
        mut self,
    ) -> (
        String,
        String,
        u64,
        Vec<i64>,
        Option<StoredResource>,
        Vec<ReferenceEdge>,
    ) {
        self.committed = true;
        (
            std::mem::take(&mut self.resource_type),
            std::mem::take(&mut self.id),
            self.version_id,
            std::mem::take(&mut self.inserted_edge_ids),
            self.backup_resource.take(),
            std::mem::take(&mut self.backup_edges),
        )
    }
}

impl Drop for TransactionContext {
    fn drop(&mut self) {
        if !self.committed {
            tracing::warn!(
                resource_type = %self.resource_type,
                id = %self.id,
                kind = ?self.kind,
                "transaction context dropped without commit or explicit rollback",
            );
        }
    }
}

/// Undoes a create: delete the just-inserted row, its history entry, and
/// every edge it produced.
pub async fn rollback_create(
    ctx: TransactionContext,
    history: &crate::history::HistoryStore,
    references: &crate::references::ReferenceStore,
    delete_row: impl std::future::Future<Output = StoreResult<()>>,
) {
    let (resource_type, id, version_id, inserted_edge_ids, _backup_resource, _backup_edges) = ctx.take_parts();

    if let Err(err) = delete_row.await {
        tracing::error!(resource_type, id, error = %err, "rollback: failed to delete row after failed create");
    }
    if let Err(err) = history.remove(&resource_type, &id, version_id).await {
        tracing::error!(resource_type, id, version_id, error = %err, "rollback: failed to remove history entry after failed create");
    }
    for edge_id in inserted_edge_ids {
        if let Err(err) = references.delete_edge_by_id(edge_id).await {
            tracing::error!(resource_type, id, edge_id, error = %err, "rollback: failed to delete edge after failed create");
        }
    }
}

/// Undoes an update: restore the backed-up row and history state, delete
/// the edges the failed update inserted, and restore the edges it removed.
pub async fn rollback_update(
    ctx: TransactionContext,
    history: &crate::history::HistoryStore,
    references: &crate::references::ReferenceStore,
    restore_row: impl std::future::Future<Output = StoreResult<()>>,
) {
    let (resource_type, id, version_id, inserted_edge_ids, _backup_resource, backup_edges) = ctx.take_parts();

    if let Err(err) = restore_row.await {
        tracing::error!(resource_type, id, error = %err, "rollback: failed to restore row after failed update");
    }
    if let Err(err) = history.remove(&resource_type, &id, version_id).await {
        tracing::error!(resource_type, id, version_id, error = %err, "rollback: failed to remove history entry after failed update");
    }
    for edge_id in inserted_edge_ids {
        if let Err(err) = references.delete_edge_by_id(edge_id).await {
            tracing::error!(resource_type, id, edge_id, error = %err, "rollback: failed to delete new edge after failed update");
        }
    }
    for edge in backup_edges {
        if let Err(err) = references.restore_edge(&edge).await {
            tracing::error!(resource_type, id, edge_id = edge.id, error = %err, "rollback: failed to restore prior edge after failed update");
        }
    }
}

/// Undoes a delete: restore the backed-up row and every backed-up edge,
/// then remove the delete's history entry.
pub async fn rollback_delete(
    ctx: TransactionContext,
    history: &crate::history::HistoryStore,
    references: &crate::references::ReferenceStore,
    restore_row: impl std::future::Future<Output = StoreResult<()>>,
) {
    let (resource_type, id, version_id, _inserted_edge_ids, _backup_resource, backup_edges) = ctx.take_parts();

    if let Err(err) = restore_row.await {
        tracing::error!(resource_type, id, error = %err, "rollback: failed to restore row after failed delete");
    }
    if let Err(err) = history.remove(&resource_type, &id, version_id).await {
        tracing::error!(resource_type, id, version_id, error = %err, "rollback: failed to remove history entry after failed delete");
    }
    for edge in backup_edges {
        if let Err(err) = references.restore_edge(&edge).await {
            tracing::error!(resource_type, id, edge_id = edge.id, error = %err, "rollback: failed to restore edge after failed delete");
        }
    }
}
