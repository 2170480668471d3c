//! Abstract storage traits for coloc.
//!
//! These traits define the contract that graph and conflict backends must
//! implement. The in-memory backend serves tests and embedded use; a
//! database-backed store implements the same contract.

use thiserror::Error;

use crate::conflict::{ConflictId, ConflictRecord};
use crate::graph::{GraphEdge, GraphNode, NodeDraft, NodeId, NodeKey, RelKind, RelationshipDraft};
use crate::record::Source;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Node not found.
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Conflict not found.
    #[error("Conflict not found: {0}")]
    ConflictNotFound(ConflictId),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Connection failed.
    #[error("Connection error: {0}")]
    ConnectionError(String),
}

/// Storage trait for the evidence graph.
///
/// # Merge semantics
/// - Nodes are merged by [`NodeKey`]; relationships by `(from, to, kind)`.
///   Repeating a merge never creates a duplicate.
/// - One call to `merge_nodes` or `merge_relationships` is one transaction:
///   it applies completely or not at all.
pub trait GraphStore: Send + Sync {
    /// Upsert a batch of nodes, merging properties into existing ones.
    ///
    /// Returns the ids of the nodes in input order.
    fn merge_nodes(&self, nodes: Vec<NodeDraft>) -> Result<Vec<NodeId>, StorageError>;

    /// Upsert a batch of relationships between existing nodes.
    ///
    /// Returns the number of relationships actually created. Fails without
    /// applying anything if any endpoint is missing.
    fn merge_relationships(
        &self,
        relationships: Vec<RelationshipDraft>,
    ) -> Result<usize, StorageError>;

    /// Get a node by id.
    fn node(&self, id: NodeId) -> Result<Option<GraphNode>, StorageError>;

    /// Get a node by key.
    fn find_node(&self, key: &NodeKey) -> Result<Option<GraphNode>, StorageError>;

    /// All nodes of a source, ordered by key.
    fn nodes_by_source(&self, source: Source) -> Result<Vec<GraphNode>, StorageError>;

    /// All relationships of a kind, ordered.
    fn relationships(&self, kind: &RelKind) -> Result<Vec<GraphEdge>, StorageError>;

    /// Outgoing relationships of a node, optionally restricted to a kind.
    fn outgoing(&self, id: NodeId, kind: Option<&RelKind>) -> Result<Vec<GraphEdge>, StorageError>;

    /// Incoming relationships of a node, optionally restricted to a kind.
    fn incoming(&self, id: NodeId, kind: Option<&RelKind>) -> Result<Vec<GraphEdge>, StorageError>;

    /// Add a marker label to nodes. Returns how many nodes newly gained it.
    fn add_label(&self, ids: &[NodeId], label: &str) -> Result<usize, StorageError>;

    /// Delete relationships. Missing ones are ignored; returns how many were removed.
    fn delete_relationships(&self, edges: &[GraphEdge]) -> Result<usize, StorageError>;

    /// Count all nodes.
    fn node_count(&self) -> Result<usize, StorageError>;

    /// Count all relationships.
    fn relationship_count(&self) -> Result<usize, StorageError>;
}

/// Storage trait for conflict records awaiting manual review.
pub trait ConflictStore: Send + Sync {
    /// Insert a conflict. Returns false if a conflict with the same id exists.
    fn insert(&self, conflict: ConflictRecord) -> Result<bool, StorageError>;

    /// Get a conflict by ID.
    fn get(&self, id: ConflictId) -> Result<Option<ConflictRecord>, StorageError>;

    /// Update conflict status.
    fn update(&self, conflict: ConflictRecord) -> Result<(), StorageError>;

    /// Find conflicts about a target node.
    fn find_by_target(&self, target: &NodeKey) -> Result<Vec<ConflictRecord>, StorageError>;

    /// Find all open (unreviewed) conflicts.
    fn find_open(&self) -> Result<Vec<ConflictRecord>, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test: ensure traits are object-safe
    fn _assert_graph_store_object_safe(_: &dyn GraphStore) {}
    fn _assert_conflict_store_object_safe(_: &dyn ConflictStore) {}

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::NodeNotFound("Dblp:conference(x)".to_string());
        assert!(err.to_string().contains("Node not found"));

        let err = StorageError::BackendError("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));
    }
}
