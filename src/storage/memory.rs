//! In-memory storage backend.
//!
//! This module provides thread-safe in-memory implementations of the storage traits.
//! It is intended for embedded usage, tests, and as a reference implementation
//! of the merge semantics a graph database provides.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use crate::conflict::{ConflictId, ConflictRecord};
use crate::graph::{GraphEdge, GraphNode, NodeDraft, NodeId, NodeKey, RelKind, RelationshipDraft};
use crate::record::Source;
use crate::storage::traits::{ConflictStore, GraphStore, StorageError};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::BackendError(format!("poisoned lock: {context}"))
}

#[derive(Debug, Default)]
struct GraphState {
    nodes: HashMap<NodeId, GraphNode>,
    edges: BTreeSet<GraphEdge>,
    outgoing: HashMap<NodeId, BTreeSet<GraphEdge>>,
    incoming: HashMap<NodeId, BTreeSet<GraphEdge>>,
}

impl GraphState {
    fn insert_edge(&mut self, edge: GraphEdge) -> bool {
        if !self.edges.insert(edge.clone()) {
            return false;
        }
        self.outgoing.entry(edge.from).or_default().insert(edge.clone());
        self.incoming.entry(edge.to).or_default().insert(edge);
        true
    }

    fn remove_edge(&mut self, edge: &GraphEdge) -> bool {
        if !self.edges.remove(edge) {
            return false;
        }
        if let Some(set) = self.outgoing.get_mut(&edge.from) {
            set.remove(edge);
            if set.is_empty() {
                self.outgoing.remove(&edge.from);
            }
        }
        if let Some(set) = self.incoming.get_mut(&edge.to) {
            set.remove(edge);
            if set.is_empty() {
                self.incoming.remove(&edge.to);
            }
        }
        true
    }
}

fn filter_kind(edges: Option<&BTreeSet<GraphEdge>>, kind: Option<&RelKind>) -> Vec<GraphEdge> {
    edges
        .map(|set| {
            set.iter()
                .filter(|e| kind.map_or(true, |k| &e.kind == k))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// Thread-safe in-memory graph store.
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    state: RwLock<GraphState>,
}

impl InMemoryGraphStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl GraphStore for InMemoryGraphStore {
    fn merge_nodes(&self, nodes: Vec<NodeDraft>) -> Result<Vec<NodeId>, StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("graph.merge_nodes"))?;

        // Validate the whole batch before touching state.
        for draft in &nodes {
            let id = draft.key.id();
            if let Some(existing) = state.nodes.get(&id) {
                if existing.key != draft.key {
                    return Err(StorageError::BackendError(format!(
                        "node id collision between {} and {}",
                        existing.key, draft.key
                    )));
                }
            }
        }

        let mut ids = Vec::with_capacity(nodes.len());
        for draft in nodes {
            let id = draft.key.id();
            match state.nodes.get_mut(&id) {
                Some(node) => node.properties.extend(draft.properties),
                None => {
                    state.nodes.insert(id, GraphNode::new(draft.key, draft.properties));
                }
            }
            ids.push(id);
        }
        Ok(ids)
    }

    fn merge_relationships(
        &self,
        relationships: Vec<RelationshipDraft>,
    ) -> Result<usize, StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("graph.merge_relationships"))?;

        let mut edges = Vec::with_capacity(relationships.len());
        for draft in &relationships {
            for key in [&draft.from, &draft.to] {
                if !state.nodes.contains_key(&key.id()) {
                    return Err(StorageError::NodeNotFound(key.to_string()));
                }
            }
            edges.push(GraphEdge::new(draft.from.id(), draft.to.id(), draft.kind.clone()));
        }

        let mut created = 0;
        for edge in edges {
            if state.insert_edge(edge) {
                created += 1;
            }
        }
        Ok(created)
    }

    fn node(&self, id: NodeId) -> Result<Option<GraphNode>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("graph.node"))?;
        Ok(state.nodes.get(&id).cloned())
    }

    fn find_node(&self, key: &NodeKey) -> Result<Option<GraphNode>, StorageError> {
        self.node(key.id())
    }

    fn nodes_by_source(&self, source: Source) -> Result<Vec<GraphNode>, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("graph.nodes_by_source"))?;
        let mut nodes: Vec<GraphNode> = state
            .nodes
            .values()
            .filter(|n| n.key.source == source)
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(nodes)
    }

    fn relationships(&self, kind: &RelKind) -> Result<Vec<GraphEdge>, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("graph.relationships"))?;
        Ok(state.edges.iter().filter(|e| &e.kind == kind).cloned().collect())
    }

    fn outgoing(&self, id: NodeId, kind: Option<&RelKind>) -> Result<Vec<GraphEdge>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("graph.outgoing"))?;
        Ok(filter_kind(state.outgoing.get(&id), kind))
    }

    fn incoming(&self, id: NodeId, kind: Option<&RelKind>) -> Result<Vec<GraphEdge>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("graph.incoming"))?;
        Ok(filter_kind(state.incoming.get(&id), kind))
    }

    fn add_label(&self, ids: &[NodeId], label: &str) -> Result<usize, StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("graph.add_label"))?;

        if let Some(missing) = ids.iter().find(|id| !state.nodes.contains_key(id)) {
            return Err(StorageError::NodeNotFound(missing.to_string()));
        }

        let mut added = 0;
        for id in ids {
            if let Some(node) = state.nodes.get_mut(id) {
                if node.markers.insert(label.to_string()) {
                    added += 1;
                }
            }
        }
        Ok(added)
    }

    fn delete_relationships(&self, edges: &[GraphEdge]) -> Result<usize, StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("graph.delete_relationships"))?;
        Ok(edges.iter().filter(|e| state.remove_edge(e)).count())
    }

    fn node_count(&self) -> Result<usize, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("graph.node_count"))?;
        Ok(state.nodes.len())
    }

    fn relationship_count(&self) -> Result<usize, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("graph.relationship_count"))?;
        Ok(state.edges.len())
    }
}

#[derive(Debug, Default)]
struct ConflictState {
    by_id: BTreeMap<ConflictId, ConflictRecord>,
    by_target: HashMap<NodeKey, Vec<ConflictId>>,
}

/// Thread-safe in-memory conflict store.
#[derive(Debug, Default)]
pub struct InMemoryConflictStore {
    state: RwLock<ConflictState>,
}

impl InMemoryConflictStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConflictStore for InMemoryConflictStore {
    fn insert(&self, conflict: ConflictRecord) -> Result<bool, StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("conflict.insert"))?;

        if state.by_id.contains_key(&conflict.id) {
            return Ok(false);
        }

        state
            .by_target
            .entry(conflict.target.clone())
            .or_default()
            .push(conflict.id);
        state.by_id.insert(conflict.id, conflict);
        Ok(true)
    }

    fn get(&self, id: ConflictId) -> Result<Option<ConflictRecord>, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("conflict.get"))?;
        Ok(state.by_id.get(&id).cloned())
    }

    fn update(&self, conflict: ConflictRecord) -> Result<(), StorageError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("conflict.update"))?;

        let slot = state
            .by_id
            .get_mut(&conflict.id)
            .ok_or(StorageError::ConflictNotFound(conflict.id))?;
        if slot.target != conflict.target {
            return Err(StorageError::BackendError(format!(
                "conflict {} cannot change its target",
                conflict.id
            )));
        }
        *slot = conflict;
        Ok(())
    }

    fn find_by_target(&self, target: &NodeKey) -> Result<Vec<ConflictRecord>, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("conflict.find_by_target"))?;
        Ok(state
            .by_target
            .get(target)
            .map(|ids| ids.iter().filter_map(|id| state.by_id.get(id).cloned()).collect())
            .unwrap_or_default())
    }

    fn find_open(&self) -> Result<Vec<ConflictRecord>, StorageError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("conflict.find_open"))?;
        Ok(state.by_id.values().filter(|c| c.is_open()).cloned().collect())
    }
}

/// Convenience bundle of shared in-memory stores.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStores {
    /// Graph store.
    pub graph: Arc<InMemoryGraphStore>,
    /// Conflict store.
    pub conflicts: Arc<InMemoryConflictStore>,
}

impl InMemoryStores {
    /// Create a new bundle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::conflict::ConflictStatus;
    use crate::record::RecordKind;

    fn ceur(key: &str) -> NodeKey {
        NodeKey::new(Source::CeurWs, RecordKind::Workshop, key)
    }

    fn wikidata(key: &str) -> NodeKey {
        NodeKey::new(Source::Wikidata, RecordKind::Conference, key)
    }

    fn draft(key: NodeKey, props: &[(&str, serde_json::Value)]) -> NodeDraft {
        NodeDraft {
            key,
            properties: props.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect(),
        }
    }

    #[test]
    fn graph_merge_nodes_is_idempotent_and_merges_properties() {
        let store = InMemoryGraphStore::new();
        store
            .merge_nodes(vec![draft(wikidata("Q1"), &[("title", "VLDB".into())])])
            .unwrap();
        store
            .merge_nodes(vec![
                draft(wikidata("Q1"), &[("year", 2003.into())]),
                draft(wikidata("Q1"), &[]),
            ])
            .unwrap();

        assert_eq!(store.node_count().unwrap(), 1);
        let node = store.find_node(&wikidata("Q1")).unwrap().unwrap();
        assert_eq!(node.properties["title"], "VLDB");
        assert_eq!(node.properties["year"], 2003);
    }

    #[test]
    fn graph_merge_relationships_deduplicates() {
        let store = InMemoryGraphStore::new();
        store
            .merge_nodes(vec![draft(ceur("76"), &[]), draft(wikidata("Q1"), &[])])
            .unwrap();

        let rel = RelationshipDraft {
            from: ceur("76"),
            to: wikidata("Q1"),
            kind: RelKind::Matches,
        };
        assert_eq!(store.merge_relationships(vec![rel.clone(), rel.clone()]).unwrap(), 1);
        assert_eq!(store.merge_relationships(vec![rel]).unwrap(), 0);
        assert_eq!(store.relationship_count().unwrap(), 1);

        let out = store.outgoing(ceur("76").id(), Some(&RelKind::Matches)).unwrap();
        assert_eq!(out.len(), 1);
        assert!(store.outgoing(ceur("76").id(), Some(&RelKind::Linked)).unwrap().is_empty());
        assert_eq!(store.incoming(wikidata("Q1").id(), None).unwrap().len(), 1);
    }

    #[test]
    fn graph_relationship_batch_is_all_or_nothing() {
        let store = InMemoryGraphStore::new();
        store
            .merge_nodes(vec![draft(ceur("76"), &[]), draft(wikidata("Q1"), &[])])
            .unwrap();

        let good = RelationshipDraft {
            from: ceur("76"),
            to: wikidata("Q1"),
            kind: RelKind::Matches,
        };
        let bad = RelationshipDraft {
            from: ceur("76"),
            to: wikidata("Q404"),
            kind: RelKind::Matches,
        };
        let err = store.merge_relationships(vec![good, bad]).unwrap_err();
        assert!(matches!(err, StorageError::NodeNotFound(_)));
        assert_eq!(store.relationship_count().unwrap(), 0);
    }

    #[test]
    fn graph_labels_and_deletes() {
        let store = InMemoryGraphStore::new();
        store
            .merge_nodes(vec![draft(ceur("76"), &[]), draft(wikidata("Q1"), &[])])
            .unwrap();
        let id = wikidata("Q1").id();
        assert_eq!(store.add_label(&[id], "Virtual").unwrap(), 1);
        assert_eq!(store.add_label(&[id], "Virtual").unwrap(), 0);
        assert!(store.node(id).unwrap().unwrap().is_virtual());
        assert!(store.add_label(&[wikidata("Q404").id()], "Virtual").is_err());

        store
            .merge_relationships(vec![RelationshipDraft {
                from: ceur("76"),
                to: wikidata("Q1"),
                kind: RelKind::Matches,
            }])
            .unwrap();
        let edges = store.relationships(&RelKind::Matches).unwrap();
        assert_eq!(store.delete_relationships(&edges).unwrap(), 1);
        assert_eq!(store.delete_relationships(&edges).unwrap(), 0);
        assert!(store.outgoing(ceur("76").id(), None).unwrap().is_empty());
        assert!(store.incoming(id, None).unwrap().is_empty());
    }

    #[test]
    fn graph_nodes_by_source_are_sorted() {
        let store = InMemoryGraphStore::new();
        store
            .merge_nodes(vec![
                draft(wikidata("Q2"), &[]),
                draft(ceur("1"), &[]),
                draft(wikidata("Q1"), &[]),
            ])
            .unwrap();
        let nodes = store.nodes_by_source(Source::Wikidata).unwrap();
        let keys: Vec<&str> = nodes.iter().map(|n| n.key.key.as_str()).collect();
        assert_eq!(keys, vec!["Q1", "Q2"]);
    }

    #[test]
    fn conflict_insert_is_idempotent_and_indexed() {
        let store = InMemoryConflictStore::new();
        let target = NodeKey::new(Source::Dblp, RecordKind::Conference, "d");
        let conflict =
            ConflictRecord::new(target.clone(), wikidata("Q1"), wikidata("Q2"), Vec::new());
        let id = conflict.id;

        assert!(store.insert(conflict.clone()).unwrap());
        assert!(!store.insert(conflict).unwrap());
        assert_eq!(store.find_by_target(&target).unwrap().len(), 1);
        assert_eq!(store.find_open().unwrap().len(), 1);

        let mut reviewed = store.get(id).unwrap().unwrap();
        reviewed.dismiss();
        store.update(reviewed).unwrap();
        assert!(store.find_open().unwrap().is_empty());
        assert_eq!(store.get(id).unwrap().unwrap().status, ConflictStatus::Dismissed);
    }

    #[test]
    fn conflict_update_requires_existing() {
        let store = InMemoryConflictStore::new();
        let target = NodeKey::new(Source::Dblp, RecordKind::Conference, "d");
        let conflict = ConflictRecord::new(target, wikidata("Q1"), wikidata("Q2"), Vec::new());
        assert!(matches!(store.update(conflict), Err(StorageError::ConflictNotFound(_))));
    }
}
