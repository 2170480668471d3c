//! Property graph types.
//!
//! Nodes are identified by their [`NodeKey`]; the [`NodeId`] is derived
//! from the key so the same record always lands on the same node, no matter
//! which matching stage writes it first.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::{RecordKind, Source};

/// Marker label for aggregate nodes that collect split proceedings.
pub const VIRTUAL_LABEL: &str = "Virtual";

/// Stable node identifier, derived from the node key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Derives the identifier for a key (UUID v5).
    #[must_use]
    pub fn for_key(key: &NodeKey) -> Self {
        let name = format!("{}/{}/{}", key.source, key.kind, key.key);
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Merge key of a node: source label, kind label and record key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeKey {
    /// Source label.
    pub source: Source,
    /// Kind label.
    pub kind: RecordKind,
    /// Record key within the source.
    pub key: String,
}

impl NodeKey {
    /// Creates a node key.
    #[must_use]
    pub fn new(source: Source, kind: RecordKind, key: impl Into<String>) -> Self {
        Self {
            source,
            kind,
            key: key.into(),
        }
    }

    /// Returns the derived node identifier.
    #[must_use]
    pub fn id(&self) -> NodeId {
        NodeId::for_key(self)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}({})", self.source, self.kind, self.key)
    }
}

/// A node in the evidence graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Derived identifier.
    pub id: NodeId,
    /// Merge key.
    pub key: NodeKey,
    /// Marker labels applied after creation, e.g. [`VIRTUAL_LABEL`].
    #[serde(default)]
    pub markers: BTreeSet<String>,
    /// Node properties.
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl GraphNode {
    /// Creates a node without markers.
    #[must_use]
    pub fn new(key: NodeKey, properties: BTreeMap<String, serde_json::Value>) -> Self {
        Self {
            id: key.id(),
            key,
            markers: BTreeSet::new(),
            properties,
        }
    }

    /// Returns the node's source.
    #[must_use]
    pub fn source(&self) -> Source {
        self.key.source
    }

    /// Returns true if the node carries the given label, implicit or marker.
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.key.source.label() == label
            || self.key.kind.to_string() == label
            || self.markers.contains(label)
    }

    /// Returns true if the node has been marked virtual.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.markers.contains(VIRTUAL_LABEL)
    }

    /// Returns a property as a string, if it is one.
    #[must_use]
    pub fn str_property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(serde_json::Value::as_str)
    }
}

/// Relationship kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum RelKind {
    /// Weak, heuristic evidence.
    Matches,
    /// Asserted equivalence; authoritative.
    Linked,
    /// Any other caller-chosen verb, stored upper-case.
    Custom(String),
}

impl RelKind {
    /// Creates a kind from a verb, case-insensitively.
    #[must_use]
    pub fn from_verb(verb: &str) -> Self {
        let upper = verb.trim().to_ascii_uppercase();
        match upper.as_str() {
            "MATCHES" => Self::Matches,
            "LINKED" => Self::Linked,
            _ => Self::Custom(upper),
        }
    }

    /// Returns the stored verb.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Matches => "MATCHES",
            Self::Linked => "LINKED",
            Self::Custom(verb) => verb,
        }
    }
}

impl Default for RelKind {
    fn default() -> Self {
        Self::Matches
    }
}

impl fmt::Display for RelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for RelKind {
    fn from(verb: String) -> Self {
        Self::from_verb(&verb)
    }
}

impl From<RelKind> for String {
    fn from(kind: RelKind) -> Self {
        kind.as_str().to_string()
    }
}

/// A directed relationship. Also its own merge key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Tail node.
    pub from: NodeId,
    /// Head node.
    pub to: NodeId,
    /// Relationship kind.
    pub kind: RelKind,
}

impl GraphEdge {
    /// Creates an edge.
    #[must_use]
    pub fn new(from: NodeId, to: NodeId, kind: RelKind) -> Self {
        Self { from, to, kind }
    }

    /// Returns the same edge pointing the other way.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self::new(self.to, self.from, self.kind.clone())
    }
}

/// A node to upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDraft {
    /// Merge key.
    pub key: NodeKey,
    /// Properties merged onto the node; existing properties are overwritten.
    pub properties: BTreeMap<String, serde_json::Value>,
}

/// A relationship to upsert, addressed by endpoint keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationshipDraft {
    /// Tail node key.
    pub from: NodeKey,
    /// Head node key.
    pub to: NodeKey,
    /// Relationship kind.
    pub kind: RelKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_is_deterministic() {
        let a = NodeKey::new(Source::CeurWs, RecordKind::Workshop, "76");
        let b = NodeKey::new(Source::CeurWs, RecordKind::Workshop, "76");
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_node_id_separates_sources() {
        let a = NodeKey::new(Source::Wikidata, RecordKind::Conference, "x");
        let b = NodeKey::new(Source::Dblp, RecordKind::Conference, "x");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_rel_kind_from_verb() {
        assert_eq!(RelKind::from_verb("linked"), RelKind::Linked);
        assert_eq!(RelKind::from_verb("Matches"), RelKind::Matches);
        assert_eq!(RelKind::from_verb("cites"), RelKind::Custom("CITES".to_string()));
        assert_eq!(RelKind::default(), RelKind::Matches);
    }

    #[test]
    fn test_rel_kind_serde_roundtrip() {
        let json = serde_json::to_string(&RelKind::Linked).unwrap();
        assert_eq!(json, "\"LINKED\"");
        let back: RelKind = serde_json::from_str("\"linked\"").unwrap();
        assert_eq!(back, RelKind::Linked);
    }

    #[test]
    fn test_has_label() {
        let mut node = GraphNode::new(
            NodeKey::new(Source::Dblp, RecordKind::Conference, "conf/esws/2010"),
            BTreeMap::new(),
        );
        assert!(node.has_label("Dblp"));
        assert!(node.has_label("conference"));
        assert!(!node.is_virtual());
        node.markers.insert(VIRTUAL_LABEL.to_string());
        assert!(node.has_label(VIRTUAL_LABEL));
        assert!(node.is_virtual());
    }
}
