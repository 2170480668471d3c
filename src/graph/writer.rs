//! Graph mutation protocol.
//!
//! Turns a table of paired rows into merged nodes and relationships. Every
//! call is an idempotent merge, so separate matching stages may write
//! overlapping node keys and any stage may be re-run.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{ColocResult, ValidationError};
use crate::graph::{NodeDraft, NodeKey, RelKind, RelationshipDraft};
use crate::matching::MatchedPair;
use crate::record::{RecordKind, Source};
use crate::storage::GraphStore;

/// Column prefix of the working side in prefixed row maps.
pub const WORKING_PREFIX: &str = "W.";
/// Column prefix of the target side in prefixed row maps.
pub const TARGET_PREFIX: &str = "C.";

/// Source and kind labels for one side of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeLabel {
    /// Source label.
    pub source: Source,
    /// Kind label.
    pub kind: RecordKind,
}

impl NodeLabel {
    /// Creates a label pair.
    #[must_use]
    pub const fn new(source: Source, kind: RecordKind) -> Self {
        Self { source, kind }
    }

    /// Returns the node key for a record key under this label.
    #[must_use]
    pub fn key(&self, key: impl Into<String>) -> NodeKey {
        NodeKey::new(self.source, self.kind, key)
    }
}

/// One side of a paired row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PairSide {
    /// Record key of the node.
    pub key: String,
    /// Attributes of this side; nulls are dropped when written.
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl PairSide {
    /// Creates a side without attributes.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
}

/// A paired row: working side and target side.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PairRow {
    /// Working (`W.`) side.
    pub working: PairSide,
    /// Target (`C.`) side.
    pub target: PairSide,
}

impl PairRow {
    fn swapped(&self) -> Self {
        Self {
            working: self.target.clone(),
            target: self.working.clone(),
        }
    }
}

/// A table of paired rows to write into the graph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PairTable {
    /// Rows in input order.
    pub rows: Vec<PairRow>,
}

impl PairTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a row.
    pub fn push(&mut self, working: PairSide, target: PairSide) {
        self.rows.push(PairRow { working, target });
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Builds a table from accepted matches.
    #[must_use]
    pub fn from_pairs(pairs: &[MatchedPair]) -> Self {
        let rows = pairs
            .iter()
            .map(|pair| PairRow {
                working: PairSide {
                    key: pair.working.id.to_string(),
                    properties: pair.working.properties(),
                },
                target: PairSide {
                    key: pair.target.id.to_string(),
                    properties: pair.target.properties(),
                },
            })
            .collect();
        Self { rows }
    }

    /// Builds a table from flat rows whose columns carry `W.`/`C.` prefixes.
    ///
    /// `working_key` and `target_key` name the (unprefixed) key columns.
    /// Columns without a known prefix are ignored.
    pub fn from_prefixed_rows(
        rows: &[BTreeMap<String, serde_json::Value>],
        working_key: &str,
        target_key: &str,
    ) -> Result<Self, ValidationError> {
        let mut table = Self::new();
        for row in rows {
            let mut working = PairSide::default();
            let mut target = PairSide::default();
            for (column, value) in row {
                let (side, name, key_column) =
                    if let Some(name) = column.strip_prefix(WORKING_PREFIX) {
                        (&mut working, name, working_key)
                    } else if let Some(name) = column.strip_prefix(TARGET_PREFIX) {
                        (&mut target, name, target_key)
                    } else {
                        continue;
                    };
                if name == key_column {
                    side.key = key_text(value).unwrap_or_default();
                } else {
                    side.properties.insert(name.to_string(), value.clone());
                }
            }
            if working.key.is_empty() {
                return Err(ValidationError::MissingField {
                    field: format!("{WORKING_PREFIX}{working_key}"),
                });
            }
            if target.key.is_empty() {
                return Err(ValidationError::MissingField {
                    field: format!("{TARGET_PREFIX}{target_key}"),
                });
            }
            table.push(working, target);
        }
        Ok(table)
    }
}

fn key_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Counts of what a write changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Nodes that did not exist before.
    pub nodes_created: usize,
    /// Relationships that did not exist before.
    pub relationships_created: usize,
}

/// Writes paired tables into a graph store.
#[derive(Clone)]
pub struct GraphWriter {
    store: Arc<dyn GraphStore>,
}

impl GraphWriter {
    /// Creates a writer over a store.
    #[must_use]
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Merges one node per distinct key per side, then one `kind`
    /// relationship per row from the working node to the target node.
    ///
    /// Nodes commit as one batch and relationships as a second, so a failure
    /// can leave nodes without relationships but never half a relationship
    /// batch.
    pub fn add_matched_nodes(
        &self,
        table: &PairTable,
        working: NodeLabel,
        target: NodeLabel,
        kind: &RelKind,
    ) -> ColocResult<WriteSummary> {
        if table.is_empty() {
            return Ok(WriteSummary::default());
        }

        let mut drafts: BTreeMap<NodeKey, BTreeMap<String, serde_json::Value>> = BTreeMap::new();
        let mut relationships = Vec::with_capacity(table.len());
        for row in &table.rows {
            let from = working.key(row.working.key.as_str());
            let to = target.key(row.target.key.as_str());
            for (key, side) in [(&from, &row.working), (&to, &row.target)] {
                let props = drafts.entry(key.clone()).or_default();
                for (name, value) in &side.properties {
                    if !value.is_null() {
                        props.entry(name.clone()).or_insert_with(|| value.clone());
                    }
                }
            }
            relationships.push(RelationshipDraft {
                from,
                to,
                kind: kind.clone(),
            });
        }

        let before = self.store.node_count()?;
        self.store.merge_nodes(
            drafts
                .into_iter()
                .map(|(key, properties)| NodeDraft { key, properties })
                .collect(),
        )?;
        let nodes_created = self.store.node_count()?.saturating_sub(before);
        let relationships_created = self.store.merge_relationships(relationships)?;

        tracing::info!(
            working = %working.source,
            target = %target.source,
            kind = %kind,
            rows = table.len(),
            nodes_created,
            relationships_created,
            "merged matched nodes"
        );

        Ok(WriteSummary {
            nodes_created,
            relationships_created,
        })
    }

    /// Same as [`Self::add_matched_nodes`], written once in each direction so
    /// the two opposite edges together form one undirected relation.
    pub fn add_matched_nodes_undirected(
        &self,
        table: &PairTable,
        working: NodeLabel,
        target: NodeLabel,
        kind: &RelKind,
    ) -> ColocResult<WriteSummary> {
        let forward = self.add_matched_nodes(table, working, target, kind)?;
        let swapped = PairTable {
            rows: table.rows.iter().map(PairRow::swapped).collect(),
        };
        let backward = self.add_matched_nodes(&swapped, target, working, kind)?;
        Ok(WriteSummary {
            nodes_created: forward.nodes_created + backward.nodes_created,
            relationships_created: forward.relationships_created + backward.relationships_created,
        })
    }

    /// Merges extra properties onto nodes that already exist.
    ///
    /// Keys without a node are skipped. Returns how many nodes were updated.
    pub fn annotate(&self, label: NodeLabel, rows: &[PairSide]) -> ColocResult<usize> {
        let mut drafts = Vec::new();
        for side in rows {
            let key = label.key(side.key.as_str());
            if self.store.find_node(&key)?.is_none() {
                continue;
            }
            let properties = side
                .properties
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            drafts.push(NodeDraft { key, properties });
        }
        let updated = drafts.len();
        if updated > 0 {
            self.store.merge_nodes(drafts)?;
        }
        Ok(updated)
    }
}
