//! Result classification of workshops after inference.
//!
//! Two orthogonal properties describe a workshop. How it is connected:
//! matched and linked with an edge between the two > matched and linked
//! without one > linked only > matched only. And whether its external event
//! identifier is already known.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::ColocResult;
use crate::graph::{GraphNode, NodeKey, RelKind};
use crate::inference::InferenceRoles;
use crate::record::Source;
use crate::storage::GraphStore;

/// Separator of multi-valued identifiers.
pub const MULTI_VALUE_SEPARATOR: char = '|';

/// How a workshop is connected to the matched and linked sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityClass {
    /// Matched and linked, and some matched node has an edge to a linked one.
    FullyConnected,
    /// Matched and linked without such an edge.
    DoublyConnected,
    /// Linked only.
    LinkOnly,
    /// Matched only.
    MatchOnly,
}

impl fmt::Display for ConnectivityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullyConnected => write!(f, "fully_connected"),
            Self::DoublyConnected => write!(f, "doubly_connected"),
            Self::LinkOnly => write!(f, "link_only"),
            Self::MatchOnly => write!(f, "match_only"),
        }
    }
}

/// Whether the workshop's external event identifier is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPresence {
    /// Non-empty event identifier.
    Present,
    /// Missing or empty.
    Missing,
}

impl fmt::Display for EventPresence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present => write!(f, "event_present"),
            Self::Missing => write!(f, "event_missing"),
        }
    }
}

/// One of the eight result buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Bucket {
    /// Connectivity class.
    pub class: ConnectivityClass,
    /// Event presence.
    pub presence: EventPresence,
}

impl Bucket {
    /// Returns the bucket name, e.g. `fully_connected_event_present`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}_{}", self.class, self.presence)
    }
}

/// A classified workshop with its neighbours.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkshopResult {
    /// The workshop node.
    pub workshop: GraphNode,
    /// Known event identifiers of the workshop.
    pub event_ids: Vec<String>,
    /// Matched nodes.
    pub matched: Vec<NodeKey>,
    /// Linked nodes.
    pub linked: Vec<NodeKey>,
    /// Matched nodes with an edge to one of the linked nodes.
    pub connected: Vec<NodeKey>,
}

/// All classified workshops.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// Workshops per bucket, in key order.
    pub buckets: BTreeMap<Bucket, Vec<WorkshopResult>>,
    /// Workshops with neither a match nor a link.
    pub unclassified: Vec<NodeKey>,
}

impl Classification {
    /// Returns the workshops of a bucket.
    #[must_use]
    pub fn bucket(&self, class: ConnectivityClass, presence: EventPresence) -> &[WorkshopResult] {
        self.buckets
            .get(&Bucket { class, presence })
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Buckets keyed by name, for serialization.
    #[must_use]
    pub fn named_buckets(&self) -> BTreeMap<String, &[WorkshopResult]> {
        self.buckets
            .iter()
            .map(|(bucket, results)| (bucket.name(), results.as_slice()))
            .collect()
    }
}

fn event_ids(node: &GraphNode, property: &str) -> Vec<String> {
    node.str_property(property)
        .map(|raw| {
            raw.split(MULTI_VALUE_SEPARATOR)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Buckets workshop nodes by connectivity and event presence.
#[derive(Clone)]
pub struct Classifier {
    graph: Arc<dyn GraphStore>,
    roles: InferenceRoles,
    event_property: String,
}

impl Classifier {
    /// Creates a classifier reading the event identifier from `event_property`.
    #[must_use]
    pub fn new(graph: Arc<dyn GraphStore>, event_property: impl Into<String>) -> Self {
        Self {
            graph,
            roles: InferenceRoles::default(),
            event_property: event_property.into(),
        }
    }

    /// Replaces the source roles.
    #[must_use]
    pub fn with_roles(mut self, roles: InferenceRoles) -> Self {
        self.roles = roles;
        self
    }

    fn neighbours(
        &self,
        workshop: &GraphNode,
        kind: &RelKind,
        source: Source,
    ) -> ColocResult<Vec<NodeKey>> {
        let mut keys = BTreeSet::new();
        for edge in self.graph.outgoing(workshop.id, Some(kind))? {
            if let Some(node) = self.graph.node(edge.to)? {
                if node.key.source == source {
                    keys.insert(node.key);
                }
            }
        }
        Ok(keys.into_iter().collect())
    }

    /// Classifies every workshop node.
    pub fn classify(&self) -> ColocResult<Classification> {
        let mut classification = Classification::default();
        for workshop in self.graph.nodes_by_source(self.roles.workshop)? {
            let matched = self.neighbours(&workshop, &RelKind::Matches, self.roles.matched)?;
            let linked = self.neighbours(&workshop, &RelKind::Linked, self.roles.linked)?;

            let mut connected = Vec::new();
            for w in &matched {
                let reaches = self
                    .graph
                    .outgoing(w.id(), None)?
                    .iter()
                    .any(|e| linked.iter().any(|d| d.id() == e.to));
                if reaches {
                    connected.push(w.clone());
                }
            }

            let class = match (matched.is_empty(), linked.is_empty()) {
                (true, true) => {
                    classification.unclassified.push(workshop.key.clone());
                    continue;
                }
                (false, false) if !connected.is_empty() => ConnectivityClass::FullyConnected,
                (false, false) => ConnectivityClass::DoublyConnected,
                (true, false) => ConnectivityClass::LinkOnly,
                (false, true) => ConnectivityClass::MatchOnly,
            };
            let event_ids = event_ids(&workshop, &self.event_property);
            let presence = if event_ids.is_empty() {
                EventPresence::Missing
            } else {
                EventPresence::Present
            };

            classification
                .buckets
                .entry(Bucket { class, presence })
                .or_default()
                .push(WorkshopResult {
                    workshop,
                    event_ids,
                    matched,
                    linked,
                    connected,
                });
        }

        tracing::info!(
            buckets = classification.buckets.len(),
            classified = classification.buckets.values().map(Vec::len).sum::<usize>(),
            unclassified = classification.unclassified.len(),
            "classified workshops"
        );
        Ok(classification)
    }
}

fn last_segment(id: &str) -> &str {
    id.trim_end_matches('/').rsplit('/').next().unwrap_or(id)
}

/// `(workshop event, conference)` pairs of fully connected workshops whose
/// event is known, as bare identifiers (last URI path segment).
#[must_use]
pub fn event_conference_pairs(classification: &Classification) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for result in classification.bucket(ConnectivityClass::FullyConnected, EventPresence::Present) {
        for conference in &result.connected {
            for event in &result.event_ids {
                pairs.push((
                    last_segment(event).to_string(),
                    last_segment(&conference.key).to_string(),
                ));
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_segment() {
        assert_eq!(last_segment("http://www.wikidata.org/entity/Q113715819"), "Q113715819");
        assert_eq!(last_segment("https://dblp.org/db/conf/vldb/"), "vldb");
        assert_eq!(last_segment("Q1"), "Q1");
    }

    #[test]
    fn test_bucket_names() {
        let bucket = Bucket {
            class: ConnectivityClass::MatchOnly,
            presence: EventPresence::Missing,
        };
        assert_eq!(bucket.name(), "match_only_event_missing");
    }
}
