//! Conflict records for ambiguous link inferences.
//!
//! When the connectivity heuristic would link one node to two different
//! nodes, nothing is linked. Instead a [`ConflictRecord`] captures the
//! target, both competitors and every supporting row so a person can fix
//! the underlying data.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::graph::NodeKey;

/// Unique identifier for a conflict.
///
/// Derived from the target and competitor keys, so detecting the same
/// ambiguity twice yields the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictId(Uuid);

impl ConflictId {
    /// Derives the id for a (target, competitor, competitor) triple.
    ///
    /// Competitor order does not matter.
    #[must_use]
    pub fn derive(target: &NodeKey, a: &NodeKey, b: &NodeKey) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let mut hasher = blake3::Hasher::new();
        for key in [target, lo, hi] {
            hasher.update(key.to_string().as_bytes());
            hasher.update(&[0]);
        }
        let hash = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash.as_bytes()[..16]);
        Self(Uuid::from_bytes(bytes))
    }
}

impl fmt::Display for ConflictId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The review status of a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    /// Conflict awaits review; its target stays excluded.
    #[default]
    Open,

    /// The underlying data was corrected.
    Resolved,

    /// Conflict was dismissed (deemed not a real conflict).
    Dismissed,
}

impl fmt::Display for ConflictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Resolved => write!(f, "resolved"),
            Self::Dismissed => write!(f, "dismissed"),
        }
    }
}

/// One piece of evidence behind a vote: `workshop -MATCHES-> matched` and
/// `workshop -LINKED-> linked`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SupportRow {
    /// Intermediary workshop node.
    pub workshop: NodeKey,
    /// Node the workshop matches.
    pub matched: NodeKey,
    /// Node the workshop is linked to.
    pub linked: NodeKey,
}

/// An ambiguous inference excluded from promotion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Unique identifier for this conflict.
    pub id: ConflictId,

    /// The node that would be linked twice.
    pub target: NodeKey,

    /// First competitor (smaller key).
    pub competitor_a: NodeKey,

    /// Second competitor.
    pub competitor_b: NodeKey,

    /// All rows supporting either competitor through the target.
    pub support: Vec<SupportRow>,

    /// When the conflict was detected.
    pub detected_at: DateTime<Utc>,

    /// Current status.
    pub status: ConflictStatus,

    /// Reviewer notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl ConflictRecord {
    /// Creates a new open conflict. Competitors are stored in key order.
    #[must_use]
    pub fn new(target: NodeKey, a: NodeKey, b: NodeKey, mut support: Vec<SupportRow>) -> Self {
        let (competitor_a, competitor_b) = if a <= b { (a, b) } else { (b, a) };
        support.sort();
        support.dedup();
        Self {
            id: ConflictId::derive(&target, &competitor_a, &competitor_b),
            target,
            competitor_a,
            competitor_b,
            support,
            detected_at: Utc::now(),
            status: ConflictStatus::Open,
            notes: None,
        }
    }

    /// Returns true if the conflict is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == ConflictStatus::Open
    }

    /// Marks the conflict resolved.
    pub fn resolve(&mut self, notes: impl Into<String>) {
        self.status = ConflictStatus::Resolved;
        self.notes = Some(notes.into());
    }

    /// Dismisses the conflict.
    pub fn dismiss(&mut self) {
        self.status = ConflictStatus::Dismissed;
    }
}

impl PartialEq for ConflictRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConflictRecord {}

impl std::hash::Hash for ConflictRecord {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
