use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::record::{EventRecord, RecordId};

/// The extraction phrase a working extract was produced from.
///
/// Extracts are requested per match type, most reliable phrase first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MatchType(String);

impl MatchType {
    /// Name of the match type that carries only a short title.
    pub const COLOCATED: &'static str = "colocated";

    /// Creates a match type, rejecting blank names.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyMatchType);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The short-title-only match type.
    #[must_use]
    pub fn colocated() -> Self {
        Self(Self::COLOCATED.to_string())
    }

    /// Returns true for the short-title-only match type.
    #[must_use]
    pub fn is_colocated(&self) -> bool {
        self.0 == Self::COLOCATED
    }

    /// Returns the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for MatchType {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MatchType> for String {
    fn from(value: MatchType) -> Self {
        value.0
    }
}

/// Phrases in descending extraction confidence, without `colocated`.
const DEFAULT_PHRASES: [&str; 8] = [
    "coloc",
    "hosted",
    "aff",
    "conjunction",
    "@2",
    "part",
    "affiliated",
    "at",
];

/// A non-empty, order-preserving, deduplicated list of match types.
///
/// - Empty lists are rejected.
/// - Duplicate match types are ignored (first occurrence wins).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct MatchTypeOrder(Vec<MatchType>);

impl MatchTypeOrder {
    /// Construct a validated priority list.
    pub fn new(order: Vec<MatchType>) -> Result<Self, ValidationError> {
        if order.is_empty() {
            return Err(ValidationError::InvalidMatchTypeOrder {
                reason: "match type order cannot be empty".to_string(),
            });
        }

        let mut seen: HashSet<MatchType> = HashSet::with_capacity(order.len());
        let mut deduped = Vec::with_capacity(order.len());
        for match_type in order {
            if seen.insert(match_type.clone()) {
                deduped.push(match_type);
            }
        }
        Ok(Self(deduped))
    }

    /// Construct from names.
    pub fn from_names<I, S>(names: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let order = names
            .into_iter()
            .map(MatchType::new)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(order)
    }

    /// Places `colocated` right after the primary phrase.
    ///
    /// An existing `colocated` entry is moved rather than duplicated.
    #[must_use]
    pub fn with_colocated(mut self) -> Self {
        self.0.retain(|m| !m.is_colocated());
        let at = self.0.len().min(1);
        self.0.insert(at, MatchType::colocated());
        self
    }

    /// Returns the list as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[MatchType] {
        &self.0
    }
}

impl Default for MatchTypeOrder {
    fn default() -> Self {
        Self(DEFAULT_PHRASES.iter().map(|p| MatchType((*p).to_string())).collect()).with_colocated()
    }
}

impl<'de> Deserialize<'de> for MatchTypeOrder {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Vec::<MatchType>::deserialize(deserializer)?;
        MatchTypeOrder::new(raw).map_err(serde::de::Error::custom)
    }
}

/// The rule that produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMethod {
    /// Equal short title and equal known country.
    ExactShortCountry,
    /// Equal short title and equal month.
    ExactShortMonth,
    /// Title similarity gated by year and a secondary attribute.
    FuzzyTitle,
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExactShortCountry => write!(f, "exact-short-country"),
            Self::ExactShortMonth => write!(f, "exact-short-month"),
            Self::FuzzyTitle => write!(f, "fuzzy-title"),
        }
    }
}

/// A proposed pairing of a working record with a target record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    /// Working record id.
    pub working_id: RecordId,
    /// Target record id.
    pub target_id: RecordId,
    /// Rule that produced it.
    pub method: MatchMethod,
    /// Zero-based index of the pass that accepted it.
    pub pass: usize,
    /// Cosine similarity, for fuzzy candidates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// An accepted candidate with both records attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedPair {
    /// The accepted candidate.
    pub candidate: MatchCandidate,
    /// Working side.
    pub working: EventRecord,
    /// Target side.
    pub target: EventRecord,
}

/// What one pass did.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PassReport {
    /// Pass index.
    pub pass: usize,
    /// Match type of the pass.
    pub match_type: Option<MatchType>,
    /// Working records extracted.
    pub extracted: usize,
    /// Accepted candidates per rule.
    pub accepted: BTreeMap<MatchMethod, usize>,
    /// Working records a rule had to skip for a missing attribute.
    pub skipped: BTreeMap<MatchMethod, usize>,
    /// Distinct working records consumed.
    pub consumed: usize,
}

impl PassReport {
    /// Total accepted candidates.
    #[must_use]
    pub fn accepted_total(&self) -> usize {
        self.accepted.values().sum()
    }
}

/// Accumulated result of a matching run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    /// Accepted pairs, in pass order.
    pub pairs: Vec<MatchedPair>,
    /// Per-pass reports.
    pub passes: Vec<PassReport>,
}

impl MatchOutcome {
    /// Returns true if nothing matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Returns the accepted candidates.
    pub fn candidates(&self) -> impl Iterator<Item = &MatchCandidate> {
        self.pairs.iter().map(|p| &p.candidate)
    }

    /// Distinct target records that were matched, first occurrence order.
    #[must_use]
    pub fn matched_targets(&self) -> Vec<&EventRecord> {
        let mut seen = HashSet::new();
        self.pairs
            .iter()
            .filter(|p| seen.insert(&p.target.id))
            .map(|p| &p.target)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order_puts_colocated_second() {
        let order = MatchTypeOrder::default();
        let names: Vec<&str> = order.as_slice().iter().map(MatchType::as_str).collect();
        assert_eq!(names[0], "coloc");
        assert_eq!(names[1], "colocated");
        assert_eq!(names.len(), 9);
    }

    #[test]
    fn test_with_colocated_moves_existing_entry() {
        let order = MatchTypeOrder::from_names(["hosted", "aff", "colocated"])
            .unwrap()
            .with_colocated();
        let names: Vec<&str> = order.as_slice().iter().map(MatchType::as_str).collect();
        assert_eq!(names, vec!["hosted", "colocated", "aff"]);
    }

    #[test]
    fn test_order_rejects_empty_and_dedups() {
        assert!(MatchTypeOrder::new(Vec::new()).is_err());
        let order = MatchTypeOrder::from_names(["at", "at", "part"]).unwrap();
        assert_eq!(order.as_slice().len(), 2);
    }

    #[test]
    fn test_order_deserialization_validates() {
        let order: MatchTypeOrder = serde_json::from_str(r#"["hosted", "aff"]"#).unwrap();
        assert_eq!(order.as_slice().len(), 2);
        assert!(serde_json::from_str::<MatchTypeOrder>("[]").is_err());
        assert!(serde_json::from_str::<MatchTypeOrder>(r#"["  "]"#).is_err());
    }

    #[test]
    fn test_method_display() {
        assert_eq!(MatchMethod::ExactShortCountry.to_string(), "exact-short-country");
        assert_eq!(
            serde_json::to_string(&MatchMethod::FuzzyTitle).unwrap(),
            "\"fuzzy-title\""
        );
    }
}
