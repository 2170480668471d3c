//! Resolver configuration.
//!
//! Thresholds and the pass order are fixed inputs for a run. Loaded from
//! JSON; every field has a default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ColocError, ColocResult, ValidationError};
use crate::matching::similarity::DEFAULT_MAX_DOCUMENT_FREQUENCY;
use crate::matching::MatchTypeOrder;

/// Configuration of a resolution run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Minimum cosine similarity for a fuzzy title match, in `(0, 1]`.
    pub match_threshold: f64,

    /// Document-frequency share above which a term is ignored, in `(0, 1]`.
    pub max_document_frequency: f64,

    /// Corroborating workshops needed to promote a match to a link.
    pub link_threshold: usize,

    /// Match types in pass order.
    pub match_types: MatchTypeOrder,

    /// Workshop property holding a known external event identifier.
    pub event_property: String,

    /// Keep targets with an open recorded conflict out of promotion.
    pub honor_recorded_conflicts: bool,

    /// Transfer links transitively after promotion.
    pub transfer_links: bool,

    /// Where to write the open-conflict report, if anywhere.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_report_path: Option<PathBuf>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.7,
            max_document_frequency: DEFAULT_MAX_DOCUMENT_FREQUENCY,
            link_threshold: 3,
            match_types: MatchTypeOrder::default(),
            event_property: "Wikidata".to_string(),
            honor_recorded_conflicts: true,
            transfer_links: false,
            conflict_report_path: None,
        }
    }
}

impl ResolverConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> ColocResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ColocError::config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> ColocResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ColocError::config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (name, value) in [
            ("match_threshold", self.match_threshold),
            ("max_document_frequency", self.max_document_frequency),
        ] {
            if !(value.is_finite() && value > 0.0 && value <= 1.0) {
                return Err(ValidationError::InvalidThreshold {
                    name: name.to_string(),
                    range: "(0, 1]".to_string(),
                    value,
                });
            }
        }
        if self.link_threshold == 0 {
            return Err(ValidationError::InvalidThreshold {
                name: "link_threshold".to_string(),
                range: ">= 1".to_string(),
                value: 0.0,
            });
        }
        if self.event_property.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "event_property".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.link_threshold, 3);
        assert_eq!(config.match_types.as_slice()[1].as_str(), "colocated");
        assert!(config.honor_recorded_conflicts);
        assert!(!config.transfer_links);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            ResolverConfig::from_json_str(r#"{"link_threshold": 4, "match_types": ["hosted"]}"#)
                .unwrap();
        assert_eq!(config.link_threshold, 4);
        assert_eq!(config.match_types.as_slice().len(), 1);
        assert!((config.match_threshold - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = ResolverConfig::from_json_str(r#"{"match_threshold": 1.5}"#).unwrap_err();
        assert!(err.is_validation());
        assert!(ResolverConfig::from_json_str(r#"{"link_threshold": 0}"#).is_err());
        assert!(ResolverConfig::from_json_str(r#"{"match_types": []}"#).is_err());
        assert!(ResolverConfig::from_json_str(r#"{"unknown_field": 1}"#).is_err());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coloc.json");
        std::fs::write(&path, r#"{"transfer_links": true}"#).unwrap();
        assert!(ResolverConfig::from_json_file(&path).unwrap().transfer_links);
        assert!(ResolverConfig::from_json_file(dir.path().join("missing.json")).is_err());
    }
}
