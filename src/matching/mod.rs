//! Record matching: deterministic joins plus a gated similarity fallback.

pub mod engine;
pub mod similarity;
mod types;
mod working_set;

pub use engine::MatchEngine;
pub use similarity::{ScoredPair, SimilarityScorer, TfidfVectorizer};
pub use types::{
    MatchCandidate, MatchMethod, MatchOutcome, MatchType, MatchTypeOrder, MatchedPair, PassReport,
};
pub use working_set::{InMemoryWorkingSet, WorkingSet};
