//! # coloc - co-located event resolution and link inference
//!
//! Resolves workshop records from a proceedings source against conference
//! records from two knowledge bases, and turns repeated weak evidence into
//! asserted "same event" links without ever linking ambiguously.
//!
//! ## Core Concepts
//!
//! - **EventRecord**: a workshop or conference record with titles, acronym, country, month, year
//! - **MatchEngine**: prioritized passes of exact joins plus a gated similarity fallback
//! - **GraphStore**: idempotent evidence graph of `MATCHES` and `LINKED` edges
//! - **LinkInferencer**: connectivity-vote promotion, conflict exclusion and supersession
//! - **Classifier**: eight result buckets per workshop
//!
//! ## Usage
//!
//! ```rust,ignore
//! use coloc::{
//!     GraphWriter, InMemoryStores, LinkInferencer, MatchEngine, NodeLabel, PairTable, RecordKind,
//!     RelKind, Source,
//! };
//!
//! let config = coloc::ResolverConfig::default();
//! let engine = MatchEngine::from_config(&config)?;
//! let outcome = engine.run(&mut working_set, &conferences)?;
//!
//! let stores = InMemoryStores::new();
//! GraphWriter::new(stores.graph.clone()).add_matched_nodes(
//!     &PairTable::from_pairs(&outcome.pairs),
//!     NodeLabel::new(Source::CeurWs, RecordKind::Workshop),
//!     NodeLabel::new(Source::Wikidata, RecordKind::Conference),
//!     &RelKind::Matches,
//! )?;
//! let report =
//!     LinkInferencer::from_config(stores.graph.clone(), stores.conflicts.clone(), &config)?
//!         .run()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Records and identities
pub mod conflict;
pub mod error;
pub mod record;

// Matching, graph, and inference
pub mod classify;
pub mod config;
pub mod graph;
pub mod inference;
pub mod matching;
pub mod report;
pub mod storage;

// Re-export primary types at crate root for convenience
pub use classify::{
    event_conference_pairs, Bucket, Classification, Classifier, ConnectivityClass, EventPresence,
    WorkshopResult,
};
pub use config::ResolverConfig;
pub use conflict::{ConflictId, ConflictRecord, ConflictStatus, SupportRow};
pub use error::{ColocError, ColocResult, ExecutionError, ValidationError};
pub use graph::{
    GraphEdge, GraphNode, GraphWriter, NodeDraft, NodeId, NodeKey, NodeLabel, PairRow, PairSide,
    PairTable, RelKind, RelationshipDraft, WriteSummary, VIRTUAL_LABEL,
};
pub use inference::{InferenceReport, InferenceRoles, LinkInferencer, PromotionOutcome};
pub use matching::{
    InMemoryWorkingSet, MatchCandidate, MatchEngine, MatchMethod, MatchOutcome, MatchType,
    MatchTypeOrder, MatchedPair, PassReport, ScoredPair, SimilarityScorer, TfidfVectorizer,
    WorkingSet,
};
pub use record::{CountryCode, EventRecord, EventRecordBuilder, Month, RecordId, RecordKind, Source};
pub use report::ConflictReporter;
pub use storage::{
    ConflictStore, GraphStore, InMemoryConflictStore, InMemoryGraphStore, InMemoryStores,
    StorageError,
};
