//! Evidence graph model and the mutation protocol that fills it.

mod model;
pub mod writer;

pub use model::{
    GraphEdge, GraphNode, NodeDraft, NodeId, NodeKey, RelKind, RelationshipDraft, VIRTUAL_LABEL,
};
pub use writer::{GraphWriter, NodeLabel, PairRow, PairSide, PairTable, WriteSummary};
