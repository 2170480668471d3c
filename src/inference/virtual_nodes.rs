use std::collections::BTreeSet;

use crate::error::ColocResult;
use crate::graph::{NodeId, RelKind, VIRTUAL_LABEL};
use crate::inference::NodeCache;
use crate::storage::GraphStore;

/// Labels the inbound endpoint of every `LINKED` edge between two nodes of
/// the same source and kind as virtual.
///
/// Returns how many nodes newly gained the label.
pub(super) fn mark_virtual(
    graph: &dyn GraphStore,
    cache: &mut NodeCache<'_>,
) -> ColocResult<usize> {
    let mut inbound: BTreeSet<NodeId> = BTreeSet::new();
    for edge in graph.relationships(&RelKind::Linked)? {
        let (Some(from), Some(to)) = (cache.get(edge.from)?, cache.get(edge.to)?) else {
            continue;
        };
        if from.key.source == to.key.source && from.key.kind == to.key.kind {
            inbound.insert(edge.to);
        }
    }
    if inbound.is_empty() {
        return Ok(0);
    }
    let ids: Vec<NodeId> = inbound.into_iter().collect();
    let marked = graph.add_label(&ids, VIRTUAL_LABEL)?;
    cache.forget(&ids);
    Ok(marked)
}
