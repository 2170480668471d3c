use crate::error::ColocResult;
use crate::graph::{GraphEdge, NodeId, RelKind};
use crate::inference::NodeCache;
use crate::record::Source;
use crate::storage::GraphStore;

fn links_back(
    graph: &dyn GraphStore,
    cache: &mut NodeCache<'_>,
    id: NodeId,
    source: Source,
) -> ColocResult<bool> {
    for edge in graph.outgoing(id, Some(&RelKind::Linked))? {
        if cache.get(edge.to)?.is_some_and(|n| n.key.source == source) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Deletes `MATCHES` edges, in either direction, between an `a_source` node
/// and a `b_source` node whose `b_source` end already links to some
/// `a_source` node.
///
/// Returns how many edges were deleted.
pub(super) fn delete_superseded(
    graph: &dyn GraphStore,
    cache: &mut NodeCache<'_>,
    a_source: Source,
    b_source: Source,
) -> ColocResult<usize> {
    let mut doomed: Vec<GraphEdge> = Vec::new();
    for edge in graph.relationships(&RelKind::Matches)? {
        let (Some(from), Some(to)) = (cache.get(edge.from)?, cache.get(edge.to)?) else {
            continue;
        };
        let b_end = if from.key.source == a_source && to.key.source == b_source {
            to.id
        } else if from.key.source == b_source && to.key.source == a_source {
            from.id
        } else {
            continue;
        };
        if links_back(graph, cache, b_end, a_source)? {
            doomed.push(edge);
        }
    }
    if doomed.is_empty() {
        return Ok(0);
    }
    Ok(graph.delete_relationships(&doomed)?)
}
