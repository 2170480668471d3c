use std::collections::BTreeSet;

use crate::error::ColocResult;
use crate::graph::{NodeKey, RelKind, RelationshipDraft};
use crate::inference::NodeCache;
use crate::record::Source;
use crate::storage::GraphStore;

/// For every chain `a -LINKED-> b -LINKED-> c` where `a` is an `a_source`
/// node and `b`, `c` are `b_source` nodes of one kind, links `a` and `c` in
/// both directions.
///
/// Returns how many relationships were created.
pub(super) fn transfer_links(
    graph: &dyn GraphStore,
    cache: &mut NodeCache<'_>,
    a_source: Source,
    b_source: Source,
) -> ColocResult<usize> {
    let mut pairs: BTreeSet<(NodeKey, NodeKey)> = BTreeSet::new();
    for a in graph.nodes_by_source(a_source)? {
        for first in graph.outgoing(a.id, Some(&RelKind::Linked))? {
            let Some(b) = cache.get(first.to)? else {
                continue;
            };
            if b.key.source != b_source {
                continue;
            }
            for second in graph.outgoing(b.id, Some(&RelKind::Linked))? {
                let Some(c) = cache.get(second.to)? else {
                    continue;
                };
                if c.id != a.id && c.key.source == b_source && c.key.kind == b.key.kind {
                    pairs.insert((a.key.clone(), c.key));
                }
            }
        }
    }

    let drafts: Vec<RelationshipDraft> = pairs
        .into_iter()
        .flat_map(|(a, c)| {
            [
                RelationshipDraft {
                    from: a.clone(),
                    to: c.clone(),
                    kind: RelKind::Linked,
                },
                RelationshipDraft {
                    from: c,
                    to: a,
                    kind: RelKind::Linked,
                },
            ]
        })
        .collect();
    if drafts.is_empty() {
        return Ok(0);
    }
    Ok(graph.merge_relationships(drafts)?)
}
