//! Workshop connectivity votes.
//!
//! A workshop `a` votes for the pair `(w, d)` when it both matches `w` and
//! links `d`. Pairs reaching the threshold are promoted unless `d` would be
//! tied to two different `w`.

use std::collections::{BTreeMap, BTreeSet};

use crate::conflict::{ConflictRecord, SupportRow};
use crate::error::ColocResult;
use crate::graph::{NodeKey, RelKind};
use crate::inference::{InferenceRoles, NodeCache};
use crate::record::Source;
use crate::storage::GraphStore;

/// Supporting rows per `(matched, linked)` pair.
#[derive(Debug, Default)]
pub(super) struct Tally {
    pub support: BTreeMap<(NodeKey, NodeKey), Vec<SupportRow>>,
    pub virtual_targets: BTreeSet<NodeKey>,
}

fn neighbours(
    graph: &dyn GraphStore,
    cache: &mut NodeCache<'_>,
    from: &NodeKey,
    kind: &RelKind,
    source: Source,
    virtual_targets: &mut BTreeSet<NodeKey>,
) -> ColocResult<Vec<NodeKey>> {
    let mut keys = Vec::new();
    for edge in graph.outgoing(from.id(), Some(kind))? {
        let Some(node) = cache.get(edge.to)? else {
            continue;
        };
        if node.key.source != source {
            continue;
        }
        if node.is_virtual() {
            virtual_targets.insert(node.key.clone());
        }
        keys.push(node.key);
    }
    Ok(keys)
}

pub(super) fn tally(
    graph: &dyn GraphStore,
    cache: &mut NodeCache<'_>,
    roles: InferenceRoles,
) -> ColocResult<Tally> {
    let mut tally = Tally::default();
    for workshop in graph.nodes_by_source(roles.workshop)? {
        let mut virtual_targets = BTreeSet::new();
        let matched = neighbours(
            graph,
            cache,
            &workshop.key,
            &RelKind::Matches,
            roles.matched,
            &mut virtual_targets,
        )?;
        if matched.is_empty() {
            continue;
        }
        let linked = neighbours(
            graph,
            cache,
            &workshop.key,
            &RelKind::Linked,
            roles.linked,
            &mut virtual_targets,
        )?;
        tally.virtual_targets.extend(virtual_targets);

        for w in &matched {
            for d in &linked {
                tally
                    .support
                    .entry((w.clone(), d.clone()))
                    .or_default()
                    .push(SupportRow {
                        workshop: workshop.key.clone(),
                        matched: w.clone(),
                        linked: d.clone(),
                    });
            }
        }
    }
    Ok(tally)
}

/// What the vote decides before anything is written.
#[derive(Debug, Default)]
pub(super) struct Decision {
    pub promote: Vec<(NodeKey, NodeKey)>,
    pub conflicts: Vec<ConflictRecord>,
    pub excluded: BTreeSet<NodeKey>,
}

pub(super) fn decide(tally: &Tally, threshold: usize, recorded: &BTreeSet<NodeKey>) -> Decision {
    let mut by_target: BTreeMap<&NodeKey, Vec<(&NodeKey, &Vec<SupportRow>)>> = BTreeMap::new();
    for ((w, d), rows) in &tally.support {
        if rows.len() >= threshold {
            by_target.entry(d).or_default().push((w, rows));
        }
    }

    let mut decision = Decision::default();
    for (d, candidates) in by_target {
        if candidates.len() > 1 && !tally.virtual_targets.contains(d) {
            // Candidates are in key order, so `w1 < w2` holds for every pair.
            for (i, (w1, rows1)) in candidates.iter().enumerate() {
                for (w2, rows2) in &candidates[i + 1..] {
                    let support = rows1.iter().chain(rows2.iter()).cloned().collect();
                    decision.conflicts.push(ConflictRecord::new(
                        d.clone(),
                        (*w1).clone(),
                        (*w2).clone(),
                        support,
                    ));
                }
            }
            decision.excluded.insert(d.clone());
            continue;
        }
        if recorded.contains(d) {
            decision.excluded.insert(d.clone());
            continue;
        }
        decision
            .promote
            .extend(candidates.into_iter().map(|(w, _)| (w.clone(), d.clone())));
    }
    decision
}
