//! Link inference over the evidence graph.
//!
//! Weak `MATCHES` evidence is promoted to `LINKED` assertions when enough
//! workshops corroborate it. Targets that would be linked to two different
//! nodes are never linked; they become conflicts for manual review.

mod connectivity;
mod supersession;
mod transfer;
mod virtual_nodes;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::config::ResolverConfig;
use crate::conflict::ConflictRecord;
use crate::error::{ColocResult, ValidationError};
use crate::graph::{GraphNode, NodeId, NodeKey, RelKind, RelationshipDraft};
use crate::record::Source;
use crate::report::ConflictReporter;
use crate::storage::{ConflictStore, GraphStore};

/// Read-through node lookups for one inference step.
pub(crate) struct NodeCache<'a> {
    graph: &'a dyn GraphStore,
    nodes: HashMap<NodeId, Option<GraphNode>>,
}

impl<'a> NodeCache<'a> {
    pub(crate) fn new(graph: &'a dyn GraphStore) -> Self {
        Self {
            graph,
            nodes: HashMap::new(),
        }
    }

    pub(crate) fn get(&mut self, id: NodeId) -> ColocResult<Option<GraphNode>> {
        if let Some(node) = self.nodes.get(&id) {
            return Ok(node.clone());
        }
        let node = self.graph.node(id)?;
        self.nodes.insert(id, node.clone());
        Ok(node)
    }

    pub(crate) fn forget(&mut self, ids: &[NodeId]) {
        for id in ids {
            self.nodes.remove(id);
        }
    }
}

/// Which source plays which part in the connectivity vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceRoles {
    /// Voting nodes (workshops).
    pub workshop: Source,
    /// Nodes the voters match.
    pub matched: Source,
    /// Nodes the voters link.
    pub linked: Source,
}

impl Default for InferenceRoles {
    fn default() -> Self {
        Self {
            workshop: Source::CeurWs,
            matched: Source::Wikidata,
            linked: Source::Dblp,
        }
    }
}

/// Result of the conflict check and promotion step.
#[derive(Debug, Clone, Default)]
pub struct PromotionOutcome {
    /// `(matched, linked)` pairs newly linked in both directions.
    pub promoted: Vec<(NodeKey, NodeKey)>,
    /// Conflicts detected in this run.
    pub conflicts: Vec<ConflictRecord>,
    /// Targets kept out of promotion.
    pub excluded: BTreeSet<NodeKey>,
}

/// What a full inference run changed.
#[derive(Debug, Clone, Default)]
pub struct InferenceReport {
    /// Nodes newly labeled virtual.
    pub virtual_marked: usize,
    /// Pairs newly linked by the connectivity vote.
    pub links_promoted: usize,
    /// Conflicts detected in this run.
    pub conflicts: Vec<ConflictRecord>,
    /// Targets kept out of promotion.
    pub excluded: BTreeSet<NodeKey>,
    /// `MATCHES` edges deleted because a link supersedes them.
    pub matches_deleted: usize,
    /// Relationships created by link transfer.
    pub links_transferred: usize,
}

/// Runs the inference steps against a graph store.
#[derive(Clone)]
pub struct LinkInferencer {
    graph: Arc<dyn GraphStore>,
    reporter: ConflictReporter,
    roles: InferenceRoles,
    threshold: usize,
    honor_recorded_conflicts: bool,
    transfer_links: bool,
}

impl LinkInferencer {
    /// Creates an inferencer promoting pairs with at least `threshold` votes.
    pub fn new(
        graph: Arc<dyn GraphStore>,
        reporter: ConflictReporter,
        threshold: usize,
    ) -> Result<Self, ValidationError> {
        if threshold == 0 {
            return Err(ValidationError::InvalidThreshold {
                name: "link_threshold".to_string(),
                range: ">= 1".to_string(),
                value: 0.0,
            });
        }
        Ok(Self {
            graph,
            reporter,
            roles: InferenceRoles::default(),
            threshold,
            honor_recorded_conflicts: true,
            transfer_links: false,
        })
    }

    /// Creates an inferencer from configuration.
    pub fn from_config(
        graph: Arc<dyn GraphStore>,
        conflicts: Arc<dyn ConflictStore>,
        config: &ResolverConfig,
    ) -> ColocResult<Self> {
        config.validate()?;
        let mut reporter = ConflictReporter::new(conflicts);
        if let Some(path) = &config.conflict_report_path {
            reporter = reporter.with_report_path(path);
        }
        Ok(Self::new(graph, reporter, config.link_threshold)?
            .with_recorded_conflicts(config.honor_recorded_conflicts)
            .with_transfer(config.transfer_links))
    }

    /// Replaces the source roles.
    #[must_use]
    pub fn with_roles(mut self, roles: InferenceRoles) -> Self {
        self.roles = roles;
        self
    }

    /// Whether open recorded conflicts keep their targets excluded.
    #[must_use]
    pub fn with_recorded_conflicts(mut self, honor: bool) -> Self {
        self.honor_recorded_conflicts = honor;
        self
    }

    /// Whether `run` transfers links transitively.
    #[must_use]
    pub fn with_transfer(mut self, enabled: bool) -> Self {
        self.transfer_links = enabled;
        self
    }

    /// Returns the conflict reporter.
    #[must_use]
    pub fn reporter(&self) -> &ConflictReporter {
        &self.reporter
    }

    /// Labels same-type link targets as virtual.
    pub fn mark_virtual(&self) -> ColocResult<usize> {
        let mut cache = NodeCache::new(self.graph.as_ref());
        let marked = virtual_nodes::mark_virtual(self.graph.as_ref(), &mut cache)?;
        tracing::info!(marked, "marked virtual nodes");
        Ok(marked)
    }

    /// Checks for ambiguous targets, reports them and promotes the rest.
    pub fn promote(&self) -> ColocResult<PromotionOutcome> {
        let graph = self.graph.as_ref();
        let mut cache = NodeCache::new(graph);
        let tally = connectivity::tally(graph, &mut cache, self.roles)?;
        let recorded = if self.honor_recorded_conflicts {
            self.reporter.open_targets()?
        } else {
            BTreeSet::new()
        };
        let decision = connectivity::decide(&tally, self.threshold, &recorded);

        self.reporter.report(&decision.conflicts)?;

        let mut promoted = Vec::new();
        let mut drafts = Vec::new();
        for (w, d) in decision.promote {
            let target = d.id();
            let linked = graph
                .outgoing(w.id(), Some(&RelKind::Linked))?
                .iter()
                .any(|e| e.to == target);
            if linked {
                continue;
            }
            drafts.push(RelationshipDraft {
                from: w.clone(),
                to: d.clone(),
                kind: RelKind::Linked,
            });
            drafts.push(RelationshipDraft {
                from: d.clone(),
                to: w.clone(),
                kind: RelKind::Linked,
            });
            promoted.push((w, d));
        }
        if !drafts.is_empty() {
            graph.merge_relationships(drafts)?;
        }

        tracing::info!(
            threshold = self.threshold,
            candidates = tally.support.len(),
            promoted = promoted.len(),
            conflicts = decision.conflicts.len(),
            excluded = decision.excluded.len(),
            "promoted links by workshop connectivity"
        );
        Ok(PromotionOutcome {
            promoted,
            conflicts: decision.conflicts,
            excluded: decision.excluded,
        })
    }

    /// Deletes `MATCHES` edges superseded by a link.
    pub fn delete_superseded(&self) -> ColocResult<usize> {
        let mut cache = NodeCache::new(self.graph.as_ref());
        let deleted = supersession::delete_superseded(
            self.graph.as_ref(),
            &mut cache,
            self.roles.matched,
            self.roles.linked,
        )?;
        tracing::info!(deleted, "deleted superseded matches");
        Ok(deleted)
    }

    /// Transfers links from matched-source nodes through linked-source chains.
    pub fn transfer(&self) -> ColocResult<usize> {
        let mut cache = NodeCache::new(self.graph.as_ref());
        let created = transfer::transfer_links(
            self.graph.as_ref(),
            &mut cache,
            self.roles.matched,
            self.roles.linked,
        )?;
        tracing::info!(created, "transferred links");
        Ok(created)
    }

    /// Runs virtual marking, promotion, supersession and, when enabled,
    /// link transfer, in that order.
    pub fn run(&self) -> ColocResult<InferenceReport> {
        let virtual_marked = self.mark_virtual()?;
        let promotion = self.promote()?;
        let matches_deleted = self.delete_superseded()?;
        let links_transferred = if self.transfer_links { self.transfer()? } else { 0 };

        Ok(InferenceReport {
            virtual_marked,
            links_promoted: promotion.promoted.len(),
            conflicts: promotion.conflicts,
            excluded: promotion.excluded,
            matches_deleted,
            links_transferred,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphWriter, NodeLabel, PairSide, PairTable};
    use crate::record::RecordKind;
    use crate::storage::{InMemoryConflictStore, InMemoryGraphStore};

    const CEUR: NodeLabel = NodeLabel::new(Source::CeurWs, RecordKind::Workshop);
    const WIKIDATA: NodeLabel = NodeLabel::new(Source::Wikidata, RecordKind::Conference);
    const DBLP: NodeLabel = NodeLabel::new(Source::Dblp, RecordKind::Conference);

    fn write(
        writer: &GraphWriter,
        from: NodeLabel,
        to: NodeLabel,
        kind: &RelKind,
        pairs: &[(&str, &str)],
    ) {
        let mut table = PairTable::new();
        for (a, b) in pairs {
            table.push(PairSide::new(*a), PairSide::new(*b));
        }
        writer.add_matched_nodes(&table, from, to, kind).unwrap();
    }

    fn setup() -> (Arc<InMemoryGraphStore>, GraphWriter, LinkInferencer) {
        let graph = Arc::new(InMemoryGraphStore::new());
        let reporter = ConflictReporter::new(Arc::new(InMemoryConflictStore::new()));
        let inferencer = LinkInferencer::new(graph.clone(), reporter, 3).unwrap();
        (graph.clone(), GraphWriter::new(graph), inferencer)
    }

    #[test]
    fn test_zero_threshold_is_rejected() {
        let graph = Arc::new(InMemoryGraphStore::new());
        let reporter = ConflictReporter::new(Arc::new(InMemoryConflictStore::new()));
        assert!(LinkInferencer::new(graph, reporter, 0).is_err());
    }

    #[test]
    fn test_virtual_marks_inbound_endpoint_only() {
        let (graph, writer, inferencer) = setup();
        write(&writer, DBLP, DBLP, &RelKind::Linked, &[("conf/a/2014-1", "conf/a/2014")]);
        write(&writer, WIKIDATA, DBLP, &RelKind::Linked, &[("Q1", "conf/b/2015")]);

        assert_eq!(inferencer.mark_virtual().unwrap(), 1);
        assert!(graph.find_node(&DBLP.key("conf/a/2014")).unwrap().unwrap().is_virtual());
        assert!(!graph.find_node(&DBLP.key("conf/a/2014-1")).unwrap().unwrap().is_virtual());
        assert!(!graph.find_node(&DBLP.key("conf/b/2015")).unwrap().unwrap().is_virtual());
        assert_eq!(inferencer.mark_virtual().unwrap(), 0);
    }

    #[test]
    fn test_promote_skips_existing_links() {
        let (graph, writer, inferencer) = setup();
        let workshops = ["1", "2", "3"];
        write(&writer, CEUR, WIKIDATA, &RelKind::Matches, &workshops.map(|a| (a, "Q1")));
        write(&writer, CEUR, DBLP, &RelKind::Linked, &workshops.map(|a| (a, "conf/x")));
        write(&writer, WIKIDATA, DBLP, &RelKind::Linked, &[("Q1", "conf/x")]);

        let outcome = inferencer.promote().unwrap();
        assert!(outcome.promoted.is_empty());
        assert_eq!(graph.relationships(&RelKind::Linked).unwrap().len(), 4);
    }

    #[test]
    fn test_supersession_deletes_both_directions() {
        let (graph, writer, inferencer) = setup();
        write(&writer, WIKIDATA, DBLP, &RelKind::Matches, &[("Q1", "conf/x")]);
        write(&writer, DBLP, WIKIDATA, &RelKind::Matches, &[("conf/x", "Q1"), ("conf/y", "Q2")]);
        write(&writer, DBLP, WIKIDATA, &RelKind::Linked, &[("conf/x", "Q9")]);

        assert_eq!(inferencer.delete_superseded().unwrap(), 2);
        let remaining = graph.relationships(&RelKind::Matches).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].from, DBLP.key("conf/y").id());
    }

    #[test]
    fn test_transfer_links_through_same_type_chain() {
        let (graph, writer, inferencer) = setup();
        write(&writer, WIKIDATA, DBLP, &RelKind::Linked, &[("Q1", "conf/a/2014-1")]);
        write(&writer, DBLP, DBLP, &RelKind::Linked, &[("conf/a/2014-1", "conf/a/2014")]);

        assert_eq!(inferencer.transfer().unwrap(), 2);
        let q1 = WIKIDATA.key("Q1").id();
        let targets: Vec<NodeId> = graph
            .outgoing(q1, Some(&RelKind::Linked))
            .unwrap()
            .into_iter()
            .map(|e| e.to)
            .collect();
        assert!(targets.contains(&DBLP.key("conf/a/2014").id()));
        assert_eq!(inferencer.transfer().unwrap(), 0);
    }
}
