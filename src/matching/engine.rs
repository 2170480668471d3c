//! Multi-pass matching of a working set against target records.

use std::collections::{HashMap, HashSet};

use crate::config::ResolverConfig;
use crate::error::ColocResult;
use crate::matching::similarity::SimilarityScorer;
use crate::matching::{
    MatchCandidate, MatchMethod, MatchOutcome, MatchType, MatchTypeOrder, MatchedPair, PassReport,
    WorkingSet,
};
use crate::record::{EventRecord, RecordId};

/// Hash indexes over the target records for the deterministic joins.
#[derive(Debug, Default)]
struct TargetIndex {
    by_short_country: HashMap<(String, String), Vec<usize>>,
    by_short_month: HashMap<(String, u32), Vec<usize>>,
}

impl TargetIndex {
    fn build(targets: &[EventRecord]) -> Self {
        let mut index = Self::default();
        for (i, target) in targets.iter().enumerate() {
            let Some(short) = target.short_key() else {
                continue;
            };
            if let Some(country) = target.country.known() {
                index
                    .by_short_country
                    .entry((short.clone(), country.to_string()))
                    .or_default()
                    .push(i);
            }
            if let Some(month) = target.month {
                index.by_short_month.entry((short, month.number())).or_default().push(i);
            }
        }
        index
    }
}

type DedupKey = (RecordId, Option<String>, Option<String>);

/// Pairs accepted within one pass, deduplicated on insertion.
struct PassPairs<'a> {
    pass: usize,
    targets: &'a [EventRecord],
    seen: HashSet<DedupKey>,
    pairs: Vec<MatchedPair>,
    report: PassReport,
}

impl<'a> PassPairs<'a> {
    fn new(
        pass: usize,
        match_type: Option<&MatchType>,
        extracted: usize,
        targets: &'a [EventRecord],
    ) -> Self {
        Self {
            pass,
            targets,
            seen: HashSet::new(),
            pairs: Vec::new(),
            report: PassReport {
                pass,
                match_type: match_type.cloned(),
                extracted,
                ..PassReport::default()
            },
        }
    }

    fn accept(
        &mut self,
        working: &EventRecord,
        target: usize,
        method: MatchMethod,
        score: Option<f64>,
    ) {
        let targets = self.targets;
        let target = &targets[target];
        let key = (
            working.id.clone(),
            target.primary_title().map(str::to_string),
            target.short.clone(),
        );
        if !self.seen.insert(key) {
            return;
        }
        *self.report.accepted.entry(method).or_insert(0) += 1;
        self.pairs.push(MatchedPair {
            candidate: MatchCandidate {
                working_id: working.id.clone(),
                target_id: target.id.clone(),
                method,
                pass: self.pass,
                score,
            },
            working: working.clone(),
            target: target.clone(),
        });
    }

    fn skip(&mut self, working: &EventRecord, method: MatchMethod, missing: &'static str) {
        tracing::debug!(
            pass = self.pass,
            working = %working.id,
            rule = %method,
            missing,
            "record lacks attribute required by rule"
        );
        *self.report.skipped.entry(method).or_insert(0) += 1;
    }

    fn finish(mut self) -> (Vec<MatchedPair>, PassReport) {
        self.report.consumed = self
            .pairs
            .iter()
            .map(|p| &p.candidate.working_id)
            .collect::<HashSet<_>>()
            .len();
        (self.pairs, self.report)
    }
}

/// Prioritized multi-pass matcher.
///
/// Every pass combines two deterministic joins on the short title with a
/// gated title-similarity fallback. Working records consumed by a pass are
/// removed from the working set before the next pass is extracted.
#[derive(Debug, Clone)]
pub struct MatchEngine {
    order: MatchTypeOrder,
    scorer: SimilarityScorer,
}

impl MatchEngine {
    /// Creates an engine.
    pub fn new(
        order: MatchTypeOrder,
        threshold: f64,
        max_document_frequency: f64,
    ) -> ColocResult<Self> {
        Ok(Self {
            order,
            scorer: SimilarityScorer::new(threshold, max_document_frequency)?,
        })
    }

    /// Creates an engine from configuration.
    pub fn from_config(config: &ResolverConfig) -> ColocResult<Self> {
        Self::new(
            config.match_types.clone(),
            config.match_threshold,
            config.max_document_frequency,
        )
    }

    /// Returns the pass order.
    #[must_use]
    pub fn order(&self) -> &MatchTypeOrder {
        &self.order
    }

    /// Runs one pass per match type against `targets`.
    ///
    /// # Errors
    /// Fails on the first extract or removal error; nothing from the failing
    /// pass is kept.
    pub fn run(
        &self,
        working: &mut dyn WorkingSet,
        targets: &[EventRecord],
    ) -> ColocResult<MatchOutcome> {
        let index = TargetIndex::build(targets);
        let mut outcome = MatchOutcome::default();
        let mut consumed: HashSet<RecordId> = HashSet::new();

        for (pass, match_type) in self.order.as_slice().iter().enumerate() {
            let mut extract = working.extract(match_type)?;
            extract.retain(|r| !consumed.contains(&r.id));

            let (pairs, report) =
                self.match_pass(pass, Some(match_type), &extract, targets, &index);

            let mut removed: Vec<RecordId> = Vec::new();
            for pair in &pairs {
                if consumed.insert(pair.candidate.working_id.clone()) {
                    removed.push(pair.candidate.working_id.clone());
                }
            }
            if !removed.is_empty() {
                working.remove(&removed)?;
            }

            tracing::info!(
                pass,
                match_type = %match_type,
                extracted = report.extracted,
                accepted = report.accepted_total(),
                consumed = report.consumed,
                "matching pass complete"
            );
            outcome.pairs.extend(pairs);
            outcome.passes.push(report);
        }

        Ok(outcome)
    }

    /// Matches two fixed record sets in a single pass, without removal.
    #[must_use]
    pub fn match_records(&self, left: &[EventRecord], right: &[EventRecord]) -> MatchOutcome {
        let index = TargetIndex::build(right);
        let (pairs, report) = self.match_pass(0, None, left, right, &index);
        tracing::info!(
            left = left.len(),
            right = right.len(),
            accepted = report.accepted_total(),
            "matched record sets"
        );
        MatchOutcome {
            pairs,
            passes: vec![report],
        }
    }

    fn match_pass(
        &self,
        pass: usize,
        match_type: Option<&MatchType>,
        working: &[EventRecord],
        targets: &[EventRecord],
        index: &TargetIndex,
    ) -> (Vec<MatchedPair>, PassReport) {
        let mut accepted = PassPairs::new(pass, match_type, working.len(), targets);
        let mut month_hits: Vec<(usize, usize)> = Vec::new();

        for (wi, record) in working.iter().enumerate() {
            let Some(short) = record.short_key() else {
                accepted.skip(record, MatchMethod::ExactShortCountry, "short");
                accepted.skip(record, MatchMethod::ExactShortMonth, "short");
                continue;
            };

            match record.country.known() {
                Some(country) => {
                    let key = (short.clone(), country.to_string());
                    if let Some(hits) = index.by_short_country.get(&key) {
                        for &ti in hits {
                            accepted.accept(record, ti, MatchMethod::ExactShortCountry, None);
                        }
                    }
                }
                None => accepted.skip(record, MatchMethod::ExactShortCountry, "country"),
            }

            match record.month {
                Some(month) => {
                    if let Some(hits) = index.by_short_month.get(&(short, month.number())) {
                        month_hits.extend(hits.iter().map(|&ti| (wi, ti)));
                    }
                }
                None => accepted.skip(record, MatchMethod::ExactShortMonth, "month"),
            }
        }
        for (wi, ti) in month_hits {
            accepted.accept(&working[wi], ti, MatchMethod::ExactShortMonth, None);
        }

        for record in working.iter().filter(|r| !r.has_titles()) {
            accepted.skip(record, MatchMethod::FuzzyTitle, "title");
        }
        if !targets.is_empty() && working.iter().any(EventRecord::has_titles) {
            for scored in self.scorer.score(working, targets) {
                accepted.accept(
                    &working[scored.working],
                    scored.target,
                    MatchMethod::FuzzyTitle,
                    Some(scored.score),
                );
            }
        }

        accepted.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::InMemoryWorkingSet;
    use crate::record::{RecordKind, Source};

    fn workshop(id: &str, short: &str, country: &str) -> EventRecord {
        EventRecord::builder(Source::CeurWs, RecordKind::Workshop)
            .id(id)
            .short(short)
            .country(country)
            .build()
            .unwrap()
    }

    fn conference(
        id: &str,
        title: &str,
        short: &str,
        country: &str,
        month: Option<u32>,
    ) -> EventRecord {
        let mut builder = EventRecord::builder(Source::Wikidata, RecordKind::Conference)
            .id(id)
            .title(title)
            .short(short)
            .country(country)
            .year(2013);
        if let Some(month) = month {
            builder = builder.month(month);
        }
        builder.build().unwrap()
    }

    fn engine(order: &[&str]) -> MatchEngine {
        let order = MatchTypeOrder::from_names(order.iter().copied()).unwrap();
        MatchEngine::new(order, 0.7, 0.7).unwrap()
    }

    #[test]
    fn test_short_country_join_is_case_insensitive() {
        let targets = vec![conference(
            "Q48025934",
            "Semantic Web Conference",
            "ISWC 2013",
            "AUS",
            None,
        )];
        let working = [workshop("1030", " iswc 2013 ", "aus")];
        let outcome = engine(&["at"]).match_records(&working, &targets);
        assert_eq!(outcome.pairs.len(), 1);
        assert_eq!(outcome.pairs[0].candidate.method, MatchMethod::ExactShortCountry);
        assert_eq!(outcome.pairs[0].candidate.score, None);
    }

    #[test]
    fn test_country_join_wins_over_month_join() {
        let working = EventRecord::builder(Source::CeurWs, RecordKind::Workshop)
            .id("1045")
            .short("ISWC 2013")
            .country("AUS")
            .month(10)
            .build()
            .unwrap();
        let targets = vec![conference(
            "Q1",
            "Semantic Web Conference",
            "ISWC 2013",
            "AUS",
            Some(10),
        )];
        let outcome = engine(&["at"]).match_records(&[working], &targets);
        assert_eq!(outcome.pairs.len(), 1);
        assert_eq!(outcome.pairs[0].candidate.method, MatchMethod::ExactShortCountry);
        assert_eq!(outcome.passes[0].accepted[&MatchMethod::ExactShortCountry], 1);
        assert!(!outcome.passes[0].accepted.contains_key(&MatchMethod::ExactShortMonth));
    }

    #[test]
    fn test_missing_attributes_are_skipped_per_rule() {
        let working = EventRecord::builder(Source::CeurWs, RecordKind::Workshop)
            .id("9")
            .short("ESWC 2013")
            .month(5)
            .build()
            .unwrap();
        let targets = vec![conference(
            "Q2",
            "Extended Semantic Web Conference",
            "ESWC 2013",
            "FRA",
            Some(5),
        )];
        let outcome = engine(&["at"]).match_records(&[working], &targets);

        let report = &outcome.passes[0];
        assert_eq!(report.skipped[&MatchMethod::ExactShortCountry], 1);
        assert!(!report.skipped.contains_key(&MatchMethod::ExactShortMonth));
        assert_eq!(outcome.pairs.len(), 1);
        assert_eq!(outcome.pairs[0].candidate.method, MatchMethod::ExactShortMonth);
    }

    #[test]
    fn test_run_removes_consumed_records() {
        let targets = vec![conference(
            "Q48025934",
            "Semantic Web Conference",
            "ISWC 2013",
            "AUS",
            None,
        )];
        let mut set = InMemoryWorkingSet::new()
            .with_extract(
                MatchType::new("coloc").unwrap(),
                vec![workshop("1030", "ISWC 2013", "AUS")],
            )
            .with_extract(
                MatchType::new("hosted").unwrap(),
                vec![workshop("1030", "ISWC 2013", "AUS"), workshop("1034", "ISWC 2013", "AUS")],
            );

        let outcome = engine(&["coloc", "hosted"]).run(&mut set, &targets).unwrap();
        let passes: Vec<(String, usize)> = outcome
            .pairs
            .iter()
            .map(|p| (p.candidate.working_id.to_string(), p.candidate.pass))
            .collect();
        assert_eq!(passes, vec![("1030".to_string(), 0), ("1034".to_string(), 1)]);
        assert_eq!(outcome.passes[1].extracted, 1);
        assert_eq!(set.remaining(), 0);

        let again = engine(&["coloc", "hosted"]).run(&mut set, &targets).unwrap();
        assert!(again.is_empty());
    }
}
