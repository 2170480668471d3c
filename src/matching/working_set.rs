use std::collections::{BTreeMap, HashSet};

use crate::error::ColocResult;
use crate::matching::MatchType;
use crate::record::{EventRecord, RecordId};

/// The unresolved working set the matcher draws from.
///
/// `extract` yields the records still unresolved for one match type;
/// `remove` marks records as consumed so no later `extract` returns them.
/// Implementations backed by an external extractor report failures as
/// `SourceUnavailable`, which aborts the run.
pub trait WorkingSet {
    /// Returns the unresolved records extracted for `match_type`.
    fn extract(&mut self, match_type: &MatchType) -> ColocResult<Vec<EventRecord>>;

    /// Removes consumed records from every future extract.
    fn remove(&mut self, ids: &[RecordId]) -> ColocResult<()>;
}

/// Owned in-memory working set holding pre-extracted records per match type.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWorkingSet {
    extracts: BTreeMap<MatchType, Vec<EventRecord>>,
    removed: HashSet<RecordId>,
}

impl InMemoryWorkingSet {
    /// Creates an empty working set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds records to the extract of a match type.
    #[must_use]
    pub fn with_extract(mut self, match_type: MatchType, records: Vec<EventRecord>) -> Self {
        self.extracts.entry(match_type).or_default().extend(records);
        self
    }

    /// Returns true if `id` has been consumed.
    #[must_use]
    pub fn is_removed(&self, id: &RecordId) -> bool {
        self.removed.contains(id)
    }

    /// Distinct record ids still unresolved across all extracts.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.extracts
            .values()
            .flatten()
            .map(|r| &r.id)
            .collect::<HashSet<_>>()
            .len()
    }
}

impl WorkingSet for InMemoryWorkingSet {
    fn extract(&mut self, match_type: &MatchType) -> ColocResult<Vec<EventRecord>> {
        Ok(self.extracts.get(match_type).cloned().unwrap_or_default())
    }

    fn remove(&mut self, ids: &[RecordId]) -> ColocResult<()> {
        self.removed.extend(ids.iter().cloned());
        let removed = &self.removed;
        for records in self.extracts.values_mut() {
            records.retain(|r| !removed.contains(&r.id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{RecordKind, Source};

    fn workshop(id: &str) -> EventRecord {
        EventRecord::builder(Source::CeurWs, RecordKind::Workshop)
            .id(id)
            .short("ISWC 2013")
            .build()
            .unwrap()
    }

    #[test]
    fn test_remove_applies_to_every_extract() {
        let hosted = MatchType::new("hosted").unwrap();
        let mut set = InMemoryWorkingSet::new()
            .with_extract(MatchType::colocated(), vec![workshop("1030"), workshop("1034")])
            .with_extract(hosted.clone(), vec![workshop("1030"), workshop("1045")]);
        assert_eq!(set.remaining(), 3);

        set.remove(&[RecordId::new("1030").unwrap()]).unwrap();
        assert!(set.is_removed(&RecordId::new("1030").unwrap()));
        assert_eq!(set.remaining(), 2);

        let ids: Vec<String> = set
            .extract(&hosted)
            .unwrap()
            .into_iter()
            .map(|r| r.id.to_string())
            .collect();
        assert_eq!(ids, vec!["1045"]);
    }

    #[test]
    fn test_unknown_match_type_is_empty() {
        let mut set = InMemoryWorkingSet::new();
        assert!(set.extract(&MatchType::new("part").unwrap()).unwrap().is_empty());
    }
}
