//! Title similarity over a jointly fit TF-IDF space.
//!
//! Titles of one conference series are nearly identical from year to year
//! ("29th ... 2003" vs "30th ... 2005"), so a similarity score on its own
//! never accepts a pair. Accepted pairs must also agree on the year and on
//! one more deterministic attribute (country or month).

use std::collections::{BTreeMap, HashMap};

use regex::Regex;

use crate::error::{ColocError, ColocResult, ValidationError};
use crate::record::EventRecord;

/// Default share of documents above which a term is treated as boilerplate.
pub const DEFAULT_MAX_DOCUMENT_FREQUENCY: f64 = 0.7;

/// Sparse, L2-normalized term vector sorted by term index.
pub type TermVector = Vec<(usize, f64)>;

fn check_unit_range(name: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ValidationError::InvalidThreshold {
            name: name.to_string(),
            range: "(0, 1]".to_string(),
            value,
        })
    }
}

/// TF-IDF vectorizer with smoothed idf and a maximum document frequency.
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
    token: Regex,
    max_document_frequency: f64,
}

impl TfidfVectorizer {
    /// Creates a vectorizer.
    ///
    /// `max_document_frequency` is a share of the corpus in `(0, 1]`; terms
    /// occurring in more documents than that are dropped from the vocabulary.
    pub fn new(max_document_frequency: f64) -> ColocResult<Self> {
        check_unit_range("max_document_frequency", max_document_frequency)?;
        let token = Regex::new(r"\b\w\w+\b")
            .map_err(|e| ColocError::internal(format!("invalid token pattern: {e}")))?;
        Ok(Self {
            token,
            max_document_frequency,
        })
    }

    fn term_counts(&self, doc: &str) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for m in self.token.find_iter(&doc.to_lowercase()) {
            *counts.entry(m.as_str().to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Fits the vocabulary on `docs` and returns one vector per document.
    ///
    /// Documents with no surviving terms get an empty vector.
    #[must_use]
    pub fn fit_transform(&self, docs: &[&str]) -> Vec<TermVector> {
        let counts: Vec<HashMap<String, usize>> =
            docs.iter().map(|d| self.term_counts(d)).collect();

        let mut document_frequency: BTreeMap<&str, usize> = BTreeMap::new();
        for doc in &counts {
            for term in doc.keys() {
                *document_frequency.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let n = docs.len() as f64;
        let max_count = self.max_document_frequency * n;

        // BTreeMap order gives every term a stable index.
        let mut vocabulary: HashMap<&str, (usize, f64)> = HashMap::new();
        for (&term, &df) in &document_frequency {
            #[allow(clippy::cast_precision_loss)]
            let df = df as f64;
            if df > max_count {
                continue;
            }
            let idf = ((1.0 + n) / (1.0 + df)).ln() + 1.0;
            let index = vocabulary.len();
            vocabulary.insert(term, (index, idf));
        }

        counts
            .iter()
            .map(|doc| {
                let mut vector: TermVector = doc
                    .iter()
                    .filter_map(|(term, count)| {
                        vocabulary.get(term.as_str()).map(|(index, idf)| {
                            #[allow(clippy::cast_precision_loss)]
                            let tf = *count as f64;
                            (*index, tf * idf)
                        })
                    })
                    .collect();
                vector.sort_unstable_by_key(|(index, _)| *index);

                let norm = vector.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
                if norm > 0.0 {
                    for (_, w) in &mut vector {
                        *w /= norm;
                    }
                }
                vector
            })
            .collect()
    }
}

/// Cosine similarity of two normalized sparse vectors.
#[must_use]
pub fn cosine(a: &TermVector, b: &TermVector) -> f64 {
    let (mut i, mut j) = (0, 0);
    let mut dot = 0.0;
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dot += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    if dot.is_finite() {
        dot
    } else {
        0.0
    }
}

/// An accepted fuzzy pair, as indices into the scored slices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredPair {
    /// Index into the working records.
    pub working: usize,
    /// Index into the target records.
    pub target: usize,
    /// Best cosine similarity over the records' titles.
    pub score: f64,
}

fn push_titles<'a>(records: &'a [EventRecord], docs: &mut Vec<&'a str>, owners: &mut Vec<usize>) {
    for (index, record) in records.iter().enumerate() {
        for title in record.titles.iter().filter(|t| !t.trim().is_empty()) {
            docs.push(title);
            owners.push(index);
        }
    }
}

fn same_year(a: &EventRecord, b: &EventRecord) -> bool {
    matches!((a.year, b.year), (Some(x), Some(y)) if x == y)
}

fn confirmed(a: &EventRecord, b: &EventRecord) -> bool {
    let same_country =
        matches!((a.country.known(), b.country.known()), (Some(x), Some(y)) if x == y);
    let same_month = matches!((a.month, b.month), (Some(x), Some(y)) if x == y);
    same_country || same_month
}

/// Scores titled records against each other.
#[derive(Debug, Clone)]
pub struct SimilarityScorer {
    threshold: f64,
    vectorizer: TfidfVectorizer,
}

impl SimilarityScorer {
    /// Creates a scorer accepting similarities at or above `threshold`.
    pub fn new(threshold: f64, max_document_frequency: f64) -> ColocResult<Self> {
        check_unit_range("match_threshold", threshold)?;
        Ok(Self {
            threshold,
            vectorizer: TfidfVectorizer::new(max_document_frequency)?,
        })
    }

    /// Returns the acceptance threshold.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Returns gated pairs between `working` and `targets`, ordered by index.
    ///
    /// Every title of every record is one document of the joint corpus. A
    /// target may appear in several pairs.
    #[must_use]
    pub fn score(&self, working: &[EventRecord], targets: &[EventRecord]) -> Vec<ScoredPair> {
        let mut docs: Vec<&str> = Vec::new();
        let mut owners: Vec<usize> = Vec::new();
        push_titles(working, &mut docs, &mut owners);
        let split = docs.len();
        push_titles(targets, &mut docs, &mut owners);
        if split == 0 || split == docs.len() {
            return Vec::new();
        }

        let vectors = self.vectorizer.fit_transform(&docs);

        let mut best: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for wi in 0..split {
            for ti in split..docs.len() {
                let score = cosine(&vectors[wi], &vectors[ti]);
                if score < self.threshold {
                    continue;
                }
                let slot = best.entry((owners[wi], owners[ti])).or_insert(score);
                if score > *slot {
                    *slot = score;
                }
            }
        }

        let above = best.len();
        let pairs: Vec<ScoredPair> = best
            .into_iter()
            .filter(|((w, t), _)| same_year(&working[*w], &targets[*t]))
            .filter(|((w, t), _)| confirmed(&working[*w], &targets[*t]))
            .map(|((working, target), score)| ScoredPair { working, target, score })
            .collect();

        tracing::debug!(
            documents = docs.len(),
            above_threshold = above,
            accepted = pairs.len(),
            "scored title similarity"
        );
        pairs
    }
}
