//! Conflict reporting for manual review.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::conflict::{ConflictId, ConflictRecord};
use crate::error::{ColocResult, ExecutionError};
use crate::graph::NodeKey;
use crate::storage::{ConflictStore, StorageError};

/// Persists detected conflicts and writes the open ones to a JSON report.
#[derive(Clone)]
pub struct ConflictReporter {
    store: Arc<dyn ConflictStore>,
    path: Option<PathBuf>,
}

impl ConflictReporter {
    /// Creates a reporter that only records into `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ConflictStore>) -> Self {
        Self { store, path: None }
    }

    /// Also writes the open conflicts to `path` after every report.
    #[must_use]
    pub fn with_report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Records conflicts and rewrites the report file.
    ///
    /// Conflicts already on record keep their stored state, including a
    /// reviewer's decision. Returns how many were new.
    pub fn report(&self, conflicts: &[ConflictRecord]) -> ColocResult<usize> {
        if conflicts.is_empty() {
            return Ok(0);
        }

        let mut inserted = 0;
        for conflict in conflicts {
            if self.store.insert(conflict.clone())? {
                inserted += 1;
            }
        }
        let targets: BTreeSet<&NodeKey> = conflicts.iter().map(|c| &c.target).collect();
        tracing::warn!(
            targets = targets.len(),
            conflicts = conflicts.len(),
            new = inserted,
            "ambiguous link targets excluded from linking"
        );

        if let Some(path) = &self.path {
            self.write_report(path)?;
        }
        Ok(inserted)
    }

    /// Targets with at least one open conflict on record.
    pub fn open_targets(&self) -> ColocResult<BTreeSet<NodeKey>> {
        Ok(self.store.find_open()?.into_iter().map(|c| c.target).collect())
    }

    /// Marks a conflict resolved.
    pub fn resolve(&self, id: ConflictId, notes: impl Into<String>) -> ColocResult<ConflictRecord> {
        let mut conflict = self.store.get(id)?.ok_or(StorageError::ConflictNotFound(id))?;
        conflict.resolve(notes);
        self.store.update(conflict.clone())?;
        Ok(conflict)
    }

    /// Dismisses a conflict.
    pub fn dismiss(&self, id: ConflictId) -> ColocResult<ConflictRecord> {
        let mut conflict = self.store.get(id)?.ok_or(StorageError::ConflictNotFound(id))?;
        conflict.dismiss();
        self.store.update(conflict.clone())?;
        Ok(conflict)
    }

    fn write_report(&self, path: &Path) -> ColocResult<()> {
        let report_err = |message: String| ExecutionError::Report {
            path: path.to_path_buf(),
            message,
        };
        let open = self.store.find_open()?;
        let json = serde_json::to_string_pretty(&open).map_err(|e| report_err(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| report_err(e.to_string()))?;
        }
        std::fs::write(path, json).map_err(|e| report_err(e.to_string()))?;
        tracing::info!(path = %path.display(), open = open.len(), "wrote conflict report");
        Ok(())
    }
}
