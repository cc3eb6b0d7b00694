//! Migration status tracking

use crate::migration::AppliedMigrationRecord;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Whether a discovered migration has a ledger record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationState {
    Applied { applied_at: DateTime<Utc> },
    Pending,
}

impl MigrationState {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, MigrationState::Applied { .. })
    }
}

/// One discovered migration and its state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub file: PathBuf,
    pub class_name: String,
    pub state: MigrationState,
}

/// Migration status information
#[derive(Debug, Clone, Default)]
pub struct MigrationStatus {
    /// Every discovered migration, in discovery order
    pub entries: Vec<StatusEntry>,

    /// Ledger records whose class is no longer discovered
    pub orphaned: Vec<AppliedMigrationRecord>,
}

impl MigrationStatus {
    /// Classify `discovered` (file, class name) pairs against the ledger
    #[must_use]
    pub fn new(discovered: Vec<(PathBuf, String)>, applied: &[AppliedMigrationRecord]) -> Self {
        let entries: Vec<StatusEntry> = discovered
            .into_iter()
            .map(|(file, class_name)| {
                let state = applied
                    .iter()
                    .find(|record| record.class_name == class_name)
                    .map_or(MigrationState::Pending, |record| MigrationState::Applied {
                        applied_at: record.applied_at,
                    });
                StatusEntry {
                    file,
                    class_name,
                    state,
                }
            })
            .collect();

        let orphaned = applied
            .iter()
            .filter(|record| !entries.iter().any(|e| e.class_name == record.class_name))
            .cloned()
            .collect();

        Self { entries, orphaned }
    }

    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.entries.iter().filter(|e| e.state.is_applied()).count()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.entries.len() - self.applied_count()
    }

    /// Check if all migrations are applied
    #[must_use]
    pub fn is_up_to_date(&self) -> bool {
        self.pending_count() == 0
    }

    /// Pending entries, in discovery order
    pub fn pending(&self) -> impl Iterator<Item = &StatusEntry> {
        self.entries.iter().filter(|e| !e.state.is_applied())
    }
}
