//! Progress reporting for migration runs

use crate::migration::{MigrationDirection, MigrationError};
use std::time::Duration;

/// Receives progress events as the runner works through a batch
///
/// Every method has a no-op default so front ends only override what they show.
pub trait MigrationReporter: Send + Sync {
    /// A migration is about to run
    fn started(&self, _class_name: &str, _direction: MigrationDirection) {}

    /// A migration finished and its ledger record was written or removed
    fn succeeded(&self, _class_name: &str, _direction: MigrationDirection, _elapsed: Duration) {}

    fn failed(&self, _class_name: &str, _direction: MigrationDirection, _error: &MigrationError) {}

    /// Nothing to apply or undo
    fn nothing_to_do(&self, _message: &str) {}

    /// The batch is over; `count` migrations were processed
    fn finished(&self, _direction: MigrationDirection, _count: usize) {}
}

/// Reports through the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl MigrationReporter for LogReporter {
    fn started(&self, class_name: &str, direction: MigrationDirection) {
        log::info!("Migrating {direction}: {class_name}");
    }

    fn succeeded(&self, class_name: &str, direction: MigrationDirection, elapsed: Duration) {
        log::info!("Migrated {direction}: {class_name} ({} ms)", elapsed.as_millis());
    }

    fn failed(&self, class_name: &str, direction: MigrationDirection, error: &MigrationError) {
        log::error!("Migration {direction} failed: {class_name}: {error}");
    }

    fn nothing_to_do(&self, message: &str) {
        log::warn!("{message}");
    }

    fn finished(&self, direction: MigrationDirection, count: usize) {
        match (direction, count) {
            (MigrationDirection::Up, 0) => log::info!("Database is up to date"),
            (MigrationDirection::Up, n) => log::info!("Applied {n} migration(s)"),
            (MigrationDirection::Down, n) => log::info!("Undid {n} migration(s)"),
        }
    }
}
