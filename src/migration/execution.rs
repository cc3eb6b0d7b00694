//! Running a single migration: timing, timeouts and cancellation

use crate::executor::Database;
use crate::migration::{MigrationDefinition, MigrationDirection, MigrationError};
use crate::runtime;
use may::sync::mpsc;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;
#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// How `down --all` undoes the applied set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndoAllStrategy {
    /// Every `down` runs at once with no ordering between migrations
    #[default]
    Concurrent,
    /// Newest first, one at a time, stopping at the first failure
    ReverseSequential,
}

/// Cooperative cancellation flag, checked before each migration starts
///
/// A migration that is already running is never interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// # Errors
    ///
    /// Returns `MigrationError::Cancelled` once [`cancel`](Self::cancel) was called.
    pub fn check(&self) -> Result<(), MigrationError> {
        if self.is_cancelled() {
            return Err(MigrationError::Cancelled);
        }
        Ok(())
    }
}

/// Runner behavior knobs
#[derive(Debug, Clone, Default)]
pub struct RunnerOptions {
    /// Upper bound for a single `up`/`down`. `None` waits indefinitely.
    ///
    /// Under [`UndoAllStrategy::Concurrent`] every `down` starts at once, so
    /// the bound is one deadline for the whole batch, counted from the moment
    /// the downs are spawned.
    pub operation_timeout: Option<Duration>,
    pub undo_all: UndoAllStrategy,
    pub cancel: CancelToken,
}

impl RunnerOptions {
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_undo_all(mut self, strategy: UndoAllStrategy) -> Self {
        self.undo_all = strategy;
        self
    }

    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Run `definition` on the current coroutine/thread and time it
pub(crate) fn execute(
    definition: &MigrationDefinition,
    db: &Database,
    direction: MigrationDirection,
) -> Result<Duration, MigrationError> {
    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::migration_span(&definition.class_name, direction_label(direction))
        .entered();

    let start = Instant::now();
    let result = definition.run(db, direction);
    let elapsed = start.elapsed();

    match result {
        Ok(()) => {
            #[cfg(feature = "metrics")]
            match direction {
                MigrationDirection::Up => METRICS.record_applied(elapsed),
                MigrationDirection::Down => METRICS.record_undone(elapsed),
            }
            Ok(elapsed)
        }
        Err(error) => {
            #[cfg(feature = "metrics")]
            METRICS.record_failure(direction_label(direction));
            Err(MigrationError::Execution {
                class_name: definition.class_name.clone(),
                direction,
                error,
            })
        }
    }
}

/// Run `definition` in its own coroutine, waiting at most `timeout`
///
/// The wait parks the calling coroutine rather than its worker thread, so
/// this is safe to call from inside a coroutine on a single-worker runtime.
/// On timeout the coroutine is left to finish on its own; the caller must not
/// touch the ledger for this migration.
pub(crate) fn run_migration(
    definition: &MigrationDefinition,
    db: &Database,
    direction: MigrationDirection,
    timeout: Option<Duration>,
) -> Result<Duration, MigrationError> {
    let (tx, rx) = mpsc::channel();
    let handle = runtime::spawn({
        let definition = definition.clone();
        let db = db.clone();
        move || {
            let _ = tx.send(execute(&definition, &db, direction));
        }
    })
    .map_err(|e| spawn_failed(definition, direction, e))?;

    let received = match timeout {
        Some(after) => rx.recv_timeout(after),
        None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
    };

    match received {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            #[cfg(feature = "metrics")]
            METRICS.record_failure(direction_label(direction));
            Err(MigrationError::Timeout {
                class_name: definition.class_name.clone(),
                direction,
                after: timeout.unwrap_or_default(),
            })
        }
        Err(RecvTimeoutError::Disconnected) => Err(panicked(definition, direction, handle.join().err())),
    }
}

/// Error for a migration whose coroutine could not be started
pub(crate) fn spawn_failed(
    definition: &MigrationDefinition,
    direction: MigrationDirection,
    error: std::io::Error,
) -> MigrationError {
    MigrationError::Execution {
        class_name: definition.class_name.clone(),
        direction,
        error: crate::executor::DocError::Io(error),
    }
}

/// Error for a migration coroutine that died without reporting a result
pub(crate) fn panicked(
    definition: &MigrationDefinition,
    direction: MigrationDirection,
    payload: Option<Box<dyn std::any::Any + Send>>,
) -> MigrationError {
    let reason = payload
        .map(|p| runtime::panic_message(&*p))
        .unwrap_or_else(|| "migration coroutine exited without a result".to_string());
    #[cfg(feature = "metrics")]
    METRICS.record_failure(direction_label(direction));
    MigrationError::Execution {
        class_name: definition.class_name.clone(),
        direction,
        error: crate::executor::DocError::Other(format!("panicked: {reason}")),
    }
}

#[cfg(any(feature = "metrics", feature = "tracing"))]
fn direction_label(direction: MigrationDirection) -> &'static str {
    match direction {
        MigrationDirection::Up => "up",
        MigrationDirection::Down => "down",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::DocError;
    use crate::migration::Migration;
    use crate::store::MemoryExecutor;
    use std::path::PathBuf;

    struct Sleepy(Duration);

    impl Migration for Sleepy {
        fn up(&self, _db: &Database) -> Result<(), DocError> {
            may::coroutine::sleep(self.0);
            Ok(())
        }

        fn down(&self, _db: &Database) -> Result<(), DocError> {
            Err(DocError::Other("cannot undo".into()))
        }
    }

    struct Panics;

    impl Migration for Panics {
        fn up(&self, _db: &Database) -> Result<(), DocError> {
            panic!("boom");
        }

        fn down(&self, _db: &Database) -> Result<(), DocError> {
            Ok(())
        }
    }

    fn db() -> Database {
        Database::new("test", Arc::new(MemoryExecutor::new()))
    }

    fn definition(instance: Arc<dyn Migration>) -> MigrationDefinition {
        MigrationDefinition::new(PathBuf::from("/m/001_a.rs"), "A", instance)
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());
        token.clone().cancel();
        assert!(matches!(token.check(), Err(MigrationError::Cancelled)));
    }

    #[test]
    fn test_run_migration_success_and_failure() {
        let def = definition(Arc::new(Sleepy(Duration::from_millis(1))));
        assert!(run_migration(&def, &db(), MigrationDirection::Up, None).is_ok());

        let err = run_migration(&def, &db(), MigrationDirection::Down, None).unwrap_err();
        assert!(matches!(
            err,
            MigrationError::Execution { direction: MigrationDirection::Down, .. }
        ));
    }

    #[test]
    fn test_run_migration_times_out() {
        let def = definition(Arc::new(Sleepy(Duration::from_secs(2))));
        let err = run_migration(
            &def,
            &db(),
            MigrationDirection::Up,
            Some(Duration::from_millis(20)),
        )
        .unwrap_err();
        assert!(matches!(err, MigrationError::Timeout { .. }));
    }

    #[test]
    fn test_run_migration_reports_panic() {
        let def = definition(Arc::new(Panics));
        let err = run_migration(&def, &db(), MigrationDirection::Up, None).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_undo_all_strategy_deserializes_snake_case() {
        let strategy: UndoAllStrategy = serde_json::from_str("\"reverse_sequential\"").unwrap();
        assert_eq!(strategy, UndoAllStrategy::ReverseSequential);
    }
}
