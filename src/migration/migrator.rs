//! Migrator - Core migration execution engine

use crate::config::MigrateConfig;
use crate::executor::Database;
use crate::migration::execution::{self, run_migration};
use crate::migration::loader::{self, load_migration_file, load_migrations};
use crate::migration::{
    AppliedMigrationRecord, LogReporter, MigrationDefinition, MigrationDirection, MigrationError,
    MigrationLedger, MigrationRegistry, MigrationReporter, MigrationStatus, RunnerOptions,
    UndoAllStrategy, DEFAULT_COLLECTION,
};
use crate::runtime;
use may::sync::mpsc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Which applied migrations `down` undoes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownMode {
    /// Only the most recently applied migration
    Last,
    /// Every applied migration, per [`UndoAllStrategy`]
    All,
}

/// Outcome of [`Migrator::up`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpReport {
    /// Class names applied by this run, in order
    pub applied: Vec<String>,
    /// Discovered migrations that were already applied
    pub skipped: usize,
}

impl UpReport {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Outcome of [`Migrator::down`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownReport {
    /// Class names undone by this run, in ledger order
    pub undone: Vec<String>,
}

impl DownReport {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.undone.is_empty()
    }
}

/// Core migration execution engine
///
/// The `Migrator` orchestrates discovery, the ledger and execution. It never
/// opens or closes connections itself: callers hand it a [`Database`], usually
/// from a [`MigrationSession`](crate::migration::MigrationSession).
pub struct Migrator {
    migrations_dir: PathBuf,
    file_ext: Option<String>,
    collection: String,
    registry: Arc<MigrationRegistry>,
    options: RunnerOptions,
    reporter: Arc<dyn MigrationReporter>,
}

impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("migrations_dir", &self.migrations_dir)
            .field("file_ext", &self.file_ext)
            .field("collection", &self.collection)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Migrator {
    /// Create a new Migrator with the specified migrations directory
    pub fn new(migrations_dir: impl AsRef<Path>, registry: Arc<MigrationRegistry>) -> Self {
        Self {
            migrations_dir: migrations_dir.as_ref().to_path_buf(),
            file_ext: None,
            collection: DEFAULT_COLLECTION.to_string(),
            registry,
            options: RunnerOptions::default(),
            reporter: Arc::new(LogReporter),
        }
    }

    /// Build from loaded configuration
    pub fn from_config(config: &MigrateConfig, registry: Arc<MigrationRegistry>) -> Self {
        let mut migrator = Self::new(&config.migrations_dir, registry)
            .with_collection(config.collection.clone())
            .with_options(config.runner_options());
        if let Some(ext) = &config.file_ext {
            migrator = migrator.with_file_ext(ext.clone());
        }
        migrator
    }

    #[must_use]
    pub fn with_file_ext(mut self, ext: impl Into<String>) -> Self {
        self.file_ext = Some(ext.into());
        self
    }

    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: RunnerOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn MigrationReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    #[must_use]
    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// The ledger for `db`
    #[must_use]
    pub fn ledger(&self, db: &Database) -> MigrationLedger {
        MigrationLedger::new(db, self.collection.clone())
    }

    /// Load every migration in the migrations directory, in discovery order
    ///
    /// # Errors
    ///
    /// See [`load_migrations`].
    pub fn discover_migrations(&self) -> Result<Vec<MigrationDefinition>, MigrationError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::load_span(&self.migrations_dir).entered();

        load_migrations(&self.registry, &self.migrations_dir, self.file_ext.as_deref())
    }

    /// Get migration status (applied vs pending)
    ///
    /// Read-only: nothing is executed and the ledger is not written.
    ///
    /// # Errors
    ///
    /// Returns loader and ledger errors.
    pub fn status(&self, db: &Database) -> Result<MigrationStatus, MigrationError> {
        let discovered = self
            .discover_migrations()?
            .into_iter()
            .map(|d| (d.file, d.class_name))
            .collect();
        let applied = self.ledger(db).applied_migrations()?;
        Ok(MigrationStatus::new(discovered, &applied))
    }

    /// Apply pending migrations
    ///
    /// Pending is every discovered migration without a ledger record, in
    /// discovery order. Each runs to completion and has its record written
    /// before the next starts; the first failure stops the batch. Migrations
    /// applied before the failure keep their records.
    ///
    /// # Errors
    ///
    /// Returns the first loader, execution or ledger error.
    pub fn up(&self, db: &Database) -> Result<UpReport, MigrationError> {
        let discovered = self.discover_migrations()?;
        let ledger = self.ledger(db);
        let applied = ledger.applied_migrations()?;
        let applied_names: HashSet<&str> = applied.iter().map(|r| r.class_name.as_str()).collect();

        let pending: Vec<&MigrationDefinition> = discovered
            .iter()
            .filter(|d| !applied_names.contains(d.class_name.as_str()))
            .collect();
        let mut report = UpReport {
            applied: Vec::with_capacity(pending.len()),
            skipped: discovered.len() - pending.len(),
        };

        if pending.is_empty() {
            self.reporter.nothing_to_do("No pending migrations");
            self.reporter.finished(MigrationDirection::Up, 0);
            return Ok(report);
        }

        for definition in pending {
            self.options.cancel.check()?;
            self.reporter
                .started(&definition.class_name, MigrationDirection::Up);

            let outcome = run_migration(
                definition,
                db,
                MigrationDirection::Up,
                self.options.operation_timeout,
            )
            .and_then(|elapsed| ledger.insert_migration(definition).map(|_| elapsed));

            match outcome {
                Ok(elapsed) => {
                    self.reporter
                        .succeeded(&definition.class_name, MigrationDirection::Up, elapsed);
                    report.applied.push(definition.class_name.clone());
                }
                Err(e) => {
                    self.reporter
                        .failed(&definition.class_name, MigrationDirection::Up, &e);
                    return Err(e);
                }
            }
        }

        self.reporter
            .finished(MigrationDirection::Up, report.applied.len());
        Ok(report)
    }

    /// Undo applied migrations
    ///
    /// An empty ledger is reported as "No migrations found" and is not an
    /// error. Every affected record is resolved to its definition before any
    /// `down` runs.
    ///
    /// # Errors
    ///
    /// - `MigrationError::FileNotFound` if a record's source file is gone
    /// - `MigrationError::MigrationNotFound` if the file no longer exports the class
    /// - execution, timeout and ledger errors
    pub fn down(&self, db: &Database, mode: DownMode) -> Result<DownReport, MigrationError> {
        let ledger = self.ledger(db);
        let records: Vec<AppliedMigrationRecord> = match mode {
            DownMode::Last => ledger.last_applied_migration()?.into_iter().collect(),
            DownMode::All => ledger.applied_migrations()?,
        };

        if records.is_empty() {
            self.reporter.nothing_to_do("No migrations found");
            return Ok(DownReport::default());
        }

        let resolved = records
            .into_iter()
            .map(|record| self.resolve_applied(&record).map(|d| (record, d)))
            .collect::<Result<Vec<_>, _>>()?;

        let report = match (mode, self.options.undo_all) {
            (DownMode::All, UndoAllStrategy::Concurrent) => {
                self.undo_concurrently(db, &ledger, resolved)?
            }
            _ => {
                let mut report = DownReport::default();
                for (record, definition) in resolved.iter().rev() {
                    self.options.cancel.check()?;
                    self.undo_one(db, &ledger, record, definition)?;
                    report.undone.push(definition.class_name.clone());
                }
                report
            }
        };

        self.reporter
            .finished(MigrationDirection::Down, report.undone.len());
        Ok(report)
    }

    /// Reload a record's source file and find its class
    ///
    /// The file is loaded afresh on every call. Relative paths resolve against
    /// the current directory.
    fn resolve_applied(
        &self,
        record: &AppliedMigrationRecord,
    ) -> Result<MigrationDefinition, MigrationError> {
        let path = loader::absolute_path(&record.file);
        load_migration_file(&self.registry, &path)?
            .into_iter()
            .find(|d| d.class_name == record.class_name)
            .ok_or_else(|| MigrationError::MigrationNotFound {
                file: path,
                class_name: record.class_name.clone(),
            })
    }

    /// `down` then delete the ledger record; the record stays if `down` fails
    fn undo_one(
        &self,
        db: &Database,
        ledger: &MigrationLedger,
        record: &AppliedMigrationRecord,
        definition: &MigrationDefinition,
    ) -> Result<(), MigrationError> {
        self.reporter
            .started(&definition.class_name, MigrationDirection::Down);

        let outcome = run_migration(
            definition,
            db,
            MigrationDirection::Down,
            self.options.operation_timeout,
        )
        .and_then(|elapsed| ledger.delete_record(record).map(|_| elapsed));

        match outcome {
            Ok(elapsed) => {
                self.reporter
                    .succeeded(&definition.class_name, MigrationDirection::Down, elapsed);
                Ok(())
            }
            Err(e) => {
                self.reporter
                    .failed(&definition.class_name, MigrationDirection::Down, &e);
                Err(e)
            }
        }
    }

    /// Undo every resolved migration at once
    ///
    /// Each coroutine runs `down` and then deletes its own record. A failure
    /// does not stop the others; once all have settled the first failure in
    /// ledger order is returned. The operation timeout is one deadline for the
    /// whole batch; downs still running when it passes fail with `Timeout`.
    fn undo_concurrently(
        &self,
        db: &Database,
        ledger: &MigrationLedger,
        resolved: Vec<(AppliedMigrationRecord, MigrationDefinition)>,
    ) -> Result<DownReport, MigrationError> {
        self.options.cancel.check()?;

        let (tx, rx) = mpsc::channel();
        let mut handles = Vec::with_capacity(resolved.len());
        let mut outcomes: Vec<Option<Result<Duration, MigrationError>>> =
            resolved.iter().map(|_| None).collect();
        let mut remaining = 0;
        for (index, (record, definition)) in resolved.iter().enumerate() {
            self.reporter
                .started(&definition.class_name, MigrationDirection::Down);

            let tx = tx.clone();
            let db = db.clone();
            let ledger = ledger.clone();
            let record = record.clone();
            let spawned = runtime::spawn({
                let definition = definition.clone();
                move || {
                    let result = execution::execute(&definition, &db, MigrationDirection::Down)
                        .and_then(|elapsed| ledger.delete_record(&record).map(|_| elapsed));
                    let _ = tx.send((index, result));
                }
            });
            match spawned {
                Ok(handle) => {
                    handles.push(Some(handle));
                    remaining += 1;
                }
                Err(e) => {
                    handles.push(None);
                    outcomes[index] = Some(Err(execution::spawn_failed(
                        definition,
                        MigrationDirection::Down,
                        e,
                    )));
                }
            }
        }
        drop(tx);

        let deadline = self.options.operation_timeout.map(|t| Instant::now() + t);
        let mut timed_out = false;
        while remaining > 0 {
            let received = match deadline {
                Some(deadline) => {
                    rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
                }
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok((index, result)) => {
                    outcomes[index] = Some(result);
                    remaining -= 1;
                }
                Err(RecvTimeoutError::Timeout) => {
                    timed_out = true;
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let mut report = DownReport::default();
        let mut first_error = None;
        for ((outcome, handle), (_, definition)) in outcomes.into_iter().zip(handles).zip(&resolved) {
            let outcome = outcome.unwrap_or_else(|| {
                if timed_out {
                    Err(MigrationError::Timeout {
                        class_name: definition.class_name.clone(),
                        direction: MigrationDirection::Down,
                        after: self.options.operation_timeout.unwrap_or_default(),
                    })
                } else {
                    Err(execution::panicked(
                        definition,
                        MigrationDirection::Down,
                        handle.and_then(|h| h.join().err()),
                    ))
                }
            });

            match outcome {
                Ok(elapsed) => {
                    self.reporter
                        .succeeded(&definition.class_name, MigrationDirection::Down, elapsed);
                    report.undone.push(definition.class_name.clone());
                }
                Err(e) => {
                    self.reporter
                        .failed(&definition.class_name, MigrationDirection::Down, &e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}
