//! In-process migration execution helpers
//!
//! Each helper is one top-level command: open a session from configuration,
//! run the migrator, close the session, then fire the matching hook once.

use crate::config::MigrateConfig;
use crate::migration::{
    DownMode, DownReport, MigrationError, MigrationHooks, MigrationRegistry, MigrationReporter,
    MigrationSession, MigrationStatus, Migrator, UpReport,
};
use std::sync::Arc;

fn session(config: &MigrateConfig) -> Result<MigrationSession, MigrationError> {
    MigrationSession::open(&config.uri, &config.database, &config.options)
}

fn migrator(
    config: &MigrateConfig,
    registry: Arc<MigrationRegistry>,
    reporter: Option<Arc<dyn MigrationReporter>>,
) -> Migrator {
    let migrator = Migrator::from_config(config, registry);
    match reporter {
        Some(reporter) => migrator.with_reporter(reporter),
        None => migrator,
    }
}

/// Apply pending migrations, then run `after_up`
///
/// # Errors
///
/// Returns connection, loader, execution and ledger errors. The hook does not
/// run on error.
pub fn run_up(
    config: &MigrateConfig,
    registry: Arc<MigrationRegistry>,
    hooks: &MigrationHooks,
    reporter: Option<Arc<dyn MigrationReporter>>,
) -> Result<UpReport, MigrationError> {
    let migrator = migrator(config, registry, reporter);
    let report = session(config)?.run(|db| migrator.up(db))?;
    hooks.run_after_up();
    Ok(report)
}

/// Undo migrations per `mode`, then run `after_down`
///
/// # Errors
///
/// Same as [`Migrator::down`], plus connection errors.
pub fn run_down(
    config: &MigrateConfig,
    registry: Arc<MigrationRegistry>,
    mode: DownMode,
    hooks: &MigrationHooks,
    reporter: Option<Arc<dyn MigrationReporter>>,
) -> Result<DownReport, MigrationError> {
    let migrator = migrator(config, registry, reporter);
    let report = session(config)?.run(|db| migrator.down(db, mode))?;
    hooks.run_after_down();
    Ok(report)
}

/// Report applied and pending migrations
///
/// # Errors
///
/// Returns connection, loader and ledger errors.
pub fn run_status(
    config: &MigrateConfig,
    registry: Arc<MigrationRegistry>,
) -> Result<MigrationStatus, MigrationError> {
    let migrator = migrator(config, registry, None);
    session(config)?.run(|db| migrator.status(db))
}

/// Run migrations on application startup
///
/// Intended for application initialization: applies whatever is pending and
/// fails fast, so the application should not start if this returns an error.
///
/// Concurrent runners against the same database are not coordinated; deploy
/// with a single migrating instance.
///
/// # Example
///
/// ```rust,no_run
/// use docshift::config::MigrateConfig;
/// use docshift::migration::{startup_migrations, MigrationRegistry};
/// use std::sync::Arc;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = MigrateConfig::load()?;
///     let registry = Arc::new(MigrationRegistry::new());
///
///     // Run migrations on startup
///     startup_migrations(&config, registry)?;
///
///     // Continue with application startup...
///     Ok(())
/// }
/// ```
///
/// # Errors
///
/// Same as [`run_up`].
pub fn startup_migrations(
    config: &MigrateConfig,
    registry: Arc<MigrationRegistry>,
) -> Result<usize, MigrationError> {
    let report = run_up(config, registry, &MigrationHooks::default(), None)?;

    if report.is_noop() {
        log::debug!("No pending migrations to apply");
    } else {
        log::info!("Applied {} migration(s) on startup", report.applied.len());
    }

    Ok(report.applied.len())
}
