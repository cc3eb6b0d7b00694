//! Behavioural properties of apply and undo
//!
//! Each test builds a throwaway migrations directory with a matching registry
//! and runs the migrator against an in-memory database.

mod common;

use chrono::{TimeZone, Utc};
use common::{failing, journal, journaled, memory_db, Project};
use docshift::connection::ConnectOptions;
use docshift::executor::{DocError, Filter};
use docshift::migration::{
    load_migration_file, DownMode, MigrationDefinition, MigrationError, MigrationModule,
    MigrationSession, RunnerState,
};
use std::fs;

/// Definition whose file and class match a registered module
fn definition(project: &Project, file: &str, class_name: &str) -> MigrationDefinition {
    load_migration_file(&project.registry, &project.dir.path().join(file))
        .unwrap()
        .into_iter()
        .find(|d| d.class_name == class_name)
        .unwrap()
}

#[test]
fn test_up_twice_is_idempotent() {
    let project = Project::new()
        .with(journaled("001_a.rs", "A"))
        .with(journaled("002_b.rs", "B"));
    let migrator = project.migrator();
    let db = memory_db();

    let first = migrator.up(&db).unwrap();
    assert_eq!(first.applied, vec!["A", "B"]);
    let ledger_after_first = migrator.ledger(&db).applied_migrations().unwrap();

    let second = migrator.up(&db).unwrap();
    assert!(second.is_noop());
    assert_eq!(second.skipped, 2);
    assert_eq!(migrator.ledger(&db).applied_migrations().unwrap(), ledger_after_first);
    assert_eq!(journal(&db, "up"), vec!["A", "B"]);
}

#[test]
fn test_ledger_tracks_applied_and_undone_migrations() {
    let project = Project::new().with(journaled("001_a.rs", "A"));
    let migrator = project.migrator();
    let db = memory_db();
    let ledger = migrator.ledger(&db);

    migrator.up(&db).unwrap();
    let records = ledger.applied_migrations().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].class_name, "A");
    assert_eq!(records[0].file, project.dir.path().join("001_a.rs"));

    migrator.down(&db, DownMode::Last).unwrap();
    assert!(!ledger.is_applied("A").unwrap());
    assert!(ledger.applied_migrations().unwrap().is_empty());
}

#[test]
fn test_pending_migrations_apply_in_file_name_order() {
    // Registration order is irrelevant
    let project = Project::new()
        .with(journaled("003_c.rs", "C"))
        .with(journaled("001_a.rs", "A"))
        .with(journaled("002_b.rs", "B"));
    let db = memory_db();

    project.migrator().up(&db).unwrap();

    assert_eq!(journal(&db, "up"), vec!["A", "B", "C"]);
}

#[test]
fn test_down_last_undoes_newest_record() {
    let project = Project::new()
        .with(journaled("001_a.rs", "A"))
        .with(journaled("002_b.rs", "B"))
        .with(journaled("003_c.rs", "C"));
    let migrator = project.migrator();
    let db = memory_db();
    let ledger = migrator.ledger(&db);

    // Insert out of order; appliedAt decides, not insertion order or file name
    for (file, class, second) in [("003_c.rs", "C", 20), ("001_a.rs", "A", 30), ("002_b.rs", "B", 10)] {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, second).unwrap();
        ledger.insert_at(&definition(&project, file, class), at).unwrap();
    }

    let report = migrator.down(&db, DownMode::Last).unwrap();

    assert_eq!(report.undone, vec!["A"]);
    assert_eq!(journal(&db, "down"), vec!["A"]);
    let remaining: Vec<String> = ledger
        .applied_migrations()
        .unwrap()
        .into_iter()
        .map(|r| r.class_name)
        .collect();
    assert_eq!(remaining, vec!["B", "C"]);
}

#[test]
fn test_down_on_empty_ledger_is_noop() {
    let project = Project::new().with(journaled("001_a.rs", "A"));
    let migrator = project.migrator();
    let db = memory_db();

    for mode in [DownMode::Last, DownMode::All] {
        let report = migrator.down(&db, mode).unwrap();
        assert!(report.is_noop());
    }
    assert!(journal(&db, "down").is_empty());
}

#[test]
fn test_down_last_with_missing_file_keeps_record() {
    let mut project = Project::new();
    let path = project.add(journaled("001_a.rs", "A"));
    let migrator = project.migrator();
    let db = memory_db();

    migrator.up(&db).unwrap();
    fs::remove_file(&path).unwrap();

    let err = migrator.down(&db, DownMode::Last).unwrap_err();
    assert!(matches!(err, MigrationError::FileNotFound(ref p) if *p == path));
    assert!(migrator.ledger(&db).is_applied("A").unwrap());
    assert!(journal(&db, "down").is_empty());
}

#[test]
fn test_down_with_removed_class_reports_migration_not_found() {
    let mut project = Project::new();
    project.add(journaled("001_a.rs", "A"));
    let db = memory_db();
    project.migrator().up(&db).unwrap();

    // The file now exports a different class
    project.registry.unregister("001_a.rs");
    project.registry.register(journaled("001_a.rs", "Renamed")).unwrap();

    let err = project.migrator().down(&db, DownMode::Last).unwrap_err();
    assert!(matches!(err, MigrationError::MigrationNotFound { ref class_name, .. } if class_name == "A"));
    assert!(project.migrator().ledger(&db).is_applied("A").unwrap());
}

#[test]
fn test_helper_exports_are_not_migrations() {
    let mut project = Project::new();
    let path = project.add(journaled("001_a.rs", "A").helper("BATCH_SIZE").helper("slugify"));

    let definitions = load_migration_file(&project.registry, &path).unwrap();

    assert_eq!(definitions.len(), 1);
    assert_eq!(definitions[0].class_name, "A");
}

#[test]
fn test_module_without_migrations_loads_empty() {
    let mut project = Project::new();
    let path = project.add(MigrationModule::new("001_helpers.rs").helper("shared"));

    assert!(load_migration_file(&project.registry, &path).unwrap().is_empty());
    assert!(project.migrator().up(&memory_db()).unwrap().is_noop());
}

#[test]
fn test_session_closes_connection_on_success_and_failure() {
    let options = ConnectOptions::default();

    let session = MigrationSession::open("memory://session-ok", "app", &options).unwrap();
    assert_eq!(session.state(), RunnerState::Connected);
    let db = session.database().clone();
    session.run(|db| db.collection("c").find(Filter::all()).map_err(MigrationError::Ledger)).unwrap();
    assert!(matches!(db.collection("c").find(Filter::all()), Err(DocError::Closed)));

    let session = MigrationSession::open("memory://session-err", "app", &options).unwrap();
    let db = session.database().clone();
    let result: Result<(), _> = session.run(|_| Err(MigrationError::Cancelled));
    assert!(matches!(result, Err(MigrationError::Cancelled)));
    assert!(matches!(db.collection("c").find(Filter::all()), Err(DocError::Closed)));
}

#[test]
fn test_up_stops_at_first_failure() {
    let project = Project::new()
        .with(journaled("001_a.rs", "A"))
        .with(failing("002_b.rs", "B", true))
        .with(journaled("003_c.rs", "C"));
    let migrator = project.migrator();
    let db = memory_db();

    let err = migrator.up(&db).unwrap_err();

    assert!(matches!(err, MigrationError::Execution { ref class_name, .. } if class_name == "B"));
    assert_eq!(journal(&db, "up"), vec!["A"]);
    let ledger = migrator.ledger(&db);
    assert!(ledger.is_applied("A").unwrap());
    assert!(!ledger.is_applied("B").unwrap());
    assert!(!ledger.is_applied("C").unwrap());

    // B is still pending, so a rerun retries it
    let err = migrator.up(&db).unwrap_err();
    assert!(matches!(err, MigrationError::Execution { ref class_name, .. } if class_name == "B"));
    assert_eq!(journal(&db, "up"), vec!["A"]);
}

#[test]
fn test_duplicate_class_names_fail_discovery() {
    let project = Project::new()
        .with(journaled("001_a.rs", "Same"))
        .with(journaled("002_b.rs", "Same"));

    let err = project.migrator().up(&memory_db()).unwrap_err();

    assert!(matches!(err, MigrationError::DuplicateClassName { ref class_name, .. } if class_name == "Same"));
}

#[test]
fn test_status_reports_pending_applied_and_orphaned() {
    let mut project = Project::new();
    project.add(journaled("001_a.rs", "A"));
    let orphan = project.add(journaled("002_b.rs", "B"));
    let db = memory_db();
    project.migrator().up(&db).unwrap();

    fs::remove_file(&orphan).unwrap();
    project.registry.unregister("002_b.rs");
    project.add(journaled("003_c.rs", "C"));

    let status = project.migrator().status(&db).unwrap();

    assert_eq!(status.applied_count(), 1);
    assert_eq!(status.pending_count(), 1);
    assert!(!status.is_up_to_date());
    assert_eq!(status.pending().map(|e| e.class_name.as_str()).collect::<Vec<_>>(), vec!["C"]);
    assert_eq!(status.orphaned.len(), 1);
    assert_eq!(status.orphaned[0].class_name, "B");
}
