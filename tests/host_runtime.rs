//! Running migrations inside a host program that owns the `may` runtime
//!
//! Kept in its own test binary: the worker count is process-wide and must be
//! set before the runtime starts.

mod common;

use common::{journal, journaled, memory_db, Project};
use docshift::migration::{DownMode, RunnerOptions, UndoAllStrategy};
use std::sync::{mpsc, Once};
use std::time::Duration;

const HOST_STACK_SIZE: usize = 0x10_0000;

static RUNTIME: Once = Once::new();

fn single_worker_runtime() {
    RUNTIME.call_once(|| {
        may::config().set_workers(1);
    });
}

#[test]
fn test_migrations_run_from_a_coroutine_on_one_worker() {
    single_worker_runtime();
    let project = Project::new()
        .with(journaled("001_a.rs", "A"))
        .with(journaled("002_b.rs", "B"));
    let db = memory_db();

    let cases = [
        RunnerOptions::default(),
        RunnerOptions::default().with_operation_timeout(Duration::from_secs(5)),
        RunnerOptions::default()
            .with_operation_timeout(Duration::from_secs(5))
            .with_undo_all(UndoAllStrategy::ReverseSequential),
    ];

    for options in cases {
        let migrator = project.migrator().with_options(options);
        let coroutine_db = db.clone();
        let (tx, rx) = mpsc::channel();
        may::go_with!(0x40000, move || {
            let outcome = migrator.up(&coroutine_db).and_then(|up| {
                migrator
                    .down(&coroutine_db, DownMode::All)
                    .map(|down| (up.applied, down.undone))
            });
            let _ = tx.send(outcome);
        })
        .unwrap();

        let (applied, mut undone) = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("migration run inside a coroutine did not return")
            .unwrap();
        undone.sort();
        assert_eq!(applied, vec!["A", "B"]);
        assert_eq!(undone, vec!["A", "B"]);
    }

    assert_eq!(journal(&db, "up").len(), 6);
    assert_eq!(journal(&db, "down").len(), 6);
}

#[test]
fn test_host_stack_size_is_left_alone() {
    single_worker_runtime();
    may::config().set_stack_size(HOST_STACK_SIZE);
    let project = Project::new().with(journaled("001_a.rs", "A"));
    let db = memory_db();

    let migrator = project
        .migrator()
        .with_options(RunnerOptions::default().with_operation_timeout(Duration::from_secs(5)));
    migrator.up(&db).unwrap();
    migrator.down(&db, DownMode::All).unwrap();

    assert_eq!(may::config().get_stack_size(), HOST_STACK_SIZE);
}
