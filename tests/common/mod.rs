//! Shared fixtures for integration tests
//!
//! Test migrations write what they do into a `journal` collection of the
//! database they run against, so ordering is observable from the outside.

#![allow(dead_code)]

use docshift::executor::{Database, DocError, Filter};
use docshift::migration::{Migration, MigrationModule, MigrationRegistry, Migrator};
use docshift::store::MemoryExecutor;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const JOURNAL: &str = "journal";

/// Records each call in the journal
pub struct Journaled {
    pub class_name: String,
}

fn record(db: &Database, class_name: &str, direction: &str) -> Result<(), DocError> {
    let entry = json!({ "class": class_name, "direction": direction });
    db.collection(JOURNAL)
        .insert_one(entry.as_object().cloned().unwrap_or_default())
}

impl Migration for Journaled {
    fn up(&self, db: &Database) -> Result<(), DocError> {
        record(db, &self.class_name, "up")
    }

    fn down(&self, db: &Database) -> Result<(), DocError> {
        record(db, &self.class_name, "down")
    }
}

/// Journals like [`Journaled`] but fails in one direction
pub struct Failing {
    pub class_name: String,
    pub fail_up: bool,
}

impl Migration for Failing {
    fn up(&self, db: &Database) -> Result<(), DocError> {
        if self.fail_up {
            return Err(DocError::Other(format!("{} refuses to go up", self.class_name)));
        }
        record(db, &self.class_name, "up")
    }

    fn down(&self, db: &Database) -> Result<(), DocError> {
        if !self.fail_up {
            return Err(DocError::Other(format!("{} refuses to go down", self.class_name)));
        }
        record(db, &self.class_name, "down")
    }
}

/// Sleeps before journaling
pub struct Slow {
    pub class_name: String,
    pub delay: Duration,
}

impl Migration for Slow {
    fn up(&self, db: &Database) -> Result<(), DocError> {
        may::coroutine::sleep(self.delay);
        record(db, &self.class_name, "up")
    }

    fn down(&self, db: &Database) -> Result<(), DocError> {
        may::coroutine::sleep(self.delay);
        record(db, &self.class_name, "down")
    }
}

pub fn journaled(file: &str, class_name: &str) -> MigrationModule {
    let class = class_name.to_string();
    MigrationModule::new(file).migration_with(class_name, move || {
        Ok(Box::new(Journaled {
            class_name: class.clone(),
        }) as Box<dyn Migration>)
    })
}

pub fn failing(file: &str, class_name: &str, fail_up: bool) -> MigrationModule {
    let class = class_name.to_string();
    MigrationModule::new(file).migration_with(class_name, move || {
        Ok(Box::new(Failing {
            class_name: class.clone(),
            fail_up,
        }) as Box<dyn Migration>)
    })
}

pub fn slow(file: &str, class_name: &str, delay: Duration) -> MigrationModule {
    let class = class_name.to_string();
    MigrationModule::new(file).migration_with(class_name, move || {
        Ok(Box::new(Slow {
            class_name: class.clone(),
            delay,
        }) as Box<dyn Migration>)
    })
}

/// A migrations directory plus the registry describing it
pub struct Project {
    pub dir: TempDir,
    pub registry: MigrationRegistry,
}

impl Project {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            registry: MigrationRegistry::new(),
        }
    }

    /// Write the file for `module` and register it
    pub fn add(&mut self, module: MigrationModule) -> PathBuf {
        let path = self.dir.path().join(module.file_name());
        fs::write(&path, "// migration").unwrap();
        self.registry.register(module).unwrap();
        path
    }

    pub fn with(mut self, module: MigrationModule) -> Self {
        self.add(module);
        self
    }

    pub fn migrator(&self) -> Migrator {
        Migrator::new(self.dir.path(), Arc::new(self.registry.clone()))
    }
}

pub fn memory_db() -> Database {
    Database::new("test", Arc::new(MemoryExecutor::new()))
}

/// Classes journaled in `direction`, in write order
pub fn journal(db: &Database, direction: &str) -> Vec<String> {
    db.collection(JOURNAL)
        .find(Filter::eq("direction", direction))
        .unwrap()
        .into_iter()
        .filter_map(|doc| doc.get("class").and_then(|c| c.as_str()).map(str::to_string))
        .collect()
}
