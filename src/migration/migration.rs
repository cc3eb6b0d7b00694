//! Migration trait definition

use crate::executor::{Database, DocError};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Trait that all migrations must implement
///
/// Each migration file defines one or more structs implementing this trait
/// with `up()` and `down()` methods for applying and undoing the change.
///
/// Note: Docshift runs on coroutines (may runtime), so these methods are
/// synchronous. Blocking I/O inside them yields to the scheduler.
pub trait Migration: Send + Sync {
    /// Apply the migration (forward migration)
    fn up(&self, db: &Database) -> Result<(), DocError>;

    /// Undo the migration (reverse migration)
    fn down(&self, db: &Database) -> Result<(), DocError>;
}

/// Direction for migration execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationDirection {
    /// Apply the migration (up)
    Up,
    /// Undo the migration (down)
    Down,
}

impl fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationDirection::Up => f.write_str("up"),
            MigrationDirection::Down => f.write_str("down"),
        }
    }
}

/// A migration loaded from a file, ready to run
///
/// Constructed fresh on every load and discarded after the run.
#[derive(Clone)]
pub struct MigrationDefinition {
    /// Absolute path of the source file
    pub file: PathBuf,
    /// Name of the exported migration, unique within its file
    pub class_name: String,
    pub instance: Arc<dyn Migration>,
}

impl fmt::Debug for MigrationDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationDefinition")
            .field("file", &self.file)
            .field("class_name", &self.class_name)
            .finish_non_exhaustive()
    }
}

impl MigrationDefinition {
    pub fn new(file: PathBuf, class_name: impl Into<String>, instance: Arc<dyn Migration>) -> Self {
        Self {
            file,
            class_name: class_name.into(),
            instance,
        }
    }

    /// Run the migration in `direction`
    ///
    /// # Errors
    ///
    /// Returns the migration's own `DocError` unchanged.
    pub fn run(&self, db: &Database, direction: MigrationDirection) -> Result<(), DocError> {
        match direction {
            MigrationDirection::Up => self.instance.up(db),
            MigrationDirection::Down => self.instance.down(db),
        }
    }
}
