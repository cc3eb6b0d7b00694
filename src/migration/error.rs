//! Migration-specific error types

use crate::connection::ConnectionError;
use crate::executor::DocError;
use crate::migration::MigrationDirection;
use std::path::PathBuf;
use std::time::Duration;

/// Migration-specific errors
#[derive(Debug)]
pub enum MigrationError {
    /// A migration file (or the migrations directory) does not exist
    FileNotFound(PathBuf),
    /// A ledger record names a class its source file no longer provides
    MigrationNotFound { file: PathBuf, class_name: String },
    /// A migration file could not be resolved or instantiated
    Load { file: PathBuf, reason: String },
    /// A migration's `up`/`down` failed
    Execution {
        class_name: String,
        direction: MigrationDirection,
        error: DocError,
    },
    /// Ledger read/write failure
    Ledger(DocError),
    /// A ledger record for this class already exists
    AlreadyApplied { class_name: String },
    /// Two migration files export the same class name
    DuplicateClassName {
        class_name: String,
        first: PathBuf,
        second: PathBuf,
    },
    /// A registry module lists the same export twice, or a module is registered twice
    DuplicateExport { module: String, name: String },
    /// A migration did not finish within the configured operation timeout
    Timeout {
        class_name: String,
        direction: MigrationDirection,
        after: Duration,
    },
    /// The run was cancelled before the next migration started
    Cancelled,
    /// The database connection could not be opened
    Connection(ConnectionError),
    /// Invalid runner configuration
    Config(String),
    /// Directory listing failed
    Io { path: PathBuf, error: std::io::Error },
}

/// Coarse classification of [`MigrationError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationErrorKind {
    FileNotFound,
    MigrationNotFound,
    Load,
    Execution,
    Ledger,
    Config,
}

impl MigrationError {
    #[must_use]
    pub fn kind(&self) -> MigrationErrorKind {
        match self {
            MigrationError::FileNotFound(_) => MigrationErrorKind::FileNotFound,
            MigrationError::MigrationNotFound { .. } => MigrationErrorKind::MigrationNotFound,
            MigrationError::Load { .. }
            | MigrationError::DuplicateClassName { .. }
            | MigrationError::DuplicateExport { .. }
            | MigrationError::Io { .. } => MigrationErrorKind::Load,
            MigrationError::Execution { .. }
            | MigrationError::Timeout { .. }
            | MigrationError::Cancelled => MigrationErrorKind::Execution,
            MigrationError::Ledger(_)
            | MigrationError::AlreadyApplied { .. }
            | MigrationError::Connection(_) => MigrationErrorKind::Ledger,
            MigrationError::Config(_) => MigrationErrorKind::Config,
        }
    }
}

impl std::fmt::Display for MigrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationError::FileNotFound(path) => {
                write!(f, "Migration file not found: {}", path.display())
            }
            MigrationError::MigrationNotFound { file, class_name } => {
                write!(
                    f,
                    "Migration ({}) not found in {}\n\
                     The file may have been edited or renamed since the migration was applied.",
                    class_name,
                    file.display()
                )
            }
            MigrationError::Load { file, reason } => {
                write!(f, "Failed to load migration file {}: {}", file.display(), reason)
            }
            MigrationError::Execution {
                class_name,
                direction,
                error,
            } => {
                write!(
                    f,
                    "Migration '{}' failed during {}: {}",
                    class_name, direction, error
                )
            }
            MigrationError::Ledger(e) => write!(f, "Migration ledger error: {e}"),
            MigrationError::AlreadyApplied { class_name } => {
                write!(f, "Migration '{class_name}' has already been applied")
            }
            MigrationError::DuplicateClassName {
                class_name,
                first,
                second,
            } => {
                write!(
                    f,
                    "Migration class '{}' is exported by both {} and {}\n\
                     Class names must be unique across the migrations directory.",
                    class_name,
                    first.display(),
                    second.display()
                )
            }
            MigrationError::DuplicateExport { module, name } => {
                write!(f, "'{name}' is registered more than once for module '{module}'")
            }
            MigrationError::Timeout {
                class_name,
                direction,
                after,
            } => {
                write!(
                    f,
                    "Migration '{}' did not finish {} within {:?}; the ledger was left unchanged for it",
                    class_name, direction, after
                )
            }
            MigrationError::Cancelled => write!(f, "Migration run cancelled"),
            MigrationError::Connection(e) => write!(f, "{e}"),
            MigrationError::Config(msg) => write!(f, "Invalid migration configuration: {msg}"),
            MigrationError::Io { path, error } => {
                write!(f, "Failed to read {}: {}", path.display(), error)
            }
        }
    }
}

impl std::error::Error for MigrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MigrationError::Execution { error, .. } | MigrationError::Ledger(error) => Some(error),
            MigrationError::Connection(e) => Some(e),
            MigrationError::Io { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<DocError> for MigrationError {
    fn from(error: DocError) -> Self {
        MigrationError::Ledger(error)
    }
}

impl From<ConnectionError> for MigrationError {
    fn from(error: ConnectionError) -> Self {
        MigrationError::Connection(error)
    }
}
