//! Connection Module
//!
//! Provides connection establishment for the built-in document stores.
//!
//! Supported connection strings:
//! - `memory://<name>`: process-wide in-memory store shared by name
//! - `file://<directory>`: JSON files under `<directory>/<database>/`

use crate::executor::{Database, DocError, DocExecutor};
use crate::store::{FileExecutor, MemoryExecutor};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Driver options passed through from configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectOptions {
    /// Create the database directory when it does not exist (file store)
    #[serde(default = "default_create_if_missing")]
    pub create_if_missing: bool,
    /// Pretty-print collection files (file store)
    #[serde(default)]
    pub pretty: bool,
}

fn default_create_if_missing() -> bool {
    true
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            create_if_missing: default_create_if_missing(),
            pretty: false,
        }
    }
}

/// Connection error type
#[derive(Debug)]
pub enum ConnectionError {
    /// Invalid connection string format
    InvalidConnectionString(String),
    /// Database name that cannot be used as a store key or directory
    InvalidDatabaseName(String),
    /// The store rejected the connection
    Store(DocError),
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::InvalidConnectionString(s) => {
                write!(f, "Invalid connection string: {s}")
            }
            ConnectionError::InvalidDatabaseName(s) => {
                write!(f, "Invalid database name: {s}")
            }
            ConnectionError::Store(e) => {
                write!(f, "Connection error: {e}")
            }
        }
    }
}

impl std::error::Error for ConnectionError {}

impl From<DocError> for ConnectionError {
    fn from(err: DocError) -> Self {
        ConnectionError::Store(err)
    }
}

/// Where a connection string points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Memory(String),
    File(PathBuf),
}

/// Parse and validate a connection string
///
/// # Errors
///
/// Returns `ConnectionError::InvalidConnectionString` for empty strings,
/// unknown schemes, or a `file://` URI without a path.
pub fn parse_connection_string(connection_string: &str) -> Result<StoreLocation, ConnectionError> {
    if connection_string.is_empty() {
        return Err(ConnectionError::InvalidConnectionString(
            "Connection string cannot be empty".to_string(),
        ));
    }

    if let Some(name) = connection_string.strip_prefix("memory://") {
        let name = if name.is_empty() { "default" } else { name };
        return Ok(StoreLocation::Memory(name.to_string()));
    }

    if let Some(path) = connection_string.strip_prefix("file://") {
        if path.is_empty() {
            return Err(ConnectionError::InvalidConnectionString(
                "file:// connection string must include a directory".to_string(),
            ));
        }
        return Ok(StoreLocation::File(PathBuf::from(path)));
    }

    Err(ConnectionError::InvalidConnectionString(format!(
        "'{connection_string}' must start with memory:// or file://"
    )))
}

fn validate_database_name(database: &str) -> Result<(), ConnectionError> {
    let invalid = database.is_empty()
        || database == "."
        || database == ".."
        || database.contains(['/', '\\', '\0']);
    if invalid {
        return Err(ConnectionError::InvalidDatabaseName(format!("'{database}'")));
    }
    Ok(())
}

/// A live connection: a [`Database`] handle plus its close operation
///
/// The underlying executor is closed exactly once, either by [`Connection::close`]
/// or when the connection is dropped, whichever comes first.
pub struct Connection {
    db: Database,
    closed: AtomicBool,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("database", &self.db.name())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Connection {
    /// Wrap an existing executor (custom stores, tests)
    pub fn from_executor(database: impl Into<String>, executor: Arc<dyn DocExecutor>) -> Self {
        Self {
            db: Database::new(database, executor),
            closed: AtomicBool::new(false),
        }
    }

    /// The database handle
    #[must_use]
    pub fn db(&self) -> &Database {
        &self.db
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the connection. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `DocError` if the executor fails to release its resources.
    pub fn close(&self) -> Result<(), DocError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        log::debug!("Closing connection to database '{}'", self.db.name());
        self.db.executor().close()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to close connection to '{}': {e}", self.db.name());
        }
    }
}

/// Establishes a connection to a document store
///
/// # Arguments
///
/// * `connection_string` - `memory://<name>` or `file://<directory>`
/// * `database` - Database name; namespaces memory stores and is the
///   subdirectory of a file store
/// * `options` - Driver options
///
/// # Examples
///
/// ```
/// use docshift::{connect, ConnectOptions};
///
/// let connection = connect("memory://docs-example", "app", &ConnectOptions::default())?;
/// assert_eq!(connection.db().name(), "app");
/// connection.close()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// # Errors
///
/// Returns `ConnectionError` if the string or database name is invalid or the
/// store cannot be opened.
pub fn connect(
    connection_string: &str,
    database: &str,
    options: &ConnectOptions,
) -> Result<Connection, ConnectionError> {
    let start = Instant::now();

    let location = parse_connection_string(connection_string)?;
    validate_database_name(database)?;

    let executor: Arc<dyn DocExecutor> = match &location {
        StoreLocation::Memory(name) => Arc::new(MemoryExecutor::shared(&format!("{name}/{database}"))?),
        StoreLocation::File(root) => Arc::new(FileExecutor::open(
            root.join(database),
            options.create_if_missing,
            options.pretty,
        )?),
    };

    log::debug!(
        "Connected to {location:?} database '{database}' in {:?}",
        start.elapsed()
    );

    Ok(Connection::from_executor(database, executor))
}
