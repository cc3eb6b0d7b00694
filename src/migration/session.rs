//! One command invocation's connection and runner state

use crate::connection::{connect, ConnectOptions, Connection};
use crate::executor::Database;
use crate::migration::MigrationError;
use std::fmt;

/// Lifecycle of a runner invocation
///
/// `Idle → Connected → Executing → Reporting → Closed`. `Closed` is reached on
/// every exit path, including errors and panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Idle,
    Connected,
    Executing,
    Reporting,
    Closed,
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunnerState::Idle => "idle",
            RunnerState::Connected => "connected",
            RunnerState::Executing => "executing",
            RunnerState::Reporting => "reporting",
            RunnerState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Scoped database connection for one command
///
/// The connection is opened once and closed exactly once: by [`finish`](Self::finish)
/// or, if that is never reached, on drop.
#[derive(Debug)]
pub struct MigrationSession {
    connection: Connection,
    state: RunnerState,
}

impl MigrationSession {
    /// Connect and enter `Connected`
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Connection` if the store cannot be opened.
    pub fn open(
        uri: &str,
        database: &str,
        options: &ConnectOptions,
    ) -> Result<Self, MigrationError> {
        log::debug!("Runner state: {}", RunnerState::Idle);
        let connection = connect(uri, database, options)?;
        Ok(Self::from_connection(connection))
    }

    /// Adopt an already open connection
    #[must_use]
    pub fn from_connection(connection: Connection) -> Self {
        let mut session = Self {
            connection,
            state: RunnerState::Idle,
        };
        session.transition(RunnerState::Connected);
        session
    }

    #[must_use]
    pub fn state(&self) -> RunnerState {
        self.state
    }

    #[must_use]
    pub fn database(&self) -> &Database {
        self.connection.db()
    }

    fn transition(&mut self, next: RunnerState) {
        log::debug!("Runner state: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Run `f` against the database, passing through `Executing` and `Reporting`
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns.
    pub fn execute<T, F>(&mut self, f: F) -> Result<T, MigrationError>
    where
        F: FnOnce(&Database) -> Result<T, MigrationError>,
    {
        self.transition(RunnerState::Executing);
        let result = f(self.connection.db());
        self.transition(RunnerState::Reporting);
        result
    }

    /// Close the connection and hand back `result`
    ///
    /// A close failure is only surfaced when `result` itself succeeded.
    ///
    /// # Errors
    ///
    /// Returns the error in `result`, or `MigrationError::Ledger` if closing failed.
    pub fn finish<T>(mut self, result: Result<T, MigrationError>) -> Result<T, MigrationError> {
        let closed = self.connection.close();
        self.transition(RunnerState::Closed);
        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(MigrationError::Ledger(e)),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_error)) => {
                log::warn!("Failed to close connection after error: {close_error}");
                Err(e)
            }
        }
    }

    /// [`execute`](Self::execute) then [`finish`](Self::finish)
    ///
    /// # Errors
    ///
    /// Same as [`finish`](Self::finish).
    pub fn run<T, F>(mut self, f: F) -> Result<T, MigrationError>
    where
        F: FnOnce(&Database) -> Result<T, MigrationError>,
    {
        let result = self.execute(f);
        self.finish(result)
    }
}

impl Drop for MigrationSession {
    fn drop(&mut self) {
        if self.state != RunnerState::Closed {
            if let Err(e) = self.connection.close() {
                log::warn!("Failed to close connection: {e}");
            }
            self.transition(RunnerState::Closed);
        }
    }
}
