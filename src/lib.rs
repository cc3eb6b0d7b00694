//! # Docshift
//!
//! Coroutine-native migration engine for document stores using the `may` runtime.
//!
//! Docshift applies and reverses ordered, versioned migrations against a
//! document database and keeps a ledger of what has been applied, so every
//! deployment of an application converges on the same data layout.
//!
//! The crate is split the same way the runtime flows:
//! - [`connection`] opens a [`Connection`] to a store (`memory://` or `file://`)
//! - [`executor`] defines the [`DocExecutor`] trait and the [`Database`] handle
//!   migrations operate on
//! - [`migration`] holds the registry, loader, ledger and the [`migration::Migrator`]
//! - [`config`] loads [`config::MigrateConfig`] from a TOML file and the environment

pub mod config;
pub mod connection;
pub mod executor;
#[cfg(any(feature = "metrics", feature = "tracing"))]
pub mod metrics;
pub mod migration;
mod runtime;
pub mod store;

pub use connection::{connect, ConnectOptions, Connection, ConnectionError};
pub use executor::{
    Collection, Database, DocError, DocExecutor, Document, Filter, FindQuery, SortOrder,
};
