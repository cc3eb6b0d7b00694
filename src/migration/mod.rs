//! Migration system for Docshift
//!
//! This module provides the infrastructure for document-store migrations, including:
//! - Migration trait definition and the module registry
//! - Discovery and loading of migration files
//! - The applied-migration ledger
//! - Apply/undo orchestration and status reporting
//!
//! # Example
//!
//! ```rust
//! use docshift::executor::{Database, DocError, Filter};
//! use docshift::migration::{Migration, MigrationModule, MigrationRegistry};
//! use serde_json::json;
//!
//! #[derive(Default)]
//! pub struct SeedRoles;
//!
//! impl Migration for SeedRoles {
//!     fn up(&self, db: &Database) -> Result<(), DocError> {
//!         let role = json!({ "name": "admin" });
//!         db.collection("roles")
//!             .insert_one(role.as_object().cloned().unwrap_or_default())
//!     }
//!
//!     fn down(&self, db: &Database) -> Result<(), DocError> {
//!         db.collection("roles").delete_many(&Filter::eq("name", "admin"))?;
//!         Ok(())
//!     }
//! }
//!
//! let mut registry = MigrationRegistry::new();
//! registry
//!     .register(MigrationModule::new("20240120120000_seed_roles.rs").migration::<SeedRoles>("SeedRoles"))
//!     .unwrap();
//! assert!(registry.is_registered("20240120120000_seed_roles.rs"));
//! ```

pub mod error;
pub mod execution;
pub mod hooks;
pub mod ledger;
pub mod loader;
pub mod migration;
pub mod migrator;
pub mod record;
pub mod registry;
pub mod reporter;
pub mod session;
pub mod startup;
pub mod status;

pub use error::{MigrationError, MigrationErrorKind};
pub use execution::{CancelToken, RunnerOptions, UndoAllStrategy};
pub use hooks::MigrationHooks;
pub use ledger::{MigrationLedger, DEFAULT_COLLECTION};
pub use loader::{load_migration_file, load_migrations, DEFAULT_EXTENSION};
pub use migration::{Migration, MigrationDefinition, MigrationDirection};
pub use migrator::{DownMode, DownReport, Migrator, UpReport};
pub use record::AppliedMigrationRecord;
pub use registry::{MigrationModule, MigrationRegistry, ModuleExport};
pub use reporter::{LogReporter, MigrationReporter};
pub use session::{MigrationSession, RunnerState};
pub use startup::{run_down, run_status, run_up, startup_migrations};
pub use status::{MigrationState, MigrationStatus, StatusEntry};

// Re-export for convenience
pub use crate::executor::{Database, DocError};
