//! Docshift Migration CLI Tool
//!
//! Command-line interface for managing document-store migrations.
//! Applications with compiled-in migrations call `docshift_migrate::run`
//! from their own binary instead.

use docshift::migration::{MigrationHooks, MigrationRegistry};
use std::process::ExitCode;

fn main() -> ExitCode {
    docshift_migrate::run(MigrationRegistry::new(), MigrationHooks::default())
}
