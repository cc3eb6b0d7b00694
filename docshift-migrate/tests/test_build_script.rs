//! Registry generation from the repository's sample migrations

use docshift_migrate::build_script::{discover_migration_modules, generate_registry_module};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn sample_dir() -> &'static Path {
    Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/../migrations"))
}

#[test]
fn test_discovers_sample_migration() {
    let modules = discover_migration_modules(sample_dir(), None).unwrap();

    let seed = modules
        .iter()
        .find(|m| m.file_name == "20240120120000_seed_roles.rs")
        .expect("sample migration should be discovered");
    assert_eq!(seed.migrations, vec!["SeedRoles20240120120000"]);
    assert_eq!(seed.helpers, vec!["BUILTIN_ROLES", "role_document"]);
}

#[test]
fn test_generated_registry_references_every_export() {
    let out_dir = TempDir::new().unwrap();
    let out = out_dir.path().join("migrations.rs");
    let modules = discover_migration_modules(sample_dir(), None).unwrap();

    generate_registry_module(&modules, &out).unwrap();

    let generated = fs::read_to_string(&out).unwrap();
    assert!(generated.contains("pub mod m_20240120120000_seed_roles;"));
    assert!(generated.contains(
        ".migration::<m_20240120120000_seed_roles::SeedRoles20240120120000>(\"SeedRoles20240120120000\")"
    ));
    assert!(generated.contains(".helper(\"role_document\")"));
    assert!(generated.contains("pub fn registry() -> Result<MigrationRegistry, MigrationError>"));
}

#[test]
fn test_other_extensions_are_ignored() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("001_a.rs"), "pub struct A;\nimpl Migration for A {}\n").unwrap();
    fs::write(dir.path().join("notes.md"), "impl Migration for B {}\n").unwrap();

    let modules = discover_migration_modules(dir.path(), None).unwrap();

    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].migrations, vec!["A"]);
}
