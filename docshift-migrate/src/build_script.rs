//! Build script helper for migration registry generation
//!
//! Rust cannot load a migration file at runtime, so applications compile
//! their migrations in. Call these functions from `build.rs` to scan the
//! migrations directory and generate a module with a `registry()` function
//! that declares every file's exports:
//!
//! ```rust,no_run
//! // build.rs
//! use docshift_migrate::build_script;
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let out = Path::new(&std::env::var("OUT_DIR")?).join("migrations.rs");
//!     let modules = build_script::discover_migration_modules(Path::new("migrations"), None)?;
//!     build_script::generate_registry_module(&modules, &out)?;
//!     println!("cargo:rerun-if-changed=migrations");
//!     Ok(())
//! }
//! ```

use docshift::migration::loader::list_migration_files;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

/// Exports found in one migration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationModuleInfo {
    pub file_name: String,
    pub file_path: PathBuf,
    /// Types with an `impl Migration for` block, in source order
    pub migrations: Vec<String>,
    /// Other public items (functions, constants)
    pub helpers: Vec<String>,
}

/// Scan `migrations_dir` for migration files and their exports
///
/// Uses the same extension filter and ordering as the runtime loader.
///
/// # Errors
///
/// Returns an error if the directory or a file cannot be read.
pub fn discover_migration_modules(
    migrations_dir: &Path,
    extension: Option<&str>,
) -> Result<Vec<MigrationModuleInfo>, Box<dyn std::error::Error>> {
    let mut modules = Vec::new();
    for path in list_migration_files(migrations_dir, extension)? {
        let content = fs::read_to_string(&path)?;
        modules.push(extract_module_info(&path, &content)?);
    }
    Ok(modules)
}

/// Extract exports from a migration source file
///
/// This is plain pattern matching, not full parsing: it only needs to find
/// what the generated registry should reference. The compiler checks the rest
/// when the registry module is built.
pub fn extract_module_info(
    file_path: &Path,
    content: &str,
) -> Result<MigrationModuleInfo, Box<dyn std::error::Error>> {
    let impl_re = Regex::new(r"(?m)^\s*impl\s+(?:[\w:]+::)?Migration\s+for\s+(\w+)")?;
    let pub_item_re = Regex::new(r"(?m)^\s*pub\s+(?:fn|const|static)\s+(\w+)")?;

    let file_name = file_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| format!("Invalid file name: {}", file_path.display()))?
        .to_string();

    let mut migrations: Vec<String> = Vec::new();
    for caps in impl_re.captures_iter(content) {
        let name = caps[1].to_string();
        if !migrations.contains(&name) {
            migrations.push(name);
        }
    }

    let helpers = pub_item_re
        .captures_iter(content)
        .map(|caps| caps[1].to_string())
        .filter(|name| !migrations.contains(name))
        .collect();

    Ok(MigrationModuleInfo {
        file_name,
        file_path: file_path.to_path_buf(),
        migrations,
        helpers,
    })
}

/// Sanitize a file name to be a valid Rust module name
fn sanitize_module_name(file_name: &str) -> String {
    let stem = file_name.split('.').next().unwrap_or(file_name);
    let sanitized: String = stem
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    // Timestamp-prefixed names start with a digit
    format!("m_{sanitized}")
}

/// Generate the registry module for `modules`
///
/// The generated file includes each migration file with `#[path = "..."]` and
/// exposes `pub fn registry() -> Result<MigrationRegistry, MigrationError>`.
///
/// # Errors
///
/// Returns an error if a relative path cannot be computed or the file cannot
/// be written.
pub fn generate_registry_module(
    modules: &[MigrationModuleInfo],
    output_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    // Calculate output directory for relative paths
    let output_dir = output_path
        .parent()
        .ok_or("Output path must have a parent directory")?;

    let mut content = String::from("//! Auto-generated migration registry\n");
    content.push_str("//! DO NOT EDIT - This file is generated by build script\n\n");
    content.push_str("pub mod migration_registry {\n");

    for module in modules {
        let file_path = absolute(&module.file_path);
        let relative_path = pathdiff::diff_paths(&file_path, output_dir).unwrap_or(file_path);
        let path_str = relative_path.to_string_lossy().replace('\\', "/");

        content.push_str(&format!("    #[path = r#\"{path_str}\"#]\n"));
        content.push_str(&format!("    pub mod {};\n", sanitize_module_name(&module.file_name)));
    }

    content.push_str("\n    use docshift::migration::{MigrationError, MigrationModule, MigrationRegistry};\n\n");
    content.push_str("    /// Every discovered migration module\n");
    content.push_str("    pub fn registry() -> Result<MigrationRegistry, MigrationError> {\n");
    content.push_str("        let mut registry = MigrationRegistry::new();\n");

    for module in modules {
        let module_name = sanitize_module_name(&module.file_name);
        content.push_str(&format!(
            "        registry.register(\n            MigrationModule::new(r#\"{}\"#)",
            module.file_name
        ));
        for migration in &module.migrations {
            content.push_str(&format!(
                "\n                .migration::<{module_name}::{migration}>(\"{migration}\")"
            ));
        }
        for helper in &module.helpers {
            content.push_str(&format!("\n                .helper(\"{helper}\")"));
        }
        content.push_str(",\n        )?;\n");
    }

    content.push_str("        Ok(registry)\n");
    content.push_str("    }\n");
    content.push_str("}\n");

    fs::write(output_path, content)?;
    Ok(())
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
