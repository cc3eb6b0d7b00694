//! Migration file discovery and loading

use crate::migration::{MigrationDefinition, MigrationError, MigrationRegistry};
use crate::runtime;
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extension scanned for when none is configured: migration source files
pub const DEFAULT_EXTENSION: &str = ".rs";

/// Build the case-insensitive "ends with extension" pattern
///
/// `extension` may be given with or without its leading dot.
///
/// # Errors
///
/// Returns `MigrationError::Config` for an empty extension.
pub fn extension_pattern(extension: Option<&str>) -> Result<Regex, MigrationError> {
    let extension = extension.unwrap_or(DEFAULT_EXTENSION).trim();
    let extension = extension.strip_prefix('.').unwrap_or(extension);
    if extension.is_empty() {
        return Err(MigrationError::Config(
            "migration file extension cannot be empty".to_string(),
        ));
    }

    RegexBuilder::new(&format!(r"\.{}$", regex::escape(extension)))
        .case_insensitive(true)
        .build()
        .map_err(|e| MigrationError::Config(format!("Invalid extension pattern: {e}")))
}

/// List migration files in `migrations_dir` in discovery order
///
/// Discovery order is file-name order, which is what makes timestamp-prefixed
/// names apply chronologically. Entries that are not files are skipped.
///
/// # Errors
///
/// Returns `MigrationError::FileNotFound` if the directory does not exist and
/// `MigrationError::Io` if it cannot be read.
pub fn list_migration_files(
    migrations_dir: &Path,
    extension: Option<&str>,
) -> Result<Vec<PathBuf>, MigrationError> {
    if !migrations_dir.is_dir() {
        return Err(MigrationError::FileNotFound(migrations_dir.to_path_buf()));
    }

    let pattern = extension_pattern(extension)?;
    let io_error = |error| MigrationError::Io {
        path: migrations_dir.to_path_buf(),
        error,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(migrations_dir).map_err(io_error)? {
        let entry = entry.map_err(io_error)?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if pattern.is_match(file_name) {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Make `path` absolute against the current directory without resolving symlinks
pub(crate) fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Load every migration defined by one file
///
/// A file whose module exports no migrations yields an empty vector.
///
/// # Errors
///
/// - `MigrationError::FileNotFound` if `path` does not exist
/// - `MigrationError::Load` if no module is registered for the file, or a
///   constructor fails
pub fn load_migration_file(
    registry: &MigrationRegistry,
    path: &Path,
) -> Result<Vec<MigrationDefinition>, MigrationError> {
    if !path.exists() {
        return Err(MigrationError::FileNotFound(path.to_path_buf()));
    }

    let path = absolute_path(path);
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| MigrationError::Load {
            file: path.clone(),
            reason: "file name is not valid UTF-8".to_string(),
        })?;

    let module = registry.module(file_name).ok_or_else(|| MigrationError::Load {
        file: path.clone(),
        reason: format!("no migration module is registered for '{file_name}'"),
    })?;

    module.instantiate(&path)
}

/// Load all migrations in `migrations_dir`, in discovery order
///
/// Files load concurrently, one coroutine each. Results are collected in
/// discovery order and the load fails at the first file that failed: files
/// listed after it are not waited for and no partial result is returned.
///
/// # Errors
///
/// Returns any error from [`list_migration_files`] or [`load_migration_file`],
/// and `MigrationError::DuplicateClassName` if two files export the same class.
pub fn load_migrations(
    registry: &Arc<MigrationRegistry>,
    migrations_dir: &Path,
    extension: Option<&str>,
) -> Result<Vec<MigrationDefinition>, MigrationError> {
    let files = list_migration_files(migrations_dir, extension)?;
    log::debug!(
        "Loading {} migration file(s) from {}",
        files.len(),
        migrations_dir.display()
    );

    let handles = files
        .into_iter()
        .map(|path| {
            let registry = Arc::clone(registry);
            let spawned = runtime::spawn({
                let path = path.clone();
                move || load_migration_file(&registry, &path)
            });
            match spawned {
                Ok(handle) => Ok((path, handle)),
                Err(e) => Err(MigrationError::Load {
                    file: path,
                    reason: format!("failed to start loader coroutine: {e}"),
                }),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut definitions = Vec::new();
    for (path, handle) in handles {
        let loaded = handle.join().unwrap_or_else(|payload| {
            Err(MigrationError::Load {
                file: path,
                reason: runtime::panic_message(&*payload),
            })
        })?;
        definitions.extend(loaded);
    }

    ensure_unique_class_names(&definitions)?;
    Ok(definitions)
}

fn ensure_unique_class_names(definitions: &[MigrationDefinition]) -> Result<(), MigrationError> {
    let mut seen: HashMap<&str, &Path> = HashMap::new();
    for definition in definitions {
        if let Some(first) = seen.insert(&definition.class_name, &definition.file) {
            return Err(MigrationError::DuplicateClassName {
                class_name: definition.class_name.clone(),
                first: first.to_path_buf(),
                second: definition.file.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Database, DocError};
    use crate::migration::{Migration, MigrationModule};
    use tempfile::TempDir;

    #[derive(Default)]
    struct Noop;

    impl Migration for Noop {
        fn up(&self, _db: &Database) -> Result<(), DocError> {
            Ok(())
        }

        fn down(&self, _db: &Database) -> Result<(), DocError> {
            Ok(())
        }
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "// migration").unwrap();
        path
    }

    #[test]
    fn test_extension_pattern() {
        let default = extension_pattern(None).unwrap();
        assert!(default.is_match("001_a.rs"));
        assert!(default.is_match("001_a.RS"));
        assert!(!default.is_match("001_a.rs.bak"));

        let json = extension_pattern(Some("json")).unwrap();
        assert!(json.is_match("001_a.json"));
        let dotted = extension_pattern(Some(".json")).unwrap();
        assert!(dotted.is_match("001_a.json"));
        assert!(!dotted.is_match("001_ajson"));

        assert!(extension_pattern(Some(".")).is_err());
    }

    #[test]
    fn test_list_migration_files_filters_and_orders() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "003_c.rs");
        touch(dir.path(), "001_a.rs");
        touch(dir.path(), "README.md");
        touch(dir.path(), "002_b.rs");
        fs::create_dir(dir.path().join("004_dir.rs")).unwrap();

        let files = list_migration_files(dir.path(), None).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["001_a.rs", "002_b.rs", "003_c.rs"]);
    }

    #[test]
    fn test_list_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = list_migration_files(&dir.path().join("nope"), None).unwrap_err();
        assert!(matches!(err, MigrationError::FileNotFound(_)));
    }

    #[test]
    fn test_load_migration_file_missing() {
        let dir = TempDir::new().unwrap();
        let registry = MigrationRegistry::new();
        let err = load_migration_file(&registry, &dir.path().join("001_a.rs")).unwrap_err();
        assert!(matches!(err, MigrationError::FileNotFound(_)));
    }

    #[test]
    fn test_load_migration_file_unregistered() {
        let dir = TempDir::new().unwrap();
        let path = touch(dir.path(), "001_a.rs");
        let err = load_migration_file(&MigrationRegistry::new(), &path).unwrap_err();
        assert!(matches!(err, MigrationError::Load { .. }));
    }

    #[test]
    fn test_load_migration_file_without_migrations_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = touch(dir.path(), "001_helpers.rs");
        let registry = MigrationRegistry::new()
            .with_module(MigrationModule::new("001_helpers.rs").helper("slugify"))
            .unwrap();
        assert!(load_migration_file(&registry, &path).unwrap().is_empty());
    }

    #[test]
    fn test_load_migrations_rejects_duplicate_class_names() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "001_a.rs");
        touch(dir.path(), "002_b.rs");
        let registry = MigrationRegistry::new()
            .with_module(MigrationModule::new("001_a.rs").migration::<Noop>("Same"))
            .unwrap()
            .with_module(MigrationModule::new("002_b.rs").migration::<Noop>("Same"))
            .unwrap();

        let err = load_migrations(&Arc::new(registry), dir.path(), None).unwrap_err();
        assert!(matches!(err, MigrationError::DuplicateClassName { .. }));
    }

    #[test]
    fn test_load_migrations_first_error_wins() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "001_a.rs");
        touch(dir.path(), "002_unregistered.rs");
        touch(dir.path(), "003_broken.rs");
        let registry = MigrationRegistry::new()
            .with_module(MigrationModule::new("001_a.rs").migration::<Noop>("A"))
            .unwrap()
            .with_module(
                MigrationModule::new("003_broken.rs").migration_with("Broken", || Err("nope".into())),
            )
            .unwrap();

        let err = load_migrations(&Arc::new(registry), dir.path(), None).unwrap_err();
        match err {
            MigrationError::Load { file, .. } => {
                assert!(file.ends_with("002_unregistered.rs"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_migrations_fails_without_waiting_for_later_files() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "001_unregistered.rs");
        touch(dir.path(), "002_slow.rs");
        let registry = MigrationRegistry::new()
            .with_module(MigrationModule::new("002_slow.rs").migration_with("Slow", || {
                may::coroutine::sleep(std::time::Duration::from_secs(5));
                Ok(Box::new(Noop) as Box<dyn Migration>)
            }))
            .unwrap();

        let start = std::time::Instant::now();
        let err = load_migrations(&Arc::new(registry), dir.path(), None).unwrap_err();

        assert!(matches!(err, MigrationError::Load { ref file, .. } if file.ends_with("001_unregistered.rs")));
        assert!(start.elapsed() < std::time::Duration::from_secs(2));
    }
}
