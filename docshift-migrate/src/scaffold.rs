//! `init` and `new`: project and migration file scaffolding

use chrono::{DateTime, Utc};
use docshift::migration::DEFAULT_EXTENSION;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Name used when `new` is given no name
pub const DEFAULT_MIGRATION_NAME: &str = "migration";

/// Built-in migration template
///
/// Placeholders: `{{class_name}}` and `{{name}}`.
pub const DEFAULT_TEMPLATE: &str = r#"//! Migration: {{name}}

use docshift::executor::{Database, DocError};
use docshift::migration::Migration;

#[derive(Default)]
pub struct {{class_name}};

impl Migration for {{class_name}} {
    fn up(&self, db: &Database) -> Result<(), DocError> {
        let _ = db;
        Ok(())
    }

    fn down(&self, db: &Database) -> Result<(), DocError> {
        let _ = db;
        Ok(())
    }
}
"#;

const CONFIG_SKELETON: &str = r#"[migrate]
uri = "file://./data"
database = "docshift_dev"
collection = "migrations_changelog"
migrations_dir = "{{migrations_dir}}"
# file_ext = ".rs"
# operation_timeout_seconds = 60
# undo_all = "concurrent"   # or "reverse_sequential"

[migrate.options]
create_if_missing = true
pretty = false
"#;

#[derive(Debug, thiserror::Error)]
pub enum ScaffoldError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Configuration file already exists: {0}")]
    ConfigExists(PathBuf),

    #[error("Migration file already exists: {0}")]
    MigrationExists(PathBuf),

    #[error("Template file not found: {0}")]
    TemplateNotFound(PathBuf),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ScaffoldError + '_ {
    move |source| ScaffoldError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Create the migrations directory and a configuration skeleton
///
/// The directory may already exist; an existing configuration file is never
/// overwritten.
///
/// # Errors
///
/// Returns `ScaffoldError::ConfigExists` if `config_path` exists, or
/// `ScaffoldError::Io` on filesystem failures.
pub fn init(migrations_dir: &Path, config_path: &Path) -> Result<(), ScaffoldError> {
    if config_path.exists() {
        return Err(ScaffoldError::ConfigExists(config_path.to_path_buf()));
    }

    fs::create_dir_all(migrations_dir).map_err(io_error(migrations_dir))?;
    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let dir = migrations_dir.to_string_lossy().replace('\\', "/");
    fs::write(config_path, CONFIG_SKELETON.replace("{{migrations_dir}}", &dir))
        .map_err(io_error(config_path))?;
    Ok(())
}

/// Split on anything that is not alphanumeric and on lower-to-upper boundaries
fn words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in name.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// `"Add users index"` → `add_users_index`
#[must_use]
pub fn to_snake_case(name: &str) -> String {
    words(name).join("_")
}

/// `"add_users-index"` → `AddUsersIndex`
#[must_use]
pub fn to_camel_case(name: &str) -> String {
    words(name)
        .iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

fn timestamp(now: &DateTime<Utc>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

/// Class name for a new migration: camel-cased name plus its timestamp
///
/// The timestamp keeps class names unique across the directory even when two
/// migrations share a name.
#[must_use]
pub fn class_name(name: &str, now: &DateTime<Utc>) -> String {
    let camel = to_camel_case(name);
    let camel = if camel.is_empty() || camel.starts_with(|c: char| c.is_ascii_digit()) {
        format!("Migration{camel}")
    } else {
        camel
    };
    format!("{camel}{}", timestamp(now))
}

/// `<YYYYMMDDHHMMSS>_<snake_name><ext>`
#[must_use]
pub fn migration_file_name(name: &str, now: &DateTime<Utc>, extension: Option<&str>) -> String {
    let ext = extension.unwrap_or(DEFAULT_EXTENSION);
    let ext = ext.strip_prefix('.').unwrap_or(ext);
    let snake = to_snake_case(name);
    let snake = if snake.is_empty() {
        DEFAULT_MIGRATION_NAME.to_string()
    } else {
        snake
    };
    format!("{}_{}.{}", timestamp(now), snake, ext)
}

#[must_use]
pub fn render(template: &str, class_name: &str, name: &str) -> String {
    template
        .replace("{{class_name}}", class_name)
        .replace("{{name}}", name)
}

/// What `new` created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMigration {
    pub path: PathBuf,
    pub class_name: String,
    pub name: String,
}

/// Options for [`create_migration`]
#[derive(Debug, Clone, Default)]
pub struct NewMigrationOptions<'a> {
    pub name: Option<&'a str>,
    pub template_file: Option<&'a Path>,
    pub extension: Option<&'a str>,
}

/// Write a new migration file into `migrations_dir`
///
/// A missing or blank name falls back to [`DEFAULT_MIGRATION_NAME`].
///
/// # Errors
///
/// Returns `ScaffoldError::TemplateNotFound` for a missing template,
/// `ScaffoldError::MigrationExists` if the target file exists, or
/// `ScaffoldError::Io` on filesystem failures.
pub fn create_migration(
    migrations_dir: &Path,
    options: &NewMigrationOptions<'_>,
    now: DateTime<Utc>,
) -> Result<NewMigration, ScaffoldError> {
    let name = options
        .name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_MIGRATION_NAME)
        .to_string();

    let template = match options.template_file {
        Some(path) if !path.exists() => {
            return Err(ScaffoldError::TemplateNotFound(path.to_path_buf()));
        }
        Some(path) => fs::read_to_string(path).map_err(io_error(path))?,
        None => DEFAULT_TEMPLATE.to_string(),
    };

    fs::create_dir_all(migrations_dir).map_err(io_error(migrations_dir))?;
    let path = migrations_dir.join(migration_file_name(&name, &now, options.extension));
    if path.exists() {
        return Err(ScaffoldError::MigrationExists(path));
    }

    let class_name = class_name(&name, &now);
    fs::write(&path, render(&template, &class_name, &name)).map_err(io_error(&path))?;
    log::debug!("Created migration {} ({})", path.display(), class_name);

    Ok(NewMigration {
        path,
        class_name,
        name,
    })
}
