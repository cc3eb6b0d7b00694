//! Migration registry
//!
//! Rust cannot import a source file at runtime, so every migration file is
//! declared up front as a [`MigrationModule`]: the file name plus the list of
//! items it exports. A module's exports mirror what a build script would
//! generate from the file's public items, so they may include helpers that are
//! not migrations; the loader keeps only the migration exports.

use crate::migration::{Migration, MigrationDefinition, MigrationError};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Constructor for a migration export. Called once per load.
pub type MigrationFactory = Arc<dyn Fn() -> Result<Box<dyn Migration>, String> + Send + Sync>;

/// One exported item of a migration module
#[derive(Clone)]
pub enum ModuleExport {
    /// A type implementing [`Migration`], constructed with no arguments
    Migration { name: String, factory: MigrationFactory },
    /// Any other public item (helper functions, constants)
    Helper { name: String },
}

impl ModuleExport {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            ModuleExport::Migration { name, .. } | ModuleExport::Helper { name } => name,
        }
    }

    #[must_use]
    pub fn is_migration(&self) -> bool {
        matches!(self, ModuleExport::Migration { .. })
    }
}

impl fmt::Debug for ModuleExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleExport::Migration { name, .. } => f.debug_tuple("Migration").field(name).finish(),
            ModuleExport::Helper { name } => f.debug_tuple("Helper").field(name).finish(),
        }
    }
}

/// The exports of one migration file
#[derive(Debug, Clone)]
pub struct MigrationModule {
    file_name: String,
    exports: Vec<ModuleExport>,
}

impl MigrationModule {
    /// Declare the module for `file_name` (the file's name, not its path)
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            exports: Vec::new(),
        }
    }

    /// Export a migration constructed with `T::default()`
    #[must_use]
    pub fn migration<T>(self, class_name: impl Into<String>) -> Self
    where
        T: Migration + Default + 'static,
    {
        self.migration_with(class_name, || Ok(Box::new(T::default()) as Box<dyn Migration>))
    }

    /// Export a migration with a custom, fallible constructor
    #[must_use]
    pub fn migration_with<F>(mut self, class_name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Migration>, String> + Send + Sync + 'static,
    {
        self.exports.push(ModuleExport::Migration {
            name: class_name.into(),
            factory: Arc::new(factory),
        });
        self
    }

    /// Export a non-migration item
    #[must_use]
    pub fn helper(mut self, name: impl Into<String>) -> Self {
        self.exports.push(ModuleExport::Helper { name: name.into() });
        self
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    #[must_use]
    pub fn exports(&self) -> &[ModuleExport] {
        &self.exports
    }

    fn validate(&self) -> Result<(), MigrationError> {
        for (i, export) in self.exports.iter().enumerate() {
            if self.exports[..i].iter().any(|e| e.name() == export.name()) {
                return Err(MigrationError::DuplicateExport {
                    module: self.file_name.clone(),
                    name: export.name().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Construct fresh definitions for every migration export, in export order
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Load` if a constructor fails.
    pub fn instantiate(&self, path: &Path) -> Result<Vec<MigrationDefinition>, MigrationError> {
        let mut definitions = Vec::new();
        for export in &self.exports {
            let ModuleExport::Migration { name, factory } = export else {
                continue;
            };
            let instance = factory().map_err(|reason| MigrationError::Load {
                file: path.to_path_buf(),
                reason: format!("failed to construct '{name}': {reason}"),
            })?;
            definitions.push(MigrationDefinition::new(
                path.to_path_buf(),
                name.clone(),
                Arc::from(instance),
            ));
        }
        Ok(definitions)
    }
}

/// All known migration modules, keyed by file name
#[derive(Debug, Clone, Default)]
pub struct MigrationRegistry {
    modules: HashMap<String, MigrationModule>,
}

impl MigrationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::DuplicateExport` if the module lists a name
    /// twice or a module for the same file is already registered.
    pub fn register(&mut self, module: MigrationModule) -> Result<(), MigrationError> {
        module.validate()?;
        if self.modules.contains_key(module.file_name()) {
            return Err(MigrationError::DuplicateExport {
                module: module.file_name().to_string(),
                name: module.file_name().to_string(),
            });
        }
        self.modules.insert(module.file_name().to_string(), module);
        Ok(())
    }

    /// Builder form of [`register`](Self::register)
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register).
    pub fn with_module(mut self, module: MigrationModule) -> Result<Self, MigrationError> {
        self.register(module)?;
        Ok(self)
    }

    #[must_use]
    pub fn module(&self, file_name: &str) -> Option<&MigrationModule> {
        self.modules.get(file_name)
    }

    #[must_use]
    pub fn is_registered(&self, file_name: &str) -> bool {
        self.modules.contains_key(file_name)
    }

    /// Remove a module; returns whether it was registered
    pub fn unregister(&mut self, file_name: &str) -> bool {
        self.modules.remove(file_name).is_some()
    }

    /// Registered file names, sorted
    #[must_use]
    pub fn file_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
