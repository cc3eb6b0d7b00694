//! Applied-migration ledger
//!
//! One document per successfully applied migration, kept in a single
//! collection of the target database.

use crate::executor::{Collection, Database, Filter};
use crate::migration::{AppliedMigrationRecord, MigrationDefinition, MigrationError};
use chrono::{DateTime, Utc};
use std::path::Path;

/// Default ledger collection name
pub const DEFAULT_COLLECTION: &str = "migrations_changelog";

/// The ledger collection of one database
#[derive(Debug, Clone)]
pub struct MigrationLedger {
    collection: Collection,
}

impl MigrationLedger {
    pub fn new(db: &Database, collection_name: impl Into<String>) -> Self {
        Self {
            collection: db.collection(collection_name),
        }
    }

    #[must_use]
    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }

    /// All records, ascending by `appliedAt`; ties keep insertion order
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Ledger` if the collection cannot be read or a
    /// record is malformed.
    pub fn applied_migrations(&self) -> Result<Vec<AppliedMigrationRecord>, MigrationError> {
        let mut records = self
            .collection
            .find(Filter::all())?
            .into_iter()
            .map(|doc| AppliedMigrationRecord::from_document(doc).map_err(MigrationError::Ledger))
            .collect::<Result<Vec<_>, _>>()?;
        // Parsed, not lexicographic: records written by other tools may use another format
        records.sort_by_key(|r| r.applied_at);
        Ok(records)
    }

    /// The record with the greatest `appliedAt`, or `None` for an empty ledger
    ///
    /// # Errors
    ///
    /// Same as [`applied_migrations`](Self::applied_migrations).
    pub fn last_applied_migration(&self) -> Result<Option<AppliedMigrationRecord>, MigrationError> {
        Ok(self.applied_migrations()?.pop())
    }

    /// # Errors
    ///
    /// Returns `MigrationError::Ledger` if the collection cannot be read.
    pub fn is_applied(&self, class_name: &str) -> Result<bool, MigrationError> {
        Ok(self.collection.count(&Filter::eq("className", class_name))? > 0)
    }

    /// Record `definition` as applied now
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::AlreadyApplied` if a record for the same class
    /// exists, or `MigrationError::Ledger` if the write fails.
    pub fn insert_migration(
        &self,
        definition: &MigrationDefinition,
    ) -> Result<AppliedMigrationRecord, MigrationError> {
        let record = AppliedMigrationRecord::for_definition(definition, Utc::now());
        self.insert_record(&record)?;
        Ok(record)
    }

    /// Insert a prepared record, e.g. when importing a ledger
    ///
    /// # Errors
    ///
    /// Same as [`insert_migration`](Self::insert_migration).
    pub fn insert_record(&self, record: &AppliedMigrationRecord) -> Result<(), MigrationError> {
        if self.is_applied(&record.class_name)? {
            return Err(MigrationError::AlreadyApplied {
                class_name: record.class_name.clone(),
            });
        }
        self.collection.insert_one(record.to_document()?)?;
        Ok(())
    }

    /// Insert a record with an explicit timestamp
    ///
    /// # Errors
    ///
    /// Same as [`insert_migration`](Self::insert_migration).
    pub fn insert_at(
        &self,
        definition: &MigrationDefinition,
        applied_at: DateTime<Utc>,
    ) -> Result<AppliedMigrationRecord, MigrationError> {
        let record = AppliedMigrationRecord::for_definition(definition, applied_at);
        self.insert_record(&record)?;
        Ok(record)
    }

    /// Remove the record for `file` + `class_name`
    ///
    /// Returns `false` (after logging a warning) when no record matched.
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::Ledger` if the delete fails.
    pub fn delete_migration(&self, file: &Path, class_name: &str) -> Result<bool, MigrationError> {
        let filter = Filter::eq("file", file.to_string_lossy().into_owned()).and_eq("className", class_name);
        let deleted = self.collection.delete_one(&filter)?;
        if deleted == 0 {
            log::warn!(
                "No ledger record found for migration {} ({}); nothing to delete",
                class_name,
                file.display()
            );
            return Ok(false);
        }
        Ok(true)
    }

    /// Remove the ledger entry matching `record`
    ///
    /// # Errors
    ///
    /// Same as [`delete_migration`](Self::delete_migration).
    pub fn delete_record(&self, record: &AppliedMigrationRecord) -> Result<bool, MigrationError> {
        self.delete_migration(&record.file, &record.class_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::DocError;
    use crate::migration::Migration;
    use crate::store::MemoryExecutor;
    use chrono::TimeZone;
    use std::path::PathBuf;
    use std::sync::Arc;

    struct Noop;

    impl Migration for Noop {
        fn up(&self, _db: &Database) -> Result<(), DocError> {
            Ok(())
        }

        fn down(&self, _db: &Database) -> Result<(), DocError> {
            Ok(())
        }
    }

    fn ledger() -> MigrationLedger {
        let db = Database::new("test", Arc::new(MemoryExecutor::new()));
        MigrationLedger::new(&db, DEFAULT_COLLECTION)
    }

    fn definition(class_name: &str) -> MigrationDefinition {
        MigrationDefinition::new(
            PathBuf::from(format!("/m/{class_name}.rs")),
            class_name,
            Arc::new(Noop),
        )
    }

    fn at(seconds: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, seconds).unwrap()
    }

    #[test]
    fn test_empty_ledger() {
        let ledger = ledger();
        assert!(ledger.applied_migrations().unwrap().is_empty());
        assert!(ledger.last_applied_migration().unwrap().is_none());
    }

    #[test]
    fn test_applied_migrations_ordered_by_applied_at() {
        let ledger = ledger();
        ledger.insert_at(&definition("C"), at(30)).unwrap();
        ledger.insert_at(&definition("A"), at(10)).unwrap();
        ledger.insert_at(&definition("B"), at(20)).unwrap();

        let names: Vec<_> = ledger
            .applied_migrations()
            .unwrap()
            .into_iter()
            .map(|r| r.class_name)
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        assert_eq!(ledger.last_applied_migration().unwrap().unwrap().class_name, "C");
    }

    #[test]
    fn test_tied_timestamps_keep_insertion_order() {
        let ledger = ledger();
        ledger.insert_at(&definition("First"), at(5)).unwrap();
        ledger.insert_at(&definition("Second"), at(5)).unwrap();
        assert_eq!(ledger.last_applied_migration().unwrap().unwrap().class_name, "Second");
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let ledger = ledger();
        ledger.insert_migration(&definition("A")).unwrap();
        let err = ledger.insert_migration(&definition("A")).unwrap_err();
        assert!(matches!(err, MigrationError::AlreadyApplied { .. }));
        assert_eq!(ledger.applied_migrations().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_migration() {
        let ledger = ledger();
        let record = ledger.insert_migration(&definition("A")).unwrap();
        assert!(ledger.delete_record(&record).unwrap());
        assert!(!ledger.is_applied("A").unwrap());
        assert!(!ledger.delete_record(&record).unwrap());
    }

    #[test]
    fn test_delete_requires_matching_file() {
        let ledger = ledger();
        ledger.insert_migration(&definition("A")).unwrap();
        assert!(!ledger.delete_migration(Path::new("/elsewhere/A.rs"), "A").unwrap());
        assert!(ledger.is_applied("A").unwrap());
    }
}
