//! File-backed document store
//!
//! Layout: `<root>/<collection>.json`, each file a JSON array of documents in
//! insertion order. Writes go to a temporary file in the same directory which
//! is then persisted over the target, so a crash never leaves a torn file.

use crate::executor::{DocError, DocExecutor, Document, Filter, FindQuery};
use crate::store::validate_collection_name;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;

const COLLECTION_EXTENSION: &str = "json";

pub struct FileExecutor {
    root: PathBuf,
    pretty: bool,
    closed: AtomicBool,
    // Serializes read-modify-write cycles within this executor.
    write_lock: Mutex<()>,
}

impl FileExecutor {
    /// Open a store rooted at `root`
    ///
    /// # Errors
    ///
    /// Returns `DocError::Io` if the directory is missing and `create_if_missing`
    /// is false, or if it cannot be created.
    pub fn open(root: impl AsRef<Path>, create_if_missing: bool, pretty: bool) -> Result<Self, DocError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            if !create_if_missing {
                return Err(DocError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("Database directory not found: {}", root.display()),
                )));
            }
            fs::create_dir_all(&root)?;
        }

        Ok(Self {
            root,
            pretty,
            closed: AtomicBool::new(false),
            write_lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_open(&self) -> Result<(), DocError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DocError::Closed);
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, DocError> {
        self.ensure_open()?;
        self.write_lock
            .lock()
            .map_err(|e| DocError::Other(format!("Failed to lock file store: {e}")))
    }

    fn collection_path(&self, collection: &str) -> Result<PathBuf, DocError> {
        validate_collection_name(collection)?;
        Ok(self.root.join(format!("{collection}.{COLLECTION_EXTENSION}")))
    }

    fn read_collection(&self, collection: &str) -> Result<Vec<Document>, DocError> {
        let path = self.collection_path(collection)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(DocError::Io(e)),
        }
    }

    fn write_collection(&self, collection: &str, documents: &[Document]) -> Result<(), DocError> {
        let path = self.collection_path(collection)?;
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(documents)?
        } else {
            serde_json::to_vec(documents)?
        };

        let mut temp = NamedTempFile::new_in(&self.root)?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| DocError::Io(e.error))?;
        Ok(())
    }
}

impl DocExecutor for FileExecutor {
    fn insert_one(&self, collection: &str, document: Document) -> Result<(), DocError> {
        let _guard = self.lock()?;
        let mut documents = self.read_collection(collection)?;
        documents.push(document);
        self.write_collection(collection, &documents)
    }

    fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, DocError> {
        let _guard = self.lock()?;
        let documents = self.read_collection(collection)?;
        Ok(query.apply(&documents))
    }

    fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        set: &Document,
    ) -> Result<u64, DocError> {
        let _guard = self.lock()?;
        let mut documents = self.read_collection(collection)?;

        let mut modified = 0;
        for doc in documents.iter_mut().filter(|doc| filter.matches(doc)) {
            for (field, value) in set {
                doc.insert(field.clone(), value.clone());
            }
            modified += 1;
        }

        if modified > 0 {
            self.write_collection(collection, &documents)?;
        }
        Ok(modified)
    }

    fn delete(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> Result<u64, DocError> {
        let _guard = self.lock()?;
        let mut documents = self.read_collection(collection)?;

        let max = limit.unwrap_or(usize::MAX);
        let mut deleted = 0usize;
        documents.retain(|doc| {
            if deleted < max && filter.matches(doc) {
                deleted += 1;
                false
            } else {
                true
            }
        });

        if deleted > 0 {
            self.write_collection(collection, &documents)?;
        }
        Ok(deleted as u64)
    }

    fn drop_collection(&self, collection: &str) -> Result<bool, DocError> {
        let _guard = self.lock()?;
        let path = self.collection_path(collection)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(DocError::Io(e)),
        }
    }

    fn list_collections(&self) -> Result<Vec<String>, DocError> {
        let _guard = self.lock()?;
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(COLLECTION_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn close(&self) -> Result<(), DocError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_round_trip_through_disk() {
        let dir = TempDir::new().unwrap();
        let store = FileExecutor::open(dir.path(), true, false).unwrap();
        store.insert_one("users", doc(json!({ "name": "a" }))).unwrap();
        store.insert_one("users", doc(json!({ "name": "b" }))).unwrap();

        let reopened = FileExecutor::open(dir.path(), false, false).unwrap();
        let names: Vec<_> = reopened
            .find("users", &FindQuery::default())
            .unwrap()
            .into_iter()
            .map(|d| d["name"].clone())
            .collect();
        assert_eq!(names, vec![json!("a"), json!("b")]);
        assert!(dir.path().join("users.json").is_file());
    }

    #[test]
    fn test_open_missing_without_create_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(FileExecutor::open(&missing, false, false).is_err());
        assert!(FileExecutor::open(&missing, true, false).is_ok());
        assert!(missing.is_dir());
    }

    #[test]
    fn test_delete_and_drop() {
        let dir = TempDir::new().unwrap();
        let store = FileExecutor::open(dir.path(), true, true).unwrap();
        store.insert_one("c", doc(json!({ "k": 1 }))).unwrap();
        store.insert_one("c", doc(json!({ "k": 1 }))).unwrap();

        assert_eq!(store.delete_one("c", &Filter::eq("k", 1)).unwrap(), 1);
        assert_eq!(store.count("c", &Filter::all()).unwrap(), 1);
        assert_eq!(store.list_collections().unwrap(), vec!["c"]);
        assert!(store.drop_collection("c").unwrap());
        assert!(store.list_collections().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_collection_is_a_serialization_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("broken.json"), b"{not json").unwrap();
        let store = FileExecutor::open(dir.path(), false, false).unwrap();
        assert!(matches!(
            store.find("broken", &FindQuery::default()),
            Err(DocError::Serialization(_))
        ));
    }
}
