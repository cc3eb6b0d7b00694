//! In-memory document store

use crate::executor::{DocError, DocExecutor, Document, Filter, FindQuery};
use crate::store::validate_collection_name;
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

type Collections = BTreeMap<String, Vec<Document>>;

/// Named stores shared by every `memory://<name>` connection in the process.
static SHARED_STORES: Lazy<Mutex<HashMap<String, Arc<Mutex<Collections>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Process-local executor
///
/// Each executor owns a close flag; the data itself may be shared with other
/// executors attached to the same name, so closing one connection never
/// discards data another connection (or a later one) can still see.
pub struct MemoryExecutor {
    data: Arc<Mutex<Collections>>,
    closed: AtomicBool,
}

impl Default for MemoryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryExecutor {
    /// A fresh, isolated store
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(BTreeMap::new())),
            closed: AtomicBool::new(false),
        }
    }

    /// Attach to the process-wide store registered under `key`, creating it on first use
    ///
    /// # Errors
    ///
    /// Returns `DocError::Other` if the shared registry lock is poisoned.
    pub fn shared(key: &str) -> Result<Self, DocError> {
        let mut stores = SHARED_STORES
            .lock()
            .map_err(|e| DocError::Other(format!("Failed to lock shared memory stores: {e}")))?;
        let data = stores
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(BTreeMap::new())));

        Ok(Self {
            data: Arc::clone(data),
            closed: AtomicBool::new(false),
        })
    }

    /// Remove a shared store so the next `shared(key)` starts empty
    ///
    /// # Errors
    ///
    /// Returns `DocError::Other` if the shared registry lock is poisoned.
    pub fn forget_shared(key: &str) -> Result<bool, DocError> {
        let mut stores = SHARED_STORES
            .lock()
            .map_err(|e| DocError::Other(format!("Failed to lock shared memory stores: {e}")))?;
        Ok(stores.remove(key).is_some())
    }

    fn collections(&self) -> Result<MutexGuard<'_, Collections>, DocError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DocError::Closed);
        }
        self.data
            .lock()
            .map_err(|e| DocError::Other(format!("Failed to lock memory store: {e}")))
    }
}

impl DocExecutor for MemoryExecutor {
    fn insert_one(&self, collection: &str, document: Document) -> Result<(), DocError> {
        validate_collection_name(collection)?;
        let mut collections = self.collections()?;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(document);
        Ok(())
    }

    fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, DocError> {
        let collections = self.collections()?;
        Ok(collections
            .get(collection)
            .map(|docs| query.apply(docs))
            .unwrap_or_default())
    }

    fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        set: &Document,
    ) -> Result<u64, DocError> {
        let mut collections = self.collections()?;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let mut modified = 0;
        for doc in docs.iter_mut().filter(|doc| filter.matches(doc)) {
            for (field, value) in set {
                doc.insert(field.clone(), value.clone());
            }
            modified += 1;
        }
        Ok(modified)
    }

    fn delete(
        &self,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> Result<u64, DocError> {
        let mut collections = self.collections()?;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let max = limit.unwrap_or(usize::MAX);
        let mut deleted = 0usize;
        docs.retain(|doc| {
            if deleted < max && filter.matches(doc) {
                deleted += 1;
                false
            } else {
                true
            }
        });
        Ok(deleted as u64)
    }

    fn drop_collection(&self, collection: &str) -> Result<bool, DocError> {
        let mut collections = self.collections()?;
        Ok(collections.remove(collection).is_some())
    }

    fn list_collections(&self) -> Result<Vec<String>, DocError> {
        let collections = self.collections()?;
        Ok(collections.keys().cloned().collect())
    }

    fn close(&self) -> Result<(), DocError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
