//! `DocExecutor` Module
//!
//! Provides the `DocExecutor` trait that abstracts document storage, plus the
//! [`Database`] and [`Collection`] handles that migrations and the ledger use.
//!
//! Executors are synchronous. Under the `may` runtime a blocking call inside a
//! coroutine yields to the scheduler, so the same code serves CLI runs and
//! in-process startup migrations.

use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A stored document: a JSON object keyed by field name.
pub type Document = serde_json::Map<String, Value>;

/// `DocExecutor` error type
#[derive(Debug)]
pub enum DocError {
    /// I/O error from a file-backed store
    Io(std::io::Error),
    /// Document (de)serialization error
    Serialization(serde_json::Error),
    /// A collection name that the store cannot represent
    InvalidName(String),
    /// The executor was closed before the operation ran
    Closed,
    /// Other execution errors (including errors raised by migration code)
    Other(String),
}

impl fmt::Display for DocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocError::Io(e) => write!(f, "Storage I/O error: {e}"),
            DocError::Serialization(e) => write!(f, "Serialization error: {e}"),
            DocError::InvalidName(name) => write!(f, "Invalid collection name: '{name}'"),
            DocError::Closed => write!(f, "Database handle is closed"),
            DocError::Other(s) => write!(f, "Execution error: {s}"),
        }
    }
}

impl std::error::Error for DocError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DocError::Io(e) => Some(e),
            DocError::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DocError {
    fn from(err: std::io::Error) -> Self {
        DocError::Io(err)
    }
}

impl From<serde_json::Error> for DocError {
    fn from(err: serde_json::Error) -> Self {
        DocError::Serialization(err)
    }
}

/// Equality filter over top-level document fields.
///
/// An empty filter matches every document. Every listed field must be present
/// and equal for a document to match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    fields: Document,
}

impl Filter {
    /// A filter matching every document
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter matching documents whose `field` equals `value`
    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and_eq(field, value)
    }

    /// Add another equality condition
    #[must_use]
    pub fn and_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check whether `document` satisfies every condition
    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        self.fields
            .iter()
            .all(|(field, expected)| document.get(field) == Some(expected))
    }
}

/// Sort direction for [`FindQuery::sort_by`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// A find request: filter, optional single-field sort, optional limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    pub filter: Filter,
    pub sort: Option<(String, SortOrder)>,
    pub limit: Option<usize>,
}

impl FindQuery {
    #[must_use]
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            sort: None,
            limit: None,
        }
    }

    #[must_use]
    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some((field.into(), order));
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluate the query over documents in storage order.
    ///
    /// Sorting is stable, so documents with equal sort keys keep the order in
    /// which they were stored. Stores share this so they agree on results.
    pub fn apply<'a>(&self, documents: impl IntoIterator<Item = &'a Document>) -> Vec<Document> {
        let mut matched: Vec<Document> = documents
            .into_iter()
            .filter(|doc| self.filter.matches(doc))
            .cloned()
            .collect();

        if let Some((field, order)) = &self.sort {
            matched.sort_by(|a, b| {
                let ordering = compare_values(
                    a.get(field).unwrap_or(&Value::Null),
                    b.get(field).unwrap_or(&Value::Null),
                );
                match order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }

        matched
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: null < bool < number < string < array < object.
///
/// Arrays compare element-wise, objects by their serialized form.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            match (x.as_i64(), y.as_i64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => {
                    let x = x.as_f64().unwrap_or(f64::NAN);
                    let y = y.as_f64().unwrap_or(f64::NAN);
                    x.total_cmp(&y)
                }
            }
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                let ordering = compare_values(left, right);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(_), Value::Object(_)) => a.to_string().cmp(&b.to_string()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Trait for executing document operations within one database
///
/// This trait abstracts storage, allowing different implementations
/// (in-memory, file-backed, a network driver) to be used interchangeably by
/// the ledger and by migrations.
///
/// # Examples
///
/// ```
/// use docshift::{DocExecutor, Filter, FindQuery};
/// use docshift::store::MemoryExecutor;
/// use serde_json::json;
///
/// # fn main() -> Result<(), docshift::DocError> {
/// let executor = MemoryExecutor::new();
/// let doc = json!({ "name": "alice" }).as_object().cloned().unwrap_or_default();
/// executor.insert_one("users", doc)?;
///
/// let found = executor.find("users", &FindQuery::new(Filter::eq("name", "alice")))?;
/// assert_eq!(found.len(), 1);
/// # Ok(())
/// # }
/// ```
pub trait DocExecutor: Send + Sync {
    /// Insert a document into `collection`, creating the collection if needed
    ///
    /// # Errors
    ///
    /// Returns `DocError` if the write fails or the executor is closed.
    fn insert_one(&self, collection: &str, document: Document) -> Result<(), DocError>;

    /// Return the documents in `collection` matching `query`
    ///
    /// A collection that does not exist yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns `DocError` if the read fails or the executor is closed.
    fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, DocError>;

    /// Merge the fields of `set` into every matching document
    ///
    /// Returns the number of documents modified.
    ///
    /// # Errors
    ///
    /// Returns `DocError` if the write fails or the executor is closed.
    fn update_many(&self, collection: &str, filter: &Filter, set: &Document)
        -> Result<u64, DocError>;

    /// Delete matching documents, at most `limit` of them when given
    ///
    /// Returns the number of documents deleted.
    ///
    /// # Errors
    ///
    /// Returns `DocError` if the write fails or the executor is closed.
    fn delete(&self, collection: &str, filter: &Filter, limit: Option<usize>)
        -> Result<u64, DocError>;

    /// Drop a collection; returns whether it existed
    ///
    /// # Errors
    ///
    /// Returns `DocError` if the store cannot remove it or the executor is closed.
    fn drop_collection(&self, collection: &str) -> Result<bool, DocError>;

    /// Names of the collections currently present, sorted
    ///
    /// # Errors
    ///
    /// Returns `DocError` if the store cannot be listed or the executor is closed.
    fn list_collections(&self) -> Result<Vec<String>, DocError>;

    /// Release the executor. Later operations fail with [`DocError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns `DocError` if releasing the underlying resources fails.
    fn close(&self) -> Result<(), DocError>;

    /// Return the first document matching `filter`
    ///
    /// # Errors
    ///
    /// Returns `DocError` if the read fails.
    fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>, DocError> {
        let query = FindQuery::new(filter.clone()).limit(1);
        Ok(self.find(collection, &query)?.into_iter().next())
    }

    /// Count the documents matching `filter`
    ///
    /// # Errors
    ///
    /// Returns `DocError` if the read fails.
    fn count(&self, collection: &str, filter: &Filter) -> Result<u64, DocError> {
        let query = FindQuery::new(filter.clone());
        Ok(self.find(collection, &query)?.len() as u64)
    }

    /// Delete the first document matching `filter`
    ///
    /// # Errors
    ///
    /// Returns `DocError` if the write fails.
    fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64, DocError> {
        self.delete(collection, filter, Some(1))
    }
}

/// A live database handle
///
/// Cheap to clone; every clone shares the same executor. This is the value
/// handed to [`Migration::up`](crate::migration::Migration::up) and
/// [`Migration::down`](crate::migration::Migration::down).
#[derive(Clone)]
pub struct Database {
    name: String,
    executor: Arc<dyn DocExecutor>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Database {
    pub fn new(name: impl Into<String>, executor: Arc<dyn DocExecutor>) -> Self {
        Self {
            name: name.into(),
            executor,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a reference to the underlying executor
    #[must_use]
    pub fn executor(&self) -> &Arc<dyn DocExecutor> {
        &self.executor
    }

    /// Handle to a collection in this database
    #[must_use]
    pub fn collection(&self, name: impl Into<String>) -> Collection {
        Collection {
            name: name.into(),
            executor: Arc::clone(&self.executor),
        }
    }

    /// # Errors
    ///
    /// Returns `DocError` if the store cannot be listed.
    pub fn list_collection_names(&self) -> Result<Vec<String>, DocError> {
        self.executor.list_collections()
    }
}

/// Handle to one collection
#[derive(Clone)]
pub struct Collection {
    name: String,
    executor: Arc<dyn DocExecutor>,
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Collection {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// # Errors
    ///
    /// Returns `DocError` if the write fails.
    pub fn insert_one(&self, document: Document) -> Result<(), DocError> {
        self.executor.insert_one(&self.name, document)
    }

    /// Insert documents one at a time, stopping at the first failure
    ///
    /// # Errors
    ///
    /// Returns `DocError` if any write fails.
    pub fn insert_many(&self, documents: impl IntoIterator<Item = Document>) -> Result<usize, DocError> {
        let mut inserted = 0;
        for document in documents {
            self.executor.insert_one(&self.name, document)?;
            inserted += 1;
        }
        Ok(inserted)
    }

    /// # Errors
    ///
    /// Returns `DocError` if the read fails.
    pub fn find(&self, filter: Filter) -> Result<Vec<Document>, DocError> {
        self.executor.find(&self.name, &FindQuery::new(filter))
    }

    /// # Errors
    ///
    /// Returns `DocError` if the read fails.
    pub fn find_with(&self, query: &FindQuery) -> Result<Vec<Document>, DocError> {
        self.executor.find(&self.name, query)
    }

    /// # Errors
    ///
    /// Returns `DocError` if the read fails.
    pub fn find_one(&self, filter: &Filter) -> Result<Option<Document>, DocError> {
        self.executor.find_one(&self.name, filter)
    }

    /// # Errors
    ///
    /// Returns `DocError` if the read fails.
    pub fn count(&self, filter: &Filter) -> Result<u64, DocError> {
        self.executor.count(&self.name, filter)
    }

    /// # Errors
    ///
    /// Returns `DocError` if the write fails.
    pub fn update_many(&self, filter: &Filter, set: &Document) -> Result<u64, DocError> {
        self.executor.update_many(&self.name, filter, set)
    }

    /// # Errors
    ///
    /// Returns `DocError` if the write fails.
    pub fn delete_one(&self, filter: &Filter) -> Result<u64, DocError> {
        self.executor.delete_one(&self.name, filter)
    }

    /// # Errors
    ///
    /// Returns `DocError` if the write fails.
    pub fn delete_many(&self, filter: &Filter) -> Result<u64, DocError> {
        self.executor.delete(&self.name, filter, None)
    }

    /// # Errors
    ///
    /// Returns `DocError` if the store cannot remove the collection.
    pub fn drop(&self) -> Result<bool, DocError> {
        self.executor.drop_collection(&self.name)
    }
}
