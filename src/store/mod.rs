//! Built-in document stores
//!
//! - [`MemoryExecutor`]: process-local store, optionally shared by name
//! - [`FileExecutor`]: one JSON array per collection under a directory

pub mod file;
pub mod memory;

pub use file::FileExecutor;
pub use memory::MemoryExecutor;

use crate::executor::DocError;

/// Reject collection names a store cannot represent safely.
pub(crate) fn validate_collection_name(name: &str) -> Result<(), DocError> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(DocError::InvalidName(name.to_string()));
    }
    Ok(())
}
