//! Key-value persistence for client-side conversation state.
//!
//! The conversation manager only needs get/set/remove/clear on string values,
//! so any backend that can offer that (memory, files, a remote store) can hold
//! the chat history.

mod error;
mod file;
mod memory;

pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::MemoryStore;

/// Synchronous string key-value store.
///
/// Calls block the current thread until the value is durable. Callers on an
/// async runtime should not hold locks that other tasks need across a call.
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when the key has never been written.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Delete a key. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> StoreResult<()>;

    /// Delete every key.
    fn clear(&self) -> StoreResult<()>;
}
