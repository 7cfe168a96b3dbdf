//! Plugin storage contract.
//!
//! The framework depends on storage only through [`PluginStorage`]: four
//! data operations (`list_installed`, `persist`, `remove`, `data_dir_for`)
//! and two lifecycle hooks (`open`, `close`).  Where and how records are
//! kept is the backend's business.  [`DirectoryStorage`] is the bundled
//! filesystem backend.

pub mod directory;

use std::path::PathBuf;

use plinth_core::{PluginId, PluginRecord, StorageResult};

pub use directory::DirectoryStorage;

/// Persistence collaborator of a framework instance.
///
/// Implementations must be safe to call from several threads; the framework
/// serializes `persist`/`remove` for the same plugin but not across plugins.
pub trait PluginStorage: Send + Sync + 'static {
    /// Claims and prepares the storage area.
    ///
    /// Returns `true` when the area did not exist before and was created by
    /// this call.  Fails with `StorageError::Locked` when another framework
    /// in the process holds the same area.
    fn open(&self) -> StorageResult<bool>;

    /// Every persisted plugin, in ascending id order.
    fn list_installed(&self) -> StorageResult<Vec<PluginRecord>>;

    /// Writes (or overwrites) the record for `record.id`.
    fn persist(&self, record: &PluginRecord) -> StorageResult<()>;

    /// Forgets a plugin: its record and its private data directory.
    /// Removing an unknown id is not an error.
    fn remove(&self, id: PluginId) -> StorageResult<()>;

    /// The private data directory of `id`, created if absent.
    fn data_dir_for(&self, id: PluginId) -> StorageResult<PathBuf>;

    /// Releases the claim taken by `open`; with `purge`, deletes the area.
    fn close(&self, purge: bool) -> StorageResult<()>;
}
