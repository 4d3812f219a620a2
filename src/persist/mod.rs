//! Single-slot local persistence of the last rendered snapshot.
mod memory;
mod sqlite;
mod types;


use async_trait::async_trait;

use crate::error::PersistError;

pub use memory::MemorySnapshotSlot;
pub use sqlite::SqliteSnapshotSlot;
pub use types::PersistedSnapshot;

/// Durable home for one [`PersistedSnapshot`].
///
/// Implementations are best-effort: a missing or unreadable entry loads as
/// `Ok(None)`.
#[async_trait]
pub trait SnapshotSlot: Send + Sync {
    /// Reads the stored snapshot, if any.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing store itself cannot be queried.
    async fn load(&self) -> Result<Option<PersistedSnapshot>, PersistError>;

    /// Replaces the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error when the snapshot cannot be encoded or written.
    async fn store(&self, snapshot: &PersistedSnapshot) -> Result<(), PersistError>;
}
