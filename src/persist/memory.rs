use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::PersistError;

use super::{PersistedSnapshot, SnapshotSlot};

/// Process-local slot, mainly for tests and `--no-persist` runs that still
/// want restore semantics within one session.
#[derive(Debug, Default)]
pub struct MemorySnapshotSlot {
    slot: Mutex<Option<PersistedSnapshot>>,
}

impl MemorySnapshotSlot {
    #[must_use]
    pub fn with_snapshot(snapshot: PersistedSnapshot) -> Self {
        Self {
            slot: Mutex::new(Some(snapshot)),
        }
    }
}

#[async_trait]
impl SnapshotSlot for MemorySnapshotSlot {
    async fn load(&self) -> Result<Option<PersistedSnapshot>, PersistError> {
        Ok(self.slot.lock().await.clone())
    }

    async fn store(&self, snapshot: &PersistedSnapshot) -> Result<(), PersistError> {
        *self.slot.lock().await = Some(snapshot.clone());
        Ok(())
    }
}
