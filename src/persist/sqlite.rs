use std::path::Path;

use async_trait::async_trait;
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::error::PersistError;

use super::{PersistedSnapshot, SnapshotSlot};

const CREATE_SLOT_TABLE: &str = "CREATE TABLE IF NOT EXISTS snapshot_slot (
        id INTEGER PRIMARY KEY CHECK (id = 0),
        payload TEXT NOT NULL,
        saved_at_ms INTEGER NOT NULL
    );";

/// Snapshot slot backed by a single row in a SQLite database.
pub struct SqliteSnapshotSlot {
    conn: Connection,
}

impl SqliteSnapshotSlot {
    /// Opens (or creates) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the parent directory cannot be created or the
    /// database cannot be opened and initialized.
    pub async fn open(path: &Path) -> Result<Self, PersistError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| PersistError::CreateDir {
                    path: parent.to_path_buf(),
                    source: err,
                })?;
        }
        let conn = Connection::open(path)
            .await
            .map_err(|err| PersistError::Open {
                path: path.to_path_buf(),
                source: err,
            })?;
        Self::initialize(conn).await
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error when the database cannot be initialized.
    pub async fn open_in_memory() -> Result<Self, PersistError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|err| PersistError::Sqlite {
                context: "open in-memory snapshot db",
                source: err,
            })?;
        Self::initialize(conn).await
    }

    async fn initialize(conn: Connection) -> Result<Self, PersistError> {
        conn.call(|conn| {
            conn.execute_batch(CREATE_SLOT_TABLE)?;
            Ok(())
        })
        .await
        .map_err(|err| PersistError::Sqlite {
            context: "initialize snapshot db",
            source: err,
        })?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub(super) async fn write_raw_payload(&self, payload: &'static str) -> Result<(), PersistError> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO snapshot_slot (id, payload, saved_at_ms) VALUES (0, ?1, 0)",
                    rusqlite::params![payload],
                )?;
                Ok(())
            })
            .await
            .map_err(|err| PersistError::Sqlite {
                context: "write raw snapshot",
                source: err,
            })
    }
}

#[async_trait]
impl SnapshotSlot for SqliteSnapshotSlot {
    async fn load(&self) -> Result<Option<PersistedSnapshot>, PersistError> {
        let payload: Option<String> = self
            .conn
            .call(|conn| {
                let payload = conn
                    .query_row(
                        "SELECT payload FROM snapshot_slot WHERE id = 0",
                        [],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()?;
                Ok(payload)
            })
            .await
            .map_err(|err| PersistError::Sqlite {
                context: "read snapshot",
                source: err,
            })?;

        let Some(payload) = payload else {
            return Ok(None);
        };
        match serde_json::from_str::<PersistedSnapshot>(&payload) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(err) => {
                debug!("Ignoring unreadable persisted snapshot: {}", err);
                Ok(None)
            }
        }
    }

    async fn store(&self, snapshot: &PersistedSnapshot) -> Result<(), PersistError> {
        let payload =
            serde_json::to_string(snapshot).map_err(|err| PersistError::Encode { source: err })?;
        let saved_at_ms = snapshot.saved_at_ms;
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO snapshot_slot (id, payload, saved_at_ms) VALUES (0, ?1, ?2)
                     ON CONFLICT(id) DO UPDATE SET payload = excluded.payload, saved_at_ms = excluded.saved_at_ms",
                    rusqlite::params![payload, saved_at_ms],
                )?;
                Ok(())
            })
            .await
            .map_err(|err| PersistError::Sqlite {
                context: "write snapshot",
                source: err,
            })
    }
}
