use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use tracing::{debug, info};

use crate::error::StoreError;

/// Externally assigned drawing identifier (taken from the add-drawing topic).
pub type DrawingId = i64;

const COLUMNS: &str = "id, created_time, displayed_time, removed, data";

/// A queued image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Drawing {
    /// Id assigned by the sender.
    pub id: DrawingId,
    /// When the drawing was stored.
    pub created_time: DateTime<Utc>,
    /// When it was first shown, `None` while still queued.
    pub displayed_time: Option<DateTime<Utc>>,
    /// Soft-delete flag.
    pub removed: bool,
    /// Encoded image bytes as received.
    pub data: Vec<u8>,
}

impl Drawing {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            created_time: from_millis(row.get(1)?),
            displayed_time: row.get::<_, Option<i64>>(2)?.map(from_millis),
            removed: row.get(3)?,
            data: row.get(4)?,
        })
    }
}

/// Row totals, logged at startup to show what a restart resumes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueCounts {
    /// Not removed and never shown.
    pub queued: u64,
    /// Shown at least once.
    pub shown: u64,
    /// Soft-deleted.
    pub removed: u64,
}

/// SQLite-backed queue of drawings.
///
/// Rows are never deleted. Insertion order is kept in an autoincrement
/// `seq` column so drawings with identical timestamps still come out in the
/// order they arrived.
pub struct DrawingStore {
    conn: Connection,
}

impl DrawingStore {
    /// Opens (or creates) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self {
            conn: Connection::open(path)?,
        };
        store.init_schema()?;
        info!(path = %path.display(), "drawing store opened");
        Ok(store)
    }

    /// Opens a throwaway in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS drawings (
                seq             INTEGER PRIMARY KEY AUTOINCREMENT,
                id              INTEGER NOT NULL UNIQUE,
                created_time    INTEGER NOT NULL,
                displayed_time  INTEGER,
                removed         INTEGER NOT NULL DEFAULT 0,
                data            BLOB NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_drawings_pending
                ON drawings(removed, displayed_time, created_time);",
        )?;
        Ok(())
    }

    /// Inserts a new drawing created at `now`.
    ///
    /// With `already_shown` the drawing is stored as displayed at `now`,
    /// which is how a drawing shown immediately on arrival is recorded.
    pub fn enqueue(
        &self,
        id: DrawingId,
        data: &[u8],
        already_shown: bool,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let created = now.timestamp_millis();
        let displayed = already_shown.then_some(created);
        let result = self.conn.execute(
            "INSERT INTO drawings (id, created_time, displayed_time, removed, data)
             VALUES (?1, ?2, ?3, 0, ?4)",
            params![id, created, displayed, data],
        );
        match result {
            Ok(_) => {
                debug!(id, already_shown, bytes = data.len(), "drawing stored");
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StoreError::DuplicateId(id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Oldest drawing that is neither removed nor shown yet.
    pub fn next_available(&self) -> Result<Option<Drawing>, StoreError> {
        let drawing = self
            .conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM drawings
                     WHERE displayed_time IS NULL AND removed = 0
                     ORDER BY created_time ASC, seq ASC LIMIT 1"
                ),
                [],
                Drawing::from_row,
            )
            .optional()?;
        Ok(drawing)
    }

    /// Whether [`next_available`](Self::next_available) would return a drawing.
    pub fn has_available(&self) -> Result<bool, StoreError> {
        let available: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM drawings WHERE displayed_time IS NULL AND removed = 0)",
            [],
            |row| row.get(0),
        )?;
        Ok(available)
    }

    /// Records the first time drawing `id` was shown.
    ///
    /// A drawing that already has a display time keeps it.
    pub fn mark_displayed(&self, id: DrawingId, when: DateTime<Utc>) -> Result<(), StoreError> {
        let updated = self.conn.execute(
            "UPDATE drawings SET displayed_time = ?2 WHERE id = ?1 AND displayed_time IS NULL",
            params![id, when.timestamp_millis()],
        )?;
        if updated == 0 && !self.exists(id)? {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    /// Soft-deletes drawing `id`.
    pub fn mark_removed(&self, id: DrawingId) -> Result<(), StoreError> {
        let updated = self
            .conn
            .execute("UPDATE drawings SET removed = 1 WHERE id = ?1", params![id])?;
        if updated == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    /// Drawing with the latest display time, removed or not.
    ///
    /// Removed rows count here because a drawing removed from the queue stays
    /// physically visible on the panel until something replaces it.
    pub fn most_recently_displayed(&self) -> Result<Option<Drawing>, StoreError> {
        let drawing = self
            .conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM drawings
                     WHERE displayed_time IS NOT NULL
                     ORDER BY displayed_time DESC, seq DESC LIMIT 1"
                ),
                [],
                Drawing::from_row,
            )
            .optional()?;
        Ok(drawing)
    }

    /// Looks up a drawing by id.
    pub fn get(&self, id: DrawingId) -> Result<Option<Drawing>, StoreError> {
        let drawing = self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM drawings WHERE id = ?1"),
                params![id],
                Drawing::from_row,
            )
            .optional()?;
        Ok(drawing)
    }

    /// Totals of queued, shown and removed drawings.
    pub fn counts(&self) -> Result<QueueCounts, StoreError> {
        let counts = self.conn.query_row(
            "SELECT
                COALESCE(SUM(removed = 0 AND displayed_time IS NULL), 0),
                COALESCE(SUM(displayed_time IS NOT NULL), 0),
                COALESCE(SUM(removed = 1), 0)
             FROM drawings",
            [],
            |row| {
                Ok(QueueCounts {
                    queued: row.get::<_, i64>(0)? as u64,
                    shown: row.get::<_, i64>(1)? as u64,
                    removed: row.get::<_, i64>(2)? as u64,
                })
            },
        )?;
        Ok(counts)
    }

    fn exists(&self, id: DrawingId) -> Result<bool, StoreError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM drawings WHERE id = ?1)",
            params![id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

#[cfg(test)]
impl DrawingStore {
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}
