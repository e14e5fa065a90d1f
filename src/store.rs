use crate::error::{MonitorError, MonitorResult};
use crate::models::StoredListing;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use tracing::debug;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS listings (
    id TEXT PRIMARY KEY,
    title TEXT,
    start_date TEXT,
    link TEXT
)";

/// Listings seen so far, keyed by listing id.
///
/// Open one per run and drop it when the run's changes are recorded.
pub struct ListingStore {
    conn: Connection,
}

impl ListingStore {
    /// Opens the store at `path`, creating the schema if it is missing.
    pub fn open(path: &Path) -> MonitorResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        debug!("Opened listing store at {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> MonitorResult<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> MonitorResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn has(&self, id: &str) -> MonitorResult<bool> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM listings WHERE id = ?1", params![id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    /// Inserts a new row; an existing id yields `DuplicateKey`.
    pub fn insert(&self, listing: &StoredListing) -> MonitorResult<()> {
        let result = self.conn.execute(
            "INSERT INTO listings (id, title, start_date, link) VALUES (?1, ?2, ?3, ?4)",
            params![listing.id, listing.title, listing.start_date, listing.link],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(MonitorError::DuplicateKey(listing.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn get(&self, id: &str) -> MonitorResult<Option<StoredListing>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, title, start_date, link FROM listings WHERE id = ?1",
                params![id],
                |row| {
                    Ok(StoredListing {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        start_date: row.get(2)?,
                        link: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn count(&self) -> MonitorResult<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

/// Creates the schema at `path` without touching existing rows.
pub fn ensure_schema(path: &Path) -> MonitorResult<()> {
    ListingStore::open(path).map(|_| ())
}
