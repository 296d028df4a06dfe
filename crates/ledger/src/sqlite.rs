//! SQLite-backed ledger

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::{ContractError, Ledger, SourceId};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::LedgerError;

/// Ledger stored in a single SQLite table.
///
/// One connection behind a mutex serializes writers from every source.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    /// Open (or create) the ledger at `path`; `:memory:` opens a private in-memory database.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let conn = if path.as_os_str() == ":memory:" {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let conn = Connection::open(path)?;
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
            conn
        };

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS delivered (
                source_id     TEXT    NOT NULL,
                sequence      INTEGER NOT NULL,
                delivered_at  TEXT    NOT NULL,
                PRIMARY KEY (source_id, sequence)
            );
            "#,
        )?;

        info!(path = %path.display(), "Ledger opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn max_sequence(&self, source: &str) -> Result<Option<u64>, LedgerError> {
        let max: Option<i64> = self
            .conn()
            .query_row(
                "SELECT MAX(sequence) FROM delivered WHERE source_id = ?1",
                params![source],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(max.map(|v| v as u64))
    }

    /// Insert a row; returns `false` if it already existed.
    pub fn insert(&self, source: &str, sequence: u64) -> Result<bool, LedgerError> {
        let seq = i64::try_from(sequence).map_err(|_| LedgerError::SequenceOutOfRange(sequence))?;
        let changed = self.conn().execute(
            "INSERT INTO delivered (source_id, sequence, delivered_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(source_id, sequence) DO NOTHING",
            params![source, seq, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(changed > 0)
    }

    /// Number of delivered rows for a source
    pub fn count(&self, source: &str) -> Result<u64, LedgerError> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM delivered WHERE source_id = ?1",
            params![source],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

impl Ledger for SqliteLedger {
    fn max_delivered(&self, source: &SourceId) -> Result<Option<u64>, ContractError> {
        Ok(self.max_sequence(source.as_str())?)
    }

    fn mark_delivered(&self, source: &SourceId, sequence: u64) -> Result<(), ContractError> {
        let inserted = self.insert(source.as_str(), sequence)?;
        debug!(source = %source, sequence, inserted, "Ledger mark");
        Ok(())
    }
}
