//! # Ledger
//!
//! Durable record of delivered sequences per source.
//!
//! - [`SqliteLedger`]: file-backed store used by the relay binary
//! - [`MemoryLedger`]: in-process store for tests and dry runs

mod error;
mod memory;
mod sqlite;

pub use error::LedgerError;
pub use memory::MemoryLedger;
pub use sqlite::SqliteLedger;
