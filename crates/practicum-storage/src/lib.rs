//! Storage and reconciliation for the practicum hour tracker.
//!
//! Two backends implement the same [`HourStore`] contract:
//!
//! ```text
//!  submit ──► HourLedger ──► WriteBatch ──► MemoryStore   (tests, dry runs)
//!                │                     └──► FileStore     (journal + snapshots)
//!                └── prior lookup / delta
//! ```
//!
//! [`HourLedger`] owns the write path: it looks up the prior entry,
//! computes the delta against the new hours, and applies one atomic batch
//! that merge-writes the entry and adjusts the per-user running totals.
//! Reads, licensure progress, and the audit/repair pass live there too.

pub mod docs;
pub mod file;
pub mod ledger;
pub mod memory;
pub mod store;


pub use docs::EntryDocV1;
pub use file::{FileStore, FileStoreConfig, JournalRecordV1, JournalWriteV1};
pub use ledger::{AuditReport, HourLedger, LedgerConfig, LedgerError, SubmitReceipt};
pub use memory::MemoryStore;
pub use store::{HourStore, StoreError, WriteBatch, WriteOp};

/// Open a durable ledger under `dir` with default settings.
pub fn open_ledger(
    dir: impl Into<std::path::PathBuf>,
) -> Result<HourLedger<FileStore>, StoreError> {
    Ok(HourLedger::new(FileStore::open_dir(dir)?))
}
