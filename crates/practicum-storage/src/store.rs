//! The storage contract shared by every backend.
//!
//! Backends store two document kinds per user: one entry per
//! (date, category) and one running-totals row. Writes arrive as a
//! `WriteBatch` that must land atomically, so an entry can never be
//! recorded without its totals adjustment (or vice versa).

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

use practicum_model::{
    AggregateTotals, DateKey, DayEntries, EntryPatch, HourCategory, HourLogEntry, UserId,
};

/// Error raised by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt document at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("store at {path} has unsupported version `{version}`")]
    UnsupportedVersion { path: PathBuf, version: String },
}

// ============================================================================
// Write Batches
// ============================================================================

/// One mutation inside a batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Merge-write one entry slot: hours always land, `Some` detail
    /// fields overwrite, `None` fields keep their stored value.
    UpsertEntry {
        user: UserId,
        date: DateKey,
        category: HourCategory,
        patch: EntryPatch,
    },
    /// Create the totals row for a user's first-ever submission.
    CreateTotals {
        user: UserId,
        totals: AggregateTotals,
    },
    /// Adjust one category's running sum by a signed delta.
    IncrementTotals {
        user: UserId,
        category: HourCategory,
        delta: f64,
    },
    /// Replace the totals row outright. Used by repair.
    PutTotals {
        user: UserId,
        totals: AggregateTotals,
    },
}

/// An ordered group of writes that is applied all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        WriteBatch::default()
    }

    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

// ============================================================================
// Storage Contract
// ============================================================================

/// Read and write access to the hour documents of any number of users.
///
/// `apply` is the only write path and must be atomic: either every op in
/// the batch is visible afterwards, or none is.
pub trait HourStore: Send + Sync {
    /// The entry stored at (user, date, category), if any.
    fn entry(
        &self,
        user: &UserId,
        date: DateKey,
        category: HourCategory,
    ) -> Result<Option<HourLogEntry>, StoreError>;

    /// All entries stored for one date. Unlogged categories stay `None`.
    fn entries_for_date(&self, user: &UserId, date: DateKey) -> Result<DayEntries, StoreError>;

    /// The running-totals row. `None` means the user has never submitted,
    /// which is distinct from a row of zeros.
    fn totals(&self, user: &UserId) -> Result<Option<AggregateTotals>, StoreError>;

    /// Every date the user has at least one entry for, ascending.
    fn dates_for_user(&self, user: &UserId) -> Result<Vec<DateKey>, StoreError>;

    /// Every user with a totals row or at least one entry, ascending.
    fn users(&self) -> Result<Vec<UserId>, StoreError>;

    /// Apply a batch atomically.
    fn apply(&self, batch: WriteBatch) -> Result<(), StoreError>;
}

// ============================================================================
// Shared In-Memory State
// ============================================================================

/// The materialized documents a backend serves reads from. `MemoryStore`
/// holds one of these directly; `FileStore` rebuilds one from disk on open
/// and keeps it in sync with the journal.
#[derive(Debug, Default)]
pub(crate) struct StoreState {
    days: BTreeMap<UserId, BTreeMap<DateKey, DayEntries>>,
    totals: BTreeMap<UserId, AggregateTotals>,
}

/// A batch resolved against a snapshot of the state: the absolute
/// post-write documents, with merges performed and deltas summed.
#[derive(Debug, Clone, Default)]
pub(crate) struct ResolvedWrites {
    pub entries: BTreeMap<(UserId, DateKey, HourCategory), HourLogEntry>,
    pub totals: BTreeMap<UserId, AggregateTotals>,
}

impl ResolvedWrites {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.totals.is_empty()
    }
}

impl StoreState {
    pub fn entry(
        &self,
        user: &UserId,
        date: DateKey,
        category: HourCategory,
    ) -> Option<&HourLogEntry> {
        self.days.get(user)?.get(&date)?.get(category)
    }

    pub fn day(&self, user: &UserId, date: DateKey) -> Option<&DayEntries> {
        self.days.get(user)?.get(&date)
    }

    pub fn totals(&self, user: &UserId) -> Option<AggregateTotals> {
        self.totals.get(user).copied()
    }

    pub fn dates(&self, user: &UserId) -> Vec<DateKey> {
        self.days
            .get(user)
            .map(|days| days.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Users with a totals row or at least one entry, ascending.
    pub fn users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.totals.keys().cloned().collect();
        for user in self.days.keys() {
            if !users.contains(user) {
                users.push(user.clone());
            }
        }
        users.sort();
        users
    }

    pub fn put_entry(&mut self, user: UserId, entry: HourLogEntry) {
        self.days
            .entry(user)
            .or_default()
            .entry(entry.date)
            .or_default()
            .set(entry);
    }

    pub fn put_totals(&mut self, user: UserId, totals: AggregateTotals) {
        self.totals.insert(user, totals);
    }

    /// Resolve a batch against this state into absolute documents. Ops are
    /// applied in order, each seeing the effect of the ones before it.
    /// An increment against a missing totals row starts from zeros.
    pub fn resolve(&self, batch: &WriteBatch) -> ResolvedWrites {
        let mut out = ResolvedWrites::default();
        for op in batch.ops() {
            match op {
                WriteOp::UpsertEntry {
                    user,
                    date,
                    category,
                    patch,
                } => {
                    let key = (user.clone(), *date, *category);
                    let existing = out
                        .entries
                        .get(&key)
                        .cloned()
                        .or_else(|| self.entry(user, *date, *category).cloned());
                    let entry = patch.apply_to(*date, *category, existing.as_ref());
                    out.entries.insert(key, entry);
                }
                WriteOp::CreateTotals { user, totals } => {
                    out.totals.insert(user.clone(), *totals);
                }
                WriteOp::IncrementTotals {
                    user,
                    category,
                    delta,
                } => {
                    let mut totals = out
                        .totals
                        .get(user)
                        .copied()
                        .or_else(|| self.totals(user))
                        .unwrap_or_default();
                    totals.apply_delta(*category, *delta);
                    out.totals.insert(user.clone(), totals);
                }
                WriteOp::PutTotals { user, totals } => {
                    out.totals.insert(user.clone(), *totals);
                }
            }
        }
        out
    }

    pub fn apply_resolved(&mut self, resolved: ResolvedWrites) {
        for ((user, _date, _category), entry) in resolved.entries {
            self.put_entry(user, entry);
        }
        for (user, totals) in resolved.totals {
            self.put_totals(user, totals);
        }
    }
}
