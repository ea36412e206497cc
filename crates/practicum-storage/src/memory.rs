//! In-memory backend. No durability; used by tests and dry runs.

use parking_lot::RwLock;

use practicum_model::{AggregateTotals, DateKey, DayEntries, HourCategory, HourLogEntry, UserId};

use crate::store::{HourStore, StoreError, StoreState, WriteBatch};

/// `HourStore` over plain maps behind one lock. Batches resolve and land
/// under the write lock, so they are atomic by construction.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl HourStore for MemoryStore {
    fn entry(
        &self,
        user: &UserId,
        date: DateKey,
        category: HourCategory,
    ) -> Result<Option<HourLogEntry>, StoreError> {
        Ok(self.state.read().entry(user, date, category).cloned())
    }

    fn entries_for_date(&self, user: &UserId, date: DateKey) -> Result<DayEntries, StoreError> {
        Ok(self.state.read().day(user, date).cloned().unwrap_or_default())
    }

    fn totals(&self, user: &UserId) -> Result<Option<AggregateTotals>, StoreError> {
        Ok(self.state.read().totals(user))
    }

    fn dates_for_user(&self, user: &UserId) -> Result<Vec<DateKey>, StoreError> {
        Ok(self.state.read().dates(user))
    }

    fn users(&self) -> Result<Vec<UserId>, StoreError> {
        Ok(self.state.read().users())
    }

    fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let resolved = state.resolve(&batch);
        state.apply_resolved(resolved);
        Ok(())
    }
}
