//! The reconciliation engine over any `HourStore`.
//!
//! `submit` is the whole write path of the tracker: look up the prior
//! entry at (user, date, category), compute the delta between the new and
//! prior hours, then apply one atomic batch that merge-writes the entry
//! and adjusts (or creates) the running totals. As long as every write
//! goes through here, a user's totals row always equals the sum of their
//! latest per-date entries.

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};

use practicum_model::{
    delta, AggregateTotals, DateKey, DayEntries, HourCategory, HourLogEntry, HourSubmission,
    LicenseProgress, LicenseRequirements, PriorHours, UserId,
};

use crate::store::{HourStore, StoreError, WriteBatch, WriteOp};

/// Stored and recomputed totals considered equal within this bound.
const DRIFT_EPSILON: f64 = 1e-9;

/// Error from the reconciliation pipeline. A failed lookup happens before
/// any write is attempted; a failed write aborts the whole batch, so the
/// entry and the totals never move separately.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("hours must not be negative (got {0})")]
    NegativeHours(f64),
    #[error("reading prior state failed")]
    Lookup(#[source] StoreError),
    #[error("applying the write batch failed")]
    Write(#[source] StoreError),
}

/// Tunables for the engine.
#[derive(Debug, Clone, Default)]
pub struct LedgerConfig {
    pub requirements: LicenseRequirements,
    /// Refuse negative hour submissions instead of warning. Off by
    /// default: the original tracker accepted them, and the delta math
    /// stays consistent either way.
    pub reject_negative_hours: bool,
}

/// What one submit did, for receipts and logging.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitReceipt {
    pub user: UserId,
    pub date: DateKey,
    pub category: HourCategory,
    pub prior: PriorHours,
    pub new_hours: f64,
    /// Signed adjustment applied to the running total.
    pub delta: f64,
    /// True when this was the user's first-ever submission and the
    /// totals row was created rather than incremented.
    pub created_totals: bool,
    /// Running totals after this submission landed.
    pub totals: AggregateTotals,
}

/// Stored totals compared against totals recomputed from the entries.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditReport {
    pub user: UserId,
    pub stored: AggregateTotals,
    pub recomputed: AggregateTotals,
    pub repaired: bool,
}

impl AuditReport {
    /// stored minus recomputed for one category.
    pub fn drift(&self, category: HourCategory) -> f64 {
        self.stored.get(category) - self.recomputed.get(category)
    }

    pub fn is_clean(&self) -> bool {
        HourCategory::ALL
            .iter()
            .all(|cat| self.drift(*cat).abs() <= DRIFT_EPSILON)
    }
}

/// The engine. Stateless besides its config; all data lives in the store.
#[derive(Debug)]
pub struct HourLedger<S: HourStore> {
    store: S,
    config: LedgerConfig,
    // Serializes read-reconcile-write cycles; concurrent submitters must
    // not interleave between reading prior state and applying the batch.
    write_lock: Mutex<()>,
}

impl<S: HourStore> HourLedger<S> {
    pub fn new(store: S) -> Self {
        HourLedger::with_config(store, LedgerConfig::default())
    }

    pub fn with_config(store: S, config: LedgerConfig) -> Self {
        HourLedger {
            store,
            config,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // ========================================================================
    // Submit
    // ========================================================================

    /// Record a submission: merge-write the entry and reconcile the
    /// running totals in one atomic batch.
    pub fn submit(&self, submission: &HourSubmission) -> Result<SubmitReceipt, LedgerError> {
        let HourSubmission {
            user,
            date,
            category,
            hours,
            ..
        } = submission;

        if *hours < 0.0 {
            if self.config.reject_negative_hours {
                return Err(LedgerError::NegativeHours(*hours));
            }
            warn!(user = %user, date = %date, hours, "negative hours submitted");
        }

        let _guard = self.write_lock.lock();

        let prior = PriorHours::from_entry(
            self.store
                .entry(user, *date, *category)
                .map_err(LedgerError::Lookup)?
                .as_ref(),
        );
        let delta = delta(*hours, prior);
        let prior_totals = self.store.totals(user).map_err(LedgerError::Lookup)?;
        let had_totals = prior_totals.is_some();

        let mut batch = WriteBatch::new();
        batch.push(WriteOp::UpsertEntry {
            user: user.clone(),
            date: *date,
            category: *category,
            patch: submission.patch(),
        });
        if had_totals {
            batch.push(WriteOp::IncrementTotals {
                user: user.clone(),
                category: *category,
                delta,
            });
        } else {
            batch.push(WriteOp::CreateTotals {
                user: user.clone(),
                totals: AggregateTotals::from_first(*category, delta),
            });
        }
        self.store.apply(batch).map_err(LedgerError::Write)?;

        let mut totals = prior_totals.unwrap_or_default();
        totals.apply_delta(*category, delta);

        debug!(
            user = %user,
            date = %date,
            category = %category,
            prior = prior.hours_or_zero(),
            new = hours,
            delta,
            "submission reconciled"
        );

        Ok(SubmitReceipt {
            user: user.clone(),
            date: *date,
            category: *category,
            prior,
            new_hours: *hours,
            delta,
            created_totals: !had_totals,
            totals,
        })
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn entry(
        &self,
        user: &UserId,
        date: DateKey,
        category: HourCategory,
    ) -> Result<Option<HourLogEntry>, LedgerError> {
        self.store
            .entry(user, date, category)
            .map_err(LedgerError::Lookup)
    }

    pub fn entries_for_date(
        &self,
        user: &UserId,
        date: DateKey,
    ) -> Result<DayEntries, LedgerError> {
        self.store
            .entries_for_date(user, date)
            .map_err(LedgerError::Lookup)
    }

    /// Running totals for display. A user with no totals row reads as
    /// all zeros.
    pub fn totals(&self, user: &UserId) -> Result<AggregateTotals, LedgerError> {
        Ok(self
            .store
            .totals(user)
            .map_err(LedgerError::Lookup)?
            .unwrap_or_default())
    }

    pub fn progress(&self, user: &UserId) -> Result<LicenseProgress, LedgerError> {
        let totals = self.totals(user)?;
        Ok(LicenseProgress::compute(self.config.requirements, &totals))
    }

    pub fn dates_for_user(&self, user: &UserId) -> Result<Vec<DateKey>, LedgerError> {
        self.store.dates_for_user(user).map_err(LedgerError::Lookup)
    }

    pub fn users(&self) -> Result<Vec<UserId>, LedgerError> {
        self.store.users().map_err(LedgerError::Lookup)
    }

    // ========================================================================
    // Audit
    // ========================================================================

    /// Recompute a user's totals from their entries and compare with the
    /// stored row. Read-only; drift is reported and logged, not fixed.
    pub fn audit_user(&self, user: &UserId) -> Result<AuditReport, LedgerError> {
        let mut recomputed = AggregateTotals::default();
        for date in self
            .store
            .dates_for_user(user)
            .map_err(LedgerError::Lookup)?
        {
            for entry in self
                .store
                .entries_for_date(user, date)
                .map_err(LedgerError::Lookup)?
                .iter()
            {
                recomputed.apply_delta(entry.category, entry.hours);
            }
        }
        let stored = self
            .store
            .totals(user)
            .map_err(LedgerError::Lookup)?
            .unwrap_or_default();
        let report = AuditReport {
            user: user.clone(),
            stored,
            recomputed,
            repaired: false,
        };
        if !report.is_clean() {
            warn!(
                user = %user,
                direct_drift = report.drift(HourCategory::Direct),
                indirect_drift = report.drift(HourCategory::Indirect),
                supervision_drift = report.drift(HourCategory::Supervision),
                "stored totals drifted from entries"
            );
        }
        Ok(report)
    }

    /// Audit and, when drift is found, overwrite the stored totals with
    /// the recomputed ones.
    pub fn repair_user(&self, user: &UserId) -> Result<AuditReport, LedgerError> {
        let _guard = self.write_lock.lock();

        let mut report = self.audit_user(user)?;
        if report.is_clean() {
            return Ok(report);
        }
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::PutTotals {
            user: user.clone(),
            totals: report.recomputed,
        });
        self.store.apply(batch).map_err(LedgerError::Write)?;
        report.repaired = true;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use approx::assert_relative_eq;
    use practicum_model::EntryDetails;

    fn user() -> UserId {
        UserId::new("alice").unwrap()
    }

    fn key(s: &str) -> DateKey {
        s.parse().unwrap()
    }

    fn submission(date: &str, category: HourCategory, hours: f64) -> HourSubmission {
        HourSubmission::new(user(), key(date), category, hours)
    }

    #[test]
    fn test_first_submission_creates_totals() {
        let ledger = HourLedger::new(MemoryStore::new());
        let receipt = ledger
            .submit(&submission("2024-04-01", HourCategory::Direct, 4.0))
            .unwrap();

        assert!(receipt.created_totals);
        assert_eq!(receipt.prior, PriorHours::Absent);
        assert_relative_eq!(receipt.delta, 4.0);
        assert_relative_eq!(receipt.totals.total_direct_hours, 4.0);
        assert_relative_eq!(ledger.totals(&user()).unwrap().total_direct_hours, 4.0);
    }

    #[test]
    fn test_resubmit_reconciles_by_delta() {
        let ledger = HourLedger::new(MemoryStore::new());
        ledger
            .submit(&submission("2024-04-01", HourCategory::Direct, 5.0))
            .unwrap();
        let receipt = ledger
            .submit(&submission("2024-04-01", HourCategory::Direct, 2.0))
            .unwrap();

        assert!(!receipt.created_totals);
        assert_eq!(receipt.prior, PriorHours::Present(5.0));
        assert_relative_eq!(receipt.delta, -3.0);
        // Total reflects the latest value, not the sum of submissions.
        assert_relative_eq!(receipt.totals.total_direct_hours, 2.0);
        assert_relative_eq!(ledger.totals(&user()).unwrap().total_direct_hours, 2.0);
    }

    #[test]
    fn test_categories_reconcile_independently() {
        let ledger = HourLedger::new(MemoryStore::new());
        ledger
            .submit(&submission("2024-04-01", HourCategory::Direct, 5.0))
            .unwrap();
        ledger
            .submit(&submission("2024-04-01", HourCategory::Supervision, 1.0))
            .unwrap();
        ledger
            .submit(&submission("2024-04-01", HourCategory::Direct, 3.0))
            .unwrap();

        let totals = ledger.totals(&user()).unwrap();
        assert_relative_eq!(totals.total_direct_hours, 3.0);
        assert_relative_eq!(totals.total_supervision_hours, 1.0);
        assert_relative_eq!(totals.total_indirect_hours, 0.0);
    }

    #[test]
    fn test_resubmitting_identical_hours_moves_nothing() {
        let ledger = HourLedger::new(MemoryStore::new());
        ledger
            .submit(&submission("2024-04-01", HourCategory::Direct, 4.0))
            .unwrap();
        let receipt = ledger
            .submit(&submission("2024-04-01", HourCategory::Direct, 4.0))
            .unwrap();

        assert_relative_eq!(receipt.delta, 0.0);
        assert_relative_eq!(ledger.totals(&user()).unwrap().total_direct_hours, 4.0);
    }

    #[test]
    fn test_same_category_across_dates_accumulates() {
        let ledger = HourLedger::new(MemoryStore::new());
        ledger
            .submit(&submission("2024-04-01", HourCategory::Indirect, 2.0))
            .unwrap();
        ledger
            .submit(&submission("2024-04-02", HourCategory::Indirect, 3.0))
            .unwrap();
        assert_relative_eq!(ledger.totals(&user()).unwrap().total_indirect_hours, 5.0);

        // Each date still reads back only its own entry.
        let first = ledger
            .entry(&user(), key("2024-04-01"), HourCategory::Indirect)
            .unwrap()
            .unwrap();
        assert_relative_eq!(first.hours, 2.0);
    }

    #[test]
    fn test_zero_hours_entry_still_creates_totals_row() {
        let ledger = HourLedger::new(MemoryStore::new());
        let receipt = ledger
            .submit(&submission("2024-04-01", HourCategory::Direct, 0.0))
            .unwrap();
        assert!(receipt.created_totals);
        // The row exists even though every sum is zero.
        assert!(ledger.store().totals(&user()).unwrap().is_some());
    }

    #[test]
    fn test_details_merge_on_resubmit() {
        let ledger = HourLedger::new(MemoryStore::new());
        let first = submission("2024-04-01", HourCategory::Direct, 5.0).with_details(
            EntryDetails {
                modality: Some("Telehealth".into()),
                setting: Some("Hospital".into()),
                ..Default::default()
            },
        );
        ledger.submit(&first).unwrap();

        let second = submission("2024-04-01", HourCategory::Direct, 2.0).with_details(
            EntryDetails {
                modality: Some("In-person".into()),
                ..Default::default()
            },
        );
        ledger.submit(&second).unwrap();

        let entry = ledger
            .entry(&user(), key("2024-04-01"), HourCategory::Direct)
            .unwrap()
            .unwrap();
        assert_eq!(entry.details.modality.as_deref(), Some("In-person"));
        assert_eq!(entry.details.setting.as_deref(), Some("Hospital"));
    }

    #[test]
    fn test_negative_hours_warn_by_default_reject_by_config() {
        let ledger = HourLedger::new(MemoryStore::new());
        let receipt = ledger
            .submit(&submission("2024-04-01", HourCategory::Direct, -2.0))
            .unwrap();
        assert_relative_eq!(receipt.delta, -2.0);

        let strict = HourLedger::with_config(
            MemoryStore::new(),
            LedgerConfig {
                reject_negative_hours: true,
                ..Default::default()
            },
        );
        let err = strict
            .submit(&submission("2024-04-01", HourCategory::Direct, -2.0))
            .unwrap_err();
        assert!(matches!(err, LedgerError::NegativeHours(_)));
    }

    #[test]
    fn test_progress_clamps_at_zero() {
        let ledger = HourLedger::new(MemoryStore::new());
        ledger
            .submit(&submission("2024-04-01", HourCategory::Supervision, 150.0))
            .unwrap();
        let progress = ledger.progress(&user()).unwrap();
        assert_relative_eq!(progress.remaining_supervision, 0.0);
        assert_relative_eq!(progress.remaining_direct, 3000.0);
    }

    #[test]
    fn test_audit_clean_after_normal_use() {
        let ledger = HourLedger::new(MemoryStore::new());
        ledger
            .submit(&submission("2024-04-01", HourCategory::Direct, 5.0))
            .unwrap();
        ledger
            .submit(&submission("2024-04-01", HourCategory::Direct, 2.0))
            .unwrap();
        ledger
            .submit(&submission("2024-04-02", HourCategory::Supervision, 1.0))
            .unwrap();

        let report = ledger.audit_user(&user()).unwrap();
        assert!(report.is_clean(), "drift: {:?}", report);
    }

    #[test]
    fn test_repair_fixes_drifted_totals() {
        let store = MemoryStore::new();
        // Sneak a drifted totals row in behind the engine's back.
        let mut batch = WriteBatch::new();
        batch.push(WriteOp::UpsertEntry {
            user: user(),
            date: key("2024-04-01"),
            category: HourCategory::Direct,
            patch: practicum_model::EntryPatch::hours_only(5.0),
        });
        batch.push(WriteOp::CreateTotals {
            user: user(),
            totals: AggregateTotals::from_first(HourCategory::Direct, 99.0),
        });
        store.apply(batch).unwrap();

        let ledger = HourLedger::new(store);
        let report = ledger.repair_user(&user()).unwrap();
        assert!(report.repaired);
        assert_relative_eq!(report.drift(HourCategory::Direct), 94.0);
        assert_relative_eq!(ledger.totals(&user()).unwrap().total_direct_hours, 5.0);

        let after = ledger.audit_user(&user()).unwrap();
        assert!(after.is_clean());
    }
}
