//! Per-user running totals, one sum per hour category.

use serde::{Deserialize, Serialize};

use crate::category::HourCategory;

/// The aggregate document kept per user. Field names match the stored
/// wire layout (`totalDirectHours`, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateTotals {
    #[serde(default)]
    pub total_direct_hours: f64,
    #[serde(default)]
    pub total_indirect_hours: f64,
    #[serde(default)]
    pub total_supervision_hours: f64,
}

impl AggregateTotals {
    /// Totals for a user's very first submission: zero everywhere except
    /// the submitted category.
    pub fn from_first(category: HourCategory, hours: f64) -> Self {
        let mut totals = AggregateTotals::default();
        totals.set(category, hours);
        totals
    }

    pub fn get(&self, category: HourCategory) -> f64 {
        match category {
            HourCategory::Direct => self.total_direct_hours,
            HourCategory::Indirect => self.total_indirect_hours,
            HourCategory::Supervision => self.total_supervision_hours,
        }
    }

    pub fn set(&mut self, category: HourCategory, hours: f64) {
        match category {
            HourCategory::Direct => self.total_direct_hours = hours,
            HourCategory::Indirect => self.total_indirect_hours = hours,
            HourCategory::Supervision => self.total_supervision_hours = hours,
        }
    }

    /// Adjust one category's sum in place. Deltas may be negative.
    pub fn apply_delta(&mut self, category: HourCategory, delta: f64) {
        let current = self.get(category);
        self.set(category, current + delta);
    }
}
