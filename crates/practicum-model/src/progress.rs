//! Licensure requirement targets and remaining-hours math.

use serde::{Deserialize, Serialize};

use crate::category::HourCategory;
use crate::totals::AggregateTotals;

/// Required hours per category for licensure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LicenseRequirements {
    pub direct: f64,
    pub indirect: f64,
    pub supervision: f64,
}

impl Default for LicenseRequirements {
    fn default() -> Self {
        LicenseRequirements {
            direct: 3000.0,
            indirect: 500.0,
            supervision: 100.0,
        }
    }
}

impl LicenseRequirements {
    pub fn get(&self, category: HourCategory) -> f64 {
        match category {
            HourCategory::Direct => self.direct,
            HourCategory::Indirect => self.indirect,
            HourCategory::Supervision => self.supervision,
        }
    }
}

/// Logged totals next to how many hours each category still needs.
/// Remaining values are clamped at zero once a target is met.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LicenseProgress {
    pub logged: AggregateTotals,
    pub remaining_direct: f64,
    pub remaining_indirect: f64,
    pub remaining_supervision: f64,
}

impl LicenseProgress {
    pub fn compute(requirements: LicenseRequirements, totals: &AggregateTotals) -> Self {
        let remaining =
            |cat: HourCategory| (requirements.get(cat) - totals.get(cat)).max(0.0);
        LicenseProgress {
            logged: *totals,
            remaining_direct: remaining(HourCategory::Direct),
            remaining_indirect: remaining(HourCategory::Indirect),
            remaining_supervision: remaining(HourCategory::Supervision),
        }
    }

    pub fn remaining(&self, category: HourCategory) -> f64 {
        match category {
            HourCategory::Direct => self.remaining_direct,
            HourCategory::Indirect => self.remaining_indirect,
            HourCategory::Supervision => self.remaining_supervision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_targets() {
        let req = LicenseRequirements::default();
        assert_relative_eq!(req.direct, 3000.0);
        assert_relative_eq!(req.indirect, 500.0);
        assert_relative_eq!(req.supervision, 100.0);
    }

    #[test]
    fn test_remaining_counts_down() {
        let mut totals = AggregateTotals::default();
        totals.set(HourCategory::Direct, 1200.0);
        let progress = LicenseProgress::compute(LicenseRequirements::default(), &totals);
        assert_relative_eq!(progress.remaining_direct, 1800.0);
        assert_relative_eq!(progress.remaining_indirect, 500.0);
    }

    #[test]
    fn test_remaining_clamps_at_zero() {
        let mut totals = AggregateTotals::default();
        totals.set(HourCategory::Supervision, 150.0);
        let progress = LicenseProgress::compute(LicenseRequirements::default(), &totals);
        assert_relative_eq!(progress.remaining_supervision, 0.0);
        // The overshoot stays visible in the logged side.
        assert_relative_eq!(progress.logged.total_supervision_hours, 150.0);
    }
}
