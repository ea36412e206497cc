//! Delta arithmetic between a submitted hours value and what was stored.
//!
//! The running totals are adjusted by the *difference* against the prior
//! entry, so overwriting 5.0 with 2.0 subtracts 3.0 instead of adding 2.0.
//! "Never logged" is a distinct state from "logged zero hours": both yield
//! the same delta, but callers (receipts, totals-row creation) need to tell
//! them apart.

use crate::entry::HourLogEntry;

/// Hours previously stored at a (date, category) key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriorHours {
    /// No entry has ever been stored at the key.
    Absent,
    /// An entry exists with this hours value.
    Present(f64),
}

impl PriorHours {
    pub fn from_entry(entry: Option<&HourLogEntry>) -> Self {
        match entry {
            Some(e) => PriorHours::Present(e.hours),
            None => PriorHours::Absent,
        }
    }

    pub fn is_absent(self) -> bool {
        matches!(self, PriorHours::Absent)
    }

    /// The value the delta is computed against.
    pub fn hours_or_zero(self) -> f64 {
        match self {
            PriorHours::Absent => 0.0,
            PriorHours::Present(h) => h,
        }
    }
}

/// Signed adjustment to apply to the running total for the submitted
/// category. Positive when the new value is larger, negative when smaller,
/// zero on an identical re-submit.
pub fn delta(new_hours: f64, prior: PriorHours) -> f64 {
    match prior {
        PriorHours::Absent => new_hours,
        PriorHours::Present(previous) => new_hours - previous,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_first_submission_adds_full_amount() {
        assert_relative_eq!(delta(4.0, PriorHours::Absent), 4.0);
    }

    #[test]
    fn test_overwrite_larger_adds_difference() {
        assert_relative_eq!(delta(5.0, PriorHours::Present(3.0)), 2.0);
    }

    #[test]
    fn test_overwrite_smaller_subtracts_difference() {
        assert_relative_eq!(delta(2.0, PriorHours::Present(5.0)), -3.0);
    }

    #[test]
    fn test_identical_resubmit_is_zero() {
        assert_relative_eq!(delta(3.25, PriorHours::Present(3.25)), 0.0);
    }

    #[test]
    fn test_absent_differs_from_stored_zero() {
        // Same delta, different state: a totals row must be created for
        // the first but merely incremented for the second.
        assert!(PriorHours::Absent.is_absent());
        assert!(!PriorHours::Present(0.0).is_absent());
        assert_relative_eq!(delta(1.0, PriorHours::Absent), delta(1.0, PriorHours::Present(0.0)));
    }

    #[test]
    fn test_from_entry() {
        use crate::{DateKey, HourCategory};
        let entry = HourLogEntry::new(
            "2024-04-01".parse::<DateKey>().unwrap(),
            HourCategory::Direct,
            7.5,
        );
        assert_eq!(PriorHours::from_entry(Some(&entry)), PriorHours::Present(7.5));
        assert_eq!(PriorHours::from_entry(None), PriorHours::Absent);
    }
}
