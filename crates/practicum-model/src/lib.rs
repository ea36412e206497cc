//! Domain model for the practicum hour tracker.
//!
//! This crate holds the pure types shared by the storage backends and the
//! CLI: hour categories, date keys, per-date log entries, per-user running
//! totals, and the delta arithmetic that keeps the two consistent. No I/O
//! lives here.

pub mod category;
pub mod datekey;
pub mod entry;
pub mod progress;
pub mod reconcile;
pub mod session;
pub mod totals;
pub mod user;
pub mod vocab;

pub use category::{CategoryParseError, HourCategory};
pub use datekey::{DateKey, DateKeyParseError};
pub use entry::{DayEntries, EntryDetails, EntryPatch, HourLogEntry, HourSubmission};
pub use progress::{LicenseProgress, LicenseRequirements};
pub use reconcile::{delta, PriorHours};
pub use session::{parse_hours_or_zero, DraftForm, FormError, FormField, SessionState};
pub use totals::AggregateTotals;
pub use user::{UserId, UserIdError};
