//! The three kinds of practicum hours a clinician accrues.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of a logged hour block. Every stored entry and every running
/// total is keyed by exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HourCategory {
    /// Face-to-face clinical work with clients.
    Direct,
    /// Documentation, case prep, and other non-client work.
    Indirect,
    /// Time spent under supervision.
    Supervision,
}

impl HourCategory {
    /// All categories, in display order.
    pub const ALL: [HourCategory; 3] = [
        HourCategory::Direct,
        HourCategory::Indirect,
        HourCategory::Supervision,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HourCategory::Direct => "direct",
            HourCategory::Indirect => "indirect",
            HourCategory::Supervision => "supervision",
        }
    }

    /// Field name carrying this category's hours in a stored entry
    /// document (`directHours`, `indirectHours`, `supervisionHours`).
    pub fn hours_field(&self) -> &'static str {
        match self {
            HourCategory::Direct => "directHours",
            HourCategory::Indirect => "indirectHours",
            HourCategory::Supervision => "supervisionHours",
        }
    }

    /// Human-facing label used by the CLI.
    pub fn label(&self) -> &'static str {
        match self {
            HourCategory::Direct => "Direct Hours",
            HourCategory::Indirect => "Indirect Hours",
            HourCategory::Supervision => "Supervision Hours",
        }
    }
}

impl fmt::Display for HourCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing an hour category from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown hour category `{0}` (expected direct, indirect, or supervision)")]
pub struct CategoryParseError(pub String);

impl FromStr for HourCategory {
    type Err = CategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(HourCategory::Direct),
            "indirect" => Ok(HourCategory::Indirect),
            "supervision" => Ok(HourCategory::Supervision),
            _ => Err(CategoryParseError(s.to_string())),
        }
    }
}
