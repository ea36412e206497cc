//! Hour log entries and the merge-write patches applied to them.
//!
//! One entry exists per (user, date, category). Re-submitting the same key
//! merges: the new hours value always lands, and descriptive fields only
//! overwrite when the patch actually carries them.

use serde::{Deserialize, Serialize};

use crate::category::HourCategory;
use crate::datekey::DateKey;
use crate::user::UserId;

/// Descriptive fields attached to an entry. All optional; which ones a
/// submission carries depends on the category (indirect entries carry
/// none, supervision entries add supervisor and topics).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setting: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_concerns: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supervisor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics_discussed: Option<String>,
}

impl EntryDetails {
    pub fn is_empty(&self) -> bool {
        self.modality.is_none()
            && self.population.is_none()
            && self.setting.is_none()
            && self.diagnosis.is_none()
            && self.client_concerns.is_none()
            && self.supervisor_name.is_none()
            && self.topics_discussed.is_none()
    }

    /// Merge-write: `Some` fields from `patch` overwrite, `None` fields
    /// leave the stored value alone.
    pub fn merge_from(&mut self, patch: &EntryDetails) {
        if let Some(v) = &patch.modality {
            self.modality = Some(v.clone());
        }
        if let Some(v) = &patch.population {
            self.population = Some(v.clone());
        }
        if let Some(v) = &patch.setting {
            self.setting = Some(v.clone());
        }
        if let Some(v) = &patch.diagnosis {
            self.diagnosis = Some(v.clone());
        }
        if let Some(v) = &patch.client_concerns {
            self.client_concerns = Some(v.clone());
        }
        if let Some(v) = &patch.supervisor_name {
            self.supervisor_name = Some(v.clone());
        }
        if let Some(v) = &patch.topics_discussed {
            self.topics_discussed = Some(v.clone());
        }
    }
}

/// One stored hour record at (date, category). The owning user is implied
/// by where the entry is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourLogEntry {
    pub date: DateKey,
    pub category: HourCategory,
    pub hours: f64,
    #[serde(default)]
    pub details: EntryDetails,
}

impl HourLogEntry {
    pub fn new(date: DateKey, category: HourCategory, hours: f64) -> Self {
        HourLogEntry {
            date,
            category,
            hours,
            details: EntryDetails::default(),
        }
    }
}

/// A merge-write against one entry slot: `hours` always lands, details
/// merge field-by-field into whatever is already stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPatch {
    pub hours: f64,
    #[serde(default)]
    pub details: EntryDetails,
}

impl EntryPatch {
    pub fn hours_only(hours: f64) -> Self {
        EntryPatch {
            hours,
            details: EntryDetails::default(),
        }
    }

    /// Resolve this patch against the currently stored entry (if any) into
    /// the full post-write entry.
    pub fn apply_to(
        &self,
        date: DateKey,
        category: HourCategory,
        existing: Option<&HourLogEntry>,
    ) -> HourLogEntry {
        let mut details = existing.map(|e| e.details.clone()).unwrap_or_default();
        details.merge_from(&self.details);
        HourLogEntry {
            date,
            category,
            hours: self.hours,
            details,
        }
    }
}

/// Everything one submit action carries: the key being written plus the
/// new hours and whichever descriptive fields the form staged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourSubmission {
    pub user: UserId,
    pub date: DateKey,
    pub category: HourCategory,
    pub hours: f64,
    #[serde(default)]
    pub details: EntryDetails,
}

impl HourSubmission {
    pub fn new(user: UserId, date: DateKey, category: HourCategory, hours: f64) -> Self {
        HourSubmission {
            user,
            date,
            category,
            hours,
            details: EntryDetails::default(),
        }
    }

    pub fn with_details(mut self, details: EntryDetails) -> Self {
        self.details = details;
        self
    }

    pub fn patch(&self) -> EntryPatch {
        EntryPatch {
            hours: self.hours,
            details: self.details.clone(),
        }
    }
}

/// The entries stored for one (user, date). Slots for categories nothing
/// has been logged under stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayEntries {
    pub direct: Option<HourLogEntry>,
    pub indirect: Option<HourLogEntry>,
    pub supervision: Option<HourLogEntry>,
}

impl DayEntries {
    pub fn get(&self, category: HourCategory) -> Option<&HourLogEntry> {
        match category {
            HourCategory::Direct => self.direct.as_ref(),
            HourCategory::Indirect => self.indirect.as_ref(),
            HourCategory::Supervision => self.supervision.as_ref(),
        }
    }

    /// Place `entry` in the slot matching its own category.
    pub fn set(&mut self, entry: HourLogEntry) {
        match entry.category {
            HourCategory::Direct => self.direct = Some(entry),
            HourCategory::Indirect => self.indirect = Some(entry),
            HourCategory::Supervision => self.supervision = Some(entry),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.direct.is_none() && self.indirect.is_none() && self.supervision.is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HourLogEntry> {
        [&self.direct, &self.indirect, &self.supervision]
            .into_iter()
            .filter_map(|slot| slot.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> DateKey {
        s.parse().unwrap()
    }

    #[test]
    fn test_patch_on_absent_slot_creates_entry() {
        let patch = EntryPatch::hours_only(3.5);
        let entry = patch.apply_to(key("2024-04-01"), HourCategory::Direct, None);
        assert_eq!(entry.hours, 3.5);
        assert!(entry.details.is_empty());
    }

    #[test]
    fn test_patch_overwrites_hours_keeps_unspecified_details() {
        let mut first = HourLogEntry::new(key("2024-04-01"), HourCategory::Direct, 5.0);
        first.details.modality = Some("Telehealth".into());
        first.details.setting = Some("Hospital".into());

        let patch = EntryPatch {
            hours: 2.0,
            details: EntryDetails {
                modality: Some("In-person".into()),
                ..Default::default()
            },
        };
        let merged = patch.apply_to(key("2024-04-01"), HourCategory::Direct, Some(&first));

        assert_eq!(merged.hours, 2.0);
        assert_eq!(merged.details.modality.as_deref(), Some("In-person"));
        // Not in the patch, so the stored value survives.
        assert_eq!(merged.details.setting.as_deref(), Some("Hospital"));
    }

    #[test]
    fn test_details_merge_every_field() {
        let mut base = EntryDetails::default();
        let full = EntryDetails {
            modality: Some("Phone".into()),
            population: Some("Adults".into()),
            setting: Some("School".into()),
            diagnosis: Some("PTSD".into()),
            client_concerns: Some("sleep".into()),
            supervisor_name: Some("Dr. Lee".into()),
            topics_discussed: Some("case review".into()),
        };
        base.merge_from(&full);
        assert_eq!(base, full);
        // Merging an empty patch changes nothing.
        base.merge_from(&EntryDetails::default());
        assert_eq!(base, full);
    }

    #[test]
    fn test_details_serialize_skips_absent_fields() {
        let details = EntryDetails {
            supervisor_name: Some("Dr. Lee".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json, serde_json::json!({ "supervisorName": "Dr. Lee" }));
    }

    #[test]
    fn test_day_entries_slot_by_category() {
        let mut day = DayEntries::default();
        assert!(day.is_empty());
        day.set(HourLogEntry::new(key("2024-04-01"), HourCategory::Supervision, 1.0));
        assert!(day.get(HourCategory::Direct).is_none());
        assert_eq!(day.get(HourCategory::Supervision).unwrap().hours, 1.0);
        assert_eq!(day.iter().count(), 1);
    }

    #[test]
    fn test_submission_to_patch() {
        let user = UserId::new("alice").unwrap();
        let sub = HourSubmission::new(user, key("2024-04-01"), HourCategory::Indirect, 2.5);
        let patch = sub.patch();
        assert_eq!(patch.hours, 2.5);
        assert!(patch.details.is_empty());
    }
}
