//! Stored document layouts.
//!
//! These match the layout of the original tracker's exports so old data
//! files load as-is: per-category hour fields (`directHours`, ...), a
//! `hourType` discriminator, and camelCase detail fields flattened in.

use serde::{Deserialize, Serialize};

use practicum_model::{DateKey, EntryDetails, HourCategory, HourLogEntry};

/// One entry document. Exactly one of the three hour fields is written,
/// the one named by `hour_type`; the others stay absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDocV1 {
    pub date: DateKey,
    pub hour_type: HourCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indirect_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supervision_hours: Option<f64>,
    #[serde(flatten)]
    pub details: EntryDetails,
}

impl EntryDocV1 {
    pub fn from_entry(entry: &HourLogEntry) -> Self {
        let mut doc = EntryDocV1 {
            date: entry.date,
            hour_type: entry.category,
            direct_hours: None,
            indirect_hours: None,
            supervision_hours: None,
            details: entry.details.clone(),
        };
        match entry.category {
            HourCategory::Direct => doc.direct_hours = Some(entry.hours),
            HourCategory::Indirect => doc.indirect_hours = Some(entry.hours),
            HourCategory::Supervision => doc.supervision_hours = Some(entry.hours),
        }
        doc
    }

    /// Hours under the field `hour_type` names. A document missing its own
    /// hours field reads as zero, matching how the original data behaved.
    pub fn hours(&self) -> f64 {
        let field = match self.hour_type {
            HourCategory::Direct => self.direct_hours,
            HourCategory::Indirect => self.indirect_hours,
            HourCategory::Supervision => self.supervision_hours,
        };
        field.unwrap_or(0.0)
    }

    pub fn into_entry(self) -> HourLogEntry {
        let hours = self.hours();
        HourLogEntry {
            date: self.date,
            category: self.hour_type,
            hours,
            details: self.details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn key(s: &str) -> DateKey {
        s.parse().unwrap()
    }

    #[test]
    fn test_doc_writes_only_its_own_hours_field() {
        let entry = HourLogEntry::new(key("2024-04-01"), HourCategory::Supervision, 1.5);
        let doc = EntryDocV1::from_entry(&entry);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "date": "2024-04-01",
                "hourType": "supervision",
                "supervisionHours": 1.5,
            })
        );
    }

    #[test]
    fn test_doc_roundtrip_with_details() {
        let mut entry = HourLogEntry::new(key("2024-04-01"), HourCategory::Direct, 3.0);
        entry.details.modality = Some("Telehealth".into());
        entry.details.client_concerns = Some("anxiety".into());

        let doc = EntryDocV1::from_entry(&entry);
        let json = serde_json::to_string(&doc).unwrap();
        let back: EntryDocV1 = serde_json::from_str(&json).unwrap();
        assert_eq!(back.into_entry(), entry);
    }

    #[test]
    fn test_legacy_document_parses() {
        // Shape produced by the original web tracker, legacy date form
        // included.
        let json = serde_json::json!({
            "date": "Mon Apr 01 2024",
            "hourType": "direct",
            "directHours": 4.0,
            "modality": "In-person",
            "population": "Adults",
        });
        let doc: EntryDocV1 = serde_json::from_value(json).unwrap();
        assert_eq!(doc.date, key("2024-04-01"));
        let entry = doc.into_entry();
        assert_eq!(entry.category, HourCategory::Direct);
        assert_relative_eq!(entry.hours, 4.0);
        assert_eq!(entry.details.population.as_deref(), Some("Adults"));
    }

    #[test]
    fn test_missing_hours_field_reads_zero() {
        let json = serde_json::json!({
            "date": "2024-04-01",
            "hourType": "indirect",
        });
        let doc: EntryDocV1 = serde_json::from_value(json).unwrap();
        assert_relative_eq!(doc.hours(), 0.0);
    }
}
