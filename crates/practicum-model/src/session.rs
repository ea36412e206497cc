//! Explicit form/session state for staging a submission.
//!
//! The original tracker kept this state implicitly in UI scope; here it is
//! a plain value the caller drives: select a date (with the entries fetched
//! for it), choose a category, stage field edits, then build the
//! `HourSubmission` to hand to the ledger.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::category::HourCategory;
use crate::datekey::DateKey;
use crate::entry::{DayEntries, EntryDetails, HourLogEntry, HourSubmission};
use crate::user::UserId;
use crate::vocab;

/// Parse an hours input the way the form does: trimmed, and anything that
/// is not a finite number (including empty input) reads as zero.
pub fn parse_hours_or_zero(input: &str) -> f64 {
    match input.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// A field of the entry form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Hours,
    Modality,
    Population,
    Setting,
    Diagnosis,
    ClientConcerns,
    SupervisorName,
    TopicsDiscussed,
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FormField::Hours => "hours",
            FormField::Modality => "modality",
            FormField::Population => "population",
            FormField::Setting => "setting",
            FormField::Diagnosis => "diagnosis",
            FormField::ClientConcerns => "client concerns",
            FormField::SupervisorName => "supervisor name",
            FormField::TopicsDiscussed => "topics discussed",
        };
        f.write_str(name)
    }
}

/// Raw staged form text. Everything is a string until submit, exactly as
/// typed; empty means "not provided" and will not overwrite stored values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftForm {
    pub hours: String,
    pub modality: String,
    pub population: String,
    pub setting: String,
    pub diagnosis: String,
    pub client_concerns: String,
    pub supervisor_name: String,
    pub topics_discussed: String,
}

impl DraftForm {
    fn set(&mut self, field: FormField, value: String) {
        match field {
            FormField::Hours => self.hours = value,
            FormField::Modality => self.modality = value,
            FormField::Population => self.population = value,
            FormField::Setting => self.setting = value,
            FormField::Diagnosis => self.diagnosis = value,
            FormField::ClientConcerns => self.client_concerns = value,
            FormField::SupervisorName => self.supervisor_name = value,
            FormField::TopicsDiscussed => self.topics_discussed = value,
        }
    }

    fn clear(&mut self) {
        *self = DraftForm::default();
    }
}

/// Error building a submission from the staged state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("no date selected")]
    NoDateSelected,
    #[error("no hour category chosen")]
    NoCategoryChosen,
}

/// One staged submission flow. The lifecycle mirrors the tracker UI:
/// picking a date resets everything below it, picking a category resets
/// the draft and pre-fills hours from the stored entry (so an untouched
/// submit re-states what is already there).
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    selected_date: Option<DateKey>,
    day: DayEntries,
    active_category: Option<HourCategory>,
    draft: DraftForm,
}

impl SessionState {
    pub fn new() -> Self {
        SessionState::default()
    }

    /// Select a date, handing over the entries fetched for it. Clears any
    /// category choice and draft from a previous date.
    pub fn select_date(&mut self, date: DateKey, fetched: DayEntries) {
        self.selected_date = Some(date);
        self.day = fetched;
        self.active_category = None;
        self.draft.clear();
    }

    pub fn selected_date(&self) -> Option<DateKey> {
        self.selected_date
    }

    pub fn day(&self) -> &DayEntries {
        &self.day
    }

    pub fn active_category(&self) -> Option<HourCategory> {
        self.active_category
    }

    pub fn draft(&self) -> &DraftForm {
        &self.draft
    }

    /// Hours currently stored for `category` on the selected date, if any.
    pub fn prior_hours(&self, category: HourCategory) -> Option<f64> {
        self.day.get(category).map(|e| e.hours)
    }

    /// Choose which category the form edits. Resets the draft; the hours
    /// box is pre-filled from the stored entry when one exists.
    pub fn choose_category(&mut self, category: HourCategory) {
        self.active_category = Some(category);
        self.draft.clear();
        if let Some(entry) = self.day.get(category) {
            self.draft.hours = entry.hours.to_string();
        }
    }

    /// Back out of the category choice. The date and its fetched entries
    /// stay selected; staged edits are discarded.
    pub fn clear_category(&mut self) {
        self.active_category = None;
        self.draft.clear();
    }

    /// Stage one field edit. Unknown dropdown choices are accepted but
    /// logged, since stored data may outlive the vocabulary.
    pub fn set_field(&mut self, field: FormField, value: impl Into<String>) {
        let value = value.into();
        let options: Option<&[&str]> = match field {
            FormField::Modality => Some(&vocab::MODALITIES),
            FormField::Population => Some(&vocab::POPULATIONS),
            FormField::Setting => Some(&vocab::SETTINGS),
            FormField::Diagnosis => Some(&vocab::DIAGNOSES),
            _ => None,
        };
        if let Some(options) = options {
            if !value.is_empty() && !vocab::is_known(options, &value) {
                warn!(field = %field, value = %value, "value not in the form vocabulary");
            }
        }
        self.draft.set(field, value);
    }

    /// Fold a just-written entry back into the cached day so the session
    /// reflects the store without a re-fetch.
    pub fn apply_written(&mut self, entry: HourLogEntry) {
        self.day.set(entry);
    }

    /// Build the submission the staged state describes. Which detail
    /// fields are carried depends on the category; empty fields are
    /// omitted so stored values survive the merge.
    pub fn build_submission(&self, user: &UserId) -> Result<HourSubmission, FormError> {
        let date = self.selected_date.ok_or(FormError::NoDateSelected)?;
        let category = self.active_category.ok_or(FormError::NoCategoryChosen)?;
        let hours = parse_hours_or_zero(&self.draft.hours);

        let mut details = EntryDetails::default();
        match category {
            HourCategory::Direct => {
                details.modality = staged(&self.draft.modality);
                details.population = staged(&self.draft.population);
                details.setting = staged(&self.draft.setting);
                details.diagnosis = staged(&self.draft.diagnosis);
                details.client_concerns = staged(&self.draft.client_concerns);
            }
            HourCategory::Indirect => {}
            HourCategory::Supervision => {
                details.modality = staged(&self.draft.modality);
                details.population = staged(&self.draft.population);
                details.setting = staged(&self.draft.setting);
                details.diagnosis = staged(&self.draft.diagnosis);
                details.client_concerns = staged(&self.draft.client_concerns);
                details.supervisor_name = staged(&self.draft.supervisor_name);
                details.topics_discussed = staged(&self.draft.topics_discussed);
            }
        }

        Ok(HourSubmission::new(user.clone(), date, category, hours).with_details(details))
    }
}

fn staged(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn user() -> UserId {
        UserId::new("alice").unwrap()
    }

    fn key(s: &str) -> DateKey {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_hours_or_zero() {
        assert_relative_eq!(parse_hours_or_zero("3.5"), 3.5);
        assert_relative_eq!(parse_hours_or_zero("  2 "), 2.0);
        assert_relative_eq!(parse_hours_or_zero(""), 0.0);
        assert_relative_eq!(parse_hours_or_zero("abc"), 0.0);
        assert_relative_eq!(parse_hours_or_zero("NaN"), 0.0);
        assert_relative_eq!(parse_hours_or_zero("inf"), 0.0);
    }

    #[test]
    fn test_submission_requires_date_and_category() {
        let mut session = SessionState::new();
        assert_eq!(
            session.build_submission(&user()).unwrap_err(),
            FormError::NoDateSelected
        );
        session.select_date(key("2024-04-01"), DayEntries::default());
        assert_eq!(
            session.build_submission(&user()).unwrap_err(),
            FormError::NoCategoryChosen
        );
    }

    #[test]
    fn test_direct_submission_carries_clinical_fields_only() {
        let mut session = SessionState::new();
        session.select_date(key("2024-04-01"), DayEntries::default());
        session.choose_category(HourCategory::Direct);
        session.set_field(FormField::Hours, "4");
        session.set_field(FormField::Modality, "In-person");
        session.set_field(FormField::SupervisorName, "Dr. Lee");

        let sub = session.build_submission(&user()).unwrap();
        assert_eq!(sub.category, HourCategory::Direct);
        assert_relative_eq!(sub.hours, 4.0);
        assert_eq!(sub.details.modality.as_deref(), Some("In-person"));
        // Supervisor is not a direct-hours field; it must not leak through.
        assert!(sub.details.supervisor_name.is_none());
    }

    #[test]
    fn test_indirect_submission_carries_no_details() {
        let mut session = SessionState::new();
        session.select_date(key("2024-04-01"), DayEntries::default());
        session.choose_category(HourCategory::Indirect);
        session.set_field(FormField::Hours, "1.5");
        session.set_field(FormField::Modality, "Phone");

        let sub = session.build_submission(&user()).unwrap();
        assert!(sub.details.is_empty());
    }

    #[test]
    fn test_supervision_submission_adds_supervisor_fields() {
        let mut session = SessionState::new();
        session.select_date(key("2024-04-01"), DayEntries::default());
        session.choose_category(HourCategory::Supervision);
        session.set_field(FormField::Hours, "1");
        session.set_field(FormField::SupervisorName, "Dr. Lee");
        session.set_field(FormField::TopicsDiscussed, "case review");

        let sub = session.build_submission(&user()).unwrap();
        assert_eq!(sub.details.supervisor_name.as_deref(), Some("Dr. Lee"));
        assert_eq!(sub.details.topics_discussed.as_deref(), Some("case review"));
    }

    #[test]
    fn test_empty_fields_are_omitted_not_blanked() {
        let mut session = SessionState::new();
        session.select_date(key("2024-04-01"), DayEntries::default());
        session.choose_category(HourCategory::Direct);
        session.set_field(FormField::Hours, "2");
        session.set_field(FormField::Setting, "  ");

        let sub = session.build_submission(&user()).unwrap();
        assert!(sub.details.setting.is_none());
    }

    #[test]
    fn test_choose_category_prefills_stored_hours() {
        let mut day = DayEntries::default();
        day.set(HourLogEntry::new(key("2024-04-01"), HourCategory::Direct, 5.0));

        let mut session = SessionState::new();
        session.select_date(key("2024-04-01"), day);
        session.choose_category(HourCategory::Direct);
        assert_eq!(session.draft().hours, "5");
        assert_relative_eq!(session.prior_hours(HourCategory::Direct).unwrap(), 5.0);

        // An untouched submit re-states the stored value.
        let sub = session.build_submission(&user()).unwrap();
        assert_relative_eq!(sub.hours, 5.0);
    }

    #[test]
    fn test_clear_category_keeps_the_selected_date() {
        let mut session = SessionState::new();
        session.select_date(key("2024-04-01"), DayEntries::default());
        session.choose_category(HourCategory::Direct);
        session.set_field(FormField::Hours, "3");

        session.clear_category();
        assert_eq!(session.active_category(), None);
        assert_eq!(session.draft().hours, "");
        assert_eq!(session.selected_date(), Some(key("2024-04-01")));
    }

    #[test]
    fn test_select_date_resets_category_and_draft() {
        let mut session = SessionState::new();
        session.select_date(key("2024-04-01"), DayEntries::default());
        session.choose_category(HourCategory::Direct);
        session.set_field(FormField::Hours, "3");

        session.select_date(key("2024-04-02"), DayEntries::default());
        assert_eq!(session.active_category(), None);
        assert_eq!(session.draft().hours, "");
    }

    #[test]
    fn test_apply_written_updates_cached_day() {
        let mut session = SessionState::new();
        session.select_date(key("2024-04-01"), DayEntries::default());
        session.apply_written(HourLogEntry::new(
            key("2024-04-01"),
            HourCategory::Indirect,
            2.0,
        ));
        assert_relative_eq!(session.prior_hours(HourCategory::Indirect).unwrap(), 2.0);
    }
}
