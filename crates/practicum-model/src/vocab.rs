//! Controlled vocabularies offered by the entry form.
//!
//! These mirror the tracker's dropdowns. Free text is still accepted on
//! submit; unknown choices are only worth a warning, never a rejection.

pub const MODALITIES: [&str; 3] = ["In-person", "Telehealth", "Phone"];

pub const POPULATIONS: [&str; 4] = ["Adults", "Children", "Adolescents", "Elderly"];

pub const SETTINGS: [&str; 4] = ["Private Practice", "Hospital", "Community Center", "School"];

pub const DIAGNOSES: [&str; 5] = ["Depression", "Anxiety", "PTSD", "Substance Abuse", "Other"];

pub fn is_known(options: &[&str], value: &str) -> bool {
    options.iter().any(|opt| *opt == value)
}
