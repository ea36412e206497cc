use chrono::NaiveDate;
use proptest::prelude::*;

use practicum_model::DateKey;

fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    // Day capped at 28 so every (year, month, day) triple is a real date.
    (2000i32..2100, 1u32..=12, 1u32..=28).prop_map(|(y, m, d)| {
        NaiveDate::from_ymd_opt(y, m, d).expect("triple is within bounds")
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn canonical_form_roundtrips(date in date_strategy()) {
        let key = DateKey::new(date);
        let parsed: DateKey = key.to_string().parse().unwrap();
        prop_assert_eq!(parsed, key);
    }

    #[test]
    fn legacy_form_parses_to_same_key(date in date_strategy()) {
        let legacy = date.format("%a %b %d %Y").to_string();
        let parsed: DateKey = legacy.parse().unwrap();
        prop_assert_eq!(parsed, DateKey::new(date));
    }

    #[test]
    fn serde_matches_display(date in date_strategy()) {
        let key = DateKey::new(date);
        let json = serde_json::to_string(&key).unwrap();
        prop_assert_eq!(json, format!("\"{}\"", key));
    }
}
