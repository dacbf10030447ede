// 🆕 Recent Intakes - Animals that arrived in the last N days
//
// Used for the weekly "new arrivals" list. Records are ordered newest intake
// first and the walk stops at the first one older than the cutoff.

use crate::records::{AnimalRecord, SECONDS_PER_DAY};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentIntake {
    pub name: String,
    pub breed: String,
    pub age: String,
    pub sex: String,
    pub location: String,
    pub intake_time: i64,
}

impl RecentIntake {
    fn from_record(record: &AnimalRecord, intake_time: i64) -> Self {
        RecentIntake {
            name: record.name.clone(),
            breed: record.breed.clone(),
            age: age_text(record.age_months),
            sex: record.sex.clone(),
            location: record.location_label(),
            intake_time,
        }
    }
}

/// Animals whose last intake is at or after `now - days`, newest first.
/// Records without a readable intake time are skipped with a warning.
pub fn newer_than_days(records: &[AnimalRecord], days: i64, now: i64) -> Vec<RecentIntake> {
    let cutoff = now.saturating_sub(days.saturating_mul(SECONDS_PER_DAY));

    let mut dated: Vec<(i64, &AnimalRecord)> = records
        .iter()
        .filter_map(|record| match record.last_intake_time() {
            Ok(time) => Some((time, record)),
            Err(err) => {
                warn!(animal = %record.name, error = %err, "skipping record without intake time");
                None
            }
        })
        .collect();
    dated.sort_by(|a, b| b.0.cmp(&a.0));

    dated
        .into_iter()
        .take_while(|(time, _)| *time >= cutoff)
        .map(|(time, record)| RecentIntake::from_record(record, time))
        .collect()
}

fn plural(n: u32, unit: &str) -> String {
    if n == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

/// 0 -> "younger than 1 month", 14 -> "1 year, 2 months"
pub fn age_text(months: u32) -> String {
    let (years, months) = (months / 12, months % 12);
    match (years, months) {
        (0, 0) => "younger than 1 month".to_string(),
        (0, m) => plural(m, "month"),
        (y, 0) => plural(y, "year"),
        (y, m) => format!("{}, {}", plural(y, "year"), plural(m, "month")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::RawTime;

    fn dog(name: &str, intake: Option<i64>) -> AnimalRecord {
        let mut record: AnimalRecord =
            serde_json::from_str(&format!(r#"{{"Internal-ID": "{0}", "Name": "{0}", "Age": 3}}"#, name))
                .unwrap();
        record.last_intake = intake.map(RawTime::from);
        record
    }

    #[test]
    fn test_age_text() {
        assert_eq!(age_text(0), "younger than 1 month");
        assert_eq!(age_text(1), "1 month");
        assert_eq!(age_text(5), "5 months");
        assert_eq!(age_text(12), "1 year");
        assert_eq!(age_text(36), "3 years");
        assert_eq!(age_text(13), "1 year, 1 month");
        assert_eq!(age_text(26), "2 years, 2 months");
    }

    #[test]
    fn test_newer_than_days_orders_and_cuts() {
        let now = 100 * SECONDS_PER_DAY;
        let records = vec![
            dog("Old", Some(now - 10 * SECONDS_PER_DAY)),
            dog("New", Some(now - SECONDS_PER_DAY)),
            dog("Edge", Some(now - 7 * SECONDS_PER_DAY)),
            dog("Unknown", None),
        ];

        let recent = newer_than_days(&records, 7, now);
        let names: Vec<&str> = recent.iter().map(|r| r.name.as_str()).collect();

        assert_eq!(names, vec!["New", "Edge"]);
        assert_eq!(recent[0].age, "3 months");
    }

    #[test]
    fn test_nothing_recent() {
        let now = 100 * SECONDS_PER_DAY;
        let records = vec![dog("Old", Some(0))];
        assert!(newer_than_days(&records, 1, now).is_empty());
    }

    #[test]
    fn test_huge_window_keeps_everything() {
        let records = vec![dog("Ancient", Some(-1_000_000 * SECONDS_PER_DAY)), dog("New", Some(0))];
        assert_eq!(newer_than_days(&records, i64::MAX, 0).len(), 2);
        assert_eq!(newer_than_days(&records, i64::MAX, i64::MIN).len(), 2);
        assert!(newer_than_days(&records, i64::MIN, 0).is_empty());
    }
}
