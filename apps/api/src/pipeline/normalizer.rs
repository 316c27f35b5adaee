//! Normalizer: maps a loosely-typed raw record onto the canonical `JobListing`.
//!
//! Never fails: a missing or malformed field degrades to its default.
//! Output depends only on `(raw, source_id, captured_at)`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::models::listing::JobListing;
use crate::sources::{RawRecord, SourceId};

/// Hands out capture timestamps for one run. Never goes backwards and never
/// returns anything earlier than the run start.
#[derive(Debug, Clone)]
pub struct CaptureClock {
    last: DateTime<Utc>,
}

impl CaptureClock {
    pub fn starting_at(run_started: DateTime<Utc>) -> Self {
        Self { last: run_started }
    }

    pub fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now().max(self.last);
        self.last = now;
        now
    }
}

pub fn normalize(raw: &RawRecord, source_id: &SourceId, captured_at: DateTime<Utc>) -> JobListing {
    let location = text_field(raw, &["location"]);
    let is_remote =
        bool_field(raw, &["is_remote", "isRemote", "remote"]) || location.to_lowercase().contains("remote");

    JobListing {
        title: text_field(raw, &["title"]),
        company: text_field(raw, &["company"]),
        description: text_field(raw, &["description"]),
        url: text_field(raw, &["url"]),
        posted_date: lookup(raw, &["posted_date", "postedDate"]).and_then(coerce_timestamp),
        salary: lookup(raw, &["salary"]).and_then(coerce_non_negative),
        job_type: text_field(raw, &["job_type", "jobType"]),
        is_remote,
        skills: lookup(raw, &["skills"]).map(coerce_skills).unwrap_or_default(),
        experience_years: lookup(raw, &["experience_years", "experienceYears"])
            .and_then(coerce_non_negative),
        location,
        source_id: source_id.clone(),
        fetched_at: captured_at,
    }
}

/// First non-null value among the accepted spellings of a key.
fn lookup<'a>(raw: &'a RawRecord, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| raw.get(*k))
        .find(|v| !v.is_null())
}

fn text_field(raw: &RawRecord, keys: &[&str]) -> String {
    match lookup(raw, keys) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn bool_field(raw: &RawRecord, keys: &[&str]) -> bool {
    match lookup(raw, keys) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => matches!(
            s.trim().to_lowercase().as_str(),
            "true" | "yes" | "1"
        ),
        _ => false,
    }
}

/// Numbers pass through; strings like `"$120,000"` are stripped and parsed.
/// Negative or non-finite values are treated as absent.
fn coerce_non_negative(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| !matches!(c, '$' | '€' | '£' | ',' | '_' | ' '))
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    }?;
    (parsed.is_finite() && parsed >= 0.0).then_some(parsed)
}

fn coerce_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp(s.trim()),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn coerce_skills(value: &Value) -> Vec<String> {
    let candidates: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        _ => vec![],
    };

    let mut skills: Vec<String> = Vec::with_capacity(candidates.len());
    for skill in candidates {
        let skill = skill.trim();
        let folded = skill.to_lowercase();
        if skill.is_empty() || skills.iter().any(|s| s.to_lowercase() == folded) {
            continue;
        }
        skills.push(skill.to_string());
    }
    skills
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::fakes::record;
    use chrono::Datelike;
    use serde_json::json;

    fn captured() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap()
    }

    fn run(value: Value) -> JobListing {
        normalize(&record(value), &SourceId::from("linkedin"), captured())
    }

    #[test]
    fn test_empty_record_degrades_to_defaults() {
        let job = run(json!({}));
        assert_eq!(job.title, "");
        assert_eq!(job.company, "");
        assert_eq!(job.url, "");
        assert!(job.posted_date.is_none());
        assert!(job.salary.is_none());
        assert!(!job.is_remote);
        assert!(job.skills.is_empty());
        assert!(job.experience_years.is_none());
        assert_eq!(job.source_id, SourceId::from("linkedin"));
        assert_eq!(job.fetched_at, captured());
    }

    #[test]
    fn test_full_record_maps_every_field() {
        let job = run(json!({
            "title": " ML Engineer ",
            "company": "Tech Corp",
            "location": "Remote",
            "description": "Train models",
            "url": "https://example.com/1",
            "posted_date": "2026-09-30T08:00:00Z",
            "salary": 120000,
            "job_type": "full-time",
            "skills": ["python", "PyTorch"],
            "experience_years": 3
        }));
        assert_eq!(job.title, "ML Engineer");
        assert_eq!(job.salary, Some(120000.0));
        assert_eq!(job.job_type, "full-time");
        assert!(job.is_remote);
        assert_eq!(job.skills, vec!["python", "PyTorch"]);
        assert_eq!(job.experience_years, Some(3.0));
        assert_eq!(job.posted_date.unwrap().day(), 30);
    }

    #[test]
    fn test_remote_inferred_from_location() {
        assert!(run(json!({"location": "Fully REMOTE (EU)"})).is_remote);
        assert!(!run(json!({"location": "Berlin"})).is_remote);
    }

    #[test]
    fn test_salary_string_is_coerced() {
        assert_eq!(run(json!({"salary": "$120,000"})).salary, Some(120000.0));
        assert_eq!(run(json!({"salary": "competitive"})).salary, None);
        assert_eq!(run(json!({"salary": -5})).salary, None);
        assert_eq!(run(json!({"salary": {"min": 1}})).salary, None);
    }

    #[test]
    fn test_text_field_with_wrong_type() {
        assert_eq!(run(json!({"title": 42})).title, "42");
        assert_eq!(run(json!({"company": ["a", "b"]})).company, "");
        assert_eq!(run(json!({"company": null})).company, "");
    }

    #[test]
    fn test_posted_date_formats() {
        let naive = run(json!({"posted_date": "2026-09-15T10:30:00"}));
        assert_eq!(naive.posted_date.unwrap().day(), 15);

        let date_only = run(json!({"postedDate": "2026-09-14"}));
        assert_eq!(date_only.posted_date.unwrap().day(), 14);

        let unix = run(json!({"posted_date": 0}));
        assert_eq!(unix.posted_date.unwrap().year(), 1970);

        assert!(run(json!({"posted_date": "last tuesday"})).posted_date.is_none());
    }

    #[test]
    fn test_skills_from_comma_string_are_deduped() {
        let job = run(json!({"skills": "Rust, rust , SQL,,"}));
        assert_eq!(job.skills, vec!["Rust", "SQL"]);
    }

    #[test]
    fn test_skills_dedupe_folds_non_ascii_case() {
        let job = run(json!({"skills": ["Ümlaut", "ümlaut", "Ça", "ça"]}));
        assert_eq!(job.skills, vec!["Ümlaut", "Ça"]);
    }

    #[test]
    fn test_camel_case_aliases() {
        let job = run(json!({"jobType": "contract", "isRemote": "yes", "experienceYears": "4"}));
        assert_eq!(job.job_type, "contract");
        assert!(job.is_remote);
        assert_eq!(job.experience_years, Some(4.0));
    }

    #[test]
    fn test_normalize_is_pure() {
        let raw = record(json!({"title": "Dev", "salary": "90000"}));
        let id = SourceId::from("indeed");
        assert_eq!(normalize(&raw, &id, captured()), normalize(&raw, &id, captured()));
    }

    #[test]
    fn test_capture_clock_never_before_run_start() {
        let future = Utc::now() + chrono::Duration::hours(1);
        let mut clock = CaptureClock::starting_at(future);
        let first = clock.tick();
        let second = clock.tick();
        assert!(first >= future);
        assert!(second >= first);
    }
}
