//! FilterEngine — keeps a listing only when every configured predicate passes.
//!
//! Each predicate is independent and vacuously satisfied when its criteria field
//! is absent (or an empty list). Missing listing data never causes a rejection on
//! the salary, experience or posting-date predicates.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::listing::JobListing;

/// User-supplied filter configuration. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    pub required_skills: Vec<String>,
    pub locations: Vec<String>,
    pub remote_only: bool,
    pub min_salary: Option<f64>,
    pub max_salary: Option<f64>,
    pub experience_min: Option<f64>,
    pub experience_max: Option<f64>,
    pub job_types: Vec<String>,
    pub company_blocklist: Vec<String>,
    pub company_allowlist: Vec<String>,
    pub posted_within_days: Option<u32>,
    pub include_keywords: Vec<String>,
    pub exclude_keywords: Vec<String>,
}

/// The predicate that rejected a listing, for logs and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    RequiredSkills,
    Location,
    Salary,
    Experience,
    JobType,
    Company,
    PostedWithin,
    Keywords,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FilterStats {
    pub total_processed: usize,
    pub kept: usize,
    /// kept / total_processed, 0.0 for an empty input.
    pub keep_rate: f64,
}

#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub kept: Vec<JobListing>,
    pub stats: FilterStats,
}

/// Filters listings against `criteria`, evaluating posting age relative to `now`.
pub fn filter_listings(
    listings: Vec<JobListing>,
    criteria: &FilterCriteria,
    now: DateTime<Utc>,
) -> FilterOutcome {
    let total_processed = listings.len();
    let kept: Vec<JobListing> = listings
        .into_iter()
        .filter(|listing| match first_failed_predicate(listing, criteria, now) {
            Some(predicate) => {
                debug!(
                    "Rejected '{}' at '{}' on {:?}",
                    listing.title, listing.company, predicate
                );
                false
            }
            None => true,
        })
        .collect();

    let stats = FilterStats {
        total_processed,
        kept: kept.len(),
        keep_rate: if total_processed > 0 {
            kept.len() as f64 / total_processed as f64
        } else {
            0.0
        },
    };
    info!("Filtered {} listings from {} total", stats.kept, total_processed);

    FilterOutcome { kept, stats }
}

/// Returns the first predicate the listing fails, in a cheap-first order.
pub fn first_failed_predicate(
    listing: &JobListing,
    criteria: &FilterCriteria,
    now: DateTime<Utc>,
) -> Option<Predicate> {
    if !check_location(listing, criteria) {
        return Some(Predicate::Location);
    }
    if !within_range(listing.salary, criteria.min_salary, criteria.max_salary) {
        return Some(Predicate::Salary);
    }
    if !within_range(
        listing.experience_years,
        criteria.experience_min,
        criteria.experience_max,
    ) {
        return Some(Predicate::Experience);
    }
    if !check_job_type(listing, criteria) {
        return Some(Predicate::JobType);
    }
    if !check_company(listing, criteria) {
        return Some(Predicate::Company);
    }
    if !check_posted_within(listing, criteria, now) {
        return Some(Predicate::PostedWithin);
    }
    if !check_required_skills(listing, criteria) {
        return Some(Predicate::RequiredSkills);
    }
    if !check_keywords(listing, criteria) {
        return Some(Predicate::Keywords);
    }
    None
}

fn contains_ci(haystack_lower: &str, needle: &str) -> bool {
    haystack_lower.contains(&needle.to_lowercase())
}

fn check_required_skills(listing: &JobListing, criteria: &FilterCriteria) -> bool {
    if criteria.required_skills.is_empty() {
        return true;
    }
    let description = listing.description.to_lowercase();
    criteria.required_skills.iter().all(|required| {
        listing
            .skills
            .iter()
            .any(|s| s.to_lowercase() == required.to_lowercase())
            || contains_ci(&description, required)
    })
}

fn check_location(listing: &JobListing, criteria: &FilterCriteria) -> bool {
    if criteria.remote_only {
        return listing.is_remote_like();
    }
    if criteria.locations.is_empty() {
        return true;
    }
    let location = listing.location.to_lowercase();
    criteria.locations.iter().any(|l| contains_ci(&location, l))
}

/// Absent values pass; present values must sit inside every bound that is set.
fn within_range(value: Option<f64>, min: Option<f64>, max: Option<f64>) -> bool {
    let Some(value) = value else {
        return true;
    };
    min.map_or(true, |m| value >= m) && max.map_or(true, |m| value <= m)
}

fn check_job_type(listing: &JobListing, criteria: &FilterCriteria) -> bool {
    if criteria.job_types.is_empty() {
        return true;
    }
    let job_type = listing.job_type.to_lowercase();
    criteria.job_types.iter().any(|t| contains_ci(&job_type, t))
}

fn check_company(listing: &JobListing, criteria: &FilterCriteria) -> bool {
    let company = listing.company.to_lowercase();
    if criteria
        .company_blocklist
        .iter()
        .any(|blocked| contains_ci(&company, blocked))
    {
        return false;
    }
    criteria.company_allowlist.is_empty()
        || criteria
            .company_allowlist
            .iter()
            .any(|allowed| contains_ci(&company, allowed))
}

fn check_posted_within(listing: &JobListing, criteria: &FilterCriteria, now: DateTime<Utc>) -> bool {
    match (criteria.posted_within_days, listing.posted_date) {
        // A window reaching past the earliest representable time admits everything.
        (Some(days), Some(posted)) => now
            .checked_sub_signed(Duration::days(i64::from(days)))
            .map_or(true, |cutoff| posted >= cutoff),
        _ => true,
    }
}

fn check_keywords(listing: &JobListing, criteria: &FilterCriteria) -> bool {
    if criteria.include_keywords.is_empty() && criteria.exclude_keywords.is_empty() {
        return true;
    }
    let text = listing.searchable_text();
    let included = criteria.include_keywords.is_empty()
        || criteria.include_keywords.iter().any(|k| contains_ci(&text, k));
    let excluded = criteria.exclude_keywords.iter().any(|k| contains_ci(&text, k));
    included && !excluded
}
