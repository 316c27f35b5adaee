//! RankingEngine — deterministic additive relevance score, then a stable sort.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::listing::JobListing;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub skills: Vec<String>,
    pub preferred_locations: Vec<String>,
    pub min_salary: Option<f64>,
    pub remote_only: bool,
    pub experience_years: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub per_shared_skill: f64,
    pub preferred_location: f64,
    pub salary_meets_minimum: f64,
    pub remote_match: f64,
    pub experience_fits: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            per_shared_skill: 5.0,
            preferred_location: 10.0,
            salary_meets_minimum: 7.5,
            remote_match: 8.0,
            experience_fits: 3.0,
        }
    }
}

/// A listing with its score against one profile. The listing itself is untouched,
/// so the same listing can be ranked against many profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub listing: JobListing,
    pub score: f64,
}

pub fn score(listing: &JobListing, profile: &UserProfile) -> f64 {
    score_with_weights(listing, profile, &ScoringWeights::default())
}

pub fn score_with_weights(
    listing: &JobListing,
    profile: &UserProfile,
    weights: &ScoringWeights,
) -> f64 {
    let mut total = 0.0;

    let listing_skills: HashSet<String> = listing.skills.iter().map(|s| s.to_lowercase()).collect();
    let profile_skills: HashSet<String> = profile.skills.iter().map(|s| s.to_lowercase()).collect();
    let shared = listing_skills.intersection(&profile_skills).count();
    total += shared as f64 * weights.per_shared_skill;

    let location = listing.location.to_lowercase();
    if profile
        .preferred_locations
        .iter()
        .any(|l| location.contains(&l.to_lowercase()))
    {
        total += weights.preferred_location;
    }

    if let (Some(min), Some(salary)) = (profile.min_salary, listing.salary) {
        if salary >= min {
            total += weights.salary_meets_minimum;
        }
    }

    if profile.remote_only && listing.is_remote_like() {
        total += weights.remote_match;
    }

    if let (Some(required), Some(has)) = (listing.experience_years, profile.experience_years) {
        if required <= has {
            total += weights.experience_fits;
        }
    }

    total
}

/// Scores every listing and sorts by descending score. `sort_by` is stable, so
/// tied listings keep their input order.
pub fn rank(listings: Vec<JobListing>, profile: &UserProfile) -> Vec<RankedResult> {
    let mut ranked: Vec<RankedResult> = listings
        .into_iter()
        .map(|listing| RankedResult {
            score: score(&listing, profile),
            listing,
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    info!("Ranked {} listings", ranked.len());
    ranked
}

/// The `n` best-ranked listings.
pub fn top_n(listings: Vec<JobListing>, profile: &UserProfile, n: usize) -> Vec<RankedResult> {
    let mut ranked = rank(listings, profile);
    ranked.truncate(n);
    ranked
}
