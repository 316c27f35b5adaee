use std::collections::HashSet;

use tracing::info;

use crate::models::listing::JobListing;

/// Drops listings whose identity key was already seen. First occurrence wins and the
/// relative order of survivors is kept. Later duplicates are dropped, never merged.
pub fn dedupe(listings: Vec<JobListing>) -> Vec<JobListing> {
    let before = listings.len();
    let mut seen = HashSet::with_capacity(before);
    let unique: Vec<JobListing> = listings
        .into_iter()
        .filter(|listing| seen.insert(listing.identity_key()))
        .collect();

    info!("Deduplicated {before} listings to {}", unique.len());
    unique
}
