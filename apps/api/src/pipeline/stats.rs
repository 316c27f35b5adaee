use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::listing::JobListing;

/// Counts of listings by a handful of dimensions. Blank values are counted as "unknown".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingSummary {
    pub total: usize,
    pub by_source: BTreeMap<String, usize>,
    pub by_company: BTreeMap<String, usize>,
    pub by_location: BTreeMap<String, usize>,
    pub by_job_type: BTreeMap<String, usize>,
}

pub fn summarize<'a>(listings: impl IntoIterator<Item = &'a JobListing>) -> ListingSummary {
    let mut summary = ListingSummary::default();
    for listing in listings {
        summary.total += 1;
        bump(&mut summary.by_source, listing.source_id.as_str());
        bump(&mut summary.by_company, &listing.company);
        bump(&mut summary.by_location, &listing.location);
        bump(&mut summary.by_job_type, &listing.job_type);
    }
    summary
}

fn bump(counts: &mut BTreeMap<String, usize>, value: &str) {
    let key = if value.trim().is_empty() {
        "unknown".to_string()
    } else {
        value.trim().to_string()
    };
    *counts.entry(key).or_insert(0) += 1;
}
