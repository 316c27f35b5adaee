use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sources::SourceId;

/// Canonical, source-agnostic job listing produced by the normalizer.
///
/// Listings are never mutated after construction: filtering and ranking
/// borrow them, and a score lives in `RankedResult`, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobListing {
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub url: String,
    pub posted_date: Option<DateTime<Utc>>,
    pub salary: Option<f64>,
    pub job_type: String,
    pub is_remote: bool,
    pub skills: Vec<String>,
    pub experience_years: Option<f64>,
    pub source_id: SourceId,
    pub fetched_at: DateTime<Utc>,
}

/// `(title, company, location)`, trimmed and lowercased.
/// Two listings with the same key are the same job regardless of source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    title: String,
    company: String,
    location: String,
}

impl IdentityKey {
    pub fn new(title: &str, company: &str, location: &str) -> Self {
        Self {
            title: title.trim().to_lowercase(),
            company: company.trim().to_lowercase(),
            location: location.trim().to_lowercase(),
        }
    }
}

impl JobListing {
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey::new(&self.title, &self.company, &self.location)
    }

    /// True when the listing is flagged remote or its location says so.
    pub fn is_remote_like(&self) -> bool {
        self.is_remote || self.location.to_lowercase().contains("remote")
    }

    /// Lowercased `title + " " + description`, the text keyword predicates search.
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.title, self.description).to_lowercase()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Bare listing with every optional field absent.
    pub fn listing(title: &str, company: &str, location: &str) -> JobListing {
        JobListing {
            title: title.to_string(),
            company: company.to_string(),
            location: location.to_string(),
            description: String::new(),
            url: String::new(),
            posted_date: None,
            salary: None,
            job_type: String::new(),
            is_remote: location.to_lowercase().contains("remote"),
            skills: vec![],
            experience_years: None,
            source_id: SourceId::from("test"),
            fetched_at: Utc::now(),
        }
    }
}
