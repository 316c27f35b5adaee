//! HTTP job-board clients. One generic client, parameterised per board by endpoint,
//! query shape and the JSON path where the listings live.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::{BoardEndpoint, Config};
use crate::sources::http::{extract_envelope, get_json};
use crate::sources::{HttpSession, RawRecord, SourceClient, SourceError, SourceId};

const PAGE_SIZE: &str = "25";

type QueryBuilder = fn(&str, &str) -> Vec<(&'static str, String)>;

pub struct JobBoardClient {
    id: SourceId,
    endpoint: BoardEndpoint,
    query: QueryBuilder,
    envelope: &'static str,
}

impl JobBoardClient {
    /// Looks up a known board by name. Returns `None` for unknown names.
    pub fn for_board(name: &str, config: &Config) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "linkedin" => Some(Self::linkedin(config.linkedin.clone())),
            "indeed" => Some(Self::indeed(config.indeed.clone())),
            "glassdoor" => Some(Self::glassdoor(config.glassdoor.clone())),
            _ => None,
        }
    }

    pub fn linkedin(endpoint: BoardEndpoint) -> Self {
        Self {
            id: SourceId::from("linkedin"),
            endpoint,
            query: |keywords, location| {
                vec![
                    ("keywords", keywords.to_string()),
                    ("location", location.to_string()),
                    ("count", PAGE_SIZE.to_string()),
                ]
            },
            envelope: "elements",
        }
    }

    pub fn indeed(endpoint: BoardEndpoint) -> Self {
        Self {
            id: SourceId::from("indeed"),
            endpoint,
            query: |keywords, location| {
                vec![
                    ("q", keywords.to_string()),
                    ("l", location.to_string()),
                    ("limit", PAGE_SIZE.to_string()),
                    ("format", "json".to_string()),
                ]
            },
            envelope: "results",
        }
    }

    pub fn glassdoor(endpoint: BoardEndpoint) -> Self {
        Self {
            id: SourceId::from("glassdoor"),
            endpoint,
            query: |keywords, location| {
                vec![
                    ("action", "jobs-prog".to_string()),
                    ("q", keywords.to_string()),
                    ("l", location.to_string()),
                    ("pagesize", PAGE_SIZE.to_string()),
                ]
            },
            envelope: "response.jobListings",
        }
    }

    /// Pulls the listing records out of a decoded response body.
    fn records_from(&self, body: &serde_json::Value) -> Result<Vec<RawRecord>, SourceError> {
        let items = extract_envelope(body, self.envelope).ok_or_else(|| {
            SourceError::Permanent(format!(
                "{} response has no '{}' array",
                self.id, self.envelope
            ))
        })?;

        let mut records = Vec::with_capacity(items.len());
        for item in items {
            match item.as_object() {
                Some(map) => records.push(map.clone()),
                None => debug!("{}: skipping non-object entry in response", self.id),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl SourceClient for JobBoardClient {
    fn id(&self) -> SourceId {
        self.id.clone()
    }

    async fn fetch(
        &self,
        session: &HttpSession,
        keywords: &str,
        location: &str,
    ) -> Result<Vec<RawRecord>, SourceError> {
        let params = (self.query)(keywords, location);
        let body = get_json(
            session,
            &self.endpoint.url,
            &params,
            self.endpoint.token.as_deref(),
        )
        .await?;

        let records = self.records_from(&body)?;
        info!("Fetched {} raw records from {}", records.len(), self.id);
        Ok(records)
    }
}
