//! FetchOrchestrator — concurrent fan-out to every selected source.
//!
//! One task per source, each wrapped in its own retry loop. The join is bounded by
//! the overall deadline: sources still running when it passes are abandoned and
//! reported as `Timeout`. Sources are all-or-nothing: an abandoned call contributes
//! no listings. Per-source failures are values in `source_outcomes`, never errors.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::{self, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::models::listing::JobListing;
use crate::pipeline::normalizer::{normalize, CaptureClock};
use crate::sources::{
    HttpSession, RawRecord, SessionProvider, SourceClient, SourceError, SourceId, SourceRegistry,
};

/// Retry, backoff and deadline tuning for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    pub per_call_timeout: Duration,
    pub overall_deadline: Duration,
    /// Attempts per source, including the first.
    pub max_retries: u32,
    /// Linear-backoff base for rate limiting when the source gives no hint.
    pub base_delay: Duration,
    /// Fixed pause between transient-failure retries.
    pub transient_delay: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            per_call_timeout: Duration::from_secs(10),
            overall_deadline: Duration::from_secs(30),
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            transient_delay: Duration::from_secs(1),
        }
    }
}

/// Hard failures of a fetch. Everything else is recorded per source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("all sources failed: {0}")]
    AllSourcesFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transient,
    RateLimited,
    Permanent,
    Timeout,
}

/// Why a source contributed nothing to this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub kind: FailureKind,
    pub attempts: u32,
    pub message: String,
}

/// Per-source result of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    Succeeded { listings: usize, attempts: u32 },
    Failed(SourceFailure),
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Normalized listings, grouped by source in registry order, each source's
    /// contribution in its own response order.
    pub listings: Vec<JobListing>,
    pub source_outcomes: BTreeMap<SourceId, SourceOutcome>,
}

impl FetchOutcome {
    /// Failed sources only: the per-source error map.
    pub fn errors(&self) -> BTreeMap<SourceId, &SourceFailure> {
        self.source_outcomes
            .iter()
            .filter_map(|(id, outcome)| match outcome {
                SourceOutcome::Failed(failure) => Some((id.clone(), failure)),
                SourceOutcome::Succeeded { .. } => None,
            })
            .collect()
    }
}

pub struct FetchOrchestrator {
    registry: Arc<SourceRegistry>,
    sessions: Arc<dyn SessionProvider>,
    settings: FetchSettings,
    max_keywords_len: usize,
}

type CallResult = Result<(Vec<RawRecord>, u32), SourceFailure>;

/// Stand-in deadline when the configured one does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

impl FetchOrchestrator {
    pub fn new(
        registry: Arc<SourceRegistry>,
        sessions: Arc<dyn SessionProvider>,
        settings: FetchSettings,
        max_keywords_len: usize,
    ) -> Self {
        Self {
            registry,
            sessions,
            settings,
            max_keywords_len,
        }
    }

    /// Fetches from the selected sources (all of them when `selection` is empty).
    ///
    /// Fails only on an invalid query, or when no listing came back and the
    /// run could not establish its network session.
    pub async fn fetch(
        &self,
        keywords: &str,
        location: &str,
        selection: &[SourceId],
    ) -> Result<FetchOutcome, FetchError> {
        let keywords = self.validate_keywords(keywords)?;
        let location = location.trim();
        let run_started = Utc::now();
        let clients = self.registry.select(selection);

        info!(
            "Fetching jobs for '{keywords}' in '{location}' from {} sources",
            clients.len()
        );

        let session = match self.sessions.open(self.settings.per_call_timeout) {
            Ok(session) => session,
            Err(e) => {
                error!("{e}");
                return Err(FetchError::AllSourcesFailed(e.to_string()));
            }
        };

        let mut completed = self.run_sources(&clients, session, keywords, location).await;

        let mut clock = CaptureClock::starting_at(run_started);
        let mut listings = Vec::new();
        let mut source_outcomes = BTreeMap::new();

        for client in &clients {
            let id = client.id();
            let outcome = match completed.remove(&id) {
                Some(Ok((records, attempts))) => {
                    let before = listings.len();
                    listings.extend(records.iter().map(|raw| normalize(raw, &id, clock.tick())));
                    SourceOutcome::Succeeded {
                        listings: listings.len() - before,
                        attempts,
                    }
                }
                Some(Err(failure)) => SourceOutcome::Failed(failure),
                None => SourceOutcome::Failed(SourceFailure {
                    kind: FailureKind::Timeout,
                    attempts: 0,
                    message: format!(
                        "did not finish within {}ms",
                        self.settings.overall_deadline.as_millis()
                    ),
                }),
            };
            if let SourceOutcome::Failed(failure) = &outcome {
                warn!("Source {id} failed ({:?}): {}", failure.kind, failure.message);
            }
            source_outcomes.insert(id, outcome);
        }

        let outcome = FetchOutcome {
            listings,
            source_outcomes,
        };
        info!(
            "Fetched {} listings; {} of {} sources failed",
            outcome.listings.len(),
            outcome.errors().len(),
            outcome.source_outcomes.len()
        );

        Ok(outcome)
    }

    fn validate_keywords<'a>(&self, keywords: &'a str) -> Result<&'a str, FetchError> {
        let keywords = keywords.trim();
        if keywords.is_empty() {
            return Err(FetchError::InvalidQuery("keywords cannot be empty".to_string()));
        }
        let len = keywords.chars().count();
        if len > self.max_keywords_len {
            return Err(FetchError::InvalidQuery(format!(
                "keywords are {len} characters, limit is {}",
                self.max_keywords_len
            )));
        }
        Ok(keywords)
    }

    /// Spawns one task per client and joins until all finish or the deadline passes.
    /// Sources missing from the returned map did not finish in time.
    async fn run_sources(
        &self,
        clients: &[Arc<dyn SourceClient>],
        session: HttpSession,
        keywords: &str,
        location: &str,
    ) -> HashMap<SourceId, CallResult> {
        let started = Instant::now();
        let deadline = started
            .checked_add(self.settings.overall_deadline)
            .unwrap_or_else(|| started + FAR_FUTURE);
        let mut tasks = JoinSet::new();
        let mut task_sources: HashMap<task::Id, SourceId> = HashMap::with_capacity(clients.len());

        for client in clients {
            let client = Arc::clone(client);
            let session = session.clone();
            let settings = self.settings.clone();
            let keywords = keywords.to_string();
            let location = location.to_string();
            let id = client.id();
            let handle = tasks.spawn(async move {
                let id = client.id();
                let result =
                    fetch_with_retry(client.as_ref(), &session, &keywords, &location, &settings)
                        .await;
                (id, result)
            });
            task_sources.insert(handle.id(), id);
        }
        drop(session);

        let mut completed = HashMap::with_capacity(clients.len());
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((id, result)))) => {
                    completed.insert(id, result);
                }
                Ok(Some(Err(join_error))) => {
                    error!("Source task terminated abnormally: {join_error}");
                    if let Some(id) = task_sources.remove(&join_error.id()) {
                        completed.insert(
                            id,
                            Err(SourceFailure {
                                kind: FailureKind::Permanent,
                                attempts: 0,
                                message: "source task terminated abnormally".to_string(),
                            }),
                        );
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        "Overall deadline of {}ms reached with {} sources still running",
                        self.settings.overall_deadline.as_millis(),
                        tasks.len()
                    );
                    break;
                }
            }
        }
        tasks.abort_all();

        completed
    }
}

/// Runs one source under the retry policy:
/// rate limiting backs off linearly (`hint or base_delay` × attempt), transient
/// failures wait a fixed delay, permanent failures stop immediately.
async fn fetch_with_retry(
    client: &dyn SourceClient,
    session: &HttpSession,
    keywords: &str,
    location: &str,
    settings: &FetchSettings,
) -> CallResult {
    let id = client.id();
    let max_attempts = settings.max_retries.max(1);
    let mut attempt = 1;

    loop {
        let call = client.fetch(session, keywords, location);
        let error = match tokio::time::timeout(settings.per_call_timeout, call).await {
            Ok(Ok(records)) => {
                debug!("{id} answered on attempt {attempt} with {} records", records.len());
                return Ok((records, attempt));
            }
            Ok(Err(e)) => e,
            Err(_) => SourceError::Transient(format!(
                "call timed out after {}ms",
                settings.per_call_timeout.as_millis()
            )),
        };

        let (kind, delay) = match &error {
            SourceError::Permanent(_) => (FailureKind::Permanent, None),
            SourceError::RateLimited { retry_after } => {
                let base = retry_after.unwrap_or(settings.base_delay);
                (FailureKind::RateLimited, Some(base * attempt))
            }
            SourceError::Transient(_) => (FailureKind::Transient, Some(settings.transient_delay)),
        };

        match delay {
            Some(delay) if attempt < max_attempts => {
                warn!(
                    "{id} attempt {attempt}/{max_attempts} failed: {error}; retrying after {}ms",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            _ => {
                return Err(SourceFailure {
                    kind,
                    attempts: attempt,
                    message: error.to_string(),
                });
            }
        }
    }
}
