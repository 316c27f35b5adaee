//! Source clients: the capability every job board implements.
//!
//! The orchestrator only sees `Arc<dyn SourceClient>` entries in a
//! `SourceRegistry`. Adding a board means registering another implementation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::config::Config;

pub mod boards;
pub mod http;
pub mod session;

pub use session::{HttpSession, ReqwestSessionProvider, SessionError, SessionProvider};

/// Loosely-typed record as returned by a source, before normalization.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Identifies which source produced a listing (e.g. `"linkedin"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceId {
    fn from(value: &str) -> Self {
        Self(value.trim().to_lowercase())
    }
}

impl From<String> for SourceId {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failure modes a source call can report. The variant decides the retry policy.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Network error or timeout. Retried after a fixed delay.
    #[error("transient source error: {0}")]
    Transient(String),

    /// Throttled by the source. Retried with linear backoff.
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Bad request or malformed response. Never retried.
    #[error("permanent source error: {0}")]
    Permanent(String),
}

/// Capability implemented once per job source.
#[async_trait]
pub trait SourceClient: Send + Sync {
    fn id(&self) -> SourceId;

    /// Fetches raw records for a query, in the source's response order.
    /// The caller bounds each call with its own timeout.
    async fn fetch(
        &self,
        session: &HttpSession,
        keywords: &str,
        location: &str,
    ) -> Result<Vec<RawRecord>, SourceError>;
}

/// Ordered set of configured sources.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    clients: Vec<Arc<dyn SourceClient>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a client. A later registration with the same id replaces the earlier one
    /// in place, keeping registry order stable.
    pub fn register(&mut self, client: Arc<dyn SourceClient>) {
        let id = client.id();
        match self.clients.iter().position(|c| c.id() == id) {
            Some(idx) => self.clients[idx] = client,
            None => self.clients.push(client),
        }
    }

    pub fn ids(&self) -> Vec<SourceId> {
        self.clients.iter().map(|c| c.id()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Returns the clients to run for a request. An empty selection means all of them;
    /// unknown ids are logged and ignored.
    pub fn select(&self, selection: &[SourceId]) -> Vec<Arc<dyn SourceClient>> {
        if selection.is_empty() {
            return self.clients.clone();
        }

        for id in selection {
            if !self.clients.iter().any(|c| &c.id() == id) {
                warn!("Unknown source requested: {id}");
            }
        }

        self.clients
            .iter()
            .filter(|c| selection.contains(&c.id()))
            .cloned()
            .collect()
    }

    /// Builds the registry of HTTP job boards enabled in configuration.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();
        for name in &config.job_sources {
            match boards::JobBoardClient::for_board(name, config) {
                Some(client) => registry.register(Arc::new(client)),
                None => warn!("Unknown source in JOB_SOURCES: {name}"),
            }
        }
        registry
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    //! Scripted in-memory sources for orchestrator and pipeline tests.

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// Replays a script of responses; the last entry repeats once the script runs out.
    pub struct ScriptedSource {
        id: SourceId,
        script: Mutex<VecDeque<Result<Vec<RawRecord>, SourceError>>>,
        delay: Duration,
        calls: AtomicU32,
    }

    impl ScriptedSource {
        pub fn new(id: &str, script: Vec<Result<Vec<RawRecord>, SourceError>>) -> Self {
            Self {
                id: SourceId::from(id),
                script: Mutex::new(script.into()),
                delay: Duration::ZERO,
                calls: AtomicU32::new(0),
            }
        }

        pub fn returning(id: &str, records: Vec<RawRecord>) -> Self {
            Self::new(id, vec![Ok(records)])
        }

        pub fn failing(id: &str, error: SourceError) -> Self {
            Self::new(id, vec![Err(error)])
        }

        /// Each call sleeps this long before answering.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SourceClient for ScriptedSource {
        fn id(&self) -> SourceId {
            self.id.clone()
        }

        async fn fetch(
            &self,
            _session: &HttpSession,
            _keywords: &str,
            _location: &str,
        ) -> Result<Vec<RawRecord>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap_or_else(|| Ok(vec![]))
            }
        }
    }

    /// Builds a raw record from a JSON object literal.
    pub fn record(value: serde_json::Value) -> RawRecord {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("record fixture must be an object, got {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::ScriptedSource;
    use super::*;

    #[test]
    fn test_source_id_is_normalized() {
        assert_eq!(SourceId::from(" LinkedIn "), SourceId::from("linkedin"));
        assert_eq!(SourceId::from("Indeed").as_str(), "indeed");
    }

    #[test]
    fn test_register_replaces_same_id_in_place() {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(ScriptedSource::returning("a", vec![])));
        registry.register(Arc::new(ScriptedSource::returning("b", vec![])));
        registry.register(Arc::new(ScriptedSource::returning("a", vec![])));
        assert_eq!(
            registry.ids(),
            vec![SourceId::from("a"), SourceId::from("b")]
        );
    }

    #[test]
    fn test_select_empty_means_all() {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(ScriptedSource::returning("a", vec![])));
        registry.register(Arc::new(ScriptedSource::returning("b", vec![])));
        assert_eq!(registry.select(&[]).len(), 2);
    }

    #[test]
    fn test_select_skips_unknown_ids() {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(ScriptedSource::returning("a", vec![])));
        let selected = registry.select(&[SourceId::from("a"), SourceId::from("zzz")]);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id(), SourceId::from("a"));
    }
}
