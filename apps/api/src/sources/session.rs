//! Network session shared read-only by every source call in one orchestrator run.
//!
//! A session is opened at the start of a run and dropped when the run ends.
//! Abandoned source tasks are aborted with it, so nothing outlives the run.

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

/// Could not establish a client/session. Counts as an infrastructure failure.
#[derive(Debug, Error)]
#[error("failed to open HTTP session: {0}")]
pub struct SessionError(String);

impl SessionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Cheap-to-clone handle over the run's HTTP client.
#[derive(Clone)]
pub struct HttpSession {
    client: Client,
}

impl HttpSession {
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Opens the session for a run. Swappable so infrastructure failures can be exercised.
pub trait SessionProvider: Send + Sync {
    fn open(&self, per_call_timeout: Duration) -> Result<HttpSession, SessionError>;
}

/// Default provider backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestSessionProvider {
    user_agent: String,
}

impl ReqwestSessionProvider {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }
}

impl SessionProvider for ReqwestSessionProvider {
    fn open(&self, per_call_timeout: Duration) -> Result<HttpSession, SessionError> {
        let client = Client::builder()
            .timeout(per_call_timeout)
            .user_agent(self.user_agent.as_str())
            .build()
            .map_err(|e| SessionError::new(e.to_string()))?;
        Ok(HttpSession { client })
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;

    /// Always refuses to open a session.
    pub struct BrokenSessionProvider;

    impl SessionProvider for BrokenSessionProvider {
        fn open(&self, _per_call_timeout: Duration) -> Result<HttpSession, SessionError> {
            Err(SessionError::new("no network available"))
        }
    }
}
