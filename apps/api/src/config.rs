use std::time::Duration;

use anyhow::{Context, Result};

use crate::pipeline::orchestrator::FetchSettings;

const DEFAULT_SOURCES: &str = "linkedin,indeed,glassdoor";
const LINKEDIN_API_URL: &str = "https://api.linkedin.com/v2/jobs";
const INDEED_API_URL: &str = "https://api.indeed.com/ads/apisearch";
const GLASSDOOR_API_URL: &str = "https://api.glassdoor.com/api/api.htm";

/// Endpoint and optional bearer token for one job board.
#[derive(Debug, Clone)]
pub struct BoardEndpoint {
    pub url: String,
    pub token: Option<String>,
}

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed numbers fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// Enabled boards, in registry order.
    pub job_sources: Vec<String>,
    pub fetch: FetchSettings,
    pub max_keywords_len: usize,
    pub user_agent: String,
    pub linkedin: BoardEndpoint,
    pub indeed: BoardEndpoint,
    pub glassdoor: BoardEndpoint,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = FetchSettings::default();
        let fetch = FetchSettings {
            per_call_timeout: env_millis("PER_CALL_TIMEOUT_MS", defaults.per_call_timeout)?,
            overall_deadline: env_millis("OVERALL_DEADLINE_MS", defaults.overall_deadline)?,
            max_retries: env_parse("MAX_RETRIES", defaults.max_retries)?.max(1),
            base_delay: env_millis("BASE_DELAY_MS", defaults.base_delay)?,
            transient_delay: env_millis("TRANSIENT_DELAY_MS", defaults.transient_delay)?,
        };

        Ok(Config {
            port: env_parse("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            job_sources: parse_source_list(
                &std::env::var("JOB_SOURCES").unwrap_or_else(|_| DEFAULT_SOURCES.to_string()),
            ),
            fetch,
            max_keywords_len: env_parse("MAX_KEYWORDS_LEN", 200)?,
            user_agent: std::env::var("HTTP_USER_AGENT")
                .unwrap_or_else(|_| format!("jobhunt-api/{}", env!("CARGO_PKG_VERSION"))),
            linkedin: board_endpoint("LINKEDIN", LINKEDIN_API_URL),
            indeed: board_endpoint("INDEED", INDEED_API_URL),
            glassdoor: board_endpoint("GLASSDOOR", GLASSDOOR_API_URL),
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        let endpoint = |url: &str| BoardEndpoint {
            url: url.to_string(),
            token: None,
        };
        Config {
            port: 0,
            rust_log: "debug".to_string(),
            job_sources: parse_source_list(DEFAULT_SOURCES),
            fetch: FetchSettings::default(),
            max_keywords_len: 200,
            user_agent: "jobhunt-api/test".to_string(),
            linkedin: endpoint(LINKEDIN_API_URL),
            indeed: endpoint(INDEED_API_URL),
            glassdoor: endpoint(GLASSDOOR_API_URL),
        }
    }
}

fn board_endpoint(prefix: &str, default_url: &str) -> BoardEndpoint {
    BoardEndpoint {
        url: std::env::var(format!("{prefix}_API_URL")).unwrap_or_else(|_| default_url.to_string()),
        token: std::env::var(format!("{prefix}_API_TOKEN"))
            .ok()
            .filter(|t| !t.trim().is_empty()),
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

fn env_millis(key: &str, default: Duration) -> Result<Duration> {
    let millis = env_parse(key, default.as_millis() as u64)?;
    Ok(Duration::from_millis(millis))
}

fn parse_source_list(raw: &str) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for name in raw.split(',').map(|s| s.trim().to_lowercase()) {
        if !name.is_empty() && !sources.contains(&name) {
            sources.push(name);
        }
    }
    sources
}
