//! HTTP plumbing shared by the job-board clients: one GET, classified into `SourceError`.

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use crate::sources::{HttpSession, SourceError};

/// Issues a GET and returns the decoded JSON body, or the classified failure.
pub async fn get_json(
    session: &HttpSession,
    url: &str,
    params: &[(&str, String)],
    bearer_token: Option<&str>,
) -> Result<Value, SourceError> {
    let mut request = session.client().get(url).query(params);
    if let Some(token) = bearer_token {
        request = request.bearer_auth(token);
    }

    let response = request.send().await.map_err(classify_transport)?;
    let status = response.status();

    if !status.is_success() {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.text().await.unwrap_or_default();
        warn!("{url} returned {status}: {}", truncate(&body, 200));
        return Err(classify_status(status, retry_after));
    }

    let body = response.text().await.map_err(classify_transport)?;
    serde_json::from_str(&body)
        .map_err(|e| SourceError::Permanent(format!("malformed response body: {e}")))
}

/// Maps a non-success status onto the retry taxonomy.
/// 429 is throttling, 408 and 5xx are worth another try, everything else is final.
pub fn classify_status(status: StatusCode, retry_after: Option<Duration>) -> SourceError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        SourceError::RateLimited { retry_after }
    } else if status == StatusCode::REQUEST_TIMEOUT || status.is_server_error() {
        SourceError::Transient(format!("upstream returned {status}"))
    } else {
        SourceError::Permanent(format!("upstream returned {status}"))
    }
}

fn classify_transport(err: reqwest::Error) -> SourceError {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        debug!("Transient transport error: {err}");
        SourceError::Transient(err.to_string())
    } else {
        SourceError::Permanent(err.to_string())
    }
}

/// Parses a `Retry-After` header given in delta-seconds. HTTP-date values are ignored.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Follows a dotted path (`"response.jobListings"`) down nested objects.
pub fn extract_envelope<'a>(body: &'a Value, path: &str) -> Option<&'a Vec<Value>> {
    path.split('.')
        .try_fold(body, |node, key| node.get(key))
        .and_then(Value::as_array)
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
