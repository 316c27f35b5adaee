//! Axum route handlers for the job search API.

use std::time::Duration;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::pipeline::filter::FilterCriteria;
use crate::pipeline::ranking::UserProfile;
use crate::pipeline::{run_pipeline, PipelineOutput, PipelineRequest};
use crate::sources::SourceId;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub keywords: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub sources: Vec<SourceId>,
    #[serde(default)]
    pub criteria: FilterCriteria,
    #[serde(default)]
    pub profile: UserProfile,
    pub limit: Option<usize>,
    /// Can only tighten the configured value.
    pub per_call_timeout_ms: Option<u64>,
    /// Can only tighten the configured value.
    pub overall_deadline_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SourcesResponse {
    pub sources: Vec<SourceId>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/jobs/search
///
/// Runs the full pipeline and returns ranked listings plus per-source outcomes.
/// Source failures show up in `source_outcomes`, not as an error status.
pub async fn handle_search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<PipelineOutput>, AppError> {
    if request.per_call_timeout_ms == Some(0) || request.overall_deadline_ms == Some(0) {
        return Err(AppError::Validation(
            "timeouts must be greater than zero".to_string(),
        ));
    }

    let mut settings = state.config.fetch.clone();
    if let Some(ms) = request.per_call_timeout_ms {
        settings.per_call_timeout = settings.per_call_timeout.min(Duration::from_millis(ms));
    }
    if let Some(ms) = request.overall_deadline_ms {
        settings.overall_deadline = settings.overall_deadline.min(Duration::from_millis(ms));
    }

    let pipeline_request = PipelineRequest {
        keywords: request.keywords,
        location: request.location,
        sources: request.sources,
        criteria: request.criteria,
        profile: request.profile,
        limit: request.limit,
    };

    let output = run_pipeline(&state.orchestrator(settings), &pipeline_request).await?;
    Ok(Json(output))
}

/// GET /api/v1/sources
pub async fn handle_list_sources(State(state): State<AppState>) -> Json<SourcesResponse> {
    Json(SourcesResponse {
        sources: state.registry.ids(),
    })
}
