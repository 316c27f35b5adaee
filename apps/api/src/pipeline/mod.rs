//! Job search pipeline: fetch → normalize → dedupe → filter → rank.
//!
//! Only the fetch stage is concurrent. Every later stage is a synchronous pass
//! over a collection the run owns exclusively.

pub mod dedup;
pub mod filter;
pub mod handlers;
pub mod normalizer;
pub mod orchestrator;
pub mod ranking;
pub mod stats;

use std::collections::BTreeMap;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::pipeline::dedup::dedupe;
use crate::pipeline::filter::{filter_listings, FilterCriteria, FilterStats};
use crate::pipeline::orchestrator::{FetchError, FetchOrchestrator, SourceOutcome};
use crate::pipeline::ranking::{rank, top_n, RankedResult, UserProfile};
use crate::pipeline::stats::{summarize, ListingSummary};
use crate::sources::SourceId;

#[derive(Debug, Clone, Default)]
pub struct PipelineRequest {
    pub keywords: String,
    pub location: String,
    /// Empty means every registered source.
    pub sources: Vec<SourceId>,
    pub criteria: FilterCriteria,
    pub profile: UserProfile,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutput {
    pub run_id: Uuid,
    /// Ranked best-first; ties keep first-occurrence order.
    pub results: Vec<RankedResult>,
    pub source_outcomes: BTreeMap<SourceId, SourceOutcome>,
    pub filter_stats: FilterStats,
    /// Counts over the deduplicated listings, before filtering.
    pub summary: ListingSummary,
}

/// Runs one full pipeline. Fails only with `InvalidQuery` or `AllSourcesFailed`;
/// otherwise returns a possibly-empty ranking plus per-source diagnostics.
pub async fn run_pipeline(
    orchestrator: &FetchOrchestrator,
    request: &PipelineRequest,
) -> Result<PipelineOutput, FetchError> {
    let run_id = Uuid::new_v4();
    let span = info_span!("pipeline", %run_id, keywords = %request.keywords);

    async move {
        let fetched = orchestrator
            .fetch(&request.keywords, &request.location, &request.sources)
            .await?;

        let unique = dedupe(fetched.listings);
        let summary = summarize(&unique);
        let filtered = filter_listings(unique, &request.criteria, Utc::now());
        let results = match request.limit {
            Some(n) => top_n(filtered.kept, &request.profile, n),
            None => rank(filtered.kept, &request.profile),
        };

        info!("Pipeline produced {} ranked results", results.len());

        Ok(PipelineOutput {
            run_id,
            results,
            source_outcomes: fetched.source_outcomes,
            filter_stats: filtered.stats,
            summary,
        })
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::pipeline::orchestrator::{FailureKind, FetchSettings};
    use crate::sources::fakes::{record, ScriptedSource};
    use crate::sources::{ReqwestSessionProvider, SourceError, SourceRegistry};
    use serde_json::json;

    fn ml_engineer() -> serde_json::Value {
        json!({
            "title": "ML Engineer",
            "company": "Tech Corp",
            "location": "Remote",
            "skills": ["python"],
            "salary": 120000
        })
    }

    fn orchestrator(sources: Vec<ScriptedSource>) -> FetchOrchestrator {
        let mut registry = SourceRegistry::new();
        for source in sources {
            registry.register(Arc::new(source));
        }
        FetchOrchestrator::new(
            Arc::new(registry),
            Arc::new(ReqwestSessionProvider::new("jobhunt-api/test")),
            FetchSettings {
                overall_deadline: Duration::from_secs(5),
                ..FetchSettings::default()
            },
            200,
        )
    }

    fn three_sources() -> FetchOrchestrator {
        orchestrator(vec![
            ScriptedSource::returning("a", vec![record(ml_engineer())]),
            ScriptedSource::returning("b", vec![record(ml_engineer())]),
            ScriptedSource::returning("c", vec![]),
        ])
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_across_sources_ranked_once() {
        let request = PipelineRequest {
            keywords: "ml engineer".to_string(),
            criteria: FilterCriteria {
                remote_only: true,
                ..Default::default()
            },
            profile: UserProfile {
                skills: vec!["python".to_string()],
                remote_only: true,
                ..Default::default()
            },
            ..Default::default()
        };

        let output = run_pipeline(&three_sources(), &request).await.unwrap();
        assert_eq!(output.results.len(), 1);
        let top = &output.results[0];
        assert_eq!(top.listing.title, "ML Engineer");
        assert_eq!(top.listing.company, "Tech Corp");
        assert_eq!(top.listing.source_id, SourceId::from("a"));
        assert_eq!(top.score, 13.0);
        assert_eq!(output.summary.total, 1);
        assert_eq!(output.source_outcomes.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocklisted_company_yields_empty_result() {
        let request = PipelineRequest {
            keywords: "ml engineer".to_string(),
            criteria: FilterCriteria {
                company_blocklist: vec!["tech corp".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };

        let output = run_pipeline(&three_sources(), &request).await.unwrap();
        assert!(output.results.is_empty());
        assert_eq!(output.filter_stats.total_processed, 1);
        assert_eq!(output.filter_stats.kept, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failure_still_ranks_survivors() {
        let orch = orchestrator(vec![
            ScriptedSource::failing("down", SourceError::Permanent("410 Gone".to_string())),
            ScriptedSource::returning("up", vec![record(ml_engineer())]),
        ]);
        let request = PipelineRequest {
            keywords: "ml".to_string(),
            ..Default::default()
        };

        let output = run_pipeline(&orch, &request).await.unwrap();
        assert_eq!(output.results.len(), 1);
        match &output.source_outcomes[&SourceId::from("down")] {
            SourceOutcome::Failed(failure) => assert_eq!(failure.kind, FailureKind::Permanent),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_truncates_results() {
        let orch = orchestrator(vec![ScriptedSource::returning(
            "a",
            (0..5)
                .map(|i| record(json!({"title": format!("Job {i}"), "company": "Co"})))
                .collect(),
        )]);
        let request = PipelineRequest {
            keywords: "job".to_string(),
            limit: Some(2),
            ..Default::default()
        };

        let output = run_pipeline(&orch, &request).await.unwrap();
        let titles: Vec<&str> = output.results.iter().map(|r| r.listing.title.as_str()).collect();
        assert_eq!(titles, vec!["Job 0", "Job 1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_query_propagates() {
        let request = PipelineRequest::default();
        let err = run_pipeline(&three_sources(), &request).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidQuery(_)));
    }
}
