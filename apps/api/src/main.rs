mod config;
mod errors;
mod models;
mod pipeline;
mod routes;
mod sources;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::routes::build_router;
use crate::sources::{ReqwestSessionProvider, SourceRegistry};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed numeric env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting JobHunt API v{}", env!("CARGO_PKG_VERSION"));

    let registry = SourceRegistry::from_config(&config);
    if registry.is_empty() {
        warn!("No job sources enabled; searches will return empty results");
    } else {
        let ids: Vec<String> = registry.ids().iter().map(ToString::to_string).collect();
        info!("Job sources: {}", ids.join(", "));
    }
    info!(
        "Fetch tuning: per_call_timeout={}ms overall_deadline={}ms max_retries={}",
        config.fetch.per_call_timeout.as_millis(),
        config.fetch.overall_deadline.as_millis(),
        config.fetch.max_retries
    );

    let state = AppState {
        sessions: Arc::new(ReqwestSessionProvider::new(config.user_agent.clone())),
        registry: Arc::new(registry),
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
