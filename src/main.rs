// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tesla-Tracker API Server
//!
//! Links Tesla accounts through the owner API OAuth flow and keeps vehicle
//! records and telemetry snapshots in sync.

use std::sync::Arc;
use tesla_tracker::{
    config::Config,
    db::FirestoreDb,
    services::ReqwestTransport,
    AppState, Backends,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Tesla-Tracker API");

    let mut backends = Backends::in_memory(Arc::new(ReqwestTransport::new()));

    // Firestore when a project is configured, process memory otherwise
    match &config.gcp_project_id {
        Some(project_id) => {
            let db = FirestoreDb::new(project_id).await?;
            backends.token_store = Arc::new(db.clone());
            backends.vehicle_store = Arc::new(db);
        }
        None => {
            tracing::warn!("GCP_PROJECT_ID not set, tokens and vehicles are kept in memory");
        }
    }

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), backends));

    // Build router
    let app = tesla_tracker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tesla_tracker=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
