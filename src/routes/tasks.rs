// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Task handler routes for the external scheduler.
//!
//! These endpoints are called by a scheduler (cron, Cloud Scheduler), not
//! directly by users. They are guarded by `require_tasks_auth`.

use crate::error::Result;
use crate::services::SyncOutcome;
use crate::AppState;
use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Task handler routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/tasks/sync-vehicle", post(sync_vehicle))
}

/// Payload for a scheduled vehicle sync.
#[derive(Debug, Deserialize, Serialize)]
pub struct SyncVehiclePayload {
    pub vehicle_id: String,
    pub user_id: String,
}

#[derive(Serialize)]
pub struct SyncVehicleResponse {
    pub outcome: SyncOutcome,
}

/// Refresh one vehicle's snapshot if it is stale.
async fn sync_vehicle(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SyncVehiclePayload>,
) -> Result<Json<SyncVehicleResponse>> {
    tracing::info!(
        vehicle_id = %payload.vehicle_id,
        user_id = %payload.user_id,
        "Scheduled vehicle sync"
    );

    let outcome = state
        .sync
        .sync_if_stale(&payload.vehicle_id, &payload.user_id)
        .await?;

    tracing::info!(
        vehicle_id = %payload.vehicle_id,
        outcome = ?outcome,
        "Scheduled vehicle sync finished"
    );
    Ok(Json(SyncVehicleResponse { outcome }))
}
