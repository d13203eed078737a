// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Vehicle, VehicleState};
use crate::services::sync::{battery_level, range_miles};
use crate::services::SyncOutcome;
use crate::time_utils::format_epoch_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/vehicles", get(list_vehicles))
        .route("/api/vehicles/{vehicle_id}", get(get_vehicle))
        .route("/api/vehicles/{vehicle_id}/wakeup", post(wakeup_vehicle))
}

// ─── Connection Status ───────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MeResponse {
    pub user_id: String,
    /// Whether a Tesla account is linked
    pub connected: bool,
    /// Access token expiry (RFC3339), if connected
    pub expires_at: Option<String>,
}

/// Get the user's Tesla connection status.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeResponse>> {
    let credential = state
        .tokens
        .credential(&user.user_id)
        .await?
        .filter(|c| !c.access_token.is_empty());

    Ok(Json(MeResponse {
        user_id: user.user_id,
        connected: credential.is_some(),
        expires_at: credential.and_then(|c| format_epoch_rfc3339(c.expires_at)),
    }))
}

// ─── Vehicles ────────────────────────────────────────────────

/// One vehicle in the list.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct VehicleSummary {
    pub vehicle_id: String,
    pub vin: String,
    pub display_name: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub state: VehicleState,
    pub synced_at: Option<String>,
}

impl From<Vehicle> for VehicleSummary {
    fn from(vehicle: Vehicle) -> Self {
        Self {
            synced_at: format_epoch_rfc3339(vehicle.synced_at),
            vehicle_id: vehicle.vehicle_id,
            vin: vehicle.vin,
            display_name: vehicle.display_name,
            state: vehicle.state,
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct VehiclesResponse {
    pub vehicles: Vec<VehicleSummary>,
}

/// Sync the vehicle list from Tesla, then return the stored records.
async fn list_vehicles(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<VehiclesResponse>> {
    if state.tokens.is_connected(&user.user_id).await? {
        state.sync.sync_vehicles(&user.user_id).await?;
    }

    let vehicles = state
        .vehicles
        .list_vehicles(&user.user_id)
        .await?
        .into_iter()
        .map(VehicleSummary::from)
        .collect();

    Ok(Json(VehiclesResponse { vehicles }))
}

/// Vehicle details with telemetry.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct VehicleDetailResponse {
    #[serde(flatten)]
    pub vehicle: VehicleSummary,
    /// Percent, absent when no telemetry is available
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub battery_level: Option<u64>,
    /// Miles
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub estimated_range: Option<i64>,
    /// Miles
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub ideal_range: Option<i64>,
    pub telemetry_updated_at: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub sync: SyncOutcome,
}

/// Get one vehicle, syncing telemetry first when stale.
async fn get_vehicle(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(vehicle_id): Path<String>,
) -> Result<Json<VehicleDetailResponse>> {
    let vehicle = state
        .vehicles
        .find_vehicle(&vehicle_id, &user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Vehicle {} not found", vehicle_id)))?;

    let (sync, snapshot) = state.sync.snapshot(&vehicle_id, &user.user_id).await?;

    let field = |name: &str| snapshot.as_ref().and_then(|s| s.field(name));

    Ok(Json(VehicleDetailResponse {
        battery_level: field("usable_battery_level").and_then(battery_level),
        estimated_range: field("est_battery_range").and_then(range_miles),
        ideal_range: field("ideal_battery_range").and_then(range_miles),
        telemetry_updated_at: snapshot
            .as_ref()
            .and_then(|s| format_epoch_rfc3339(s.updated_at)),
        sync,
        vehicle: vehicle.into(),
    }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct WakeupResponse {
    pub online: bool,
}

/// Wake a vehicle, polling until it reports online or attempts run out.
async fn wakeup_vehicle(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(vehicle_id): Path<String>,
) -> Result<Json<WakeupResponse>> {
    if state
        .vehicles
        .find_vehicle(&vehicle_id, &user.user_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(format!("Vehicle {} not found", vehicle_id)));
    }

    let online = state.wake.wakeup(&vehicle_id, &user.user_id).await;
    Ok(Json(WakeupResponse { online }))
}
