// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Vehicle sync: keeps stored vehicle records and telemetry snapshots
//! current.
//!
//! A snapshot older than the sync interval is refreshed by waking the
//! vehicle and fetching telemetry. If the vehicle will not wake, or the
//! fetch fails, the previous snapshot is served as-is.

use crate::db::VehicleStore;
use crate::error::AppError;
use crate::models::{Vehicle, VehicleSnapshot};
use crate::services::tesla::{TelemetrySource, TeslaClient};
use crate::services::wake::WakeController;
use crate::time_utils::now_epoch;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Result of a staleness check plus any resulting sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// No vehicle record for this owner; nothing was fetched.
    UnknownVehicle,
    /// Snapshot is within the sync interval.
    Fresh,
    /// A new snapshot was stored.
    Synced,
    /// The vehicle did not come online; the old snapshot stands.
    WakeFailed,
    /// Telemetry call returned no data; the old snapshot stands.
    FetchFailed,
}

/// Orchestrates wake + fetch + persist for vehicle telemetry.
#[derive(Clone)]
pub struct SyncOrchestrator {
    client: TeslaClient,
    wake: WakeController,
    store: Arc<dyn VehicleStore>,
    sync_interval: i64,
    source: TelemetrySource,
}

impl SyncOrchestrator {
    pub fn new(
        client: TeslaClient,
        wake: WakeController,
        store: Arc<dyn VehicleStore>,
        sync_interval: i64,
    ) -> Self {
        Self {
            client,
            wake,
            store,
            sync_interval,
            source: TelemetrySource::default(),
        }
    }

    /// Use a different telemetry call for snapshots.
    pub fn with_source(mut self, source: TelemetrySource) -> Self {
        self.source = source;
        self
    }

    // ─── Vehicle Records ─────────────────────────────────────────────────────

    /// Pull the account's vehicle list and upsert each entry.
    ///
    /// Returns how many records were written. A failed list call is logged
    /// and counts as zero; stored records are left alone.
    pub async fn sync_vehicles(&self, user_id: &str) -> Result<usize, AppError> {
        let response = self.client.list_vehicles(user_id).await?;

        let Some(entries) = response.response().and_then(Value::as_array) else {
            tracing::warn!(
                user_id,
                status = ?response.response_code,
                error = ?response.error(),
                "Vehicle list unavailable"
            );
            return Ok(0);
        };

        let now = now_epoch();
        let mut synced = 0;
        for entry in entries {
            let Some(vehicle) = Vehicle::from_api(user_id, entry, now) else {
                tracing::debug!(user_id, "Skipping vehicle entry without an ID");
                continue;
            };
            self.store.upsert_vehicle(&vehicle).await?;
            synced += 1;
        }

        tracing::info!(user_id, synced, "Vehicles synced");
        Ok(synced)
    }

    // ─── Snapshots ───────────────────────────────────────────────────────────

    /// Refresh the snapshot if it is missing or stale.
    pub async fn sync_if_stale(
        &self,
        vehicle_id: &str,
        user_id: &str,
    ) -> Result<SyncOutcome, AppError> {
        let (outcome, _) = self.snapshot(vehicle_id, user_id).await?;
        Ok(outcome)
    }

    /// Snapshot data, or one field of it, syncing first when stale.
    ///
    /// `None` means "not available": unknown vehicle, no snapshot yet, or
    /// the field is absent.
    pub async fn get_vehicle_data(
        &self,
        vehicle_id: &str,
        user_id: &str,
        field: Option<&str>,
    ) -> Result<Option<Value>, AppError> {
        let (_, snapshot) = self.snapshot(vehicle_id, user_id).await?;
        let Some(snapshot) = snapshot else {
            return Ok(None);
        };

        Ok(match field {
            Some(name) => snapshot.field(name).cloned(),
            None => Some(snapshot.data),
        })
    }

    /// Current snapshot, synced first when missing or stale, and how it
    /// was obtained.
    pub async fn snapshot(
        &self,
        vehicle_id: &str,
        user_id: &str,
    ) -> Result<(SyncOutcome, Option<VehicleSnapshot>), AppError> {
        if self.store.find_vehicle(vehicle_id, user_id).await?.is_none() {
            tracing::debug!(vehicle_id, user_id, "No vehicle record for owner");
            return Ok((SyncOutcome::UnknownVehicle, None));
        }

        let previous = self.store.get_snapshot(vehicle_id, user_id).await?;
        let now = now_epoch();

        if let Some(snapshot) = &previous {
            if !snapshot.is_stale(now, self.sync_interval) {
                return Ok((SyncOutcome::Fresh, previous));
            }
        }

        self.sync_snapshot(vehicle_id, user_id, previous).await
    }

    /// Wake the vehicle, fetch telemetry and store it.
    async fn sync_snapshot(
        &self,
        vehicle_id: &str,
        user_id: &str,
        previous: Option<VehicleSnapshot>,
    ) -> Result<(SyncOutcome, Option<VehicleSnapshot>), AppError> {
        if !self.wake.wakeup(vehicle_id, user_id).await {
            tracing::warn!(vehicle_id, user_id, "Serving previous snapshot, vehicle asleep");
            return Ok((SyncOutcome::WakeFailed, previous));
        }

        // Fetch uncached: the point of a sync is fresh data.
        let response = self
            .client
            .telemetry(vehicle_id, user_id, self.source, false)
            .await?;

        let Some(data) = response.response().cloned() else {
            tracing::warn!(
                vehicle_id,
                user_id,
                status = ?response.response_code,
                error = ?response.error(),
                "Telemetry fetch returned no data"
            );
            return Ok((SyncOutcome::FetchFailed, previous));
        };

        let updated_at = previous
            .as_ref()
            .map_or(now_epoch(), |p| now_epoch().max(p.updated_at));
        let snapshot = VehicleSnapshot {
            vehicle_id: vehicle_id.to_string(),
            owner_user_id: user_id.to_string(),
            data,
            updated_at,
        };
        self.store.set_snapshot(&snapshot).await?;

        tracing::info!(vehicle_id, user_id, updated_at, "Vehicle snapshot synced");
        Ok((SyncOutcome::Synced, Some(snapshot)))
    }

    // ─── Derived Accessors ───────────────────────────────────────────────────

    /// VIN from the vehicle record, falling back to the snapshot.
    pub async fn get_vin(&self, vehicle_id: &str, user_id: &str) -> Result<Option<String>, AppError> {
        if let Some(vehicle) = self.store.find_vehicle(vehicle_id, user_id).await? {
            if !vehicle.vin.is_empty() {
                return Ok(Some(vehicle.vin));
            }
        }

        Ok(self
            .get_vehicle_data(vehicle_id, user_id, Some("vin"))
            .await?
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|vin| !vin.is_empty()))
    }

    /// Usable battery level in percent.
    pub async fn get_battery_level(
        &self,
        vehicle_id: &str,
        user_id: &str,
    ) -> Result<Option<u64>, AppError> {
        let value = self
            .get_vehicle_data(vehicle_id, user_id, Some("usable_battery_level"))
            .await?;
        Ok(value.as_ref().and_then(battery_level))
    }

    /// Estimated range in miles.
    pub async fn get_estimated_range(
        &self,
        vehicle_id: &str,
        user_id: &str,
    ) -> Result<Option<i64>, AppError> {
        let value = self
            .get_vehicle_data(vehicle_id, user_id, Some("est_battery_range"))
            .await?;
        Ok(value.as_ref().and_then(range_miles))
    }

    /// Ideal range in miles.
    pub async fn get_ideal_range(
        &self,
        vehicle_id: &str,
        user_id: &str,
    ) -> Result<Option<i64>, AppError> {
        let value = self
            .get_vehicle_data(vehicle_id, user_id, Some("ideal_battery_range"))
            .await?;
        Ok(value.as_ref().and_then(range_miles))
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Integer part, made non-negative.
pub fn battery_level(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_i64() {
        return Some(n.unsigned_abs());
    }
    as_f64(value).map(|v| v.trunc().abs() as u64)
}

/// Floor of the value.
pub fn range_miles(value: &Value) -> Option<i64> {
    as_f64(value).map(|v| v.floor() as i64)
}
