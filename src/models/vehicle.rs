// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Vehicle and telemetry snapshot models.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Vehicle state as reported by the owner API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VehicleState {
    Online,
    Asleep,
    Offline,
    #[default]
    #[serde(other)]
    Unknown,
}

impl VehicleState {
    /// Parse the `state` string of an API response.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "online" => VehicleState::Online,
            "asleep" => VehicleState::Asleep,
            "offline" => VehicleState::Offline,
            _ => VehicleState::Unknown,
        }
    }
}

/// Vehicle record owned by one local user.
///
/// Stored at: `vehicles/{owner_user_id}_{vehicle_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Tesla vehicle ID (the `id_s` string form)
    pub vehicle_id: String,
    /// Local user ID of the owner
    pub owner_user_id: String,
    pub vin: String,
    pub display_name: String,
    #[serde(default)]
    pub state: VehicleState,
    /// Comma separated option codes split into a list
    #[serde(default)]
    pub option_codes: Vec<String>,
    /// Last time the record was synced (Unix seconds)
    #[serde(default)]
    pub synced_at: i64,
}

impl Vehicle {
    /// Build a record from one entry of the vehicle list response.
    ///
    /// Returns `None` when the entry carries no usable vehicle ID.
    pub fn from_api(owner_user_id: &str, entry: &Value, now: i64) -> Option<Self> {
        let vehicle_id = entry
            .get("id_s")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| entry.get("id").and_then(Value::as_u64).map(|id| id.to_string()))?;
        let vehicle_id = vehicle_id.trim().to_string();
        if vehicle_id.is_empty() {
            return None;
        }

        let text = |key: &str| {
            entry
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string()
        };

        let option_codes = text("option_codes")
            .split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string)
            .collect();

        Some(Self {
            vehicle_id,
            owner_user_id: owner_user_id.to_string(),
            vin: text("vin"),
            display_name: text("display_name"),
            state: VehicleState::parse(&text("state")),
            option_codes,
            synced_at: now,
        })
    }

    /// Document ID namespaced by owner.
    pub fn doc_id(&self) -> String {
        vehicle_doc_id(&self.owner_user_id, &self.vehicle_id)
    }
}

/// Document ID for a vehicle or its snapshot.
pub fn vehicle_doc_id(owner_user_id: &str, vehicle_id: &str) -> String {
    format!("{}_{}", owner_user_id, vehicle_id)
}

/// Cached telemetry for a vehicle.
///
/// Stored at: `vehicle_snapshots/{owner_user_id}_{vehicle_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub vehicle_id: String,
    pub owner_user_id: String,
    /// Decoded `response` object of the telemetry call
    pub data: Value,
    /// When the snapshot was fetched (Unix seconds)
    pub updated_at: i64,
}

impl VehicleSnapshot {
    /// Whether the snapshot is older than `sync_interval` seconds.
    pub fn is_stale(&self, now: i64, sync_interval: i64) -> bool {
        now - self.updated_at > sync_interval
    }

    /// Look up a single field.
    ///
    /// Full `vehicle_data` snapshots nest charge fields under
    /// `charge_state`, so that object is searched second.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data
            .get(name)
            .or_else(|| self.data.get("charge_state").and_then(|c| c.get(name)))
            .filter(|v| !v.is_null())
    }
}
