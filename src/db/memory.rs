// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory token and vehicle store.

use crate::db::{TokenStore, VehicleStore};
use crate::error::AppError;
use crate::models::vehicle::vehicle_doc_id;
use crate::models::{AccountCredential, LoginSession, Vehicle, VehicleSnapshot};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// DashMap-backed store. Clones share the same maps.
#[derive(Clone, Default)]
pub struct MemoryStore {
    credentials: Arc<DashMap<String, AccountCredential>>,
    login_sessions: Arc<DashMap<String, LoginSession>>,
    vehicles: Arc<DashMap<String, Vehicle>>,
    snapshots: Arc<DashMap<String, VehicleSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn get_credential(&self, user_id: &str) -> Result<Option<AccountCredential>, AppError> {
        Ok(self.credentials.get(user_id).map(|c| c.clone()))
    }

    async fn set_credential(&self, credential: &AccountCredential) -> Result<(), AppError> {
        self.credentials
            .insert(credential.user_id.clone(), credential.clone());
        Ok(())
    }

    async fn delete_credential(&self, user_id: &str) -> Result<(), AppError> {
        self.credentials.remove(user_id);
        Ok(())
    }

    async fn get_login_session(&self, user_id: &str) -> Result<Option<LoginSession>, AppError> {
        Ok(self.login_sessions.get(user_id).map(|s| s.clone()))
    }

    async fn set_login_session(&self, session: &LoginSession) -> Result<(), AppError> {
        self.login_sessions
            .insert(session.user_id.clone(), session.clone());
        Ok(())
    }

    async fn delete_login_session(&self, user_id: &str) -> Result<(), AppError> {
        self.login_sessions.remove(user_id);
        Ok(())
    }
}

#[async_trait]
impl VehicleStore for MemoryStore {
    async fn find_vehicle(
        &self,
        vehicle_id: &str,
        owner_user_id: &str,
    ) -> Result<Option<Vehicle>, AppError> {
        let key = vehicle_doc_id(owner_user_id, vehicle_id.trim());
        Ok(self.vehicles.get(&key).map(|v| v.clone()))
    }

    async fn list_vehicles(&self, owner_user_id: &str) -> Result<Vec<Vehicle>, AppError> {
        let mut vehicles: Vec<Vehicle> = self
            .vehicles
            .iter()
            .filter(|v| v.owner_user_id == owner_user_id)
            .map(|v| v.clone())
            .collect();
        vehicles.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(vehicles)
    }

    async fn upsert_vehicle(&self, vehicle: &Vehicle) -> Result<(), AppError> {
        self.vehicles.insert(vehicle.doc_id(), vehicle.clone());
        Ok(())
    }

    async fn get_snapshot(
        &self,
        vehicle_id: &str,
        owner_user_id: &str,
    ) -> Result<Option<VehicleSnapshot>, AppError> {
        let key = vehicle_doc_id(owner_user_id, vehicle_id.trim());
        Ok(self.snapshots.get(&key).map(|s| s.clone()))
    }

    async fn set_snapshot(&self, snapshot: &VehicleSnapshot) -> Result<(), AppError> {
        let key = vehicle_doc_id(&snapshot.owner_user_id, &snapshot.vehicle_id);
        self.snapshots.insert(key, snapshot.clone());
        Ok(())
    }
}
