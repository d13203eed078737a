//! Storage layer: token store, vehicle store and the keyed cache.
//!
//! The services only see the traits below. `MemoryStore` backs tests and
//! single-instance deployments, `FirestoreDb` backs production.

pub mod cache;
pub mod firestore;
pub mod memory;

pub use cache::{KeyedCache, MemoryCache};
pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{AccountCredential, LoginSession, Vehicle, VehicleSnapshot};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const CREDENTIALS: &str = "credentials";
    pub const LOGIN_SESSIONS: &str = "login_sessions";
    pub const VEHICLES: &str = "vehicles";
    pub const VEHICLE_SNAPSHOTS: &str = "vehicle_snapshots";
}

/// Per-account token persistence. Every key is namespaced by `user_id`.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get_credential(&self, user_id: &str) -> Result<Option<AccountCredential>, AppError>;

    /// Replace all token fields for `credential.user_id`.
    async fn set_credential(&self, credential: &AccountCredential) -> Result<(), AppError>;

    async fn delete_credential(&self, user_id: &str) -> Result<(), AppError>;

    async fn get_login_session(&self, user_id: &str) -> Result<Option<LoginSession>, AppError>;

    async fn set_login_session(&self, session: &LoginSession) -> Result<(), AppError>;

    async fn delete_login_session(&self, user_id: &str) -> Result<(), AppError>;
}

/// Vehicle record store consumed by the sync layer.
#[async_trait]
pub trait VehicleStore: Send + Sync {
    /// Find a vehicle by Tesla ID, scoped to its owner.
    async fn find_vehicle(
        &self,
        vehicle_id: &str,
        owner_user_id: &str,
    ) -> Result<Option<Vehicle>, AppError>;

    async fn list_vehicles(&self, owner_user_id: &str) -> Result<Vec<Vehicle>, AppError>;

    /// Create or update, matching on `vehicle_id` + owner.
    async fn upsert_vehicle(&self, vehicle: &Vehicle) -> Result<(), AppError>;

    async fn get_snapshot(
        &self,
        vehicle_id: &str,
        owner_user_id: &str,
    ) -> Result<Option<VehicleSnapshot>, AppError>;

    async fn set_snapshot(&self, snapshot: &VehicleSnapshot) -> Result<(), AppError>;
}
