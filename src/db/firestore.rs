// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Credentials (Tesla OAuth tokens, one document per user)
//! - Login sessions (transient PKCE verifier + state)
//! - Vehicles (synced vehicle records, scoped to their owner)
//! - Vehicle snapshots (cached telemetry)

use crate::db::{collections, TokenStore, VehicleStore};
use crate::error::AppError;
use crate::models::vehicle::vehicle_doc_id;
use crate::models::{AccountCredential, LoginSession, Vehicle, VehicleSnapshot};
use async_trait::async_trait;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator does not accept real credentials, so skip the
        // credential lookup entirely when it is configured.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    async fn get_doc<T>(&self, collection: &str, id: &str) -> Result<Option<T>, AppError>
    where
        T: for<'de> serde::Deserialize<'de> + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn put_doc<T>(&self, collection: &str, id: String, doc: &T) -> Result<(), AppError>
    where
        T: serde::Serialize + for<'de> serde::Deserialize<'de> + Sync + Send,
    {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(doc)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn delete_doc(&self, collection: &str, id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collection)
            .document_id(id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

// ─── Credential Operations ───────────────────────────────────

#[async_trait]
impl TokenStore for FirestoreDb {
    async fn get_credential(&self, user_id: &str) -> Result<Option<AccountCredential>, AppError> {
        self.get_doc(collections::CREDENTIALS, user_id).await
    }

    async fn set_credential(&self, credential: &AccountCredential) -> Result<(), AppError> {
        self.put_doc(
            collections::CREDENTIALS,
            credential.user_id.clone(),
            credential,
        )
        .await
    }

    async fn delete_credential(&self, user_id: &str) -> Result<(), AppError> {
        self.delete_doc(collections::CREDENTIALS, user_id).await
    }

    async fn get_login_session(&self, user_id: &str) -> Result<Option<LoginSession>, AppError> {
        self.get_doc(collections::LOGIN_SESSIONS, user_id).await
    }

    async fn set_login_session(&self, session: &LoginSession) -> Result<(), AppError> {
        self.put_doc(collections::LOGIN_SESSIONS, session.user_id.clone(), session)
            .await
    }

    async fn delete_login_session(&self, user_id: &str) -> Result<(), AppError> {
        self.delete_doc(collections::LOGIN_SESSIONS, user_id).await
    }
}

// ─── Vehicle Operations ──────────────────────────────────────

#[async_trait]
impl VehicleStore for FirestoreDb {
    async fn find_vehicle(
        &self,
        vehicle_id: &str,
        owner_user_id: &str,
    ) -> Result<Option<Vehicle>, AppError> {
        let id = vehicle_doc_id(owner_user_id, vehicle_id.trim());
        self.get_doc(collections::VEHICLES, &id).await
    }

    async fn list_vehicles(&self, owner_user_id: &str) -> Result<Vec<Vehicle>, AppError> {
        let owner = owner_user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::VEHICLES)
            .filter(move |q| q.for_all([q.field("owner_user_id").eq(owner.clone())]))
            .order_by([("display_name", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_vehicle(&self, vehicle: &Vehicle) -> Result<(), AppError> {
        self.put_doc(collections::VEHICLES, vehicle.doc_id(), vehicle)
            .await
    }

    async fn get_snapshot(
        &self,
        vehicle_id: &str,
        owner_user_id: &str,
    ) -> Result<Option<VehicleSnapshot>, AppError> {
        let id = vehicle_doc_id(owner_user_id, vehicle_id.trim());
        self.get_doc(collections::VEHICLE_SNAPSHOTS, &id).await
    }

    async fn set_snapshot(&self, snapshot: &VehicleSnapshot) -> Result<(), AppError> {
        let id = vehicle_doc_id(&snapshot.owner_user_id, &snapshot.vehicle_id);
        self.put_doc(collections::VEHICLE_SNAPSHOTS, id, snapshot)
            .await
    }
}
