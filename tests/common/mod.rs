// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tesla_tracker::config::Config;
use tesla_tracker::db::{FirestoreDb, MemoryCache, MemoryStore, TokenStore, VehicleStore};
use tesla_tracker::error::TransportError;
use tesla_tracker::models::{AccountCredential, Vehicle, VehicleSnapshot, VehicleState};
use tesla_tracker::routes::create_router;
use tesla_tracker::services::{
    FixedCacheTime, Sleeper, Transport, TransportRequest, TransportResponse,
};
use tesla_tracker::time_utils::now_epoch;
use tesla_tracker::{AppState, Backends};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

// ─── Scripted Transport ──────────────────────────────────────────────────────

/// One scripted outcome.
#[derive(Clone, Debug)]
#[allow(dead_code)]
pub enum Scripted {
    Respond(u16, String),
    Fail,
}

#[allow(dead_code)]
impl Scripted {
    pub fn json(status: u16, body: Value) -> Self {
        Scripted::Respond(status, body.to_string())
    }
}

/// Transport that answers from per-URL scripts and records every call.
///
/// Each script is matched by a URL fragment; responses are consumed in
/// order and the last one repeats. Unmatched URLs get a 404.
#[derive(Default)]
#[allow(dead_code)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<(String, VecDeque<Scripted>)>>,
    calls: Mutex<Vec<TransportRequest>>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the responses for URLs containing `fragment`.
    pub fn on(&self, fragment: &str, responses: Vec<Scripted>) {
        self.routes
            .lock()
            .unwrap()
            .push((fragment.to_string(), responses.into_iter().collect()));
    }

    pub fn calls(&self) -> Vec<TransportRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls whose URL contains `fragment`.
    pub fn calls_to(&self, fragment: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.contains(fragment))
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.calls.lock().unwrap().push(request.clone());

        let outcome = {
            let mut routes = self.routes.lock().unwrap();
            routes
                .iter_mut()
                .find(|(fragment, _)| request.url.contains(fragment.as_str()))
                .and_then(|(_, queue)| {
                    if queue.len() > 1 {
                        queue.pop_front()
                    } else {
                        queue.front().cloned()
                    }
                })
        };

        match outcome {
            Some(Scripted::Respond(status, body)) => Ok(TransportResponse {
                status,
                headers: Default::default(),
                body,
            }),
            Some(Scripted::Fail) => Err(TransportError::Connect("scripted failure".to_string())),
            None => Ok(TransportResponse {
                status: 404,
                ..Default::default()
            }),
        }
    }
}

/// Sleeper that records requested delays and returns immediately.
#[derive(Default)]
#[allow(dead_code)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

#[allow(dead_code)]
impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

// ─── Harness ─────────────────────────────────────────────────────────────────

/// Fully wired services over scripted and in-memory collaborators.
#[allow(dead_code)]
pub struct TestHarness {
    pub state: Arc<AppState>,
    pub transport: Arc<ScriptedTransport>,
    pub sleeper: Arc<RecordingSleeper>,
    pub store: MemoryStore,
    pub cache: Arc<MemoryCache>,
}

#[allow(dead_code)]
impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(Config::test_default())
    }

    pub fn with_config(config: Config) -> Self {
        let transport = Arc::new(ScriptedTransport::new());
        let sleeper = Arc::new(RecordingSleeper::default());
        let store = MemoryStore::new();
        let cache = Arc::new(MemoryCache::new());

        let backends = Backends {
            transport: transport.clone(),
            cache: cache.clone(),
            token_store: Arc::new(store.clone()),
            vehicle_store: Arc::new(store.clone()),
            sleeper: sleeper.clone(),
            cache_time: Arc::new(FixedCacheTime(Duration::from_secs(60))),
        };

        Self {
            state: Arc::new(AppState::new(config, backends)),
            transport,
            sleeper,
            store,
            cache,
        }
    }

    pub fn app(&self) -> axum::Router {
        create_router(self.state.clone())
    }

    /// Store a credential whose access token expires in `expires_in` seconds.
    pub async fn connect(&self, user_id: &str, access_token: &str, expires_in: i64) {
        let credential = AccountCredential::issued(
            user_id,
            access_token.to_string(),
            format!("{}-refresh", access_token),
            now_epoch(),
            expires_in,
        );
        self.store.set_credential(&credential).await.unwrap();
    }

    pub async fn add_vehicle(&self, user_id: &str, vehicle_id: &str) {
        let vehicle = Vehicle {
            vehicle_id: vehicle_id.to_string(),
            owner_user_id: user_id.to_string(),
            vin: "5YJ3E1EA7KF000000".to_string(),
            display_name: "Sulaco".to_string(),
            state: VehicleState::Asleep,
            option_codes: vec![],
            synced_at: now_epoch(),
        };
        self.store.upsert_vehicle(&vehicle).await.unwrap();
    }

    pub async fn add_snapshot(&self, user_id: &str, vehicle_id: &str, data: Value, updated_at: i64) {
        let snapshot = VehicleSnapshot {
            vehicle_id: vehicle_id.to_string(),
            owner_user_id: user_id.to_string(),
            data,
            updated_at,
        };
        self.store.set_snapshot(&snapshot).await.unwrap();
    }
}

// ─── Canned Payloads ─────────────────────────────────────────────────────────

#[allow(dead_code)]
pub fn token_body(access_token: &str, expires_in: i64) -> Value {
    json!({
        "access_token": access_token,
        "refresh_token": format!("{}-refresh", access_token),
        "expires_in": expires_in,
        "token_type": "Bearer"
    })
}

#[allow(dead_code)]
pub fn wake_body(state: &str) -> Value {
    json!({"response": {"id_s": "33015387032628850", "state": state}})
}
