// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running
//! (`FIRESTORE_EMULATOR_HOST`); they are skipped otherwise.

use serde_json::json;
use tesla_tracker::db::{TokenStore, VehicleStore};
use tesla_tracker::models::{AccountCredential, LoginSession, Vehicle, VehicleSnapshot, VehicleState};
use tesla_tracker::time_utils::now_epoch;

mod common;
use common::test_db;

/// Generate a unique user ID for test isolation.
fn unique_user_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("user-{}", nanos)
}

fn test_vehicle(owner: &str, vehicle_id: &str, name: &str) -> Vehicle {
    Vehicle {
        vehicle_id: vehicle_id.to_string(),
        owner_user_id: owner.to_string(),
        vin: format!("VIN{}", vehicle_id),
        display_name: name.to_string(),
        state: VehicleState::Online,
        option_codes: vec!["MDL3".to_string()],
        synced_at: now_epoch(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TOKEN STORE
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_credential_lifecycle() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();

    assert!(db.get_credential(&user_id).await.unwrap().is_none());

    let credential = AccountCredential::issued(
        &user_id,
        "access".to_string(),
        "refresh".to_string(),
        now_epoch(),
        28_800,
    );
    db.set_credential(&credential).await.unwrap();
    assert_eq!(db.get_credential(&user_id).await.unwrap(), Some(credential));

    db.delete_credential(&user_id).await.unwrap();
    assert!(db.get_credential(&user_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_login_session_lifecycle() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();
    let session = LoginSession {
        user_id: user_id.clone(),
        code_verifier: "v".repeat(86),
        state: "state".to_string(),
        created_at: now_epoch(),
    };

    db.set_login_session(&session).await.unwrap();
    assert_eq!(db.get_login_session(&user_id).await.unwrap(), Some(session));

    db.delete_login_session(&user_id).await.unwrap();
    assert!(db.get_login_session(&user_id).await.unwrap().is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// VEHICLE STORE
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_vehicles_are_scoped_to_owner() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique_user_id();
    let other = unique_user_id();

    db.upsert_vehicle(&test_vehicle(&owner, "1", "Sulaco"))
        .await
        .unwrap();
    db.upsert_vehicle(&test_vehicle(&owner, "2", "Nostromo"))
        .await
        .unwrap();
    db.upsert_vehicle(&test_vehicle(&other, "1", "Narcissus"))
        .await
        .unwrap();

    let names: Vec<String> = db
        .list_vehicles(&owner)
        .await
        .unwrap()
        .into_iter()
        .map(|v| v.display_name)
        .collect();
    assert_eq!(names, vec!["Nostromo", "Sulaco"]);

    let found = db.find_vehicle("1", &other).await.unwrap().unwrap();
    assert_eq!(found.display_name, "Narcissus");

    // Upsert replaces in place.
    let mut renamed = test_vehicle(&owner, "1", "Sulaco II");
    renamed.state = VehicleState::Asleep;
    db.upsert_vehicle(&renamed).await.unwrap();
    assert_eq!(db.list_vehicles(&owner).await.unwrap().len(), 2);
    assert_eq!(
        db.find_vehicle("1", &owner).await.unwrap().unwrap().state,
        VehicleState::Asleep
    );
}

#[tokio::test]
async fn test_snapshot_round_trip() {
    require_emulator!();

    let db = test_db().await;
    let owner = unique_user_id();
    let snapshot = VehicleSnapshot {
        vehicle_id: "33015387032628850".to_string(),
        owner_user_id: owner.clone(),
        data: json!({"usable_battery_level": 72, "est_battery_range": 210.7}),
        updated_at: now_epoch(),
    };

    db.set_snapshot(&snapshot).await.unwrap();

    let loaded = db
        .get_snapshot("33015387032628850", &owner)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(loaded.updated_at, snapshot.updated_at);
    assert_eq!(loaded.field("usable_battery_level"), Some(&json!(72)));
}
