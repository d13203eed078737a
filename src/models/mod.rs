// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod credential;
pub mod vehicle;

pub use credential::{AccountCredential, LoginSession};
pub use vehicle::{vehicle_doc_id, Vehicle, VehicleSnapshot, VehicleState};
