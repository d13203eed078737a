// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wake-up polling.

use crate::models::VehicleState;
use crate::services::backoff::Sleeper;
use crate::services::tesla::{ApiResponse, TeslaClient};
use std::sync::Arc;
use std::time::Duration;

/// Repeatedly asks a vehicle to wake up until it reports online.
#[derive(Clone)]
pub struct WakeController {
    client: TeslaClient,
    sleeper: Arc<dyn Sleeper>,
    max_tries: u32,
    delay: Duration,
}

impl WakeController {
    pub fn new(
        client: TeslaClient,
        sleeper: Arc<dyn Sleeper>,
        max_tries: u32,
        delay: Duration,
    ) -> Self {
        Self {
            client,
            sleeper,
            max_tries: max_tries.max(1),
            delay,
        }
    }

    /// Try to bring the vehicle online.
    ///
    /// Returns `true` as soon as a wake-up response reports `online`, or
    /// `false` once `max_tries` calls have been made. There is no delay
    /// after the final attempt.
    pub async fn wakeup(&self, vehicle_id: &str, user_id: &str) -> bool {
        for attempt in 1..=self.max_tries {
            let state = match self.client.wake_up(vehicle_id, user_id).await {
                Ok(response) => reported_state(&response),
                Err(e) => {
                    tracing::warn!(vehicle_id, attempt, error = %e, "Wake-up request failed");
                    VehicleState::Unknown
                }
            };

            if state == VehicleState::Online {
                tracing::info!(vehicle_id, attempt, "Vehicle is online");
                return true;
            }

            tracing::debug!(vehicle_id, attempt, state = ?state, "Vehicle not online yet");
            if attempt < self.max_tries {
                self.sleeper.sleep(self.delay).await;
            }
        }

        tracing::warn!(
            vehicle_id,
            max_tries = self.max_tries,
            "Vehicle did not wake up"
        );
        false
    }
}

/// `response.state` from a wake-up call; anything missing is unknown.
fn reported_state(response: &ApiResponse) -> VehicleState {
    response
        .response()
        .and_then(|r| r.get("state"))
        .and_then(|s| s.as_str())
        .map(VehicleState::parse)
        .unwrap_or_default()
}
