// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Scheduler authentication for `/tasks/*` routes.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Header carrying the shared secret.
pub const TASKS_SECRET_HEADER: &str = "x-tasks-secret";

/// Require the shared scheduler secret on `/tasks/*` routes.
pub async fn require_tasks_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let presented = request
        .headers()
        .get(TASKS_SECRET_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();

    if !secret_matches(presented, &state.config.tasks_shared_secret) {
        tracing::warn!(
            path = %request.uri().path(),
            "Blocked tasks request with missing or invalid secret"
        );
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}

fn secret_matches(presented: &str, expected: &str) -> bool {
    !expected.is_empty() && bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}
