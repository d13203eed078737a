// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tesla account linking routes.
//!
//! Tesla's `ownerapi` client only redirects to a page that does not exist,
//! so the login is completed out-of-band: the user opens the authorize URL,
//! signs in, and pastes the final redirect URL back to the callback route.

use axum::{
    extract::{Json, State},
    routing::{get, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::services::{AuthResult, LoginUrl};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/tesla/login", get(login_start))
        .route("/auth/tesla/callback", post(login_callback))
        .route("/auth/logout", post(logout))
}

/// Start login - returns the URL the user must open.
async fn login_start(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<LoginUrl>> {
    let login = state.tokens.start_login(&user.user_id).await?;
    Ok(Json(login))
}

#[derive(Deserialize)]
pub struct CallbackRequest {
    /// Full URL the browser ended up on after signing in
    redirect_url: String,
}

/// Finish login from the pasted redirect URL.
async fn login_callback(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CallbackRequest>,
) -> Result<Json<AuthResult>> {
    let result = state
        .tokens
        .complete_login(&user.user_id, &body.redirect_url)
        .await?;

    if !result.authenticated {
        tracing::warn!(
            user_id = %user.user_id,
            status = ?result.response_code,
            "Tesla authorization code exchange failed"
        );
        return Err(AppError::TeslaApi(
            "Authorization code was not accepted".to_string(),
        ));
    }

    // Populate vehicle records right away; failure here is not fatal.
    if let Err(e) = state.sync.sync_vehicles(&user.user_id).await {
        tracing::warn!(user_id = %user.user_id, error = %e, "Initial vehicle sync failed");
    }

    Ok(Json(result))
}

#[derive(Serialize)]
pub struct LogoutResponse {
    disconnected: bool,
}

/// Disconnect the Tesla account.
async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<LogoutResponse>> {
    state.tokens.logout(&user.user_id).await?;
    Ok(Json(LogoutResponse { disconnected: true }))
}
