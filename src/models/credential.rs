// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth credential models for storage.

use serde::{Deserialize, Serialize};

/// Tesla tokens linked to one local user account.
///
/// Stored at: `credentials/{user_id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCredential {
    /// Local user ID (also used as document ID)
    pub user_id: String,
    /// Bearer token for owner API calls
    pub access_token: String,
    /// Refresh token for the SSO token endpoint
    pub refresh_token: String,
    /// When the tokens were issued (Unix seconds)
    pub created_at: i64,
    /// When the access token expires (Unix seconds, never before `created_at`)
    pub expires_at: i64,
}

impl AccountCredential {
    /// Build a credential from a token response issued at `now`.
    pub fn issued(
        user_id: &str,
        access_token: String,
        refresh_token: String,
        now: i64,
        expires_in: i64,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            access_token,
            refresh_token,
            created_at: now,
            expires_at: now.saturating_add(expires_in.max(0)),
        }
    }

    /// Seconds until the access token expires (negative once expired).
    pub fn expires_in(&self, now: i64) -> i64 {
        self.expires_at.saturating_sub(now)
    }
}

/// Transient PKCE state held between "start login" and the code exchange.
///
/// Stored at: `login_sessions/{user_id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginSession {
    /// Local user ID (also used as document ID)
    pub user_id: String,
    /// PKCE code verifier, sent with the authorization code
    pub code_verifier: String,
    /// CSRF state echoed back on the redirect URL
    pub state: String,
    /// When the login was started (Unix seconds)
    pub created_at: i64,
}
