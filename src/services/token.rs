// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tesla OAuth token lifecycle.
//!
//! Handles:
//! - PKCE login start (authorization URL + stored verifier)
//! - Authorization code exchange
//! - Refresh before expiry, with a configurable buffer
//! - Best-effort revocation on logout

use crate::db::TokenStore;
use crate::error::AppError;
use crate::models::{AccountCredential, LoginSession};
use crate::services::api_cache::ApiCache;
use crate::services::pkce;
use crate::services::transport::{encode_form, Transport, TransportRequest};
use crate::time_utils::now_epoch;
use dashmap::DashMap;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;

/// Scope requested on refresh.
pub const REFRESH_SCOPE: &str = "openid email offline_access";

/// Shared refresh locks type, one mutex per user.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Endpoints and tunables for the token flows.
#[derive(Debug, Clone)]
pub struct OAuthSettings {
    pub client_id: String,
    pub auth_base_url: String,
    pub api_base_url: String,
    pub redirect_uri: String,
    /// Refresh when fewer than this many seconds remain.
    pub expire_buffer_secs: i64,
    pub timeout: Duration,
}

impl OAuthSettings {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            client_id: config.tesla_client_id.clone(),
            auth_base_url: config.auth_base_url.trim_end_matches('/').to_string(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            redirect_uri: config.redirect_uri.clone(),
            expire_buffer_secs: config.token_expire_buffer_secs,
            timeout: Duration::from_secs(config.http_timeout_secs),
        }
    }

    fn token_url(&self) -> String {
        format!("{}/oauth2/v3/token", self.auth_base_url)
    }

    fn revoke_url(&self) -> String {
        format!("{}/oauth/revoke", self.api_base_url)
    }
}

/// Outcome of a token exchange. Never an error for remote rejections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthResult {
    pub authenticated: bool,
    /// New access token (not serialized into API responses).
    #[serde(skip)]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_code: Option<u16>,
}

impl AuthResult {
    fn success(token: String, response_code: u16) -> Self {
        Self {
            authenticated: true,
            token: Some(token),
            response_code: Some(response_code),
        }
    }

    fn failure(response_code: Option<u16>) -> Self {
        Self {
            authenticated: false,
            token: None,
            response_code,
        }
    }
}

/// Authorization URL handed to the user, who completes login in a browser.
#[derive(Debug, Clone, Serialize)]
pub struct LoginUrl {
    pub authorize_url: String,
    pub state: String,
}

/// Token response from the SSO token endpoint.
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
}

/// Manages per-user Tesla tokens.
#[derive(Clone)]
pub struct TokenManager {
    transport: Arc<dyn Transport>,
    store: Arc<dyn TokenStore>,
    api_cache: ApiCache,
    settings: OAuthSettings,
    refresh_locks: RefreshLocks,
}

impl TokenManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn TokenStore>,
        api_cache: ApiCache,
        settings: OAuthSettings,
    ) -> Self {
        Self {
            transport,
            store,
            api_cache,
            settings,
            refresh_locks: Arc::new(DashMap::new()),
        }
    }

    /// Stored credential for a user, if connected.
    pub async fn credential(&self, user_id: &str) -> Result<Option<AccountCredential>, AppError> {
        self.store.get_credential(user_id).await
    }

    /// Whether the user has linked a Tesla account.
    pub async fn is_connected(&self, user_id: &str) -> Result<bool, AppError> {
        Ok(self
            .credential(user_id)
            .await?
            .is_some_and(|c| !c.access_token.is_empty()))
    }

    // ─── Token Retrieval ─────────────────────────────────────────────────────

    /// Get an access token for the user, refreshing first if it is missing
    /// or expires within the buffer.
    ///
    /// Returns `Ok(None)` when no usable token can be produced; callers
    /// proceed unauthenticated and let the API reject the request.
    pub async fn get_token(&self, user_id: &str) -> Result<Option<String>, AppError> {
        if let Some(token) = self.valid_token(user_id).await? {
            return Ok(Some(token));
        }

        // Only one task per user performs the refresh; the rest wait here.
        let lock = self.lock_for(user_id);
        let result = {
            let _guard = lock.lock().await;
            self.refresh_if_still_needed(user_id).await
        };
        self.release_lock(user_id, lock);
        result
    }

    async fn refresh_if_still_needed(&self, user_id: &str) -> Result<Option<String>, AppError> {
        // Another task may have refreshed while we were waiting.
        if let Some(token) = self.valid_token(user_id).await? {
            return Ok(Some(token));
        }

        tracing::info!(user_id, "Access token missing or expiring, refreshing");
        let result = self.refresh_unlocked(user_id).await?;
        Ok(result.token)
    }

    fn lock_for(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.refresh_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop our handle and forget the user's lock once nobody else holds it.
    fn release_lock(&self, user_id: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.refresh_locks
            .remove_if(user_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Number of users with a refresh in flight or queued.
    pub fn refresh_locks_in_use(&self) -> usize {
        self.refresh_locks.len()
    }

    async fn valid_token(&self, user_id: &str) -> Result<Option<String>, AppError> {
        let Some(cred) = self.store.get_credential(user_id).await? else {
            return Ok(None);
        };
        if cred.access_token.is_empty() {
            return Ok(None);
        }
        if cred.expires_in(now_epoch()) < self.settings.expire_buffer_secs {
            return Ok(None);
        }
        Ok(Some(cred.access_token))
    }

    // ─── Login (Authorization Code + PKCE) ───────────────────────────────────

    /// Start an interactive login: store a fresh verifier and state, and
    /// return the authorization URL for the user to open.
    pub async fn start_login(&self, user_id: &str) -> Result<LoginUrl, AppError> {
        let code_verifier = pkce::generate_code_verifier()?;
        let state = pkce::generate_state()?;
        let challenge = pkce::code_challenge(&code_verifier);

        self.store
            .set_login_session(&LoginSession {
                user_id: user_id.to_string(),
                code_verifier,
                state: state.clone(),
                created_at: now_epoch(),
            })
            .await?;

        let authorize_url = pkce::authorize_url(
            &self.settings.auth_base_url,
            &self.settings.client_id,
            &self.settings.redirect_uri,
            &challenge,
            &state,
        );

        tracing::info!(user_id, "Tesla login started");
        Ok(LoginUrl {
            authorize_url,
            state,
        })
    }

    /// Finish a login from the redirect URL the user pasted back.
    pub async fn complete_login(
        &self,
        user_id: &str,
        redirect_url: &str,
    ) -> Result<AuthResult, AppError> {
        let (code, state) = parse_redirect(redirect_url)?;

        let session = self
            .store
            .get_login_session(user_id)
            .await?
            .ok_or_else(|| AppError::BadRequest("No login in progress".to_string()))?;

        let Some(state) = state else {
            tracing::warn!(user_id, "Login callback without OAuth state");
            return Err(AppError::BadRequest("Missing state".to_string()));
        };
        if !bool::from(state.as_bytes().ct_eq(session.state.as_bytes())) {
            tracing::warn!(user_id, "OAuth state mismatch on login callback");
            return Err(AppError::BadRequest("State mismatch".to_string()));
        }

        self.authenticate(user_id, &code).await
    }

    /// Exchange an authorization code for tokens using the stored verifier.
    pub async fn authenticate(&self, user_id: &str, code: &str) -> Result<AuthResult, AppError> {
        let Some(session) = self.store.get_login_session(user_id).await? else {
            tracing::warn!(user_id, "Authorization code received without a login session");
            return Ok(AuthResult::failure(None));
        };

        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", self.settings.client_id.as_str()),
            ("code", code),
            ("code_verifier", session.code_verifier.as_str()),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
        ];

        let result = self.exchange(user_id, &form).await?;

        // The verifier is single use whatever the outcome.
        self.store.delete_login_session(user_id).await?;

        if result.authenticated {
            tracing::info!(user_id, "Tesla account connected");
        }
        Ok(result)
    }

    // ─── Refresh ─────────────────────────────────────────────────────────────

    /// Exchange the stored refresh token for new tokens.
    pub async fn refresh(&self, user_id: &str) -> Result<AuthResult, AppError> {
        let lock = self.lock_for(user_id);
        let result = {
            let _guard = lock.lock().await;
            self.refresh_unlocked(user_id).await
        };
        self.release_lock(user_id, lock);
        result
    }

    async fn refresh_unlocked(&self, user_id: &str) -> Result<AuthResult, AppError> {
        let refresh_token = match self.store.get_credential(user_id).await? {
            Some(cred) if !cred.refresh_token.is_empty() => cred.refresh_token,
            _ => {
                tracing::debug!(user_id, "No refresh token stored");
                return Ok(AuthResult::failure(None));
            }
        };

        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.settings.client_id.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("scope", REFRESH_SCOPE),
        ];

        let result = self.exchange(user_id, &form).await?;
        if result.authenticated {
            tracing::info!(user_id, "Token refreshed");
        } else {
            tracing::warn!(user_id, status = ?result.response_code, "Token refresh rejected");
        }
        Ok(result)
    }

    /// POST a grant to the token endpoint and persist a successful result.
    ///
    /// Nothing is written unless the response is a 200 carrying all three
    /// token fields.
    async fn exchange(&self, user_id: &str, form: &[(&str, &str)]) -> Result<AuthResult, AppError> {
        let request = TransportRequest {
            method: Method::POST,
            url: self.settings.token_url(),
            headers: sso_headers(),
            body: Some(encode_form(form)),
            timeout: self.settings.timeout,
        };

        let response = match self.transport.send(request).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Token request failed");
                return Ok(AuthResult::failure(None));
            }
        };

        if response.status != 200 {
            return Ok(AuthResult::failure(Some(response.status)));
        }

        let tokens: TokenResponse = match serde_json::from_str(&response.body) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Token response missing fields");
                return Ok(AuthResult::failure(Some(response.status)));
            }
        };

        let credential = AccountCredential::issued(
            user_id,
            tokens.access_token.clone(),
            tokens.refresh_token,
            now_epoch(),
            tokens.expires_in,
        );
        self.store.set_credential(&credential).await?;
        self.api_cache.invalidate().await;

        Ok(AuthResult::success(tokens.access_token, response.status))
    }

    // ─── Logout ──────────────────────────────────────────────────────────────

    /// Best-effort remote revocation. Failures are logged and ignored.
    pub async fn revoke(&self, token: &str) {
        let mut headers = BTreeMap::new();
        headers.insert(
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );

        let request = TransportRequest {
            method: Method::POST,
            url: self.settings.revoke_url(),
            headers,
            body: Some(encode_form(&[("token", token)])),
            timeout: self.settings.timeout,
        };

        match self.transport.send(request).await {
            Ok(r) if (200..300).contains(&r.status) => tracing::info!("Tesla token revoked"),
            Ok(r) => tracing::warn!(status = r.status, "Token revocation rejected (ignored)"),
            Err(e) => tracing::warn!(error = %e, "Token revocation failed (ignored)"),
        }
    }

    /// Disconnect the user: revoke remotely, then forget everything local.
    pub async fn logout(&self, user_id: &str) -> Result<(), AppError> {
        if let Some(cred) = self.store.get_credential(user_id).await? {
            if !cred.access_token.is_empty() {
                self.revoke(&cred.access_token).await;
            }
        }

        self.store.delete_credential(user_id).await?;
        self.store.delete_login_session(user_id).await?;
        self.api_cache.invalidate().await;

        tracing::info!(user_id, "Tesla account disconnected");
        Ok(())
    }
}

/// Headers the SSO endpoint expects from the mobile app.
fn sso_headers() -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert(
        "Content-Type".to_string(),
        "application/x-www-form-urlencoded".to_string(),
    );
    headers.insert("Accept".to_string(), "application/json".to_string());
    headers.insert("User-Agent".to_string(), String::new());
    headers.insert("x-tesla-user-agent".to_string(), String::new());
    headers.insert(
        "X-Requested-With".to_string(),
        "com.teslamotors.tesla".to_string(),
    );
    headers
}

/// Pull `code` (required) and `state` (optional) out of a redirect URL.
fn parse_redirect(redirect_url: &str) -> Result<(String, Option<String>), AppError> {
    let url = reqwest::Url::parse(redirect_url.trim())
        .map_err(|e| AppError::BadRequest(format!("Invalid redirect URL: {}", e)))?;

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            _ => {}
        }
    }

    let code = code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Redirect URL has no code".to_string()))?;
    Ok((code, state))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_redirect() {
        let (code, state) = parse_redirect(
            "https://auth.tesla.com/void/callback?code=abc123&state=xyz&issuer=https%3A%2F%2Fauth.tesla.com",
        )
        .unwrap();
        assert_eq!(code, "abc123");
        assert_eq!(state.as_deref(), Some("xyz"));
    }

    #[test]
    fn test_parse_redirect_rejects_missing_code() {
        assert!(matches!(
            parse_redirect("https://auth.tesla.com/void/callback?state=xyz"),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            parse_redirect("not a url"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_sso_headers_are_verbatim() {
        let headers = sso_headers();
        assert_eq!(headers["User-Agent"], "");
        assert_eq!(headers["x-tesla-user-agent"], "");
        assert_eq!(headers["X-Requested-With"], "com.teslamotors.tesla");
    }
}
