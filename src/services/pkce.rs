// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PKCE (RFC 7636) helpers for the Tesla SSO login.

use crate::error::AppError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};

/// Random bytes behind each verifier; encodes to 86 characters.
const VERIFIER_BYTES: usize = 64;
const STATE_BYTES: usize = 16;

fn random_urlsafe(len: usize) -> Result<String, AppError> {
    let mut bytes = vec![0u8; len];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG unavailable")))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Generate a new code verifier (86 URL-safe characters).
pub fn generate_code_verifier() -> Result<String, AppError> {
    random_urlsafe(VERIFIER_BYTES)
}

/// Generate a random state token for CSRF protection.
pub fn generate_state() -> Result<String, AppError> {
    random_urlsafe(STATE_BYTES)
}

/// `BASE64URL(SHA256(verifier))` without padding.
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Build the URL the user opens to log in.
pub fn authorize_url(
    auth_base_url: &str,
    client_id: &str,
    redirect_uri: &str,
    challenge: &str,
    state: &str,
) -> String {
    format!(
        "{}/oauth2/v3/authorize?\
         client_id={}&\
         code_challenge={}&\
         code_challenge_method=S256&\
         redirect_uri={}&\
         response_type=code&\
         scope=openid+email+offline_access&\
         state={}",
        auth_base_url.trim_end_matches('/'),
        urlencoding::encode(client_id),
        challenge,
        urlencoding::encode(redirect_uri),
        urlencoding::encode(state)
    )
}
