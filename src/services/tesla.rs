// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tesla owner API client.
//!
//! Handles:
//! - Endpoint normalization against the configured base URL
//! - Bearer token injection (refreshing through `TokenManager`)
//! - Retry with linear backoff on transport failures only
//! - Caching of successful idempotent responses
//!
//! HTTP error statuses are never turned into `Err`; callers inspect
//! `response_code` and `data` on the returned `ApiResponse`.

use crate::error::AppError;
use crate::services::api_cache::ApiCache;
use crate::services::backoff::{RetryPolicy, Sleeper};
use crate::services::token::TokenManager;
use crate::services::transport::{encode_form, Transport, TransportRequest, TransportResponse};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// How the caller wants the body returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReturnFormat {
    #[default]
    Json,
    /// Also return the raw body and headers.
    Raw,
}

/// Per-call options. Defaults: token required, response cached with the
/// policy TTL, JSON decoded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestParams {
    pub user_id: Option<String>,
    /// JSON body
    pub body: Option<Value>,
    /// Form body; takes precedence over `body`
    pub form: Option<Vec<(String, String)>>,
    pub require_token: bool,
    pub cache_response: bool,
    /// Cache TTL in seconds; 0 defers to the cache-time policy
    pub cache_time: u64,
    #[serde(rename = "return")]
    pub return_format: ReturnFormat,
}

impl Default for RequestParams {
    fn default() -> Self {
        Self {
            user_id: None,
            body: None,
            form: None,
            require_token: true,
            cache_response: true,
            cache_time: 0,
            return_format: ReturnFormat::Json,
        }
    }
}

impl RequestParams {
    pub fn for_user(user_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            ..Self::default()
        }
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn form<K: Into<String>, V: Into<String>>(mut self, pairs: Vec<(K, V)>) -> Self {
        self.form = Some(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn without_token(mut self) -> Self {
        self.require_token = false;
        self
    }

    pub fn no_cache(mut self) -> Self {
        self.cache_response = false;
        self
    }

    pub fn cache_for(mut self, secs: u64) -> Self {
        self.cache_time = secs;
        self
    }

    pub fn raw(mut self) -> Self {
        self.return_format = ReturnFormat::Raw;
        self
    }
}

/// Transport-level arguments merged into the final request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestArgs {
    pub headers: BTreeMap<String, String>,
    /// Overrides the client default timeout
    pub timeout_secs: Option<u64>,
}

/// Structured result of every API call.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    /// Decoded JSON body; `None` for empty, undecodable or failed responses
    pub data: Option<Value>,
    pub cache_hit: bool,
    pub endpoint: String,
    pub method: String,
    pub params: RequestParams,
    /// Final request args (the bearer token is redacted)
    pub request_args: RequestArgs,
    /// `None` when no HTTP response was received
    pub response_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_headers: Option<BTreeMap<String, String>>,
}

/// Error details carried in a failed response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiErrorInfo {
    pub code: String,
    pub message: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        matches!(self.response_code, Some(code) if (200..300).contains(&code))
    }

    /// The `response` member that owner API payloads are wrapped in.
    pub fn response(&self) -> Option<&Value> {
        self.data.as_ref()?.get("response").filter(|v| !v.is_null())
    }

    /// Error details, if the call failed.
    pub fn error(&self) -> Option<ApiErrorInfo> {
        let text = |v: &Value, key: &str| v.get(key).and_then(Value::as_str).map(str::to_string);

        if let Some(data) = &self.data {
            if let Some(code) = text(data, "error") {
                return Some(ApiErrorInfo {
                    code,
                    message: text(data, "error_description").unwrap_or_default(),
                });
            }
            if let Some(code) = text(data, "error_code") {
                return Some(ApiErrorInfo {
                    code,
                    message: text(data, "message").unwrap_or_default(),
                });
            }
        }

        match self.response_code {
            Some(_) if self.is_success() => None,
            Some(code) => Some(ApiErrorInfo {
                code: format!("http_{}", code),
                message: String::new(),
            }),
            None => Some(ApiErrorInfo {
                code: "transport_error".to_string(),
                message: "No response received".to_string(),
            }),
        }
    }
}

/// Which telemetry call backs a vehicle snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TelemetrySource {
    #[default]
    ChargeState,
    VehicleData,
}

/// Tesla owner API client.
#[derive(Clone)]
pub struct TeslaClient {
    transport: Arc<dyn Transport>,
    cache: ApiCache,
    tokens: TokenManager,
    retry: Arc<dyn RetryPolicy>,
    sleeper: Arc<dyn Sleeper>,
    base_url: String,
    timeout: Duration,
}

impl TeslaClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: ApiCache,
        tokens: TokenManager,
        retry: Arc<dyn RetryPolicy>,
        sleeper: Arc<dyn Sleeper>,
        base_url: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            cache,
            tokens,
            retry,
            sleeper,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Token lifecycle (authenticate, refresh, revoke, logout).
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn cache(&self) -> &ApiCache {
        &self.cache
    }

    /// Send a request to the API.
    ///
    /// Fails only for a malformed endpoint; everything else is reported in
    /// the returned `ApiResponse`.
    pub async fn request(
        &self,
        endpoint: &str,
        method: Method,
        params: RequestParams,
        args: RequestArgs,
    ) -> Result<ApiResponse, AppError> {
        let endpoint = self.normalize_endpoint(endpoint)?;

        let mut request_args = RequestArgs {
            headers: BTreeMap::new(),
            timeout_secs: args.timeout_secs,
        };
        request_args
            .headers
            .insert("Accept".to_string(), "application/json".to_string());

        let body = if let Some(form) = &params.form {
            request_args.headers.insert(
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            );
            Some(encode_form(form))
        } else if let Some(json) = params.body.as_ref().filter(|b| b.is_object() || b.is_array())
        {
            request_args
                .headers
                .insert("Content-Type".to_string(), "application/json".to_string());
            Some(json.to_string())
        } else {
            None
        };

        // Caller headers win over the defaults above.
        request_args.headers.extend(args.headers);

        let caching_enabled = params.cache_response && is_cacheable(&method);

        if params.require_token {
            let user_id = params.user_id.as_deref().unwrap_or_default();
            match self.tokens.get_token(user_id).await {
                Ok(Some(token)) => {
                    request_args
                        .headers
                        .insert("Authorization".to_string(), format!("Bearer {}", token));
                }
                Ok(None) => {
                    tracing::debug!(user_id, "No token available, sending unauthenticated");
                }
                Err(e) => {
                    tracing::warn!(user_id, error = %e, "Token lookup failed, sending unauthenticated");
                }
            }
        }

        let mut api_response = ApiResponse {
            data: None,
            cache_hit: false,
            endpoint: endpoint.clone(),
            method: method.to_string(),
            params: params.clone(),
            request_args: redacted(&request_args),
            response_code: None,
            raw_body: None,
            raw_headers: None,
        };

        let cache_key = if caching_enabled {
            let epoch = self.cache.epoch().await;
            let key = ApiCache::key(&endpoint, method.as_str(), &params, &request_args, epoch);
            if let Some(cached) = self.cache.get(&key).await {
                tracing::debug!(endpoint = %endpoint, "API cache hit");
                api_response.data = Some(cached);
                api_response.cache_hit = true;
                return Ok(api_response);
            }
            Some(key)
        } else {
            None
        };

        let timeout = request_args
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.timeout);
        let request = TransportRequest {
            method: method.clone(),
            url: endpoint.clone(),
            headers: request_args.headers.clone(),
            body,
            timeout,
        };

        let Some(response) = self.send_with_retry(request).await else {
            return Ok(api_response);
        };

        api_response.response_code = Some(response.status);
        api_response.data = decode_body(&response.body);

        if params.return_format == ReturnFormat::Raw {
            api_response.raw_body = Some(response.body);
            api_response.raw_headers = Some(response.headers);
        }

        if let (Some(key), Some(data)) = (cache_key, api_response.data.as_ref()) {
            if matches!(response.status, 200 | 201) {
                self.cache
                    .put(&key, data.clone(), Duration::from_secs(params.cache_time))
                    .await;
            }
        }

        Ok(api_response)
    }

    /// Run the request, retrying transport failures with backoff.
    /// Any HTTP response, whatever its status, ends the loop.
    async fn send_with_retry(&self, request: TransportRequest) -> Option<TransportResponse> {
        let max_attempts = self.retry.max_attempts().max(1);

        for attempt in 1..=max_attempts {
            match self.transport.send(request.clone()).await {
                Ok(response) => {
                    tracing::debug!(
                        attempt,
                        method = %request.method,
                        url = %request.url,
                        status = response.status,
                        "Tesla API response"
                    );
                    return Some(response);
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        url = %request.url,
                        error = %e,
                        "Tesla API transport failure"
                    );
                    if attempt < max_attempts {
                        self.sleeper.sleep(self.retry.delay(attempt)).await;
                    }
                }
            }
        }

        None
    }

    fn normalize_endpoint(&self, endpoint: &str) -> Result<String, AppError> {
        let endpoint = endpoint.trim();
        let absolute = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
        };

        match reqwest::Url::parse(&absolute) {
            Ok(url) if url.host_str().is_some_and(|h| !h.is_empty()) => Ok(absolute),
            _ => Err(AppError::InvalidEndpoint(absolute)),
        }
    }

    // ─── Vehicle Endpoints ───────────────────────────────────────────────────

    /// List the account's vehicles.
    pub async fn list_vehicles(&self, user_id: &str) -> Result<ApiResponse, AppError> {
        self.request(
            "/api/1/vehicles",
            Method::GET,
            RequestParams::for_user(user_id),
            RequestArgs::default(),
        )
        .await
    }

    /// Full vehicle data (requires the vehicle to be online).
    pub async fn vehicle_data(
        &self,
        vehicle_id: &str,
        user_id: &str,
    ) -> Result<ApiResponse, AppError> {
        self.telemetry(vehicle_id, user_id, TelemetrySource::VehicleData, true)
            .await
    }

    /// Charge state only.
    pub async fn charge_state(
        &self,
        vehicle_id: &str,
        user_id: &str,
    ) -> Result<ApiResponse, AppError> {
        self.telemetry(vehicle_id, user_id, TelemetrySource::ChargeState, true)
            .await
    }

    /// Fetch telemetry, optionally bypassing the response cache.
    pub async fn telemetry(
        &self,
        vehicle_id: &str,
        user_id: &str,
        source: TelemetrySource,
        use_cache: bool,
    ) -> Result<ApiResponse, AppError> {
        let endpoint = match source {
            TelemetrySource::ChargeState => format!(
                "/api/1/vehicles/{}/data_request/charge_state",
                vehicle_id.trim()
            ),
            TelemetrySource::VehicleData => {
                format!("/api/1/vehicles/{}/vehicle_data", vehicle_id.trim())
            }
        };

        let mut params = RequestParams::for_user(user_id);
        if !use_cache {
            params = params.no_cache();
        }

        self.request(&endpoint, Method::GET, params, RequestArgs::default())
            .await
    }

    /// Ask a sleeping vehicle to wake up. Never cached.
    pub async fn wake_up(&self, vehicle_id: &str, user_id: &str) -> Result<ApiResponse, AppError> {
        self.request(
            &format!("/api/1/vehicles/{}/wake_up", vehicle_id.trim()),
            Method::POST,
            RequestParams::for_user(user_id).no_cache(),
            RequestArgs::default(),
        )
        .await
    }
}

/// State-changing methods are never cached.
fn is_cacheable(method: &Method) -> bool {
    !matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

/// Decode a JSON body; anything undecodable counts as no data.
fn decode_body(body: &str) -> Option<Value> {
    if body.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(error = %e, "Response body is not JSON");
            None
        }
    }
}

fn redacted(args: &RequestArgs) -> RequestArgs {
    let mut args = args.clone();
    if let Some(auth) = args.headers.get_mut("Authorization") {
        *auth = "Bearer [redacted]".to_string();
    }
    args
}
