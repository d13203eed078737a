// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - Tesla client, token lifecycle and vehicle sync.

pub mod api_cache;
pub mod backoff;
pub mod pkce;
pub mod sync;
pub mod tesla;
pub mod token;
pub mod transport;
pub mod wake;

pub use api_cache::{ApiCache, CacheTimePolicy, FixedCacheTime, RandomCacheTime};
pub use backoff::{LinearBackoff, RetryPolicy, Sleeper, TokioSleeper};
pub use sync::{SyncOrchestrator, SyncOutcome};
pub use tesla::{
    ApiErrorInfo, ApiResponse, RequestArgs, RequestParams, ReturnFormat, TelemetrySource,
    TeslaClient,
};
pub use token::{AuthResult, LoginUrl, OAuthSettings, TokenManager};
pub use transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse};
pub use wake::WakeController;
