// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Tesla-Tracker: Tesla owner API client with vehicle telemetry sync
//!
//! This crate provides the OAuth (PKCE) token lifecycle, a caching and
//! retrying owner API client, wake-up polling and snapshot sync, plus a
//! thin HTTP API around them.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::{KeyedCache, MemoryCache, MemoryStore, TokenStore, VehicleStore};
use services::{
    ApiCache, CacheTimePolicy, LinearBackoff, OAuthSettings, RandomCacheTime, ReqwestTransport,
    Sleeper, SyncOrchestrator, TeslaClient, TokenManager, TokioSleeper, Transport,
    WakeController,
};
use std::sync::Arc;
use std::time::Duration;

/// External collaborators the services are built on.
#[derive(Clone)]
pub struct Backends {
    pub transport: Arc<dyn Transport>,
    pub cache: Arc<dyn KeyedCache>,
    pub token_store: Arc<dyn TokenStore>,
    pub vehicle_store: Arc<dyn VehicleStore>,
    pub sleeper: Arc<dyn Sleeper>,
    pub cache_time: Arc<dyn CacheTimePolicy>,
}

impl Backends {
    /// In-process storage around the given transport.
    pub fn in_memory(transport: Arc<dyn Transport>) -> Self {
        let store = MemoryStore::new();
        Self {
            transport,
            cache: Arc::new(MemoryCache::new()),
            token_store: Arc::new(store.clone()),
            vehicle_store: Arc::new(store),
            sleeper: Arc::new(TokioSleeper),
            cache_time: Arc::new(RandomCacheTime::default()),
        }
    }
}

impl Default for Backends {
    fn default() -> Self {
        Self::in_memory(Arc::new(ReqwestTransport::new()))
    }
}

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub tokens: TokenManager,
    pub tesla: TeslaClient,
    pub wake: WakeController,
    pub sync: SyncOrchestrator,
    pub vehicles: Arc<dyn VehicleStore>,
}

impl AppState {
    /// Wire the services together.
    pub fn new(config: Config, backends: Backends) -> Self {
        let api_cache = ApiCache::new(backends.cache.clone(), backends.cache_time.clone());

        let tokens = TokenManager::new(
            backends.transport.clone(),
            backends.token_store.clone(),
            api_cache.clone(),
            OAuthSettings::from_config(&config),
        );

        let tesla = TeslaClient::new(
            backends.transport.clone(),
            api_cache,
            tokens.clone(),
            Arc::new(LinearBackoff::new(config.api_max_retries)),
            backends.sleeper.clone(),
            &config.api_base_url,
            Duration::from_secs(config.http_timeout_secs),
        );

        let wake = WakeController::new(
            tesla.clone(),
            backends.sleeper.clone(),
            config.wakeup_max_tries,
            Duration::from_secs(config.wakeup_delay_secs),
        );

        let sync = SyncOrchestrator::new(
            tesla.clone(),
            wake.clone(),
            backends.vehicle_store.clone(),
            config.sync_interval_secs,
        );

        Self {
            config,
            tokens,
            tesla,
            wake,
            sync,
            vehicles: backends.vehicle_store,
        }
    }
}
