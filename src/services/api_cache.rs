// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Response cache for idempotent owner API calls.
//!
//! Keys are a SHA-256 over the request plus the current cache epoch.
//! Invalidation bumps the epoch, so every previously computed key
//! becomes unreachable at once and simply ages out of the cache.

use crate::db::KeyedCache;
use crate::time_utils::now_epoch;
use ring::rand::{SecureRandom, SystemRandom};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

/// Key holding the current cache epoch.
pub const CACHE_EPOCH_KEY: &str = "tesla_api_cache_epoch";
/// Prefix for cached responses.
pub const CACHE_KEY_PREFIX: &str = "tesla_api_request_";

const EPOCH_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Chooses how long a response is cached when the caller did not say.
pub trait CacheTimePolicy: Send + Sync {
    fn cache_time(&self) -> Duration;
}

/// Uniformly random TTL in `[min, max]` seconds, so entries written
/// together do not all expire together.
#[derive(Debug, Clone)]
pub struct RandomCacheTime {
    min_secs: u64,
    max_secs: u64,
    rng: SystemRandom,
}

impl RandomCacheTime {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            min_secs,
            max_secs: max_secs.max(min_secs),
            rng: SystemRandom::new(),
        }
    }
}

impl Default for RandomCacheTime {
    /// 15 to 20 minutes.
    fn default() -> Self {
        Self::new(15 * 60, 20 * 60)
    }
}

impl CacheTimePolicy for RandomCacheTime {
    fn cache_time(&self) -> Duration {
        let span = self.max_secs - self.min_secs + 1;
        let mut bytes = [0u8; 8];
        // SystemRandom only fails if the OS RNG is unavailable; fall back to min.
        let offset = match self.rng.fill(&mut bytes) {
            Ok(()) => u64::from_le_bytes(bytes) % span,
            Err(_) => 0,
        };
        Duration::from_secs(self.min_secs + offset)
    }
}

/// Always the same TTL.
#[derive(Debug, Clone, Copy)]
pub struct FixedCacheTime(pub Duration);

impl CacheTimePolicy for FixedCacheTime {
    fn cache_time(&self) -> Duration {
        self.0
    }
}

/// Epoch-versioned response cache.
#[derive(Clone)]
pub struct ApiCache {
    cache: Arc<dyn KeyedCache>,
    time_policy: Arc<dyn CacheTimePolicy>,
}

impl ApiCache {
    pub fn new(cache: Arc<dyn KeyedCache>, time_policy: Arc<dyn CacheTimePolicy>) -> Self {
        Self { cache, time_policy }
    }

    /// Current epoch, initialized to the current timestamp when absent.
    pub async fn epoch(&self) -> i64 {
        if let Some(epoch) = self.cache.get(CACHE_EPOCH_KEY).await.and_then(|v| v.as_i64()) {
            return epoch;
        }

        let epoch = now_epoch();
        self.cache
            .set(CACHE_EPOCH_KEY, Value::from(epoch), EPOCH_TTL)
            .await;
        epoch
    }

    /// Drop every cached response in one step.
    ///
    /// The new epoch is strictly greater than the old one even when both
    /// fall in the same second.
    pub async fn invalidate(&self) -> i64 {
        let current = self.cache.get(CACHE_EPOCH_KEY).await.and_then(|v| v.as_i64());
        let next = match current {
            Some(epoch) => now_epoch().max(epoch + 1),
            None => now_epoch(),
        };
        self.cache
            .set(CACHE_EPOCH_KEY, Value::from(next), EPOCH_TTL)
            .await;
        tracing::debug!(epoch = next, "Tesla API cache invalidated");
        next
    }

    /// Stable key over the request description and the epoch.
    pub fn key<P: Serialize, A: Serialize>(
        endpoint: &str,
        method: &str,
        params: &P,
        request_args: &A,
        epoch: i64,
    ) -> String {
        // One JSON array, so field boundaries can't shift between inputs.
        let material = serde_json::to_string(&(endpoint, method, params, request_args, epoch))
            .unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(material.as_bytes());
        format!("{}{}", CACHE_KEY_PREFIX, hex::encode(hasher.finalize()))
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.cache.get(key).await
    }

    /// Store a response. A zero `cache_time` defers to the policy.
    pub async fn put(&self, key: &str, data: Value, cache_time: Duration) {
        let ttl = if cache_time.is_zero() {
            self.time_policy.cache_time()
        } else {
            cache_time
        };
        self.cache.set(key, data, ttl).await;
    }
}
