// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Keyed cache with per-entry TTL.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Expired entries are swept once every this many writes.
const PURGE_EVERY: usize = 64;

/// Generic get/set/delete cache used for API responses and the cache epoch.
#[async_trait]
pub trait KeyedCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;

    /// Store `value` for `ttl`. A zero TTL stores without expiry.
    async fn set(&self, key: &str, value: Value, ttl: Duration);

    async fn delete(&self, key: &str);
}

#[derive(Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
}

/// In-process cache shared across requests.
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|e| e.expires_at.map_or(true, |at| at > now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every expired entry. Keys from an older cache epoch or an
    /// older bearer token are never read again, so lookups alone won't
    /// reclaim them.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries
            .retain(|_, e| e.expires_at.map_or(true, |at| at > now));
    }
}

#[async_trait]
impl KeyedCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) => match entry.expires_at {
                Some(at) if at <= now => true,
                _ => return Some(entry.value.clone()),
            },
            None => return None,
        };

        if expired {
            self.entries.remove(key);
        }
        None
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Instant::now().checked_add(ttl)
        };
        self.entries
            .insert(key.to_string(), CacheEntry { value, expires_at });

        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % PURGE_EVERY == 0 {
            self.purge_expired();
        }
    }

    async fn delete(&self, key: &str) {
        self.entries.remove(key);
    }
}
