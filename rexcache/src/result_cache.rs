// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Match-result memoisation cache
//!
//! Stores (pattern fingerprint, input fingerprint) -> bool. The input
//! string itself is never stored, so every entry has the same fixed
//! memory cost. Internal errors in `get`/`put` are counted and swallowed;
//! the operation degrades to a miss or a no-op.

use crate::clock;
use crate::config::CacheConfig;
use crate::fingerprint;
use crate::metrics::CacheMetrics;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Fixed memory cost per entry; independent of the input length.
pub const RESULT_ENTRY_SIZE: u64 = 64;

// Candidates considered per LRU eviction pass.
const LRU_BATCH_SIZE: usize = 100;

struct ResultEntry {
    match_result: bool,
    last_access: AtomicU64,
}

#[derive(Default)]
struct ResultCacheInner {
    map: HashMap<u64, ResultEntry>,
    total_size_bytes: u64,
}

/// Fingerprint -> match-outcome cache with TTL and capacity-bounded LRU.
pub struct ResultCache {
    config: Arc<CacheConfig>,
    metrics: Arc<CacheMetrics>,
    inner: RwLock<ResultCacheInner>,
}

impl ResultCache {
    pub fn new(config: Arc<CacheConfig>, metrics: Arc<CacheMetrics>) -> Self {
        Self {
            config,
            metrics,
            inner: RwLock::new(ResultCacheInner::default()),
        }
    }

    /// Look up a memoised match outcome, refreshing its recency on a hit.
    /// Returns `None` when the cache is disabled.
    pub fn get(&self, pattern_fingerprint: u64, input: &str) -> Option<bool> {
        if !self.config.pattern_result_cache_enabled {
            return None;
        }

        let metrics = &self.metrics.pattern_result_cache;
        let key = fingerprint::result_key(pattern_fingerprint, input);

        match self.inner.read() {
            Ok(inner) => {
                if let Some(entry) = inner.map.get(&key) {
                    entry
                        .last_access
                        .store(clock::monotonic_now_ms(), Ordering::SeqCst);
                    metrics.hits.fetch_add(1, Ordering::Relaxed);
                    Some(entry.match_result)
                } else {
                    metrics.misses.fetch_add(1, Ordering::Relaxed);
                    None
                }
            }
            Err(_) => {
                metrics.get_errors.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert or update a match outcome. No-op when the cache is disabled
    /// or the input exceeds the string threshold.
    pub fn put(&self, pattern_fingerprint: u64, input: &str, match_result: bool) {
        if !self.config.pattern_result_cache_enabled {
            return;
        }
        // Large inputs are not worth a fixed-size slot; silent skip.
        if input.len() as u64 > self.config.pattern_result_cache_string_threshold_bytes {
            return;
        }

        let metrics = &self.metrics.pattern_result_cache;
        let key = fingerprint::result_key(pattern_fingerprint, input);
        let now_ms = clock::monotonic_now_ms();

        match self.inner.write() {
            Ok(mut guard) => {
                let inner = &mut *guard;
                match inner.map.entry(key) {
                    Entry::Occupied(mut occupied) => {
                        let entry = occupied.get_mut();
                        entry.match_result = match_result;
                        entry.last_access.store(now_ms, Ordering::SeqCst);
                    }
                    Entry::Vacant(vacant) => {
                        vacant.insert(ResultEntry {
                            match_result,
                            last_access: AtomicU64::new(now_ms),
                        });
                        inner.total_size_bytes += RESULT_ENTRY_SIZE;
                    }
                }
            }
            Err(_) => {
                metrics.put_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// One eviction pass: TTL expiry first, then one LRU batch if the
    /// cache is over its byte target. Called by the eviction worker.
    pub fn evict(&self, now_ms: u64) -> usize {
        let metrics = &self.metrics.pattern_result_cache;
        let ttl_ms = self.config.pattern_result_cache_ttl_ms;
        let target_bytes = self.config.pattern_result_cache_target_capacity_bytes;

        let mut guard = self.inner.write().unwrap();
        let inner = &mut *guard;
        let mut evicted = 0usize;

        // TTL phase; strict `>` keeps entries exactly at the boundary.
        inner.map.retain(|_, entry| {
            let age = now_ms.saturating_sub(entry.last_access.load(Ordering::SeqCst));
            if age > ttl_ms {
                metrics.ttl_evictions.fetch_add(1, Ordering::Relaxed);
                metrics.total_evictions.fetch_add(1, Ordering::Relaxed);
                metrics
                    .total_bytes_freed
                    .fetch_add(RESULT_ENTRY_SIZE, Ordering::Relaxed);
                evicted += 1;
                false
            } else {
                true
            }
        });
        inner.total_size_bytes = inner
            .total_size_bytes
            .saturating_sub(evicted as u64 * RESULT_ENTRY_SIZE);

        // LRU phase: oldest batch by last access, stopping as soon as the
        // byte budget is met.
        if inner.total_size_bytes > target_bytes && !inner.map.is_empty() {
            let mut candidates: Vec<(u64, u64)> = inner
                .map
                .iter()
                .map(|(key, entry)| (*key, entry.last_access.load(Ordering::SeqCst)))
                .collect();

            let batch = LRU_BATCH_SIZE.min(candidates.len());
            if batch < candidates.len() {
                candidates.select_nth_unstable_by_key(batch - 1, |&(_, last_access)| last_access);
            }
            let oldest = &mut candidates[..batch];
            oldest.sort_unstable_by_key(|&(_, last_access)| last_access);

            for &(key, _) in oldest.iter() {
                if inner.map.remove(&key).is_some() {
                    inner.total_size_bytes =
                        inner.total_size_bytes.saturating_sub(RESULT_ENTRY_SIZE);
                    metrics.lru_evictions.fetch_add(1, Ordering::Relaxed);
                    metrics
                        .lru_evictions_bytes_freed
                        .fetch_add(RESULT_ENTRY_SIZE, Ordering::Relaxed);
                    metrics.total_evictions.fetch_add(1, Ordering::Relaxed);
                    metrics
                        .total_bytes_freed
                        .fetch_add(RESULT_ENTRY_SIZE, Ordering::Relaxed);
                    evicted += 1;

                    if inner.total_size_bytes <= target_bytes {
                        break;
                    }
                }
            }
        }

        evicted
    }

    /// Drop all entries and reset the byte counter.
    pub fn clear(&self) {
        let mut guard = self.inner.write().unwrap();
        guard.map.clear();
        guard.total_size_bytes = 0;
    }

    /// Refresh the capacity snapshot under the cache lock.
    pub fn snapshot_metrics(&self) {
        let inner = self.inner.read().unwrap();
        self.metrics.pattern_result_cache.set_capacity(
            self.config.pattern_result_cache_target_capacity_bytes,
            inner.total_size_bytes,
            inner.map.len() as u64,
        );
    }

    /// Current entry count.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current aggregate byte accounting.
    pub fn total_size_bytes(&self) -> u64 {
        self.inner.read().unwrap().total_size_bytes
    }
}
