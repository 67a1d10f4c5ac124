// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Deferred cache - holding tier for evicted-but-referenced patterns
//!
//! Patterns evicted from the Pattern Cache while callers still hold
//! references land here. The tier is purely age-bounded: an entry leaves
//! either immediately once its refcount reaches zero, or by forced
//! eviction after the deferred TTL, which is the leak-recovery path. The
//! configuration invariant `deferred_cache_ttl_ms > pattern_cache_ttl_ms`
//! guarantees a bounded window even for leaked references.

use crate::config::CacheConfig;
use crate::engine::CompiledPattern;
use crate::metrics::CacheMetrics;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, RwLock};

struct DeferredEntry {
    pattern: Arc<CompiledPattern>,
    entered_ms: u64,
    approx_size_bytes: u64,
}

#[derive(Default)]
struct DeferredCacheInner {
    map: HashMap<u64, DeferredEntry>,
    total_size_bytes: u64,
}

/// Age-bounded holding tier with leak detection. No LRU, no capacity
/// bound.
pub struct DeferredCache {
    config: Arc<CacheConfig>,
    metrics: Arc<CacheMetrics>,
    inner: RwLock<DeferredCacheInner>,
}

impl DeferredCache {
    pub fn new(config: Arc<CacheConfig>, metrics: Arc<CacheMetrics>) -> Self {
        Self {
            config,
            metrics,
            inner: RwLock::new(DeferredCacheInner::default()),
        }
    }

    /// Accept a pattern evicted from the Pattern Cache with refcount > 0.
    ///
    /// A duplicate fingerprint is a no-op; the existing entry stays. This
    /// cannot arise under the normal eviction protocol and is retained
    /// defensively.
    pub fn add(&self, pattern_fingerprint: u64, pattern: Arc<CompiledPattern>) {
        let entered_ms = crate::clock::monotonic_now_ms();
        let mut guard = self.inner.write().unwrap();
        let inner = &mut *guard;
        if let Entry::Vacant(vacant) = inner.map.entry(pattern_fingerprint) {
            let approx_size_bytes = pattern.approx_size_bytes();
            vacant.insert(DeferredEntry {
                pattern,
                entered_ms,
                approx_size_bytes,
            });
            inner.total_size_bytes += approx_size_bytes;
        }
    }

    /// One eviction pass over every entry.
    ///
    /// Refcount zero frees the slot immediately (the normal case); an
    /// entry past the deferred TTL is force-freed despite its positive
    /// refcount and a leak warning is emitted. The caller's outstanding
    /// reference stays valid through shared ownership; only the cache
    /// slot and its accounting are released.
    pub fn evict(&self, now_ms: u64) -> usize {
        let metrics = &self.metrics.deferred_cache;
        let ttl_ms = self.config.deferred_cache_ttl_ms;

        let mut guard = self.inner.write().unwrap();
        let inner = &mut *guard;
        let mut evicted = 0usize;
        let mut freed_bytes = 0u64;

        inner.map.retain(|_, entry| {
            let refcount = entry.pattern.refcount();

            if refcount == 0 {
                metrics.immediate_evictions.fetch_add(1, Ordering::Relaxed);
                metrics
                    .immediate_evictions_bytes_freed
                    .fetch_add(entry.approx_size_bytes, Ordering::Relaxed);
                metrics.total_evictions.fetch_add(1, Ordering::Relaxed);
                metrics
                    .total_bytes_freed
                    .fetch_add(entry.approx_size_bytes, Ordering::Relaxed);
                freed_bytes += entry.approx_size_bytes;
                evicted += 1;
                return false;
            }

            let age_ms = now_ms.saturating_sub(entry.entered_ms);
            if age_ms > ttl_ms {
                log::warn!(
                    "memory leak detected in deferred pattern cache: pattern held for {} minutes with refcount={}, forcing eviction",
                    age_ms / 60_000,
                    refcount
                );
                metrics.forced_evictions.fetch_add(1, Ordering::Relaxed);
                metrics
                    .forced_evictions_bytes_freed
                    .fetch_add(entry.approx_size_bytes, Ordering::Relaxed);
                metrics.total_evictions.fetch_add(1, Ordering::Relaxed);
                metrics
                    .total_bytes_freed
                    .fetch_add(entry.approx_size_bytes, Ordering::Relaxed);
                freed_bytes += entry.approx_size_bytes;
                evicted += 1;
                return false;
            }

            true
        });

        inner.total_size_bytes = inner.total_size_bytes.saturating_sub(freed_bytes);
        evicted
    }

    /// Unconditional drop of every entry, regardless of refcount.
    pub fn clear(&self) {
        let mut guard = self.inner.write().unwrap();
        guard.map.clear();
        guard.total_size_bytes = 0;
    }

    /// Refresh the capacity snapshot under the cache lock.
    pub fn snapshot_metrics(&self) {
        let inner = self.inner.read().unwrap();
        self.metrics
            .deferred_cache
            .set_capacity(inner.total_size_bytes, inner.map.len() as u64);
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

    /// Whether a fingerprint currently resides in this tier.
    pub fn contains(&self, pattern_fingerprint: u64) -> bool {
        self.inner
            .read()
            .unwrap()
            .map
            .contains_key(&pattern_fingerprint)
    }
}
