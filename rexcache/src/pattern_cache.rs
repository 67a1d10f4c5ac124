// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Compiled-pattern cache with refcounted lifetimes
//!
//! Compile-once, share-many storage. The single rule that makes eviction
//! safe against concurrent lookups: the refcount increment on a hit
//! happens while the read lock still pins the entry, and eviction frees
//! entries only under the write lock after re-reading the refcount. A
//! reference can therefore never be handed out for an entry the eviction
//! pass has already freed.

use crate::clock;
use crate::config::CacheConfig;
use crate::deferred_cache::DeferredCache;
use crate::engine::CompiledPattern;
use crate::error::CacheResult;
use crate::fingerprint;
use crate::metrics::CacheMetrics;
use crate::options::PatternOptions;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::{Arc, RwLock};

/// A caller's reference to a shared compiled pattern.
///
/// Each reference accounts for exactly one refcount; it is released
/// explicitly through [`PatternCache::release`] (or `api::release`).
/// Dropping a reference without releasing it leaks the refcount, which is
/// precisely the situation the Deferred Cache's forced eviction recovers
/// from.
#[derive(Debug)]
pub struct PatternRef {
    pattern: Arc<CompiledPattern>,
}

impl PatternRef {
    pub(crate) fn new(pattern: Arc<CompiledPattern>) -> Self {
        Self { pattern }
    }

    /// Unanchored search: true if the pattern matches anywhere in `text`.
    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// Byte range of the leftmost match, if any.
    pub fn find(&self, text: &str) -> Option<(usize, usize)> {
        self.pattern.find(text)
    }

    /// Original pattern text.
    pub fn pattern(&self) -> &str {
        self.pattern.pattern()
    }

    /// Options the pattern was compiled with.
    pub fn options(&self) -> &PatternOptions {
        self.pattern.options()
    }

    /// Cache identity of this (pattern, options) pair.
    pub fn fingerprint(&self) -> u64 {
        self.pattern.fingerprint()
    }

    /// Engine-reported program size in bytes.
    pub fn program_size_bytes(&self) -> u64 {
        self.pattern.approx_size_bytes()
    }

    /// Current count of live caller references to the shared pattern.
    pub fn refcount(&self) -> u32 {
        self.pattern.refcount()
    }

    /// Milliseconds-since-epoch of the shared pattern's latest access.
    pub fn last_access_ms(&self) -> u64 {
        self.pattern.last_access_ms()
    }

    /// Whether two references point at the same shared pattern.
    pub fn shares_pattern_with(&self, other: &PatternRef) -> bool {
        Arc::ptr_eq(&self.pattern, &other.pattern)
    }

    pub(crate) fn into_inner(self) -> Arc<CompiledPattern> {
        self.pattern
    }
}

#[derive(Default)]
struct PatternCacheInner {
    map: HashMap<u64, Arc<CompiledPattern>>,
    total_size_bytes: u64,
}

/// Fingerprint -> compiled-pattern cache, TTL and capacity-bounded.
pub struct PatternCache {
    config: Arc<CacheConfig>,
    metrics: Arc<CacheMetrics>,
    inner: RwLock<PatternCacheInner>,
}

impl PatternCache {
    pub fn new(config: Arc<CacheConfig>, metrics: Arc<CacheMetrics>) -> Self {
        Self {
            config,
            metrics,
            inner: RwLock::new(PatternCacheInner::default()),
        }
    }

    /// Return a shared reference to the compiled pattern, compiling on a
    /// miss.
    ///
    /// Compilation is the only slow path and runs with no cache lock
    /// held. When two callers race to compile the same fingerprint, the
    /// first insertion wins and the loser's compile output is discarded;
    /// both callers end up referencing the winner.
    pub fn get_or_compile(
        &self,
        pattern: &str,
        options: &PatternOptions,
    ) -> CacheResult<PatternRef> {
        let fp = fingerprint::pattern_fingerprint(pattern, options);
        let metrics = &self.metrics.pattern_cache;

        {
            let inner = self.inner.read().unwrap();
            if let Some(existing) = inner.map.get(&fp) {
                // The increment must happen before this read lock is
                // dropped: eviction needs the write lock to free the
                // entry, so the entry cannot disappear between the lookup
                // and the acquire.
                existing.acquire();
                existing.touch(clock::monotonic_now_ms());
                metrics.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(PatternRef::new(Arc::clone(existing)));
            }
        }

        metrics.misses.fetch_add(1, Ordering::Relaxed);

        let compiled = match CompiledPattern::compile(pattern, options, fp) {
            Ok(compiled) => compiled,
            Err(e) => {
                metrics.compilation_errors.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };

        let mut guard = self.inner.write().unwrap();
        let inner = &mut *guard;
        match inner.map.entry(fp) {
            Entry::Occupied(occupied) => {
                // Lost the compile race; take the winner and drop ours.
                let existing = occupied.get();
                existing.acquire();
                existing.touch(clock::monotonic_now_ms());
                Ok(PatternRef::new(Arc::clone(existing)))
            }
            Entry::Vacant(vacant) => {
                let shared = Arc::new(compiled);
                shared.acquire();
                inner.total_size_bytes += shared.approx_size_bytes();
                vacant.insert(Arc::clone(&shared));
                Ok(PatternRef::new(shared))
            }
        }
    }

    /// Release a caller reference. No lock is taken; the atomic decrement
    /// suffices because eviction re-reads the refcount under the write
    /// lock before freeing.
    pub fn release(pattern: PatternRef) {
        pattern.into_inner().release_ref();
    }

    /// One eviction pass: TTL expiry first (expired-but-referenced
    /// entries transfer to the Deferred Cache), then one LRU batch over
    /// refcount-zero entries if the cache is over its byte target.
    pub fn evict(&self, now_ms: u64, deferred: &DeferredCache) -> usize {
        let metrics = &self.metrics.pattern_cache;
        let ttl_ms = self.config.pattern_cache_ttl_ms;
        let target_bytes = self.config.pattern_cache_target_capacity_bytes;

        let mut guard = self.inner.write().unwrap();
        let inner = &mut *guard;
        let mut evicted = 0usize;

        // TTL phase; strict `>` keeps entries exactly at the boundary.
        let expired: Vec<u64> = inner
            .map
            .iter()
            .filter(|(_, pattern)| now_ms.saturating_sub(pattern.last_access_ms()) > ttl_ms)
            .map(|(fp, _)| *fp)
            .collect();

        for fp in expired {
            if let Some(pattern) = inner.map.remove(&fp) {
                let size = pattern.approx_size_bytes();
                inner.total_size_bytes = inner.total_size_bytes.saturating_sub(size);

                // Refcount read is authoritative here: increments need the
                // read lock and we hold the write lock.
                if pattern.refcount() == 0 {
                    metrics.ttl_evictions.fetch_add(1, Ordering::Relaxed);
                    metrics.total_evictions.fetch_add(1, Ordering::Relaxed);
                    metrics.total_bytes_freed.fetch_add(size, Ordering::Relaxed);
                } else {
                    deferred.add(fp, pattern);
                    metrics.ttl_moved_to_deferred.fetch_add(1, Ordering::Relaxed);
                }
                evicted += 1;
            }
        }

        // LRU phase: only refcount-zero entries are eligible; referenced
        // entries are skipped and will transfer on TTL expiry later. The
        // cache may stay over capacity until refcounts drop.
        if inner.total_size_bytes > target_bytes {
            let mut candidates: Vec<(u64, u64)> = inner
                .map
                .iter()
                .filter(|(_, pattern)| pattern.refcount() == 0)
                .map(|(fp, pattern)| (*fp, pattern.last_access_ms()))
                .collect();

            if !candidates.is_empty() {
                let batch = self.config.pattern_cache_lru_batch_size.min(candidates.len());
                if batch < candidates.len() {
                    candidates
                        .select_nth_unstable_by_key(batch - 1, |&(_, last_access)| last_access);
                }
                let oldest = &mut candidates[..batch];
                oldest.sort_unstable_by_key(|&(_, last_access)| last_access);

                for &(fp, _) in oldest.iter() {
                    if let Some(pattern) = inner.map.remove(&fp) {
                        let size = pattern.approx_size_bytes();
                        inner.total_size_bytes = inner.total_size_bytes.saturating_sub(size);
                        metrics.lru_evictions.fetch_add(1, Ordering::Relaxed);
                        metrics
                            .lru_evictions_bytes_freed
                            .fetch_add(size, Ordering::Relaxed);
                        metrics.total_evictions.fetch_add(1, Ordering::Relaxed);
                        metrics.total_bytes_freed.fetch_add(size, Ordering::Relaxed);
                        evicted += 1;

                        if inner.total_size_bytes <= target_bytes {
                            break;
                        }
                    }
                }
            }
        }

        evicted
    }

    /// Drop every entry, transferring still-referenced patterns to the
    /// Deferred Cache, and reset the byte counter.
    pub fn clear(&self, deferred: &DeferredCache) {
        let mut guard = self.inner.write().unwrap();
        let inner = &mut *guard;
        for (fp, pattern) in inner.map.drain() {
            if pattern.refcount() > 0 {
                deferred.add(fp, pattern);
            }
        }
        inner.total_size_bytes = 0;
    }

    /// Refresh the capacity snapshot under the cache lock.
    pub fn snapshot_metrics(&self) {
        let inner = self.inner.read().unwrap();
        self.metrics.pattern_cache.set_capacity(
            self.config.pattern_cache_target_capacity_bytes,
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

    /// Whether a fingerprint currently resides in this cache.
    pub fn contains(&self, pattern_fingerprint: u64) -> bool {
        self.inner
            .read()
            .unwrap()
            .map
            .contains_key(&pattern_fingerprint)
    }
}
