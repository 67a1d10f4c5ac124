// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cache metrics
//!
//! Counters are individually atomic and updated on the hot paths; the
//! capacity snapshots are computed under the owning cache's lock by
//! `snapshot_metrics` and read without any cache lock when serialising.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Point-in-time copy of a cache's capacity figures.
#[derive(Debug, Default, Clone, Copy)]
pub struct CapacitySnapshot {
    pub target_bytes: u64,
    pub actual_bytes: u64,
    pub entry_count: u64,
    pub utilization_ratio: f64,
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        (100.0 * hits as f64) / total as f64
    }
}

/// Metrics for the match-result memoisation cache.
#[derive(Debug, Default)]
pub struct PatternResultCacheMetrics {
    pub hits: AtomicU64,
    pub misses: AtomicU64,

    // Non-fatal internal errors; the operation degrades to miss/no-op.
    pub get_errors: AtomicU64,
    pub put_errors: AtomicU64,

    pub ttl_evictions: AtomicU64,
    pub lru_evictions: AtomicU64,
    pub lru_evictions_bytes_freed: AtomicU64,
    pub total_evictions: AtomicU64,
    pub total_bytes_freed: AtomicU64,

    capacity: Mutex<CapacitySnapshot>,
}

impl PatternResultCacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        hit_rate(
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    pub fn capacity(&self) -> CapacitySnapshot {
        *self.capacity.lock().unwrap()
    }

    pub(crate) fn set_capacity(&self, target_bytes: u64, actual_bytes: u64, entry_count: u64) {
        *self.capacity.lock().unwrap() = CapacitySnapshot {
            target_bytes,
            actual_bytes,
            entry_count,
            utilization_ratio: utilization(actual_bytes, target_bytes),
        };
    }

    fn to_json(&self) -> Value {
        let capacity = self.capacity();
        json!({
            "hits": self.hits.load(Ordering::Relaxed),
            "misses": self.misses.load(Ordering::Relaxed),
            "hit_rate": self.hit_rate(),
            "get_errors": self.get_errors.load(Ordering::Relaxed),
            "put_errors": self.put_errors.load(Ordering::Relaxed),
            "evictions": {
                "ttl": self.ttl_evictions.load(Ordering::Relaxed),
                "lru": self.lru_evictions.load(Ordering::Relaxed),
                "lru_bytes_freed": self.lru_evictions_bytes_freed.load(Ordering::Relaxed),
                "total_evictions": self.total_evictions.load(Ordering::Relaxed),
                "total_bytes_freed": self.total_bytes_freed.load(Ordering::Relaxed),
            },
            "capacity": {
                "target_bytes": capacity.target_bytes,
                "actual_bytes": capacity.actual_bytes,
                "entry_count": capacity.entry_count,
                "utilization_ratio": capacity.utilization_ratio,
            },
        })
    }
}

/// Metrics for the compiled-pattern cache.
#[derive(Debug, Default)]
pub struct PatternCacheMetrics {
    pub hits: AtomicU64,
    pub misses: AtomicU64,

    pub compilation_errors: AtomicU64,

    pub ttl_evictions: AtomicU64,
    pub lru_evictions: AtomicU64,
    pub lru_evictions_bytes_freed: AtomicU64,
    // Entries transferred to the Deferred Cache still referenced; their
    // bytes move rather than free.
    pub ttl_moved_to_deferred: AtomicU64,
    pub lru_moved_to_deferred: AtomicU64,
    pub total_evictions: AtomicU64,
    pub total_bytes_freed: AtomicU64,

    capacity: Mutex<CapacitySnapshot>,
}

impl PatternCacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        hit_rate(
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    pub fn capacity(&self) -> CapacitySnapshot {
        *self.capacity.lock().unwrap()
    }

    pub(crate) fn set_capacity(&self, target_bytes: u64, actual_bytes: u64, entry_count: u64) {
        *self.capacity.lock().unwrap() = CapacitySnapshot {
            target_bytes,
            actual_bytes,
            entry_count,
            utilization_ratio: utilization(actual_bytes, target_bytes),
        };
    }

    fn to_json(&self) -> Value {
        let capacity = self.capacity();
        json!({
            "hits": self.hits.load(Ordering::Relaxed),
            "misses": self.misses.load(Ordering::Relaxed),
            "hit_rate": self.hit_rate(),
            "compilation_errors": self.compilation_errors.load(Ordering::Relaxed),
            "evictions": {
                "ttl": self.ttl_evictions.load(Ordering::Relaxed),
                "lru": self.lru_evictions.load(Ordering::Relaxed),
                "lru_bytes_freed": self.lru_evictions_bytes_freed.load(Ordering::Relaxed),
                "ttl_moved_to_deferred": self.ttl_moved_to_deferred.load(Ordering::Relaxed),
                "lru_moved_to_deferred": self.lru_moved_to_deferred.load(Ordering::Relaxed),
                "total_evictions": self.total_evictions.load(Ordering::Relaxed),
                "total_bytes_freed": self.total_bytes_freed.load(Ordering::Relaxed),
            },
            "capacity": {
                "target_bytes": capacity.target_bytes,
                "actual_bytes": capacity.actual_bytes,
                "entry_count": capacity.entry_count,
                "utilization_ratio": capacity.utilization_ratio,
            },
        })
    }
}

/// Metrics for the deferred holding tier.
#[derive(Debug, Default)]
pub struct DeferredCacheMetrics {
    /// Refcount reached zero naturally.
    pub immediate_evictions: AtomicU64,
    pub immediate_evictions_bytes_freed: AtomicU64,
    /// Age exceeded with refcount still positive - leak signal.
    pub forced_evictions: AtomicU64,
    pub forced_evictions_bytes_freed: AtomicU64,
    pub total_evictions: AtomicU64,
    pub total_bytes_freed: AtomicU64,

    capacity: Mutex<CapacitySnapshot>,
}

impl DeferredCacheMetrics {
    pub fn capacity(&self) -> CapacitySnapshot {
        *self.capacity.lock().unwrap()
    }

    pub(crate) fn set_capacity(&self, actual_bytes: u64, entry_count: u64) {
        *self.capacity.lock().unwrap() = CapacitySnapshot {
            target_bytes: 0,
            actual_bytes,
            entry_count,
            utilization_ratio: 0.0,
        };
    }

    fn to_json(&self) -> Value {
        let capacity = self.capacity();
        json!({
            "evictions": {
                "immediate": self.immediate_evictions.load(Ordering::Relaxed),
                "immediate_bytes_freed": self.immediate_evictions_bytes_freed.load(Ordering::Relaxed),
                "forced": self.forced_evictions.load(Ordering::Relaxed),
                "forced_bytes_freed": self.forced_evictions_bytes_freed.load(Ordering::Relaxed),
                "total_evictions": self.total_evictions.load(Ordering::Relaxed),
                "total_bytes_freed": self.total_bytes_freed.load(Ordering::Relaxed),
            },
            "capacity": {
                "actual_bytes": capacity.actual_bytes,
                "entry_count": capacity.entry_count,
            },
        })
    }
}

/// Combined metrics for all three caches.
#[derive(Debug)]
pub struct CacheMetrics {
    pub pattern_result_cache: PatternResultCacheMetrics,
    pub pattern_cache: PatternCacheMetrics,
    pub deferred_cache: DeferredCacheMetrics,

    /// Eviction passes that failed and were swallowed by the worker.
    pub eviction_pass_errors: AtomicU64,

    generated_at: Mutex<DateTime<Utc>>,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self {
            pattern_result_cache: PatternResultCacheMetrics::default(),
            pattern_cache: PatternCacheMetrics::default(),
            deferred_cache: DeferredCacheMetrics::default(),
            eviction_pass_errors: AtomicU64::new(0),
            generated_at: Mutex::new(Utc::now()),
        }
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        *self.generated_at.lock().unwrap()
    }

    pub fn touch_generated_at(&self) {
        *self.generated_at.lock().unwrap() = Utc::now();
    }

    pub fn to_json_value(&self) -> Value {
        json!({
            "pattern_result_cache": self.pattern_result_cache.to_json(),
            "pattern_cache": self.pattern_cache.to_json(),
            "deferred_cache": self.deferred_cache.to_json(),
            "generated_at": self.generated_at().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        })
    }

    /// Serialise all metrics as a pretty-printed JSON document.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string_pretty(&self.to_json_value()).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for CacheMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn utilization(actual_bytes: u64, target_bytes: u64) -> f64 {
    if target_bytes == 0 {
        0.0
    } else {
        actual_bytes as f64 / target_bytes as f64
    }
}
