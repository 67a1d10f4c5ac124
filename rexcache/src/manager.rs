// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Central cache management and coordination

use crate::config::CacheConfig;
use crate::deferred_cache::DeferredCache;
use crate::error::CacheResult;
use crate::eviction::EvictionThread;
use crate::metrics::CacheMetrics;
use crate::pattern_cache::PatternCache;
use crate::result_cache::ResultCache;
use std::sync::Arc;

/// Composition root owning the three caches, the eviction worker, the
/// configuration and the metrics.
pub struct CacheManager {
    config: Arc<CacheConfig>,
    metrics: Arc<CacheMetrics>,
    result_cache: Arc<ResultCache>,
    pattern_cache: Arc<PatternCache>,
    deferred_cache: Arc<DeferredCache>,
    eviction: EvictionThread,
}

impl CacheManager {
    /// Build the cache system from a validated-on-entry configuration,
    /// starting the eviction worker when configured to.
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        config.validate()?;

        let config = Arc::new(config);
        let metrics = Arc::new(CacheMetrics::new());

        let result_cache = Arc::new(ResultCache::new(Arc::clone(&config), Arc::clone(&metrics)));
        let pattern_cache = Arc::new(PatternCache::new(Arc::clone(&config), Arc::clone(&metrics)));
        let deferred_cache =
            Arc::new(DeferredCache::new(Arc::clone(&config), Arc::clone(&metrics)));

        let eviction = EvictionThread::new(
            Arc::clone(&config),
            Arc::clone(&result_cache),
            Arc::clone(&pattern_cache),
            Arc::clone(&deferred_cache),
            Arc::clone(&metrics),
        );

        let manager = Self {
            config,
            metrics,
            result_cache,
            pattern_cache,
            deferred_cache,
            eviction,
        };

        if manager.config.auto_start_eviction_thread {
            manager.eviction.start();
        }

        Ok(manager)
    }

    /// Build from a JSON configuration document.
    pub fn from_json(json: &str) -> CacheResult<Self> {
        Self::new(CacheConfig::from_json(json)?)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    pub fn result_cache(&self) -> &ResultCache {
        &self.result_cache
    }

    pub fn pattern_cache(&self) -> &PatternCache {
        &self.pattern_cache
    }

    pub fn deferred_cache(&self) -> &DeferredCache {
        &self.deferred_cache
    }

    pub fn start_eviction_thread(&self) {
        self.eviction.start();
    }

    pub fn stop_eviction_thread(&self) {
        self.eviction.stop();
    }

    pub fn is_eviction_thread_running(&self) -> bool {
        self.eviction.is_running()
    }

    /// Aggregate fresh capacity snapshots and serialise all metrics.
    /// Safe to call while the eviction worker runs.
    pub fn metrics_json(&self) -> String {
        self.result_cache.snapshot_metrics();
        self.pattern_cache.snapshot_metrics();
        self.deferred_cache.snapshot_metrics();
        self.metrics.touch_generated_at();
        self.metrics.to_json_string()
    }

    /// Clear all three caches, restarting the eviction worker only if it
    /// was running when the clear began.
    pub fn clear_all(&self) {
        let was_running = self.eviction.is_running();

        self.eviction.stop();

        self.pattern_cache.clear(&self.deferred_cache);
        self.result_cache.clear();
        self.deferred_cache.clear();

        if was_running {
            self.eviction.start();
        }
    }
}

impl Drop for CacheManager {
    fn drop(&mut self) {
        // Stop the worker first, then drain: in-use patterns migrate to
        // the deferred tier before the final unconditional clear.
        self.eviction.stop();
        self.pattern_cache.clear(&self.deferred_cache);
        self.result_cache.clear();
        self.deferred_cache.clear();
    }
}
