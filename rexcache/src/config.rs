// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cache configuration
//!
//! A single immutable record parsed from a JSON document. Defaults are
//! applied before validation; unknown fields are ignored so newer
//! documents still load on older builds.

use crate::error::{CacheError, CacheResult};
use serde::{Deserialize, Serialize};

/// Tuning parameters for all three caches and the eviction worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Master switch; when false the facade bypasses all caches and
    /// validation is skipped.
    pub cache_enabled: bool,

    /// Enable the match-result memoisation cache.
    pub pattern_result_cache_enabled: bool,
    /// Target aggregate byte budget for the Result Cache.
    pub pattern_result_cache_target_capacity_bytes: u64,
    /// Inputs longer than this are not cached (applies to `put` only).
    pub pattern_result_cache_string_threshold_bytes: u64,
    /// Result Cache entry TTL.
    pub pattern_result_cache_ttl_ms: u64,

    /// Target aggregate byte budget for the Pattern Cache.
    pub pattern_cache_target_capacity_bytes: u64,
    /// Pattern Cache entry TTL.
    pub pattern_cache_ttl_ms: u64,
    /// Maximum entries selected per LRU-eviction pass.
    pub pattern_cache_lru_batch_size: usize,

    /// Maximum age in the Deferred Cache before forced eviction. Must be
    /// strictly greater than the Pattern Cache TTL so an evicted entry has
    /// time to drop to refcount zero naturally.
    pub deferred_cache_ttl_ms: u64,

    /// Start the background eviction worker at construction.
    pub auto_start_eviction_thread: bool,
    /// Period between eviction passes.
    pub eviction_check_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            pattern_result_cache_enabled: true,
            pattern_result_cache_target_capacity_bytes: 100 * 1024 * 1024,
            pattern_result_cache_string_threshold_bytes: 10 * 1024,
            pattern_result_cache_ttl_ms: 300_000,
            pattern_cache_target_capacity_bytes: 100 * 1024 * 1024,
            pattern_cache_ttl_ms: 300_000,
            pattern_cache_lru_batch_size: 100,
            deferred_cache_ttl_ms: 600_000,
            auto_start_eviction_thread: true,
            eviction_check_interval_ms: 100,
        }
    }
}

impl CacheConfig {
    /// Parse a configuration document, apply defaults, and validate.
    ///
    /// Malformed JSON fails with `BadInput`; type mismatches (including
    /// negative values for unsigned fields) and semantic violations fail
    /// with `InvalidConfig`.
    pub fn from_json(json: &str) -> CacheResult<Self> {
        let config: CacheConfig = serde_json::from_str(json).map_err(|e| match e.classify() {
            serde_json::error::Category::Data => CacheError::InvalidConfig(e.to_string()),
            _ => CacheError::BadInput(e.to_string()),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serialise the configuration to pretty JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Validate the configuration. Skipped entirely when caching is
    /// disabled.
    pub fn validate(&self) -> CacheResult<()> {
        if !self.cache_enabled {
            return Ok(());
        }

        let positive: [(&str, u64); 6] = [
            (
                "pattern_result_cache_target_capacity_bytes",
                self.pattern_result_cache_target_capacity_bytes,
            ),
            (
                "pattern_result_cache_ttl_ms",
                self.pattern_result_cache_ttl_ms,
            ),
            (
                "pattern_cache_target_capacity_bytes",
                self.pattern_cache_target_capacity_bytes,
            ),
            ("pattern_cache_ttl_ms", self.pattern_cache_ttl_ms),
            ("deferred_cache_ttl_ms", self.deferred_cache_ttl_ms),
            (
                "eviction_check_interval_ms",
                self.eviction_check_interval_ms,
            ),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(CacheError::InvalidConfig(format!(
                    "{} must be positive",
                    name
                )));
            }
        }

        if self.pattern_cache_lru_batch_size == 0 {
            return Err(CacheError::InvalidConfig(
                "pattern_cache_lru_batch_size must be positive".to_string(),
            ));
        }

        // Leak-protection invariant: the Deferred Cache must hold entries
        // strictly longer than the Pattern Cache could have.
        if self.deferred_cache_ttl_ms <= self.pattern_cache_ttl_ms {
            return Err(CacheError::InvalidConfig(format!(
                "deferred_cache_ttl_ms ({}) must be greater than pattern_cache_ttl_ms ({})",
                self.deferred_cache_ttl_ms, self.pattern_cache_ttl_ms
            )));
        }

        Ok(())
    }
}
