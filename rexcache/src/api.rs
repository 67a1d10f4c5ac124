// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Process-global facade
//!
//! The cache system is intended as a single process-wide instance with
//! explicit lifecycle: `init` constructs it, `shutdown` destroys it, and
//! re-initialisation after shutdown is permitted. There is no lazy
//! initialisation; before `init` (or after `shutdown`) compilation falls
//! back to direct, uncached engine calls.

use crate::config::CacheConfig;
use crate::engine::CompiledPattern;
use crate::error::{CacheError, CacheResult};
use crate::fingerprint;
use crate::manager::CacheManager;
use crate::metrics::CacheMetrics;
use crate::options::PatternOptions;
use crate::pattern_cache::{PatternCache, PatternRef};
use once_cell::sync::Lazy;
use std::sync::{Arc, RwLock};

static MANAGER: Lazy<RwLock<Option<Arc<CacheManager>>>> = Lazy::new(|| RwLock::new(None));

/// Initialise the cache system. `None` or an empty document selects the
/// default configuration. Fails with `AlreadyInitialized` when called
/// twice without an intervening `shutdown`.
pub fn init(json_config: Option<&str>) -> CacheResult<()> {
    let mut slot = MANAGER.write().unwrap();
    if slot.is_some() {
        return Err(CacheError::AlreadyInitialized);
    }

    let config = match json_config {
        Some(json) if !json.trim().is_empty() => CacheConfig::from_json(json)?,
        _ => CacheConfig::default(),
    };

    *slot = Some(Arc::new(CacheManager::new(config)?));
    Ok(())
}

/// Tear down the cache system. Idempotent; the manager's drop stops the
/// eviction worker and drains all caches.
pub fn shutdown() {
    let taken = MANAGER.write().unwrap().take();
    drop(taken);
}

pub fn is_initialized() -> bool {
    MANAGER.read().unwrap().is_some()
}

/// Handle to the live manager, if any.
pub fn manager() -> Option<Arc<CacheManager>> {
    MANAGER.read().unwrap().clone()
}

/// Compile a pattern through the cache; direct engine compilation when
/// the system is uninitialised or caching is disabled.
pub fn compile(pattern: &str, options: &PatternOptions) -> CacheResult<PatternRef> {
    match manager() {
        Some(mgr) if mgr.config().cache_enabled => {
            mgr.pattern_cache().get_or_compile(pattern, options)
        }
        _ => {
            let fp = fingerprint::pattern_fingerprint(pattern, options);
            let compiled = Arc::new(CompiledPattern::compile(pattern, options, fp)?);
            compiled.acquire();
            Ok(PatternRef::new(compiled))
        }
    }
}

/// Release a compiled-pattern reference.
pub fn release(pattern: PatternRef) {
    PatternCache::release(pattern);
}

/// Evaluate a match, memoising the outcome in the Result Cache when the
/// system is initialised and caching is enabled.
pub fn is_match(pattern: &PatternRef, text: &str) -> bool {
    if let Some(mgr) = manager() {
        if mgr.config().cache_enabled {
            let result_cache = mgr.result_cache();
            if let Some(cached) = result_cache.get(pattern.fingerprint(), text) {
                return cached;
            }
            let result = pattern.is_match(text);
            result_cache.put(pattern.fingerprint(), text, result);
            return result;
        }
    }
    pattern.is_match(text)
}

/// Escape all regex metacharacters in `text` so it matches literally.
/// Stateless; independent of the cache lifecycle.
pub fn quote_meta(text: &str) -> String {
    regex_syntax::escape(text)
}

/// Current metrics as a pretty-printed JSON document. An uninitialised
/// system reports an all-zero document with a fresh timestamp.
pub fn metrics_json() -> String {
    match manager() {
        Some(mgr) => mgr.metrics_json(),
        None => {
            let empty = CacheMetrics::new();
            empty.touch_generated_at();
            empty.to_json_string()
        }
    }
}

/// Clear all caches; no-op when the system is uninitialised.
pub fn clear_all() {
    if let Some(mgr) = manager() {
        mgr.clear_all();
    }
}
