// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Background eviction worker
//!
//! A single long-lived thread drives all three caches. Each tick runs the
//! caches sequentially - Pattern Cache before Deferred Cache, so entries
//! transferred in this tick can be collected in the same tick once their
//! refcount reaches zero. A failing pass is counted and the loop
//! continues; the sleep between passes is interruptible so `stop()`
//! latency does not depend on the check interval.

use crate::clock;
use crate::config::CacheConfig;
use crate::deferred_cache::DeferredCache;
use crate::metrics::CacheMetrics;
use crate::pattern_cache::PatternCache;
use crate::result_cache::ResultCache;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

struct EvictionShared {
    config: Arc<CacheConfig>,
    result_cache: Arc<ResultCache>,
    pattern_cache: Arc<PatternCache>,
    deferred_cache: Arc<DeferredCache>,
    metrics: Arc<CacheMetrics>,
    stop_requested: Mutex<bool>,
    stop_signal: Condvar,
}

/// Lifecycle handle for the eviction worker. `start` and `stop` are both
/// idempotent; `stop` joins the worker and therefore blocks until the
/// current pass finishes.
pub struct EvictionThread {
    shared: Arc<EvictionShared>,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl EvictionThread {
    pub fn new(
        config: Arc<CacheConfig>,
        result_cache: Arc<ResultCache>,
        pattern_cache: Arc<PatternCache>,
        deferred_cache: Arc<DeferredCache>,
        metrics: Arc<CacheMetrics>,
    ) -> Self {
        Self {
            shared: Arc::new(EvictionShared {
                config,
                result_cache,
                pattern_cache,
                deferred_cache,
                metrics,
                stop_requested: Mutex::new(false),
                stop_signal: Condvar::new(),
            }),
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the worker if it is not already running.
    ///
    /// The handle mutex serialises `start` against `stop`, so a racing
    /// stop can never resurrect a worker that was told to exit.
    pub fn start(&self) {
        let mut handle_slot = self.handle.lock().unwrap();

        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return; // Already running
        }

        *self.shared.stop_requested.lock().unwrap() = false;

        let shared = Arc::clone(&self.shared);
        let running = Arc::clone(&self.running);
        *handle_slot = Some(std::thread::spawn(move || {
            let interval = Duration::from_millis(shared.config.eviction_check_interval_ms);
            loop {
                run_eviction_pass(&shared);

                let guard = shared.stop_requested.lock().unwrap();
                let (guard, _) = shared
                    .stop_signal
                    .wait_timeout_while(guard, interval, |stop| !*stop)
                    .unwrap();
                if *guard {
                    break;
                }
            }
            running.store(false, Ordering::Release);
        }));
    }

    /// Signal the worker to exit and join it; blocks until the current
    /// pass finishes.
    pub fn stop(&self) {
        let mut handle_slot = self.handle.lock().unwrap();

        if self
            .running
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let mut stop = self.shared.stop_requested.lock().unwrap();
            *stop = true;
            drop(stop);
            self.shared.stop_signal.notify_all();
        }

        // Join outside the CAS branch so a finished worker handle is
        // always reaped.
        if let Some(handle) = handle_slot.take() {
            let _ = handle.join();
        }
    }

    /// Observable worker state.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for EvictionThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_eviction_pass(shared: &EvictionShared) {
    let pass = catch_unwind(AssertUnwindSafe(|| {
        let now_ms = clock::monotonic_now_ms();

        if shared.config.pattern_result_cache_enabled {
            shared.result_cache.evict(now_ms);
            shared.result_cache.snapshot_metrics();
        }

        shared
            .pattern_cache
            .evict(now_ms, &shared.deferred_cache);
        shared.pattern_cache.snapshot_metrics();

        shared.deferred_cache.evict(now_ms);
        shared.deferred_cache.snapshot_metrics();

        shared.metrics.touch_generated_at();
    }));

    if pass.is_err() {
        shared
            .metrics
            .eviction_pass_errors
            .fetch_add(1, Ordering::Relaxed);
        log::error!("cache eviction pass failed; worker continues");
    }
}
