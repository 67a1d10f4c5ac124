//! Tests for match-result memoisation: round trips, thresholds, TTL and
//! LRU eviction, and the disabled mode

use rexcache::result_cache::RESULT_ENTRY_SIZE;
use rexcache::{clock, CacheConfig, CacheManager, PatternOptions};
use std::sync::atomic::Ordering;
use std::time::Duration;

const RESULT_TTL_MS: u64 = 100;

fn result_manager(config: CacheConfig) -> CacheManager {
    CacheManager::new(CacheConfig {
        auto_start_eviction_thread: false,
        ..config
    })
    .expect("config should validate")
}

fn pattern_fp(manager: &CacheManager, pattern: &str) -> u64 {
    let reference = manager
        .pattern_cache()
        .get_or_compile(pattern, &PatternOptions::default())
        .unwrap();
    let fp = reference.fingerprint();
    rexcache::PatternCache::release(reference);
    fp
}

#[test]
fn put_then_get_round_trips_both_outcomes() {
    let manager = result_manager(CacheConfig::default());
    let cache = manager.result_cache();
    let fp = pattern_fp(&manager, "round");

    cache.put(fp, "yes", true);
    cache.put(fp, "no", false);

    assert_eq!(cache.get(fp, "yes"), Some(true));
    assert_eq!(cache.get(fp, "no"), Some(false));
    assert_eq!(cache.get(fp, "unseen"), None);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.total_size_bytes(), 2 * RESULT_ENTRY_SIZE);

    let metrics = &manager.metrics().pattern_result_cache;
    assert_eq!(metrics.hits.load(Ordering::Relaxed), 2);
    assert_eq!(metrics.misses.load(Ordering::Relaxed), 1);
}

#[test]
fn overwrite_flips_result_without_growing() {
    let manager = result_manager(CacheConfig::default());
    let cache = manager.result_cache();
    let fp = pattern_fp(&manager, "flip");

    cache.put(fp, "x", true);
    cache.put(fp, "x", false);

    assert_eq!(cache.get(fp, "x"), Some(false));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.total_size_bytes(), RESULT_ENTRY_SIZE);
}

#[test]
fn oversized_inputs_are_not_cached() {
    let manager = result_manager(CacheConfig {
        pattern_result_cache_string_threshold_bytes: 8,
        ..CacheConfig::default()
    });
    let cache = manager.result_cache();
    let fp = pattern_fp(&manager, "thresh");

    // Strictly longer than the threshold: silently skipped.
    cache.put(fp, "123456789", true);
    assert_eq!(cache.len(), 0);
    assert_eq!(cache.get(fp, "123456789"), None);

    // Exactly at the threshold: cached.
    cache.put(fp, "12345678", true);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(fp, "12345678"), Some(true));
}

#[test]
fn disabled_cache_degrades_to_misses() {
    let manager = result_manager(CacheConfig {
        pattern_result_cache_enabled: false,
        ..CacheConfig::default()
    });
    let cache = manager.result_cache();
    let fp = pattern_fp(&manager, "disabled");

    cache.put(fp, "input", true);
    assert_eq!(cache.get(fp, "input"), None);
    assert_eq!(cache.len(), 0);

    // A disabled cache keeps its counters untouched.
    let metrics = &manager.metrics().pattern_result_cache;
    assert_eq!(metrics.hits.load(Ordering::Relaxed), 0);
    assert_eq!(metrics.misses.load(Ordering::Relaxed), 0);
}

#[test]
fn ttl_pass_drops_stale_entries() {
    let manager = result_manager(CacheConfig {
        pattern_result_cache_ttl_ms: RESULT_TTL_MS,
        ..CacheConfig::default()
    });
    let cache = manager.result_cache();
    let fp = pattern_fp(&manager, "stale");

    cache.put(fp, "input", true);
    assert_eq!(cache.len(), 1);

    // Within the TTL nothing happens.
    cache.evict(clock::monotonic_now_ms());
    assert_eq!(cache.len(), 1);

    let evicted = cache.evict(clock::monotonic_now_ms() + RESULT_TTL_MS + 1);
    assert_eq!(evicted, 1);
    assert_eq!(cache.len(), 0);
    assert_eq!(cache.total_size_bytes(), 0);

    let metrics = &manager.metrics().pattern_result_cache;
    assert_eq!(metrics.ttl_evictions.load(Ordering::Relaxed), 1);
    assert_eq!(
        metrics.total_bytes_freed.load(Ordering::Relaxed),
        RESULT_ENTRY_SIZE
    );
}

#[test]
fn lru_pass_trims_back_to_target() {
    let manager = result_manager(CacheConfig {
        pattern_result_cache_target_capacity_bytes: 3 * RESULT_ENTRY_SIZE,
        ..CacheConfig::default()
    });
    let cache = manager.result_cache();
    let fp = pattern_fp(&manager, "trim");

    for i in 0..8 {
        cache.put(fp, &format!("input-{}", i), true);
    }
    assert_eq!(cache.len(), 8);

    let evicted = cache.evict(clock::monotonic_now_ms());
    assert_eq!(evicted, 5);
    assert_eq!(cache.len(), 3);
    assert_eq!(cache.total_size_bytes(), 3 * RESULT_ENTRY_SIZE);

    let metrics = &manager.metrics().pattern_result_cache;
    assert_eq!(metrics.lru_evictions.load(Ordering::Relaxed), 5);
    assert_eq!(
        metrics.lru_evictions_bytes_freed.load(Ordering::Relaxed),
        5 * RESULT_ENTRY_SIZE
    );
}

#[test]
fn lru_pass_evicts_oldest_first() {
    let manager = result_manager(CacheConfig {
        pattern_result_cache_target_capacity_bytes: RESULT_ENTRY_SIZE,
        ..CacheConfig::default()
    });
    let cache = manager.result_cache();
    let fp = pattern_fp(&manager, "recency");

    cache.put(fp, "old", true);
    std::thread::sleep(Duration::from_millis(10));
    cache.put(fp, "new", true);
    std::thread::sleep(Duration::from_millis(10));

    // Touching "old" makes it the most recently used entry.
    assert_eq!(cache.get(fp, "old"), Some(true));

    cache.evict(clock::monotonic_now_ms());

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(fp, "old"), Some(true));
    assert_eq!(cache.get(fp, "new"), None);
}

#[test]
fn clear_resets_entries_and_bytes() {
    let manager = result_manager(CacheConfig::default());
    let cache = manager.result_cache();
    let fp = pattern_fp(&manager, "clear");

    cache.put(fp, "a", true);
    cache.put(fp, "b", false);
    cache.clear();

    assert_eq!(cache.len(), 0);
    assert_eq!(cache.total_size_bytes(), 0);
    assert_eq!(cache.get(fp, "a"), None);
}
