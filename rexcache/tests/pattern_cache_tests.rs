//! Tests for compiled-pattern cache sharing, keying, and refcounts

use rexcache::{CacheConfig, CacheManager, PatternCache, PatternOptions};
use std::sync::atomic::Ordering;

fn manager_without_worker() -> CacheManager {
    CacheManager::new(CacheConfig {
        auto_start_eviction_thread: false,
        ..CacheConfig::default()
    })
    .expect("default config should build")
}

#[test]
fn second_lookup_reuses_compiled_pattern() {
    let manager = manager_without_worker();
    let cache = manager.pattern_cache();

    let first = cache
        .get_or_compile("foo", &PatternOptions::default())
        .unwrap();
    let second = cache
        .get_or_compile("foo", &PatternOptions::default())
        .unwrap();

    assert!(first.shares_pattern_with(&second));
    assert_eq!(first.refcount(), 2);
    assert_eq!(cache.len(), 1);

    let metrics = &manager.metrics().pattern_cache;
    assert_eq!(metrics.misses.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.hits.load(Ordering::Relaxed), 1);

    PatternCache::release(first);
    PatternCache::release(second);
}

#[test]
fn different_options_produce_distinct_entries() {
    let manager = manager_without_worker();
    let cache = manager.pattern_cache();

    let sensitive = cache
        .get_or_compile("FOO", &PatternOptions::default())
        .unwrap();
    let insensitive = cache
        .get_or_compile("FOO", &PatternOptions::case_sensitive(false))
        .unwrap();

    assert!(!sensitive.shares_pattern_with(&insensitive));
    assert_ne!(sensitive.fingerprint(), insensitive.fingerprint());
    assert_eq!(cache.len(), 2);

    // Each entry carries its own behaviour.
    assert!(!sensitive.is_match("foo"));
    assert!(insensitive.is_match("foo"));

    PatternCache::release(sensitive);
    PatternCache::release(insensitive);
}

#[test]
fn release_decrements_refcount() {
    let manager = manager_without_worker();
    let cache = manager.pattern_cache();

    let first = cache.get_or_compile("a+b", &PatternOptions::default()).unwrap();
    let second = cache.get_or_compile("a+b", &PatternOptions::default()).unwrap();
    assert_eq!(second.refcount(), 2);

    PatternCache::release(first);
    assert_eq!(second.refcount(), 1);

    PatternCache::release(second);
    // The entry stays resident with refcount 0 until eviction claims it.
    assert_eq!(cache.len(), 1);
}

#[test]
fn concurrent_lookups_share_one_entry() {
    let manager = manager_without_worker();
    let cache = manager.pattern_cache();

    let refs = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..20)
            .map(|_| {
                scope.spawn(|| {
                    cache
                        .get_or_compile("shared", &PatternOptions::default())
                        .unwrap()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>()
    });

    assert_eq!(cache.len(), 1);
    assert_eq!(refs[0].refcount(), 20);
    for other in &refs[1..] {
        assert!(refs[0].shares_pattern_with(other));
    }

    let metrics = &manager.metrics().pattern_cache;
    assert_eq!(
        metrics.hits.load(Ordering::Relaxed) + metrics.misses.load(Ordering::Relaxed),
        20
    );

    for reference in refs {
        PatternCache::release(reference);
    }
}

#[test]
fn failed_compile_leaves_cache_unchanged() {
    let manager = manager_without_worker();
    let cache = manager.pattern_cache();

    let result = cache.get_or_compile("(unclosed", &PatternOptions::default());
    assert!(matches!(result, Err(rexcache::CacheError::CompileFailed(_))));

    assert_eq!(cache.len(), 0);
    assert_eq!(cache.total_size_bytes(), 0);

    let metrics = &manager.metrics().pattern_cache;
    assert_eq!(metrics.compilation_errors.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.misses.load(Ordering::Relaxed), 1);
    assert_eq!(metrics.hits.load(Ordering::Relaxed), 0);
}

#[test]
fn byte_accounting_tracks_program_sizes() {
    let manager = manager_without_worker();
    let cache = manager.pattern_cache();

    let first = cache
        .get_or_compile(r"\d{4}-\d{2}-\d{2}", &PatternOptions::default())
        .unwrap();
    let second = cache
        .get_or_compile(r"[a-z]+@[a-z]+\.[a-z]{2,}", &PatternOptions::default())
        .unwrap();

    assert!(first.program_size_bytes() > 0);
    assert_eq!(
        cache.total_size_bytes(),
        first.program_size_bytes() + second.program_size_bytes()
    );

    PatternCache::release(first);
    PatternCache::release(second);
}
