//! Benchmark for pattern cache and result cache throughput
//!
//! Measures compile-path throughput with and without cache reuse, and the
//! memoised match path against direct engine evaluation.

use rexcache::{CacheConfig, CacheManager, PatternCache, PatternOptions};
use std::time::Instant;

const DATE_PATTERN: &str = r"(\d{4})-(\d{2})-(\d{2})T(\d{2}):(\d{2}):(\d{2})Z";
const SAMPLE: &str = "event recorded at 2025-06-01T10:30:00Z by worker 7";

fn main() {
    println!("=== rexcache throughput benchmark ===\n");

    let manager = CacheManager::new(CacheConfig {
        auto_start_eviction_thread: false,
        ..CacheConfig::default()
    })
    .expect("default config should build");
    let options = PatternOptions::default();

    // Cached compile path: every lookup after the first is a hit.
    let iterations = 100_000;
    let start = Instant::now();
    for _ in 0..iterations {
        let reference = manager
            .pattern_cache()
            .get_or_compile(DATE_PATTERN, &options)
            .unwrap();
        PatternCache::release(reference);
    }
    let cached = start.elapsed();
    println!("cached get_or_compile:");
    println!("  iterations: {}", iterations);
    println!("  time: {:?}", cached);
    println!(
        "  throughput: {:.0} lookups/sec\n",
        iterations as f64 / cached.as_secs_f64()
    );

    // Cold compile path: distinct patterns defeat the cache entirely.
    let cold_iterations = 2_000;
    let start = Instant::now();
    for i in 0..cold_iterations {
        let pattern = format!(r"worker-{} (\d+)", i);
        let reference = manager
            .pattern_cache()
            .get_or_compile(&pattern, &options)
            .unwrap();
        PatternCache::release(reference);
    }
    let cold = start.elapsed();
    println!("cold compiles:");
    println!("  iterations: {}", cold_iterations);
    println!("  time: {:?}", cold);
    println!(
        "  throughput: {:.0} compiles/sec\n",
        cold_iterations as f64 / cold.as_secs_f64()
    );

    // Match path: engine evaluation vs. result-cache memoisation.
    let reference = manager
        .pattern_cache()
        .get_or_compile(DATE_PATTERN, &options)
        .unwrap();

    let match_iterations = 200_000;
    let start = Instant::now();
    for _ in 0..match_iterations {
        assert!(reference.is_match(SAMPLE));
    }
    let direct = start.elapsed();
    println!("direct engine matches:");
    println!("  iterations: {}", match_iterations);
    println!("  time: {:?}", direct);
    println!(
        "  throughput: {:.0} matches/sec\n",
        match_iterations as f64 / direct.as_secs_f64()
    );

    let result_cache = manager.result_cache();
    result_cache.put(reference.fingerprint(), SAMPLE, true);
    let start = Instant::now();
    for _ in 0..match_iterations {
        assert_eq!(result_cache.get(reference.fingerprint(), SAMPLE), Some(true));
    }
    let memoised = start.elapsed();
    println!("memoised matches:");
    println!("  iterations: {}", match_iterations);
    println!("  time: {:?}", memoised);
    println!(
        "  throughput: {:.0} lookups/sec\n",
        match_iterations as f64 / memoised.as_secs_f64()
    );

    PatternCache::release(reference);

    println!("final metrics:\n{}", manager.metrics_json());
}
