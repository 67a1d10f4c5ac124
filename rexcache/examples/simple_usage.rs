// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Simple example demonstrating rexcache embedding in Rust applications
//!
//! This example shows the recommended way to use the process-global
//! facade: explicit init, cached compilation, memoised matching, metrics,
//! and shutdown.
//!
//! Run with: cargo run --example simple_usage

use rexcache::{api, PatternOptions};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    println!("=== rexcache Simple Usage Example ===\n");

    // Step 1: Initialize the cache system
    // An empty configuration selects the defaults; any field can be
    // overridden through a JSON document.
    println!("1. Initializing cache system...");
    api::init(Some(
        r#"{
            "pattern_cache_ttl_ms": 60000,
            "deferred_cache_ttl_ms": 120000,
            "eviction_check_interval_ms": 250
        }"#,
    ))?;
    println!("   ✓ Cache system initialized\n");

    // Step 2: Compile patterns
    // The first compile is a miss; every further lookup of the same
    // (pattern, options) pair shares the compiled object.
    println!("2. Compiling patterns...");
    let date = api::compile(r"(\d{4})-(\d{2})-(\d{2})", &PatternOptions::default())?;
    let date_again = api::compile(r"(\d{4})-(\d{2})-(\d{2})", &PatternOptions::default())?;
    println!("   ✓ Compiled date pattern ({} bytes)", date.program_size_bytes());
    println!(
        "   ✓ Second lookup shares the entry: {}\n",
        date.shares_pattern_with(&date_again)
    );

    // Options partition the cache: same text, different entry.
    let folded = api::compile("error", &PatternOptions::case_sensitive(false))?;
    println!("   → Case-folded variant is a distinct entry");
    println!("     matches \"ERROR\": {}\n", api::is_match(&folded, "big ERROR here"));

    // Step 3: Match with memoisation
    // Repeated matches over identical (pattern, input) pairs are answered
    // from the Result Cache without touching the engine.
    println!("3. Matching...");
    let log_line = "deploy finished at 2025-06-01 with 0 failures";
    for _ in 0..3 {
        let matched = api::is_match(&date, log_line);
        println!("   → date in log line: {}", matched);
    }
    if let Some((start, end)) = date.find(log_line) {
        println!("   ✓ Found at bytes {}..{}\n", start, end);
    }

    // A user-supplied literal can be made safe with quote_meta.
    let needle = api::quote_meta("1+1 (really?)");
    let literal = api::compile(&needle, &PatternOptions::default())?;
    println!("   ✓ Escaped literal matches: {}\n", api::is_match(&literal, "1+1 (really?)"));

    // Step 4: Inspect metrics
    println!("4. Cache metrics:");
    println!("{}\n", api::metrics_json());

    // Step 5: Release references and shut down
    // Every compiled reference is released explicitly; unreleased
    // references are recovered by the deferred tier's leak protection.
    println!("5. Shutting down...");
    api::release(date);
    api::release(date_again);
    api::release(folded);
    api::release(literal);
    api::shutdown();
    println!("   ✓ Cache system shut down");

    Ok(())
}
