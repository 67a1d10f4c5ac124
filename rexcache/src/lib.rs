// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! rexcache - A multi-tier cache for compiled regular expressions
//!
//! rexcache compiles regex patterns once and shares them across concurrent
//! callers, with optional memoisation of match outcomes for hot
//! (pattern, input) pairs.
//!
//! # Features
//!
//! - **Pattern Cache**: compile-once, share-many storage with refcounted
//!   lifetimes; TTL and capacity-bounded LRU eviction
//! - **Deferred Cache**: holding tier for evicted-but-still-referenced
//!   patterns with leak detection and forced recovery
//! - **Result Cache**: fingerprint-keyed memoisation of match outcomes
//! - **Background eviction**: a single periodic worker drives all three
//!   caches
//! - **JSON configuration and metrics**: tuning parameters parsed from a
//!   JSON document; counters and capacity snapshots serialised back out
//!
//! # Usage
//!
//! ```ignore
//! rexcache::api::init(None)?;
//!
//! let pattern = rexcache::api::compile(r"\d{4}-\d{2}-\d{2}", &PatternOptions::default())?;
//! let matched = rexcache::api::is_match(&pattern, "2025-01-31");
//! rexcache::api::release(pattern);
//!
//! println!("{}", rexcache::api::metrics_json());
//! rexcache::api::shutdown();
//! ```

pub mod api;
pub mod clock;
pub mod config;
pub mod deferred_cache;
pub mod engine;
pub mod error;
pub mod eviction;
pub mod fingerprint;
pub mod manager;
pub mod metrics;
pub mod options;
pub mod pattern_cache;
pub mod result_cache;

pub use config::CacheConfig;
pub use deferred_cache::DeferredCache;
pub use engine::CompiledPattern;
pub use error::{CacheError, CacheResult};
pub use manager::CacheManager;
pub use metrics::CacheMetrics;
pub use options::{Encoding, PatternOptions};
pub use pattern_cache::{PatternCache, PatternRef};
pub use result_cache::ResultCache;

/// rexcache version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// rexcache crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
