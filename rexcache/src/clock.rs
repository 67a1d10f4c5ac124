// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Process-wide monotonic millisecond clock
//!
//! Cache entries store their last-access and entry times as plain
//! `AtomicU64` millisecond values measured from a process-wide epoch, so a
//! recency touch never needs more than an atomic store. Eviction passes
//! take `now` as a parameter, which also lets tests drive TTL boundaries
//! deterministically.

use once_cell::sync::Lazy;
use std::time::Instant;

static PROCESS_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Milliseconds elapsed since the process-wide monotonic epoch.
pub fn monotonic_now_ms() -> u64 {
    PROCESS_EPOCH.elapsed().as_millis() as u64
}
