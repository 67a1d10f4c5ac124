// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cache key fingerprinting
//!
//! All three caches key their entries by 64-bit fingerprints. A pattern's
//! identity is `hash64(pattern text) XOR option fingerprint`; a match
//! result's identity folds the input hash into the pattern fingerprint.
//! The hash must be deterministic within a process and well-distributed;
//! it is not required to be cryptographic.

use crate::options::PatternOptions;
use rustc_hash::FxHasher;
use std::hash::Hasher;

/// 64-bit non-cryptographic hash of raw bytes.
pub fn hash64(data: &[u8]) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(data);
    hasher.finish()
}

/// Fingerprint identifying one (pattern text, compile options) pair.
///
/// Two patterns with the same text but different options are distinct
/// cache entries.
pub fn pattern_fingerprint(pattern: &str, options: &PatternOptions) -> u64 {
    hash64(pattern.as_bytes()) ^ options.fingerprint()
}

/// Result Cache key combining a pattern fingerprint with an input string.
pub fn result_key(pattern_fingerprint: u64, input: &str) -> u64 {
    pattern_fingerprint ^ mix(hash64(input.as_bytes()), pattern_fingerprint)
}

// Golden-ratio combiner; wrapping arithmetic matches the unsigned 64-bit
// source semantics.
fn mix(a: u64, b: u64) -> u64 {
    a.wrapping_add(0x9e37_79b9_7f4a_7c15)
        .wrapping_add(b.wrapping_shl(6))
        .wrapping_add(b.wrapping_shr(2))
}
