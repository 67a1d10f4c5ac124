// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Compiled pattern wrapper around the regex engine
//!
//! The engine itself is an opaque dependency; the caches consume exactly
//! three things from it: a fallible compile honouring a memory limit, match
//! evaluation, and the reported program size used for capacity accounting.
//! `CompiledPattern` bundles the engine object with the cache bookkeeping
//! that must live on the shared object: the caller refcount and the
//! last-access timestamp.

use crate::clock;
use crate::error::{CacheError, CacheResult};
use crate::options::{Encoding, PatternOptions};
use regex_automata::meta;
use regex_automata::util::syntax;
use regex_automata::MatchKind;
use std::borrow::Cow;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// One compiled regex shared by all concurrent callers.
///
/// Destroyed only when no cache holds it and the refcount is zero; the
/// pattern text is immutable after construction.
pub struct CompiledPattern {
    regex: meta::Regex,
    pattern: String,
    options: PatternOptions,
    fingerprint: u64,
    approx_size_bytes: u64,
    refcount: AtomicU32,
    last_access: AtomicU64,
}

impl CompiledPattern {
    /// Compile `pattern` under `options`. Runs with no cache lock held.
    pub(crate) fn compile(
        pattern: &str,
        options: &PatternOptions,
        fingerprint: u64,
    ) -> CacheResult<Self> {
        let utf8 = options.encoding == Encoding::Utf8;

        let syntax_config = syntax::Config::new()
            .case_insensitive(!options.case_sensitive)
            // In POSIX mode `^`/`$` anchor per line unless one_line is set;
            // in Perl mode they anchor at text ends by default.
            .multi_line(options.posix_syntax && !options.one_line)
            .dot_matches_new_line(options.dot_nl)
            .unicode(utf8)
            .utf8(utf8);

        let meta_config = meta::Config::new()
            .match_kind(MatchKind::LeftmostFirst)
            .utf8_empty(utf8)
            .nfa_size_limit(if options.max_mem > 0 {
                Some(options.max_mem as usize)
            } else {
                None
            });

        let source: Cow<'_, str> = if options.literal {
            Cow::Owned(regex_syntax::escape(pattern))
        } else {
            Cow::Borrowed(pattern)
        };

        let regex = meta::Builder::new()
            .configure(meta_config)
            .syntax(syntax_config)
            .build(&source)
            .map_err(|e| CacheError::CompileFailed(e.to_string()))?;

        let approx_size_bytes = regex.memory_usage() as u64;

        Ok(Self {
            regex,
            pattern: pattern.to_string(),
            options: options.clone(),
            fingerprint,
            approx_size_bytes,
            refcount: AtomicU32::new(0),
            last_access: AtomicU64::new(clock::monotonic_now_ms()),
        })
    }

    /// Unanchored search: true if the pattern matches anywhere in `text`.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Byte range of the leftmost match, if any.
    pub fn find(&self, text: &str) -> Option<(usize, usize)> {
        self.regex.find(text).map(|m| (m.start(), m.end()))
    }

    /// Original pattern text.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Options the pattern was compiled with.
    pub fn options(&self) -> &PatternOptions {
        &self.options
    }

    /// Cache identity of this (pattern, options) pair.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Engine-reported program size, used for capacity accounting only.
    pub fn approx_size_bytes(&self) -> u64 {
        self.approx_size_bytes
    }

    /// Count of live caller references.
    pub fn refcount(&self) -> u32 {
        self.refcount.load(Ordering::SeqCst)
    }

    /// Acquire one caller reference. On the cache hit path this must run
    /// while the cache's read lock still pins the entry against eviction.
    pub(crate) fn acquire(&self) {
        self.refcount.fetch_add(1, Ordering::SeqCst);
    }

    /// Drop one caller reference. Lock-free; eviction re-reads the
    /// refcount under its own lock before freeing, so a concurrent release
    /// cannot race the free.
    pub(crate) fn release_ref(&self) -> u32 {
        match self
            .refcount
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                count.checked_sub(1)
            }) {
            Ok(previous) => previous - 1,
            Err(_) => {
                log::debug!("release of pattern {:?} with refcount already 0", self.pattern);
                0
            }
        }
    }

    pub(crate) fn touch(&self, now_ms: u64) {
        self.last_access.store(now_ms, Ordering::SeqCst);
    }

    /// Milliseconds-since-epoch of the most recent access.
    pub fn last_access_ms(&self) -> u64 {
        self.last_access.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for CompiledPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledPattern")
            .field("pattern", &self.pattern)
            .field("fingerprint", &self.fingerprint)
            .field("approx_size_bytes", &self.approx_size_bytes)
            .field("refcount", &self.refcount())
            .finish()
    }
}
