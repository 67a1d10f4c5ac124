// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Pattern compile options
//!
//! Options configure pattern compilation and participate in cache key
//! generation: the same pattern text compiled with different options is a
//! different cache entry. All fields are optional in JSON; missing fields
//! take their defaults.

use crate::error::{CacheError, CacheResult};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

/// Input/pattern text encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    #[serde(rename = "UTF8")]
    Utf8,
    #[serde(rename = "Latin1")]
    Latin1,
}

impl Default for Encoding {
    fn default() -> Self {
        Encoding::Utf8
    }
}

/// Pattern compilation options.
///
/// The flag set mirrors a POSIX/Perl regex engine's option surface. Flags
/// the active engine cannot express (`longest_match`, `never_nl`,
/// `never_capture`, `perl_classes`, `word_boundary`, `log_errors`) still
/// partition the caches through the option fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternOptions {
    /// POSIX egrep syntax rather than Perl-flavoured.
    pub posix_syntax: bool,
    /// Leftmost-longest match rather than leftmost-first.
    pub longest_match: bool,
    /// Let the engine log parse errors (disabled by default).
    pub log_errors: bool,
    /// Treat the entire pattern as literal text.
    pub literal: bool,
    /// `.` and negated classes refuse newline.
    pub never_nl: bool,
    /// `.` matches newline.
    pub dot_nl: bool,
    /// Parenthesised groups do not capture.
    pub never_capture: bool,
    /// Literal case matching rather than folded.
    pub case_sensitive: bool,
    /// Allow `\d \s \w` in POSIX mode.
    pub perl_classes: bool,
    /// Allow `\b \B` in POSIX mode.
    pub word_boundary: bool,
    /// `^` and `$` anchor only at text ends.
    pub one_line: bool,
    /// Pattern/input encoding.
    pub encoding: Encoding,
    /// Upper bound on compiled program bytes.
    pub max_mem: i64,

    // Computed once on first access, then reused for every cache lookup.
    #[serde(skip)]
    pub(crate) cached_fingerprint: OnceCell<u64>,
}

impl Default for PatternOptions {
    fn default() -> Self {
        Self {
            posix_syntax: false,
            longest_match: false,
            log_errors: false,
            literal: false,
            never_nl: false,
            dot_nl: false,
            never_capture: false,
            case_sensitive: true,
            perl_classes: false,
            word_boundary: false,
            one_line: false,
            encoding: Encoding::Utf8,
            max_mem: 8 * 1024 * 1024,
            cached_fingerprint: OnceCell::new(),
        }
    }
}

// The fingerprint cell is derived state; equality is over the option
// fields only.
impl PartialEq for PatternOptions {
    fn eq(&self, other: &Self) -> bool {
        self.posix_syntax == other.posix_syntax
            && self.longest_match == other.longest_match
            && self.log_errors == other.log_errors
            && self.literal == other.literal
            && self.never_nl == other.never_nl
            && self.dot_nl == other.dot_nl
            && self.never_capture == other.never_capture
            && self.case_sensitive == other.case_sensitive
            && self.perl_classes == other.perl_classes
            && self.word_boundary == other.word_boundary
            && self.one_line == other.one_line
            && self.encoding == other.encoding
            && self.max_mem == other.max_mem
    }
}

impl Eq for PatternOptions {}

impl PatternOptions {
    /// Default options with only `case_sensitive` overridden.
    pub fn case_sensitive(case_sensitive: bool) -> Self {
        Self {
            case_sensitive,
            ..Self::default()
        }
    }

    /// Parse options from a JSON document; an empty document yields the
    /// defaults, unknown fields are ignored.
    pub fn from_json(json: &str) -> CacheResult<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json).map_err(|e| match e.classify() {
            serde_json::error::Category::Data => CacheError::InvalidConfig(e.to_string()),
            _ => CacheError::BadInput(e.to_string()),
        })
    }

    /// Serialise the options to JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// 64-bit option fingerprint, computed once and cached on the record.
    ///
    /// Bits 0-10 hold the eleven boolean flags, bit 11 the encoding, bits
    /// 13-44 the low 32 bits of `max_mem`. Guaranteed non-zero.
    pub fn fingerprint(&self) -> u64 {
        *self
            .cached_fingerprint
            .get_or_init(|| self.compute_fingerprint())
    }

    fn compute_fingerprint(&self) -> u64 {
        let mut h = 0u64;

        let flags = [
            self.posix_syntax,
            self.longest_match,
            self.log_errors,
            self.literal,
            self.never_nl,
            self.dot_nl,
            self.never_capture,
            self.case_sensitive,
            self.perl_classes,
            self.word_boundary,
            self.one_line,
        ];
        for (bit, set) in flags.iter().enumerate() {
            if *set {
                h |= 1u64 << bit;
            }
        }

        if self.encoding == Encoding::Utf8 {
            h |= 1u64 << 11;
        }

        h |= ((self.max_mem as u64) & 0xFFFF_FFFF) << 13;

        // Zero is reserved for "not computed".
        if h == 0 {
            h = 1;
        }
        h
    }
}
