// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for the caching subsystem

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Configuration document could not be parsed at all.
    #[error("Invalid configuration input: {0}")]
    BadInput(String),

    /// Configuration parsed but failed semantic validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The regex engine rejected the pattern; the message is the engine's
    /// diagnostic.
    #[error("Pattern compilation failed: {0}")]
    CompileFailed(String),

    /// `init` called while the cache system is already initialised.
    #[error("Cache already initialized")]
    AlreadyInitialized,
}

pub type CacheResult<T> = Result<T, CacheError>;
