// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 the hrpc authors

//! Runtime properties and thread pool configuration.
//!
//! Configuration is a flat, string-keyed property store read once at
//! construction time. Thread pools derive their sizing from a `<prefix>`
//! namespace, so one runtime can host differently tuned pools (for example
//! `Server.*` and `Client.*`):
//!
//! | key | default | effect |
//! |-----|---------|--------|
//! | `<prefix>.Size` | 1 | initial and minimum worker count |
//! | `<prefix>.SizeMax` | Size | hard ceiling for elastic growth |
//! | `<prefix>.SizeWarn` | SizeMax * 80 / 100 | warn when `in_use` reaches this |
//! | `<prefix>.StackSize` | 0 | per-worker stack size in bytes (0 = platform default) |
//! | `MessageSizeMax` | 1024 | maximum message size in kilobytes |
//! | `Warn.Datagrams` | 0 | if > 0, log truncated datagrams |

use dashmap::DashMap;

// =======================================================================
// Property store
// =======================================================================

/// Flat string-keyed property store.
///
/// Reads are lock-free; writes are expected only during process setup.
/// Missing or unparsable values fall back to the caller-supplied default,
/// matching the forgiving lookup semantics the rest of the runtime relies
/// on.
#[derive(Debug, Default)]
pub struct Properties {
    map: DashMap<String, String>,
}

impl Properties {
    /// Create an empty property store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property, replacing any previous value.
    pub fn set(&self, key: &str, value: &str) {
        self.map.insert(key.to_string(), value.to_string());
    }

    /// Look up a property.
    pub fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).map(|v| v.value().clone())
    }

    /// Look up a property with a fallback.
    pub fn get_with_default(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// Look up an integer property; unset or unparsable values yield the
    /// default.
    pub fn get_int_with_default(&self, key: &str, default: i32) -> i32 {
        self.get(key)
            .and_then(|v| v.trim().parse::<i32>().ok())
            .unwrap_or(default)
    }

    /// Number of properties currently set.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// =======================================================================
// Pool configuration
// =======================================================================

/// Default `MessageSizeMax` in kilobytes.
pub const DEFAULT_MESSAGE_SIZE_MAX_KB: i32 = 1024;

/// Sizing parameters of one thread pool, derived from a property prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Initial and minimum worker count (`<prefix>.Size`, clamped to >= 1)
    pub size: i32,
    /// Growth ceiling (`<prefix>.SizeMax`, clamped to >= size)
    pub size_max: i32,
    /// In-use count that triggers a capacity warning (`<prefix>.SizeWarn`)
    pub size_warn: i32,
    /// Worker stack size in bytes (`<prefix>.StackSize`, clamped to >= 0;
    /// 0 keeps the platform default)
    pub stack_size: usize,
}

impl PoolConfig {
    /// Read and clamp the pool sizing properties under `prefix`.
    pub fn from_properties(properties: &Properties, prefix: &str) -> Self {
        // One worker is the fastest default and keeps handlers free of their
        // own locking.
        let mut size = properties.get_int_with_default(&format!("{}.Size", prefix), 1);
        if size < 1 {
            size = 1;
        }

        let mut size_max = properties.get_int_with_default(&format!("{}.SizeMax", prefix), size);
        if size_max < size {
            size_max = size;
        }

        let size_warn =
            properties.get_int_with_default(&format!("{}.SizeWarn", prefix), size_max * 80 / 100);

        let mut stack_size = properties.get_int_with_default(&format!("{}.StackSize", prefix), 0);
        if stack_size < 0 {
            stack_size = 0;
        }

        Self {
            size,
            size_max,
            size_warn,
            stack_size: stack_size as usize,
        }
    }
}

/// Read `MessageSizeMax` (kilobytes, clamped to >= 1) and convert to bytes.
pub fn message_size_max(properties: &Properties) -> i32 {
    let mut kb = properties.get_int_with_default("MessageSizeMax", DEFAULT_MESSAGE_SIZE_MAX_KB);
    if kb < 1 {
        kb = 1;
    }
    kb.saturating_mul(1024)
}
