// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 the hrpc authors

//! Per-runtime capability bundle.
//!
//! An [`Instance`] carries everything a thread pool needs from its enclosing
//! runtime: the property store, the logger and the shutdown hook invoked on
//! idle timeout. There are no process-wide singletons; a process can host
//! several independent runtimes.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::{self, Properties};
use crate::logging::Logger;

/// Entry point the pool invokes when its idle timeout elapses.
///
/// In a full runtime this is implemented by the server-side adapter
/// registry. The pool promotes a follower before invoking the hook, so the
/// shutdown runs in a dedicated worker and may itself dispatch work back
/// into the pool.
pub trait ShutdownHook: Send + Sync {
    /// Initiate shutdown of the enclosing runtime.
    fn shutdown(&self);
}

/// Shared runtime context handed to every component at construction.
pub struct Instance {
    properties: Arc<Properties>,
    logger: Logger,
    message_size_max: i32,
    shutdown_hook: RwLock<Option<Arc<dyn ShutdownHook>>>,
}

impl Instance {
    /// Create an instance with the default stderr logger.
    pub fn new(properties: Arc<Properties>) -> Arc<Self> {
        Self::with_logger(properties, Logger::stderr())
    }

    /// Create an instance with a caller-supplied logger.
    pub fn with_logger(properties: Arc<Properties>, logger: Logger) -> Arc<Self> {
        let message_size_max = config::message_size_max(&properties);
        Arc::new(Self {
            properties,
            logger,
            message_size_max,
            shutdown_hook: RwLock::new(None),
        })
    }

    /// The runtime property store.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// The runtime logger.
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Maximum accepted message size in bytes (`MessageSizeMax`).
    pub fn message_size_max(&self) -> i32 {
        self.message_size_max
    }

    /// Install the idle-shutdown hook. Replaces any previous hook.
    pub fn set_shutdown_hook(&self, hook: Arc<dyn ShutdownHook>) {
        *self.shutdown_hook.write() = Some(hook);
    }

    /// The idle-shutdown hook, if one is installed. `None` means the
    /// enclosing runtime is already torn down and there is nothing to shut
    /// down.
    pub fn shutdown_hook(&self) -> Option<Arc<dyn ShutdownHook>> {
        self.shutdown_hook.read().clone()
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("message_size_max", &self.message_size_max)
            .field("properties", &self.properties.len())
            .finish()
    }
}
