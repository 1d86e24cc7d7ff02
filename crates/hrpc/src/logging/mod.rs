// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 the hrpc authors

//! Instance-held logging.
//!
//! A [`Logger`] bundles an [`Output`] sink with a minimum [`LogLevel`] and is
//! owned by the [`Instance`](crate::instance::Instance) capability bundle.
//! There is deliberately no process-wide logger: two runtimes in one process
//! log independently, and embedding applications plug in their own sink by
//! implementing [`Output`].
//!
//! Sink failures are swallowed; logging never becomes a reason for a worker
//! thread to die.

mod output;

pub use output::{ConsoleOutput, FileOutput, LogLevel, Output};

use std::sync::Arc;

/// Level-filtered front end over an [`Output`] sink.
#[derive(Clone)]
pub struct Logger {
    output: Arc<dyn Output>,
    level: LogLevel,
}

impl Logger {
    /// Create a logger writing to the given sink at the given minimum level.
    pub fn new(output: Arc<dyn Output>, level: LogLevel) -> Self {
        Self { output, level }
    }

    /// Convenience constructor: stderr sink at `Info` level.
    pub fn stderr() -> Self {
        Self::new(Arc::new(ConsoleOutput::new()), LogLevel::Info)
    }

    /// Whether a message at `level` would be emitted.
    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.level
    }

    fn log(&self, level: LogLevel, message: &str) {
        if level >= self.level {
            let _ = self.output.write(level, message);
        }
    }

    /// Emit a debug-level message.
    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    /// Emit an info-level message.
    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    /// Emit a warning-level message.
    pub fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }

    /// Emit an error-level message.
    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    /// Flush the underlying sink.
    pub fn flush(&self) {
        let _ = self.output.flush();
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger").field("level", &self.level).finish()
    }
}
