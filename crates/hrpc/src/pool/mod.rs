// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 the hrpc authors

//! Leader/follower I/O thread pool.
//!
//! The pool is built from five pieces:
//!
//! - `interrupt`: self-pipe that wakes the leader out of `poll(2)`
//! - `ready_set`: monitored descriptors plus round-robin selection state
//! - `handler`: the [`EventHandler`] capability bound to each descriptor
//! - `framer`: reads and validates one message per readiness event
//! - `thread_pool`: the coordinator tying it together
//!
//! See [`ThreadPool`] for the full lifecycle description.

mod framer;
mod handler;
mod interrupt;
mod ready_set;
mod thread_pool;

pub use handler::EventHandler;
pub use thread_pool::{PoolStats, ThreadPool};
