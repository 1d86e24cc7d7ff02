// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 the hrpc authors

//! # HRPC transport engine
//!
//! The I/O core of the HRPC middleware runtime: a leader/follower thread
//! pool that multiplexes readiness over registered transport endpoints and
//! dispatches framed messages to their handlers.
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |                         Enclosing runtime                          |
//! |        connections, adapters, dispatch, user servants              |
//! +--------------------------------------------------------------------+
//! |                          ThreadPool                                |
//! |   register/unregister -> change queue -> self-pipe -> leader       |
//! |   leader: poll(2) -> promote follower -> frame -> dispatch         |
//! |   elastic sizing: Size..SizeMax workers, EWMA shrink               |
//! +--------------------------------------------------------------------+
//! |                        EventHandler impls                          |
//! |          stream transports | datagram transports                   |
//! +--------------------------------------------------------------------+
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use hrpc::{Instance, Properties, ThreadPool};
//!
//! fn main() -> hrpc::Result<()> {
//!     let properties = Arc::new(Properties::new());
//!     properties.set("Server.Size", "2");
//!     properties.set("Server.SizeMax", "8");
//!
//!     let instance = Instance::new(properties);
//!     let pool = ThreadPool::new(instance, "Server", 0)?;
//!
//!     // register transport handlers, run the application ...
//!
//!     pool.destroy()?;
//!     pool.join_with_all_threads();
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`pool`] - the thread pool and the [`EventHandler`] capability
//! - [`protocol`] - wire constants, header validation, message buffer
//! - [`config`] - runtime properties and pool sizing
//! - [`instance`] - per-runtime capability bundle
//! - [`logging`] - instance-held logger and output sinks
//! - [`error`] - crate-wide error taxonomy

pub mod config;
pub mod error;
pub mod instance;
pub mod logging;
pub mod pool;
pub mod protocol;

pub use config::{PoolConfig, Properties};
pub use error::{Error, Result};
pub use instance::{Instance, ShutdownHook};
pub use logging::{Logger, LogLevel};
pub use pool::{EventHandler, PoolStats, ThreadPool};
pub use protocol::buffer::MessageBuf;
pub use protocol::{Header, MessageType, HEADER_SIZE, MESSAGE_MAGIC};
