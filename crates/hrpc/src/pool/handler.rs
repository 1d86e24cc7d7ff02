// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 the hrpc authors

//! The event handler capability.
//!
//! An [`EventHandler`] binds a registered descriptor to its transport. The
//! pool drives it through a fixed lifecycle: readiness events feed
//! [`read`](EventHandler::read) via the framer, a complete frame is handed
//! to [`message`](EventHandler::message), and after unregistration takes
//! effect [`finished`](EventHandler::finished) runs exactly once.
//!
//! # Promotion contract
//!
//! `message` and `finished` execute on a worker that is still the pool
//! leader. Both must call
//! [`ThreadPool::promote_follower`](super::ThreadPool::promote_follower)
//! before doing anything that could block; otherwise no other thread waits
//! for readiness and the pool stalls.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::pool::ThreadPool;
use crate::protocol::buffer::MessageBuf;

/// Transport-side callbacks invoked by the pool.
pub trait EventHandler: Send + Sync {
    /// Whether framed reads should be performed on readiness. Handlers that
    /// consume their transport elsewhere return `false` and receive an empty
    /// stream in [`message`](Self::message).
    fn readable(&self) -> bool;

    /// Whether the transport has datagram semantics. A truncated datagram is
    /// rejected instead of completed by further reads.
    fn datagram(&self) -> bool {
        false
    }

    /// Append transport bytes into `stream` until its target length is
    /// reached. Returns [`Error::Timeout`] when the transport cannot make
    /// progress now; the partial stream is kept and the read resumes on the
    /// next readiness event.
    fn read(&self, stream: &mut MessageBuf) -> Result<()>;

    /// Consume one complete frame. See the promotion contract above.
    fn message(&self, stream: MessageBuf, pool: &ThreadPool) -> Result<()>;

    /// Notification that the handler left the pool. Called exactly once,
    /// after which the pool holds no reference to the handler. See the
    /// promotion contract above.
    fn finished(&self, pool: &ThreadPool) -> Result<()>;

    /// Receive a framing or transport error for this descriptor. The
    /// descriptor stays registered; most transports unregister themselves
    /// here.
    fn exception(&self, _err: &Error) {}

    /// Diagnostic label used in log messages.
    fn label(&self) -> String;
}

/// Handler table entry: the handler plus its in-progress message stream.
///
/// The stream lives beside the handler rather than inside it so the framer
/// can fill it across multiple readiness events. Events for one descriptor
/// are serialized by the leader, so the mutex is uncontended; it exists to
/// make the entry shareable with the dispatching worker outside the pool
/// lock.
pub(crate) struct HandlerEntry {
    pub(crate) handler: Arc<dyn EventHandler>,
    pub(crate) stream: Mutex<MessageBuf>,
}

impl HandlerEntry {
    pub(crate) fn new(handler: Arc<dyn EventHandler>) -> Self {
        Self {
            handler,
            stream: Mutex::new(MessageBuf::new()),
        }
    }
}
