// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 the hrpc authors

//! Leader/follower I/O thread pool.
//!
//! A small, elastic set of worker threads multiplexes readiness over every
//! registered descriptor. Exactly one worker, the leader, blocks in
//! `poll(2)`; the rest wait on a condition variable. Before a leader
//! processes an event it promotes a follower to take over the wait, so
//! dispatch runs in parallel without ever having two threads inside the
//! readiness primitive.
//!
//! ```text
//!  register/unregister            workers
//!  --------------------           -----------------------------------
//!  push change, poke  ----------> leader returns from poll(2)
//!  the self-pipe                  drains one change under the lock
//!                                 next iteration: new leader waits
//!                                 while this thread frames + dispatches
//! ```
//!
//! Sizing is elastic: the pool starts with `Size` workers, grows on demand
//! up to `SizeMax` (a worker is added whenever every running worker is in
//! use), and shrinks back when an exponentially weighted moving average of
//! the in-use count stays below the running count. A positive construction
//! timeout arms an idle watchdog: if no readiness occurs within the window
//! the pool invokes the instance shutdown hook once and disables the
//! timeout.

use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::os::unix::io::RawFd;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::instance::Instance;
use crate::pool::framer;
use crate::pool::handler::{EventHandler, HandlerEntry};
use crate::pool::interrupt::InterruptChannel;
use crate::pool::ready_set::ReadySet;
use crate::protocol::buffer::MessageBuf;

/// Smoothing factor of the in-use moving average driving shrink decisions.
const LOAD_FACTOR: f64 = 0.05;

/// Point-in-time worker accounting, for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Workers currently alive
    pub running: i32,
    /// Workers currently dispatching (leader excluded)
    pub in_use: i32,
}

/// Mutable pool state, guarded by the one pool mutex.
struct State {
    destroyed: bool,
    /// Idle timeout in seconds; zeroed after it fires once
    timeout_secs: i32,
    /// Deferred registration changes, applied by the leader in FIFO order
    changes: VecDeque<(RawFd, Option<Arc<dyn EventHandler>>)>,
    handlers: BTreeMap<RawFd, Arc<HandlerEntry>>,
    ready: ReadySet,
    running: i32,
    in_use: i32,
    load: f64,
    /// Leader handoff flag; true when the leader role is up for grabs
    promote: bool,
    threads: Vec<JoinHandle<()>>,
}

/// What the leader decided to do with a wake-up, resolved under the lock
/// and executed outside it.
enum Action {
    /// Idle timeout fired: run the instance shutdown hook
    Shutdown,
    /// A handler was unregistered: deliver `finished()`
    Finished(Arc<HandlerEntry>),
    /// A descriptor is readable: frame and deliver `message()`
    Dispatch(Arc<HandlerEntry>),
}

/// Leader/follower thread pool over a set of registered event handlers.
pub struct ThreadPool {
    self_ref: Weak<ThreadPool>,
    instance: Arc<Instance>,
    prefix: String,
    size: i32,
    size_max: i32,
    size_warn: i32,
    stack_size: usize,
    warn_datagrams: bool,
    message_size_max: i32,
    intr: InterruptChannel,
    state: Mutex<State>,
    cond: Condvar,
}

impl ThreadPool {
    /// Create a pool and spawn its initial workers.
    ///
    /// Sizing comes from the `<prefix>.*` properties of `instance`. A
    /// positive `timeout_secs` arms the idle-shutdown watchdog. If a worker
    /// cannot be spawned the pool is destroyed, joined and the error
    /// propagated.
    pub fn new(instance: Arc<Instance>, prefix: &str, timeout_secs: i32) -> Result<Arc<Self>> {
        let config = PoolConfig::from_properties(instance.properties(), prefix);
        let warn_datagrams = instance
            .properties()
            .get_int_with_default("Warn.Datagrams", 0)
            > 0;
        let message_size_max = instance.message_size_max();

        let intr = InterruptChannel::new()?;
        let ready = ReadySet::new(intr.read_fd());

        let pool = Arc::new_cyclic(|self_ref| ThreadPool {
            self_ref: self_ref.clone(),
            instance,
            prefix: prefix.to_string(),
            size: config.size,
            size_max: config.size_max,
            size_warn: config.size_warn,
            stack_size: config.stack_size,
            warn_datagrams,
            message_size_max,
            intr,
            state: Mutex::new(State {
                destroyed: false,
                timeout_secs,
                changes: VecDeque::new(),
                handlers: BTreeMap::new(),
                ready,
                running: 0,
                in_use: 0,
                load: 0.0,
                promote: true,
                threads: Vec::new(),
            }),
            cond: Condvar::new(),
        });

        for i in 0..config.size {
            match pool.spawn_worker(i) {
                Ok(handle) => {
                    let mut st = pool.state.lock();
                    st.threads.push(handle);
                    st.running += 1;
                }
                Err(e) => {
                    pool.instance
                        .logger()
                        .error(&format!("{}: cannot create worker thread: {}", prefix, e));
                    if let Err(de) = pool.destroy() {
                        pool.instance
                            .logger()
                            .error(&format!("{}: destroy after spawn failure: {}", prefix, de));
                    }
                    pool.join_with_all_threads();
                    return Err(e);
                }
            }
        }

        Ok(pool)
    }

    /// The property prefix this pool was configured from.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Current worker accounting.
    pub fn stats(&self) -> PoolStats {
        let st = self.state.lock();
        PoolStats {
            running: st.running,
            in_use: st.in_use,
        }
    }

    /// Register `handler` for readiness events on `fd`.
    ///
    /// The registration is queued and becomes visible to the readiness wait
    /// in FIFO order with respect to other register/unregister calls.
    pub fn register(&self, fd: RawFd, handler: Arc<dyn EventHandler>) -> Result<()> {
        let mut st = self.state.lock();
        assert!(!st.destroyed, "{}: register() after destroy()", self.prefix);
        st.changes.push_back((fd, Some(handler)));
        self.intr.set()
    }

    /// Remove the handler registered on `fd`. The handler's `finished()`
    /// runs on a pool worker once the removal takes effect.
    pub fn unregister(&self, fd: RawFd) -> Result<()> {
        let mut st = self.state.lock();
        assert!(!st.destroyed, "{}: unregister() after destroy()", self.prefix);
        st.changes.push_back((fd, None));
        self.intr.set()
    }

    /// Initiate shutdown. Every worker observes the interrupt on its next
    /// wake and exits; callers must have unregistered all handlers first.
    pub fn destroy(&self) -> Result<()> {
        let mut st = self.state.lock();
        assert!(!st.destroyed, "{}: destroy() called twice", self.prefix);
        assert!(
            st.handlers.is_empty() && st.changes.is_empty(),
            "{}: destroy() with live handlers",
            self.prefix
        );
        st.destroyed = true;
        // The interrupt stays set so that every worker, not just the current
        // leader, sees it on its way out.
        self.intr.set()
    }

    /// Wait for every worker to exit. Call after [`destroy`](Self::destroy).
    pub fn join_with_all_threads(&self) {
        let threads = {
            let mut st = self.state.lock();
            debug_assert!(st.destroyed);
            std::mem::take(&mut st.threads)
        };
        for handle in threads {
            let _ = handle.join();
        }
    }

    /// Hand the leader role to a follower.
    ///
    /// Called by the pool itself before the idle-shutdown hook, and by every
    /// `message()`/`finished()` implementation before blocking work. Grows
    /// the pool when all running workers are busy and warns once per climb
    /// through `SizeWarn`. No-op for a single-worker pool.
    pub fn promote_follower(&self) {
        if self.size_max <= 1 {
            return;
        }

        let mut st = self.state.lock();
        debug_assert!(!st.promote);
        st.promote = true;
        self.cond.notify_one();

        if st.destroyed {
            return;
        }

        st.in_use += 1;

        if st.in_use == self.size_warn {
            self.instance.logger().warning(&format!(
                "{}: thread pool is running low on threads (Size={}, SizeMax={}, SizeWarn={})",
                self.prefix, self.size, self.size_max, self.size_warn
            ));
        }

        debug_assert!(st.in_use <= st.running);
        if st.in_use < self.size_max && st.in_use == st.running {
            match self.spawn_worker(st.running) {
                Ok(handle) => {
                    st.threads.push(handle);
                    st.running += 1;
                }
                Err(e) => {
                    // The pool still works, just without the extra worker.
                    self.instance
                        .logger()
                        .error(&format!("{}: cannot create worker thread: {}", self.prefix, e));
                }
            }
        }
    }

    fn spawn_worker(&self, index: i32) -> Result<JoinHandle<()>> {
        let Some(pool) = self.self_ref.upgrade() else {
            return Err(Error::ThreadSpawn(io::Error::other("pool is gone")));
        };

        let mut builder = thread::Builder::new().name(format!("{}-io-{}", self.prefix, index));
        if self.stack_size > 0 {
            builder = builder.stack_size(self.stack_size);
        }
        builder
            .spawn(move || pool.worker_main())
            .map_err(Error::ThreadSpawn)
    }

    /// Worker entry point: run the reactor and, on the exit paths that
    /// require it, pass the leader role on without touching the accounting.
    fn worker_main(&self) {
        let promote = match self.run() {
            Ok(promote) => promote,
            Err(e) => {
                self.instance
                    .logger()
                    .error(&format!("{}: worker failed: {}", self.prefix, e));
                true
            }
        };

        if promote && self.size_max > 1 {
            let mut st = self.state.lock();
            debug_assert!(!st.promote);
            st.promote = true;
            self.cond.notify_one();
        }
    }

    /// One blocking readiness wait, retried on signal interruption.
    fn wait_for_readiness(&self, pollfds: &mut [libc::pollfd], timeout_ms: i32) -> io::Result<i32> {
        loop {
            // SAFETY: pollfds is a live, exclusively borrowed slice for the
            // duration of the call.
            let ret = unsafe {
                libc::poll(
                    pollfds.as_mut_ptr(),
                    pollfds.len() as libc::nfds_t,
                    timeout_ms,
                )
            };
            if ret >= 0 {
                return Ok(ret);
            }
            let errno = io::Error::last_os_error();
            if errno.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(errno);
        }
    }

    /// The reactor loop. Returns `Ok(true)` when the caller should hand the
    /// leader role on (pool destroyed or worker failure handled upstream)
    /// and `Ok(false)` when the worker retires because the pool shrank.
    fn run(&self) -> Result<bool> {
        if self.size_max > 1 {
            let mut st = self.state.lock();
            while !st.promote {
                self.cond.wait(&mut st);
            }
            st.promote = false;
        }

        'outer: loop {
            // Snapshot the descriptor set. Only the current leader, which is
            // this thread, mutates it, so the lock is held just long enough
            // to copy.
            let (mut pollfds, timeout_ms) = {
                let st = self.state.lock();
                let timeout_ms = if st.timeout_secs > 0 {
                    st.timeout_secs.saturating_mul(1000)
                } else {
                    -1
                };
                (st.ready.pollfds(), timeout_ms)
            };

            let ret = match self.wait_for_readiness(&mut pollfds, timeout_ms) {
                Ok(ret) => ret,
                Err(e) => {
                    // Transient; log and re-enter the wait.
                    self.instance
                        .logger()
                        .error(&format!("{}: poll() failed: {}", self.prefix, e));
                    continue;
                }
            };

            let action: Action = {
                let mut st = self.state.lock();

                if ret == 0 {
                    // Only a positive timeout can get us here.
                    debug_assert!(st.timeout_secs > 0);
                    st.timeout_secs = 0;
                    Action::Shutdown
                } else if pollfds[0].revents != 0 {
                    // Interrupted: either the pool is going down or a
                    // registration change is pending.
                    if st.destroyed {
                        return Ok(true);
                    }

                    self.intr.clear()?;

                    debug_assert!(!st.changes.is_empty());
                    let Some((fd, change)) = st.changes.pop_front() else {
                        continue 'outer;
                    };

                    match change {
                        Some(handler) => {
                            st.ready.insert(fd);
                            st.handlers.insert(fd, Arc::new(HandlerEntry::new(handler)));
                            debug_assert_eq!(st.ready.len(), st.handlers.len());
                            debug_assert!(st.ready.min_fd() <= st.ready.max_fd());
                            // Nothing to dispatch for an addition.
                            continue 'outer;
                        }
                        None => match st.handlers.remove(&fd) {
                            Some(entry) => {
                                st.ready.remove(fd);
                                debug_assert_eq!(st.ready.len(), st.handlers.len());
                                // finished() must run outside the lock, in
                                // this thread.
                                Action::Finished(entry)
                            }
                            None => {
                                self.instance.logger().error(&format!(
                                    "{}: descriptor {} is not registered",
                                    self.prefix, fd
                                ));
                                continue 'outer;
                            }
                        },
                    }
                } else {
                    let ready: Vec<RawFd> = pollfds[1..]
                        .iter()
                        .filter(|p| p.revents != 0)
                        .map(|p| p.fd)
                        .collect();

                    match st.ready.select_round_robin(&ready) {
                        None => {
                            self.instance.logger().error(&format!(
                                "{}: poll() reported {} ready descriptors but none is known",
                                self.prefix, ret
                            ));
                            continue 'outer;
                        }
                        Some(fd) => match st.handlers.get(&fd) {
                            Some(entry) => Action::Dispatch(Arc::clone(entry)),
                            None => {
                                self.instance.logger().error(&format!(
                                    "{}: descriptor {} is not registered",
                                    self.prefix, fd
                                ));
                                continue 'outer;
                            }
                        },
                    }
                }
            };

            // Past this point the lock is released; handler callbacks and
            // the framer never run under it.
            match action {
                Action::Shutdown => {
                    let Some(hook) = self.instance.shutdown_hook() else {
                        // Runtime already torn down; stay leader.
                        continue 'outer;
                    };
                    // Promote first so the shutdown runs in its own thread
                    // from this pool.
                    self.promote_follower();
                    hook.shutdown();
                }
                Action::Finished(entry) => {
                    if let Err(e) = entry.handler.finished(self) {
                        self.instance.logger().error(&format!(
                            "{}: error from finished() on {}: {}",
                            self.prefix,
                            entry.handler.label(),
                            e
                        ));
                    }
                    // finished() promoted its own follower; fall through.
                }
                Action::Dispatch(entry) => {
                    let mut message = MessageBuf::new();
                    if entry.handler.readable() {
                        let mut stream = entry.stream.lock();
                        match framer::read_message(
                            &*entry.handler,
                            &mut stream,
                            self.message_size_max,
                            self.warn_datagrams,
                            self.instance.logger(),
                        ) {
                            Ok(()) => message = stream.take(),
                            Err(e) if e.is_expected() => continue 'outer,
                            Err(e) => {
                                drop(stream);
                                entry.handler.exception(&e);
                                continue 'outer;
                            }
                        }
                    }

                    if let Err(e) = entry.handler.message(message, self) {
                        self.instance.logger().error(&format!(
                            "{}: error from message() on {}: {}",
                            self.prefix,
                            entry.handler.label(),
                            e
                        ));
                    }
                    // message() promoted its own follower; fall through.
                }
            }

            if self.size_max > 1 {
                let mut st = self.state.lock();

                if !st.destroyed {
                    // Reap workers that retired since the last pass.
                    if (st.running as usize) < st.threads.len() {
                        let (alive, dead): (Vec<_>, Vec<_>) = st
                            .threads
                            .drain(..)
                            .partition(|handle| !handle.is_finished());
                        st.threads = alive;
                        for handle in dead {
                            let _ = handle.join();
                        }
                    }

                    st.load = st.load * (1.0 - LOAD_FACTOR) + f64::from(st.in_use) * LOAD_FACTOR;

                    if st.running > self.size {
                        let load = st.load as i32 + 1;
                        if load < st.running {
                            debug_assert!(st.in_use > 0);
                            st.in_use -= 1;
                            st.running -= 1;
                            // This worker retires; no promotion on the way
                            // out.
                            return Ok(false);
                        }
                    }

                    debug_assert!(st.in_use > 0);
                    st.in_use -= 1;
                }

                while !st.promote {
                    self.cond.wait(&mut st);
                }
                st.promote = false;
            }
        }
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("ThreadPool")
            .field("prefix", &self.prefix)
            .field("size", &self.size)
            .field("size_max", &self.size_max)
            .field("running", &stats.running)
            .field("in_use", &stats.in_use)
            .finish()
    }
}
