// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 the hrpc authors

//! Self-pipe used to wake the leader out of the readiness wait.
//!
//! A Unix socket pair where every [`set`](InterruptChannel::set) writes
//! exactly one byte and every [`clear`](InterruptChannel::clear) consumes
//! exactly one. The read end is non-blocking and is a permanent member of
//! the readiness set, so a queued registration change (or pool destruction)
//! turns into an ordinary readiness event on the leader.

use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;

use crate::error::{Error, Result};

/// Wake-up channel between callers and the blocked leader.
#[derive(Debug)]
pub(crate) struct InterruptChannel {
    read: UnixStream,
    write: UnixStream,
}

impl InterruptChannel {
    /// Open the channel. The read end is switched to non-blocking so a
    /// drain can never wedge a worker.
    pub(crate) fn new() -> Result<Self> {
        let (read, write) = UnixStream::pair().map_err(|e| Error::Syscall {
            op: "socketpair",
            errno: e,
        })?;
        read.set_nonblocking(true).map_err(|e| Error::Syscall {
            op: "fcntl",
            errno: e,
        })?;
        Ok(Self { read, write })
    }

    /// Descriptor the readiness wait monitors.
    pub(crate) fn read_fd(&self) -> RawFd {
        self.read.as_raw_fd()
    }

    /// Write one wake-up byte, retrying when interrupted by a signal.
    pub(crate) fn set(&self) -> Result<()> {
        let byte = [0u8; 1];
        loop {
            // SAFETY: byte is a live one-byte stack buffer and the fd is
            // owned by self for the whole call.
            let n = unsafe { libc::write(self.write.as_raw_fd(), byte.as_ptr().cast(), 1) };
            if n == 1 {
                return Ok(());
            }
            if n == 0 {
                return Err(Error::Syscall {
                    op: "write",
                    errno: io::Error::new(io::ErrorKind::WriteZero, "interrupt byte not written"),
                });
            }
            let errno = io::Error::last_os_error();
            if errno.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(Error::Syscall { op: "write", errno });
        }
    }

    /// Consume exactly one wake-up byte, retrying when interrupted by a
    /// signal. Fails if no byte is pending; callers only clear after the
    /// readiness wait reported the read end readable.
    pub(crate) fn clear(&self) -> Result<()> {
        let mut byte = [0u8; 1];
        loop {
            // SAFETY: byte is a live one-byte stack buffer and the fd is
            // owned by self for the whole call.
            let n = unsafe { libc::read(self.read.as_raw_fd(), byte.as_mut_ptr().cast(), 1) };
            if n == 1 {
                return Ok(());
            }
            if n == 0 {
                return Err(Error::Syscall {
                    op: "read",
                    errno: io::Error::new(io::ErrorKind::UnexpectedEof, "interrupt channel closed"),
                });
            }
            let errno = io::Error::last_os_error();
            if errno.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(Error::Syscall { op: "read", errno });
        }
    }
}
