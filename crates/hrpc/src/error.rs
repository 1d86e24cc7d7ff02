// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 the hrpc authors

//! Crate-wide error taxonomy.
//!
//! Groups every failure the transport engine can report:
//!
//! - **Framing**: header validation failures ([`Error::BadMagic`],
//!   [`Error::UnsupportedProtocol`], [`Error::UnsupportedEncoding`],
//!   [`Error::IllegalMessageSize`], [`Error::MemoryLimit`],
//!   [`Error::DatagramLimit`])
//! - **Transport**: [`Error::Timeout`] (would-block reads) and [`Error::Io`]
//! - **System**: [`Error::Syscall`] from the interrupt channel or the
//!   readiness wait
//! - **Lifecycle**: [`Error::ThreadSpawn`]
//!
//! [`Error::Timeout`] and [`Error::DatagramLimit`] are expected outcomes of a
//! dispatch attempt, not faults; the reactor skips the message and keeps
//! going. See [`Error::is_expected`].

use std::error;
use std::fmt;
use std::io;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the thread pool, the framer and the interrupt channel.
#[derive(Debug)]
pub enum Error {
    /// Message did not start with the protocol magic.
    BadMagic([u8; 4]),

    /// Peer speaks a protocol version we cannot handle.
    UnsupportedProtocol {
        /// Major version found in the header
        bad_major: u8,
        /// Minor version found in the header
        bad_minor: u8,
        /// Major version this build supports
        major: u8,
        /// Highest minor version this build supports
        minor: u8,
    },

    /// Peer uses an encoding version we cannot handle.
    UnsupportedEncoding {
        /// Major version found in the header
        bad_major: u8,
        /// Minor version found in the header
        bad_minor: u8,
        /// Major version this build supports
        major: u8,
        /// Highest minor version this build supports
        minor: u8,
    },

    /// Header declared a total size smaller than the header itself.
    IllegalMessageSize(i32),

    /// Header declared a total size above the configured maximum.
    MemoryLimit {
        /// Declared total size
        size: i32,
        /// Configured `MessageSizeMax` in bytes
        max: i32,
    },

    /// A datagram arrived truncated; datagrams are one-shot and cannot be
    /// completed by further reads.
    DatagramLimit {
        /// Total size declared by the header
        expected: usize,
        /// Bytes actually received
        received: usize,
    },

    /// The transport cannot make progress right now (non-blocking read would
    /// block). The partial stream is kept and completed on the next readiness
    /// event.
    Timeout,

    /// Transport-level I/O failure raised by a handler's `read`.
    Io(io::Error),

    /// A raw system call failed.
    Syscall {
        /// Name of the failing call
        op: &'static str,
        /// Captured OS error
        errno: io::Error,
    },

    /// Worker thread could not be created.
    ThreadSpawn(io::Error),
}

impl Error {
    /// Whether this error is an expected dispatch outcome rather than a
    /// fault. The reactor continues without notifying the handler.
    pub fn is_expected(&self) -> bool {
        matches!(self, Error::Timeout | Error::DatagramLimit { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadMagic(bytes) => write!(
                f,
                "invalid message magic: {:02x} {:02x} {:02x} {:02x}",
                bytes[0], bytes[1], bytes[2], bytes[3]
            ),
            Error::UnsupportedProtocol {
                bad_major,
                bad_minor,
                major,
                minor,
            } => write!(
                f,
                "unsupported protocol version {}.{} (this build supports up to {}.{})",
                bad_major, bad_minor, major, minor
            ),
            Error::UnsupportedEncoding {
                bad_major,
                bad_minor,
                major,
                minor,
            } => write!(
                f,
                "unsupported encoding version {}.{} (this build supports up to {}.{})",
                bad_major, bad_minor, major, minor
            ),
            Error::IllegalMessageSize(size) => {
                write!(f, "illegal message size: {}", size)
            }
            Error::MemoryLimit { size, max } => {
                write!(f, "message of {} bytes exceeds MessageSizeMax of {} bytes", size, max)
            }
            Error::DatagramLimit { expected, received } => write!(
                f,
                "datagram truncated: received {} of {} bytes",
                received, expected
            ),
            Error::Timeout => write!(f, "transport read timed out"),
            Error::Io(e) => write!(f, "transport I/O error: {}", e),
            Error::Syscall { op, errno } => write!(f, "{}() failed: {}", op, errno),
            Error::ThreadSpawn(e) => write!(f, "cannot spawn worker thread: {}", e),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io(e) | Error::ThreadSpawn(e) | Error::Syscall { errno: e, .. } => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_errors() {
        assert!(Error::Timeout.is_expected());
        assert!(Error::DatagramLimit {
            expected: 64,
            received: 20
        }
        .is_expected());
        assert!(!Error::BadMagic([0; 4]).is_expected());
        assert!(!Error::Io(io::Error::other("boom")).is_expected());
    }

    #[test]
    fn test_display_contains_versions() {
        let e = Error::UnsupportedProtocol {
            bad_major: 2,
            bad_minor: 7,
            major: 1,
            minor: 0,
        };
        let text = e.to_string();
        assert!(text.contains("2.7"));
        assert!(text.contains("1.0"));
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error as _;
        let e = Error::Syscall {
            op: "write",
            errno: io::Error::from_raw_os_error(libc::EPIPE),
        };
        assert!(e.source().is_some());
        assert!(Error::Timeout.source().is_none());
    }
}
