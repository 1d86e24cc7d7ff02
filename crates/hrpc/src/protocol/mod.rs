// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 the hrpc authors

//! Wire protocol constants and message header.
//!
//! Every HRPC message starts with a fixed 14-byte header:
//!
//! ```text
//! +--------+--------+--------+--------+--------+--------+--------+
//! | magic "HRPC" (4B)                 | pMajor | pMinor | eMajor |
//! +--------+--------+--------+--------+--------+--------+--------+
//! | eMinor | type   | compr  | total size (i32 LE)               |
//! +--------+--------+--------+--------+--------+--------+--------+
//! ```
//!
//! - **magic**: the literal bytes `HRPC`
//! - **pMajor/pMinor**: protocol version; a peer may send any minor up to
//!   ours, the major must match
//! - **eMajor/eMinor**: encoding version, same rule
//! - **type**: see [`MessageType`]
//! - **compr**: `0` = none, `1` = supported, `2` = compressed
//! - **total size**: whole message length including the header, little-endian
//!
//! This layout is the single source of truth; nothing else in the crate
//! hardcodes header offsets. Compatibility is byte-exact across releases.

pub mod buffer;

use self::buffer::MessageBuf;
use crate::error::{Error, Result};

// =======================================================================
// Constants
// =======================================================================

/// Message magic, the first four bytes of every frame.
pub const MESSAGE_MAGIC: &[u8; 4] = b"HRPC";

/// Protocol major version.
pub const PROTOCOL_MAJOR: u8 = 1;

/// Highest protocol minor version this build accepts.
pub const PROTOCOL_MINOR: u8 = 0;

/// Encoding major version.
pub const ENCODING_MAJOR: u8 = 1;

/// Highest encoding minor version this build accepts.
pub const ENCODING_MINOR: u8 = 0;

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 14;

/// Compression flag: payload is not compressed.
pub const COMPRESS_NONE: u8 = 0;

/// Compression flag: sender supports compressed replies.
pub const COMPRESS_SUPPORTED: u8 = 1;

/// Compression flag: payload is compressed.
pub const COMPRESS_YES: u8 = 2;

// =======================================================================
// Message types
// =======================================================================

/// Kind of message carried by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Two-way or one-way invocation
    Request = 0,
    /// Batch of one-way invocations
    BatchRequest = 1,
    /// Reply to a two-way invocation
    Reply = 2,
    /// Connection validation, sent by the server after accept
    ValidateConnection = 3,
    /// Orderly connection close
    CloseConnection = 4,
}

impl MessageType {
    /// Convert from the wire representation.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Request),
            1 => Some(Self::BatchRequest),
            2 => Some(Self::Reply),
            3 => Some(Self::ValidateConnection),
            4 => Some(Self::CloseConnection),
            _ => None,
        }
    }

    /// The wire representation.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

// =======================================================================
// Header
// =======================================================================

/// Parsed and validated message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Protocol version (major, minor)
    pub protocol: (u8, u8),
    /// Encoding version (major, minor)
    pub encoding: (u8, u8),
    /// Raw message type byte; unknown values are a dispatch concern, not a
    /// framing error
    pub message_type: u8,
    /// Compression flag
    pub compress: u8,
    /// Total message size including the header
    pub size: i32,
}

impl Header {
    /// Parse and validate a header from the first [`HEADER_SIZE`] bytes of
    /// `buf`.
    ///
    /// Validation order: magic, protocol version, encoding version, size
    /// lower bound, size upper bound (`message_size_max` in bytes).
    pub fn parse(buf: &[u8], message_size_max: i32) -> Result<Header> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::IllegalMessageSize(buf.len() as i32));
        }

        let magic: [u8; 4] = [buf[0], buf[1], buf[2], buf[3]];
        if &magic != MESSAGE_MAGIC {
            return Err(Error::BadMagic(magic));
        }

        let (p_major, p_minor) = (buf[4], buf[5]);
        if p_major != PROTOCOL_MAJOR || p_minor > PROTOCOL_MINOR {
            return Err(Error::UnsupportedProtocol {
                bad_major: p_major,
                bad_minor: p_minor,
                major: PROTOCOL_MAJOR,
                minor: PROTOCOL_MINOR,
            });
        }

        let (e_major, e_minor) = (buf[6], buf[7]);
        if e_major != ENCODING_MAJOR || e_minor > ENCODING_MINOR {
            return Err(Error::UnsupportedEncoding {
                bad_major: e_major,
                bad_minor: e_minor,
                major: ENCODING_MAJOR,
                minor: ENCODING_MINOR,
            });
        }

        let message_type = buf[8];
        let compress = buf[9];

        let size = i32::from_le_bytes([buf[10], buf[11], buf[12], buf[13]]);
        if size < HEADER_SIZE as i32 {
            return Err(Error::IllegalMessageSize(size));
        }
        if size > message_size_max {
            return Err(Error::MemoryLimit {
                size,
                max: message_size_max,
            });
        }

        Ok(Header {
            protocol: (p_major, p_minor),
            encoding: (e_major, e_minor),
            message_type,
            compress,
            size,
        })
    }

    /// Append this header to `buf` in wire layout.
    pub fn encode_into(&self, buf: &mut MessageBuf) {
        buf.write_blob(MESSAGE_MAGIC);
        buf.write_u8(self.protocol.0);
        buf.write_u8(self.protocol.1);
        buf.write_u8(self.encoding.0);
        buf.write_u8(self.encoding.1);
        buf.write_u8(self.message_type);
        buf.write_u8(self.compress);
        buf.write_i32_le(self.size);
    }
}

/// Append a frame header for an outgoing message of `total_size` bytes
/// (header included) to `buf`, using the current protocol and encoding
/// versions.
pub fn encode_header(
    buf: &mut MessageBuf,
    message_type: MessageType,
    compress: u8,
    total_size: i32,
) {
    Header {
        protocol: (PROTOCOL_MAJOR, PROTOCOL_MINOR),
        encoding: (ENCODING_MAJOR, ENCODING_MINOR),
        message_type: message_type.as_u8(),
        compress,
        size: total_size,
    }
    .encode_into(buf);
}
