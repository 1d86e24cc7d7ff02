// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 the hrpc authors

//! Message framer.
//!
//! Reads and validates exactly one message from a handler's stream. On
//! success the stream holds a complete frame, header included, ready for
//! `message()`. The framer is incremental: a stream peer that delivers a
//! frame in pieces yields [`Error::Timeout`] and the partially filled stream
//! is resumed on the next readiness event.
//!
//! Datagram transports are one-shot. If the bytes already received fall
//! short of the declared total size the frame can never be completed, so the
//! framer raises [`Error::DatagramLimit`] and drops the stream content.

use crate::error::{Error, Result};
use crate::logging::Logger;
use crate::pool::handler::EventHandler;
use crate::protocol::buffer::MessageBuf;
use crate::protocol::{Header, HEADER_SIZE};

/// Fill `stream` with one complete, validated message from `handler`.
///
/// `message_size_max` bounds the declared total size; `warn_datagrams`
/// controls whether truncated datagrams are logged.
pub(crate) fn read_message(
    handler: &dyn EventHandler,
    stream: &mut MessageBuf,
    message_size_max: i32,
    warn_datagrams: bool,
    logger: &Logger,
) -> Result<()> {
    if stream.is_empty() {
        stream.resize(HEADER_SIZE);
        stream.rewind();
    }

    if !stream.is_complete() {
        handler.read(stream)?;
        debug_assert!(stream.is_complete());
    }

    // The header is in hand; everything received so far ends at pos.
    let pos = stream.pos();
    debug_assert!(pos >= HEADER_SIZE);

    let header = Header::parse(stream.as_slice(), message_size_max)?;
    let size = header.size as usize;

    if size > stream.len() {
        stream.resize(size);
    }
    stream.set_pos(pos);

    if !stream.is_complete() {
        if handler.datagram() {
            if warn_datagrams {
                logger.warning(&format!(
                    "maximum datagram size of {} exceeded by {}",
                    pos,
                    handler.label()
                ));
            }
            let received = pos;
            stream.clear();
            return Err(Error::DatagramLimit {
                expected: size,
                received,
            });
        }
        handler.read(stream)?;
        debug_assert!(stream.is_complete());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{Logger, LogLevel, Output};
    use crate::pool::ThreadPool;
    use crate::protocol::{encode_header, MessageType, COMPRESS_NONE};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Handler that serves reads from a canned byte sequence, in bounded
    /// chunks, and reports would-block when the sequence runs dry.
    struct ScriptedHandler {
        data: Mutex<Vec<u8>>,
        datagram: bool,
    }

    impl ScriptedHandler {
        fn stream_from(bytes: &[u8]) -> Self {
            Self {
                data: Mutex::new(bytes.to_vec()),
                datagram: false,
            }
        }

        fn datagram_from(bytes: &[u8]) -> Self {
            Self {
                data: Mutex::new(bytes.to_vec()),
                datagram: true,
            }
        }

        fn feed(&self, bytes: &[u8]) {
            self.data.lock().extend_from_slice(bytes);
        }
    }

    impl EventHandler for ScriptedHandler {
        fn readable(&self) -> bool {
            true
        }

        fn datagram(&self) -> bool {
            self.datagram
        }

        fn read(&self, stream: &mut MessageBuf) -> crate::error::Result<()> {
            let mut data = self.data.lock();
            if self.datagram {
                // One whole packet per read; the stream grows to fit it.
                if data.is_empty() {
                    return Err(Error::Timeout);
                }
                let n = data.len();
                let pos = stream.pos();
                if pos + n > stream.len() {
                    stream.resize(pos + n);
                }
                stream.unread()[..n].copy_from_slice(&data);
                data.clear();
                stream.advance(n);
                return Ok(());
            }
            while !stream.is_complete() {
                if data.is_empty() {
                    return Err(Error::Timeout);
                }
                let n = stream.remaining().min(data.len());
                stream.unread()[..n].copy_from_slice(&data[..n]);
                data.drain(..n);
                stream.advance(n);
            }
            Ok(())
        }

        fn message(&self, _stream: MessageBuf, _pool: &ThreadPool) -> crate::error::Result<()> {
            Ok(())
        }

        fn finished(&self, _pool: &ThreadPool) -> crate::error::Result<()> {
            Ok(())
        }

        fn label(&self) -> String {
            "scripted handler".to_string()
        }
    }

    #[derive(Default)]
    struct WarnCounter {
        warnings: Mutex<usize>,
    }

    impl Output for WarnCounter {
        fn write(&self, level: LogLevel, _message: &str) -> std::io::Result<()> {
            if level == LogLevel::Warning {
                *self.warnings.lock() += 1;
            }
            Ok(())
        }

        fn flush(&self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn quiet_logger() -> Logger {
        Logger::new(Arc::new(WarnCounter::default()), LogLevel::Error)
    }

    fn frame(payload: &[u8]) -> Vec<u8> {
        let total = (HEADER_SIZE + payload.len()) as i32;
        let mut buf = MessageBuf::new();
        encode_header(&mut buf, MessageType::Request, COMPRESS_NONE, total);
        buf.write_blob(payload);
        buf.into_vec()
    }

    fn header_only(total: i32) -> Vec<u8> {
        let mut buf = MessageBuf::new();
        encode_header(&mut buf, MessageType::Request, COMPRESS_NONE, total);
        buf.into_vec()
    }

    const MAX: i32 = 1024;

    #[test]
    fn test_reads_complete_frame() {
        let handler = ScriptedHandler::stream_from(&frame(&[1, 2, 3, 4]));
        let mut stream = MessageBuf::new();
        read_message(&handler, &mut stream, MAX, false, &quiet_logger()).unwrap();
        assert!(stream.is_complete());
        assert_eq!(stream.len(), HEADER_SIZE + 4);
        assert_eq!(&stream.as_slice()[HEADER_SIZE..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_header_only_frame() {
        let handler = ScriptedHandler::stream_from(&frame(&[]));
        let mut stream = MessageBuf::new();
        read_message(&handler, &mut stream, MAX, false, &quiet_logger()).unwrap();
        assert_eq!(stream.len(), HEADER_SIZE);
    }

    #[test]
    fn test_partial_read_resumes() {
        let full = frame(&[7; 8]);
        let handler = ScriptedHandler::stream_from(&full[..5]);
        let mut stream = MessageBuf::new();

        // Not even the header arrived yet.
        assert!(matches!(
            read_message(&handler, &mut stream, MAX, false, &quiet_logger()),
            Err(Error::Timeout)
        ));
        assert_eq!(stream.pos(), 5);

        // Header complete, payload still short.
        handler.feed(&full[5..HEADER_SIZE + 3]);
        assert!(matches!(
            read_message(&handler, &mut stream, MAX, false, &quiet_logger()),
            Err(Error::Timeout)
        ));

        // Rest of the payload lands.
        handler.feed(&full[HEADER_SIZE + 3..]);
        read_message(&handler, &mut stream, MAX, false, &quiet_logger()).unwrap();
        assert!(stream.is_complete());
        assert_eq!(&stream.as_slice()[HEADER_SIZE..], &[7; 8]);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes = frame(&[1]);
        bytes[0] = b'x';
        let handler = ScriptedHandler::stream_from(&bytes);
        let mut stream = MessageBuf::new();
        assert!(matches!(
            read_message(&handler, &mut stream, MAX, false, &quiet_logger()),
            Err(Error::BadMagic(_))
        ));
    }

    #[test]
    fn test_illegal_size_rejected() {
        let mut bytes = frame(&[]);
        let bad = (HEADER_SIZE as i32 - 1).to_le_bytes();
        bytes[10..14].copy_from_slice(&bad);
        let handler = ScriptedHandler::stream_from(&bytes);
        let mut stream = MessageBuf::new();
        assert!(matches!(
            read_message(&handler, &mut stream, MAX, false, &quiet_logger()),
            Err(Error::IllegalMessageSize(_))
        ));
    }

    #[test]
    fn test_memory_limit_rejected() {
        let mut bytes = frame(&[]);
        bytes[10..14].copy_from_slice(&(MAX + 1).to_le_bytes());
        let handler = ScriptedHandler::stream_from(&bytes);
        let mut stream = MessageBuf::new();
        assert!(matches!(
            read_message(&handler, &mut stream, MAX, false, &quiet_logger()),
            Err(Error::MemoryLimit { .. })
        ));
    }

    #[test]
    fn test_truncated_datagram_rejected() {
        // Header declares a payload that never arrived.
        let bytes = header_only((HEADER_SIZE + 8) as i32);
        let handler = ScriptedHandler::datagram_from(&bytes);
        let mut stream = MessageBuf::new();
        match read_message(&handler, &mut stream, MAX, false, &quiet_logger()) {
            Err(Error::DatagramLimit { expected, received }) => {
                assert_eq!(expected, HEADER_SIZE + 8);
                assert_eq!(received, HEADER_SIZE);
            }
            other => panic!("expected DatagramLimit, got {:?}", other),
        }
        // One-shot: nothing is kept for a retry.
        assert!(stream.is_empty());
    }

    #[test]
    fn test_truncated_datagram_warns_when_enabled() {
        let bytes = header_only((HEADER_SIZE + 8) as i32);

        let sink = Arc::new(WarnCounter::default());
        let logger = Logger::new(sink.clone(), LogLevel::Debug);

        let handler = ScriptedHandler::datagram_from(&bytes);
        let mut stream = MessageBuf::new();
        let _ = read_message(&handler, &mut stream, MAX, true, &logger);
        assert_eq!(*sink.warnings.lock(), 1);

        // Disabled by default.
        let handler = ScriptedHandler::datagram_from(&bytes);
        let mut stream = MessageBuf::new();
        let _ = read_message(&handler, &mut stream, MAX, false, &logger);
        assert_eq!(*sink.warnings.lock(), 1);
    }

    #[test]
    fn test_complete_datagram_accepted() {
        let handler = ScriptedHandler::datagram_from(&frame(&[9, 9, 9]));
        let mut stream = MessageBuf::new();
        // The whole packet arrives with the header fill; no second read.
        read_message(&handler, &mut stream, MAX, false, &quiet_logger()).unwrap();
        assert!(stream.is_complete());
        assert_eq!(&stream.as_slice()[HEADER_SIZE..], &[9, 9, 9]);
    }
}
