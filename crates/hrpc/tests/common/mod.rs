// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 the hrpc authors

//! Shared fixtures for the thread pool integration tests.

#![allow(dead_code)]

use std::io::Read;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Barrier};

use parking_lot::Mutex;

use hrpc::logging::{ConsoleOutput, Output};
use hrpc::protocol::{encode_header, MessageType, COMPRESS_NONE};
use hrpc::{
    Error, EventHandler, Instance, LogLevel, Logger, MessageBuf, Properties, Result, ThreadPool,
    HEADER_SIZE,
};

/// What a test handler observed, reported through an mpsc channel.
#[derive(Debug, PartialEq, Eq)]
pub enum HandlerEvent {
    /// `message()` ran; carries the payload bytes after the header.
    Message(Vec<u8>),
    /// `exception()` ran; carries the error text.
    Exception(String),
    /// `finished()` ran.
    Finished,
}

/// Build an instance with quiet logging and the given properties.
pub fn test_instance(props: &[(&str, &str)]) -> Arc<Instance> {
    test_instance_with_sink(props, Arc::new(ConsoleOutput::new()), LogLevel::Error)
}

/// Build an instance logging to a caller-supplied sink.
pub fn test_instance_with_sink(
    props: &[(&str, &str)],
    sink: Arc<dyn Output>,
    level: LogLevel,
) -> Arc<Instance> {
    let properties = Arc::new(Properties::new());
    for (key, value) in props {
        properties.set(key, value);
    }
    Instance::with_logger(properties, Logger::new(sink, level))
}

/// Encode one request frame with the given payload.
pub fn frame(payload: &[u8]) -> Vec<u8> {
    let total = (HEADER_SIZE + payload.len()) as i32;
    let mut buf = MessageBuf::new();
    encode_header(&mut buf, MessageType::Request, COMPRESS_NONE, total);
    buf.write_blob(payload);
    buf.into_vec()
}

/// Log sink that records warnings, for asserting on SizeWarn.
#[derive(Default)]
pub struct WarnCounting {
    pub warnings: Mutex<Vec<String>>,
}

impl Output for WarnCounting {
    fn write(&self, level: LogLevel, message: &str) -> std::io::Result<()> {
        if level == LogLevel::Warning {
            self.warnings.lock().push(message.to_string());
        }
        Ok(())
    }

    fn flush(&self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Stream-transport handler over one end of a Unix socket pair.
///
/// Reports everything it observes through the event channel. An optional
/// barrier makes `message()` block until enough workers dispatch
/// concurrently, which is how the growth tests force the pool to its
/// ceiling.
pub struct StreamHandler {
    socket: UnixStream,
    events: Mutex<Sender<HandlerEvent>>,
    barrier: Option<Arc<Barrier>>,
}

impl StreamHandler {
    pub fn new(socket: UnixStream, events: Sender<HandlerEvent>) -> Arc<Self> {
        Self::build(socket, events, None)
    }

    pub fn with_barrier(
        socket: UnixStream,
        events: Sender<HandlerEvent>,
        barrier: Arc<Barrier>,
    ) -> Arc<Self> {
        Self::build(socket, events, Some(barrier))
    }

    fn build(
        socket: UnixStream,
        events: Sender<HandlerEvent>,
        barrier: Option<Arc<Barrier>>,
    ) -> Arc<Self> {
        socket
            .set_nonblocking(true)
            .expect("cannot make test socket non-blocking");
        Arc::new(Self {
            socket,
            events: Mutex::new(events),
            barrier,
        })
    }

    pub fn fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }

    fn send(&self, event: HandlerEvent) {
        let _ = self.events.lock().send(event);
    }
}

impl EventHandler for StreamHandler {
    fn readable(&self) -> bool {
        true
    }

    fn read(&self, stream: &mut MessageBuf) -> Result<()> {
        while !stream.is_complete() {
            match (&self.socket).read(stream.unread()) {
                Ok(0) => {
                    return Err(Error::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "peer closed the connection",
                    )))
                }
                Ok(n) => stream.advance(n),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Err(Error::Timeout),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Ok(())
    }

    fn message(&self, stream: MessageBuf, pool: &ThreadPool) -> Result<()> {
        pool.promote_follower();
        if let Some(barrier) = &self.barrier {
            barrier.wait();
        }
        let payload = stream
            .as_slice()
            .get(HEADER_SIZE..)
            .unwrap_or(&[])
            .to_vec();
        self.send(HandlerEvent::Message(payload));
        Ok(())
    }

    fn finished(&self, pool: &ThreadPool) -> Result<()> {
        pool.promote_follower();
        self.send(HandlerEvent::Finished);
        Ok(())
    }

    fn exception(&self, err: &Error) {
        self.send(HandlerEvent::Exception(err.to_string()));
    }

    fn label(&self) -> String {
        format!("test stream handler (fd {})", self.fd())
    }
}

/// Handler that opts out of framed reads; `message()` receives an empty
/// stream whenever its descriptor is readable.
pub struct SilentHandler {
    socket: UnixStream,
    events: Mutex<Sender<HandlerEvent>>,
}

impl SilentHandler {
    pub fn new(socket: UnixStream, events: Sender<HandlerEvent>) -> Arc<Self> {
        socket
            .set_nonblocking(true)
            .expect("cannot make test socket non-blocking");
        Arc::new(Self {
            socket,
            events: Mutex::new(events),
        })
    }

    pub fn fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

impl EventHandler for SilentHandler {
    fn readable(&self) -> bool {
        false
    }

    fn read(&self, _stream: &mut MessageBuf) -> Result<()> {
        Ok(())
    }

    fn message(&self, stream: MessageBuf, pool: &ThreadPool) -> Result<()> {
        pool.promote_follower();
        let _ = self
            .events
            .lock()
            .send(HandlerEvent::Message(stream.as_slice().to_vec()));
        Ok(())
    }

    fn finished(&self, pool: &ThreadPool) -> Result<()> {
        pool.promote_follower();
        let _ = self.events.lock().send(HandlerEvent::Finished);
        Ok(())
    }

    fn label(&self) -> String {
        format!("test silent handler (fd {})", self.fd())
    }
}
