// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 the hrpc authors

//! Message buffer with a fill cursor.
//!
//! A [`MessageBuf`] is the unit of exchange between a transport handler and
//! the framer: the framer sets the target length with [`resize`], the
//! handler appends bytes into [`unread`] and records progress with
//! [`advance`], and the message is ready once [`is_complete`] holds. Partial
//! fills survive across readiness events, which is how slow stream peers are
//! handled without blocking a worker.
//!
//! The same cursor doubles as a read position: encoders build outgoing
//! frames with the `write_*` methods (each appends and moves the cursor to
//! the new end), and consumers [`rewind`] a delivered message and walk it
//! with the `read_*` methods. Integers are little-endian on the wire.
//!
//! [`resize`]: MessageBuf::resize
//! [`unread`]: MessageBuf::unread
//! [`advance`]: MessageBuf::advance
//! [`is_complete`]: MessageBuf::is_complete
//! [`rewind`]: MessageBuf::rewind

/// Byte buffer with a cursor marking how much of it has been filled.
#[derive(Debug, Default)]
pub struct MessageBuf {
    buf: Vec<u8>,
    pos: usize,
}

impl MessageBuf {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer wrapping already-received bytes, cursor at the end.
    pub fn from_vec(buf: Vec<u8>) -> Self {
        let pos = buf.len();
        Self { buf, pos }
    }

    /// Current target length.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer holds no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Fill cursor position.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Move the fill cursor. `pos` must not exceed the target length.
    pub fn set_pos(&mut self, pos: usize) {
        debug_assert!(pos <= self.buf.len());
        self.pos = pos.min(self.buf.len());
    }

    /// Reset the fill cursor to the start.
    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    /// Bytes still missing before the buffer is complete.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Whether the cursor has reached the target length.
    pub fn is_complete(&self) -> bool {
        self.pos == self.buf.len()
    }

    /// Grow or shrink the target length. New bytes are zeroed; the cursor is
    /// clamped when shrinking.
    pub fn resize(&mut self, len: usize) {
        self.buf.resize(len, 0);
        self.pos = self.pos.min(len);
    }

    /// Drop all content and reset the cursor.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.pos = 0;
    }

    /// The unfilled tail, for a transport read to append into. Pair with
    /// [`advance`](Self::advance).
    pub fn unread(&mut self) -> &mut [u8] {
        let pos = self.pos;
        &mut self.buf[pos..]
    }

    /// Record that `n` bytes of the unfilled tail were written.
    pub fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.remaining());
        self.pos = (self.pos + n).min(self.buf.len());
    }

    /// Read one byte at the cursor. `None` past the end.
    pub fn read_u8(&mut self) -> Option<u8> {
        let byte = *self.buf.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    /// Read a little-endian `i32` at the cursor. `None` when fewer than four
    /// bytes remain.
    pub fn read_i32_le(&mut self) -> Option<i32> {
        let end = self.pos.checked_add(4)?;
        let bytes = self.buf.get(self.pos..end)?;
        let value = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        self.pos = end;
        Some(value)
    }

    /// Read `len` raw bytes at the cursor. `None` when fewer remain.
    pub fn read_blob(&mut self, len: usize) -> Option<&[u8]> {
        let end = self.pos.checked_add(len)?;
        let bytes = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(bytes)
    }

    /// Append one byte; the cursor moves to the new end.
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
        self.pos = self.buf.len();
    }

    /// Append a little-endian `i32`; the cursor moves to the new end.
    pub fn write_i32_le(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self.pos = self.buf.len();
    }

    /// Append raw bytes; the cursor moves to the new end.
    pub fn write_blob(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        self.pos = self.buf.len();
    }

    /// Move the content out, leaving this buffer empty.
    pub fn take(&mut self) -> MessageBuf {
        std::mem::take(self)
    }

    /// The filled content.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Mutable view of the content, cursor untouched.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Consume the buffer, returning the raw bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}
