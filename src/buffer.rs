//! Buffers for queueing incoming and outgoing messages.

use std::collections::VecDeque;
use std::collections::vec_deque::Drain;

use crate::constant::END_MARKER;
use crate::error::{Error, Result};

/// Largest chunk body expressible by the 16-bit length prefix.
const MAX_CHUNK_PAYLOAD: usize = u16::MAX as usize;

/// Chunk-encodes outgoing message payloads into bounded transport blobs.
///
/// `write` accumulates the in-progress payload; `write_eof` seals it into
/// one logical message, emitting length-prefixed chunks terminated by the
/// `0x0000` end-of-message marker. Sealed blobs never exceed
/// `max_chunk_size` bytes and are drained with [`flush`](Self::flush).
#[derive(Debug)]
pub struct ChunkedWriteBuffer {
    max_chunk_size: usize,
    queue: VecDeque<Vec<u8>>,
    incoming: Vec<u8>,
    current: Vec<u8>,
    remaining: usize,
}

impl ChunkedWriteBuffer {
    pub fn new(max_chunk_size: usize) -> Self {
        Self {
            max_chunk_size,
            queue: VecDeque::new(),
            incoming: Vec::new(),
            current: Vec::new(),
            remaining: max_chunk_size,
        }
    }

    /// Append payload bytes to the in-progress message.
    pub fn write(&mut self, data: &[u8]) {
        self.incoming.extend_from_slice(data);
    }

    /// Seal the in-progress payload into one logical message.
    ///
    /// The payload is split into chunks so that no chunk body is zero-length
    /// and no blob exceeds `max_chunk_size`; the terminal `0x0000` marker is
    /// always emitted.
    pub fn write_eof(&mut self) {
        let data = core::mem::take(&mut self.incoming);
        let mut rest = data.as_slice();
        loop {
            // A blob with fewer than 3 bytes left cannot hold a header plus payload.
            if self.remaining <= 2 {
                self.append_and_reset_buffer();
            }
            let len = rest.len();
            if len == 0 {
                // Only the end-of-message marker is left to place.
                self.current.extend_from_slice(&END_MARKER);
                self.remaining -= 2;
                return;
            }
            if len + 4 <= self.remaining && len <= MAX_CHUNK_PAYLOAD {
                // Header, payload, and end marker all fit in the current blob.
                self.current.extend_from_slice(&(len as u16).to_be_bytes());
                self.current.extend_from_slice(rest);
                self.current.extend_from_slice(&END_MARKER);
                self.remaining -= len + 4;
                return;
            }
            if len + 2 > self.remaining || len > MAX_CHUNK_PAYLOAD || self.current.is_empty() {
                // Emit a partial chunk filling the blob and continue with the rest.
                let take = len.min(self.remaining - 2).min(MAX_CHUNK_PAYLOAD);
                self.current
                    .extend_from_slice(&(take as u16).to_be_bytes());
                self.current.extend_from_slice(&rest[..take]);
                self.append_and_reset_buffer();
                rest = &rest[take..];
            } else {
                // The payload would fit as one chunk but its end marker would
                // not; sealing here avoids a zero-length continuation chunk.
                self.append_and_reset_buffer();
            }
        }
    }

    /// Seal the current blob onto the queue and start a fresh one.
    fn append_and_reset_buffer(&mut self) {
        if !self.current.is_empty() {
            self.queue.push_back(core::mem::take(&mut self.current));
        }
        self.remaining = self.max_chunk_size;
    }

    /// Drain the sealed blobs ready for transport, sealing the current one first.
    pub fn flush(&mut self) -> Drain<'_, Vec<u8>> {
        self.append_and_reset_buffer();
        self.queue.drain(..)
    }

    /// Discard everything not yet handed to the transport.
    pub fn clear(&mut self) {
        self.incoming.clear();
        self.current.clear();
        self.queue.clear();
        self.remaining = self.max_chunk_size;
    }
}

/// Reassembles chunk payloads into whole messages and serves them to the
/// codec one read at a time.
///
/// The parser feeds chunk payloads via [`feed_data`](Self::feed_data) and
/// seals a message via [`feed_eof`](Self::feed_eof). The assembled queue is
/// never interrupted mid-message: `read` walks the head message with a
/// cursor and dequeues the next message only once the head is exhausted.
#[derive(Debug, Default)]
pub struct ChunkedReadBuffer {
    queue: VecDeque<Vec<u8>>,
    current: Option<Vec<u8>>,
    current_pos: usize,
    ready: bool,
    incoming: Vec<u8>,
}

impl ChunkedReadBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether at least one whole message is positioned or queued.
    pub fn ready(&self) -> bool {
        self.ready
    }

    /// Accumulate a chunk payload of the in-progress message.
    pub fn feed_data(&mut self, data: &[u8]) {
        self.incoming.extend_from_slice(data);
    }

    /// Seal the in-progress payload into a whole message.
    pub fn feed_eof(&mut self) {
        let message = core::mem::take(&mut self.incoming);
        match self.current {
            None => {
                self.current = Some(message);
                self.current_pos = 0;
            }
            Some(_) => self.queue.push_back(message),
        }
        self.ready = true;
    }

    /// Read the next `num` bytes of the head message.
    ///
    /// Dequeues the next message once the head is exhausted. Reading past
    /// the end of a message, or with nothing queued, is a buffer error.
    pub fn read(&mut self, num: usize) -> Result<&[u8]> {
        if self.at_eof() {
            let next = self
                .queue
                .pop_front()
                .ok_or_else(|| Error::Buffer("trying to read from empty buffer".to_string()))?;
            self.current = Some(next);
            self.current_pos = 0;
        }
        let Some(current) = self.current.as_ref() else {
            return Err(Error::Buffer("trying to read from empty buffer".to_string()));
        };
        if self.current_pos + num > current.len() {
            return Err(Error::Buffer(
                "not enough bytes to read in current message".to_string(),
            ));
        }
        let start = self.current_pos;
        self.current_pos += num;
        if self.current_pos == current.len() && self.queue.is_empty() {
            self.ready = false;
        }
        Ok(&current[start..self.current_pos])
    }

    /// Whether the head message is fully consumed (or absent).
    fn at_eof(&self) -> bool {
        match self.current.as_ref() {
            Some(current) => self.current_pos == current.len(),
            None => true,
        }
    }

    /// Drop every queued whole message, keeping the in-progress accumulator
    /// so a message still arriving in chunks is not corrupted.
    pub fn discard_queued(&mut self) {
        self.queue.clear();
        self.current = None;
        self.current_pos = 0;
        self.ready = false;
    }

    /// Drop every queued message and the in-progress accumulator.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.current = None;
        self.current_pos = 0;
        self.ready = false;
        self.incoming.clear();
    }
}
