//! Chunk-boundary scanner for the Bolt message transfer encoding.

use auto_impl::auto_impl;

use crate::buffer::ChunkedReadBuffer;
use crate::constant::END_MARKER;

/// Callbacks invoked by [`BoltParser`] as chunk boundaries are recognized.
#[auto_impl(&mut, Box)]
pub trait FrameHandler {
    /// One chunk payload of the message currently being assembled.
    fn on_chunk(&mut self, chunk: &[u8]);
    /// The `0x0000` end-of-message marker was consumed.
    fn on_message_complete(&mut self);
}

impl FrameHandler for ChunkedReadBuffer {
    fn on_chunk(&mut self, chunk: &[u8]) {
        self.feed_data(chunk);
    }

    fn on_message_complete(&mut self) {
        self.feed_eof();
    }
}

/// Incremental parser over the raw byte stream.
///
/// Reads a 16-bit length, that many payload bytes, then peeks the next two
/// bytes: `0x0000` completes the message, anything else starts the next
/// chunk. Partial trailing bytes are stashed and re-examined on the next
/// call, so the byte stream may be split at any position across calls.
#[derive(Debug, Default)]
pub struct BoltParser {
    stash: Vec<u8>,
}

impl BoltParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, invoking `handler` for every chunk boundary found.
    pub fn feed_data<H: FrameHandler>(&mut self, data: &[u8], handler: &mut H) {
        if data.is_empty() {
            return;
        }
        self.stash.extend_from_slice(data);
        let mut pos = 0;
        loop {
            let avail = self.stash.len() - pos;
            if avail < 2 {
                break;
            }
            let payload_len = u16::from_be_bytes([self.stash[pos], self.stash[pos + 1]]) as usize;
            // The two bytes after the payload decide whether the message ends.
            if avail < 2 + payload_len + 2 {
                break;
            }
            let payload_start = pos + 2;
            let payload_end = payload_start + payload_len;
            handler.on_chunk(&self.stash[payload_start..payload_end]);
            if self.stash[payload_end..payload_end + 2] == END_MARKER {
                handler.on_message_complete();
                pos = payload_end + 2;
            } else {
                pos = payload_end;
            }
        }
        self.stash.drain(..pos);
    }

    /// Drop any stashed partial bytes.
    pub fn clear(&mut self) {
        self.stash.clear();
    }
}
