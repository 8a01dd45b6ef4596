use pretty_assertions::assert_eq;

use crate::parser::{BoltParser, FrameHandler};

#[derive(Default)]
struct Events {
    chunks: Vec<Vec<u8>>,
    completes: usize,
}

impl FrameHandler for Events {
    fn on_chunk(&mut self, chunk: &[u8]) {
        self.chunks.push(chunk.to_vec());
    }

    fn on_message_complete(&mut self) {
        self.completes += 1;
    }
}

#[test]
fn single_chunk_message() {
    let mut parser = BoltParser::new();
    let mut events = Events::default();
    parser.feed_data(b"\x00\x05hello\x00\x00", &mut events);
    assert_eq!(events.chunks, vec![b"hello".to_vec()]);
    assert_eq!(events.completes, 1);
}

#[test]
fn message_spanning_chunks() {
    let mut parser = BoltParser::new();
    let mut events = Events::default();
    parser.feed_data(b"\x00\x03abc\x00\x02de\x00\x00", &mut events);
    assert_eq!(events.chunks, vec![b"abc".to_vec(), b"de".to_vec()]);
    assert_eq!(events.completes, 1);
}

#[test]
fn two_messages_back_to_back() {
    let mut parser = BoltParser::new();
    let mut events = Events::default();
    parser.feed_data(b"\x00\x02ab\x00\x00\x00\x02cd\x00\x00", &mut events);
    assert_eq!(events.chunks, vec![b"ab".to_vec(), b"cd".to_vec()]);
    assert_eq!(events.completes, 2);
}

#[test]
fn split_at_every_byte_boundary() {
    let wire = b"\x00\x03abc\x00\x02de\x00\x00\x00\x01f\x00\x00";
    for split in 1..wire.len() {
        let mut parser = BoltParser::new();
        let mut events = Events::default();
        parser.feed_data(&wire[..split], &mut events);
        parser.feed_data(&wire[split..], &mut events);
        assert_eq!(
            events.chunks,
            vec![b"abc".to_vec(), b"de".to_vec(), b"f".to_vec()],
            "split at {}",
            split
        );
        assert_eq!(events.completes, 2, "split at {}", split);
    }
}

#[test]
fn one_byte_at_a_time() {
    let wire = b"\x00\x05hello\x00\x00";
    let mut parser = BoltParser::new();
    let mut events = Events::default();
    for byte in wire {
        parser.feed_data(&[*byte], &mut events);
    }
    assert_eq!(events.chunks, vec![b"hello".to_vec()]);
    assert_eq!(events.completes, 1);
}

#[test]
fn partial_header_is_stashed() {
    let mut parser = BoltParser::new();
    let mut events = Events::default();
    parser.feed_data(b"\x00", &mut events);
    assert!(events.chunks.is_empty());
    parser.feed_data(b"\x02ab\x00\x00", &mut events);
    assert_eq!(events.chunks, vec![b"ab".to_vec()]);
    assert_eq!(events.completes, 1);
}

#[test]
fn chunk_waits_for_the_peek_bytes() {
    // A complete chunk is not surfaced until the two bytes deciding
    // end-of-message have arrived.
    let mut parser = BoltParser::new();
    let mut events = Events::default();
    parser.feed_data(b"\x00\x02ab", &mut events);
    assert!(events.chunks.is_empty());
    parser.feed_data(b"\x00\x00", &mut events);
    assert_eq!(events.chunks, vec![b"ab".to_vec()]);
    assert_eq!(events.completes, 1);
}

#[test]
fn empty_feed_is_a_no_op() {
    let mut parser = BoltParser::new();
    let mut events = Events::default();
    parser.feed_data(&[], &mut events);
    assert!(events.chunks.is_empty());
    assert_eq!(events.completes, 0);
}
