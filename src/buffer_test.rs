use pretty_assertions::assert_eq;

use crate::buffer::{ChunkedReadBuffer, ChunkedWriteBuffer};
use crate::parser::BoltParser;

fn drain(buf: &mut ChunkedWriteBuffer) -> Vec<Vec<u8>> {
    buf.flush().collect()
}

#[test]
fn single_message_fits_one_blob() {
    let mut buf = ChunkedWriteBuffer::new(16);
    buf.write(b"hello");
    buf.write_eof();
    let blobs = drain(&mut buf);
    assert_eq!(blobs, vec![b"\x00\x05hello\x00\x00".to_vec()]);
}

#[test]
fn write_accumulates_until_eof() {
    let mut buf = ChunkedWriteBuffer::new(64);
    buf.write(b"hel");
    buf.write(b"lo");
    buf.write_eof();
    let blobs = drain(&mut buf);
    assert_eq!(blobs, vec![b"\x00\x05hello\x00\x00".to_vec()]);
}

#[test]
fn exact_fit_boundary() {
    // capacity 16, payload 12: header + payload + end marker fill the blob.
    let mut buf = ChunkedWriteBuffer::new(16);
    buf.write(&[b'x'; 12]);
    buf.write_eof();
    let blobs = drain(&mut buf);
    assert_eq!(blobs.len(), 1);
    assert_eq!(blobs[0].len(), 16);
    assert_eq!(&blobs[0][..2], &[0x00, 0x0C]);
    assert_eq!(&blobs[0][14..], &[0x00, 0x00]);
}

#[test]
fn end_marker_spills_into_next_blob() {
    // capacity 16, payload 13: the chunk fits, the end marker does not.
    let mut buf = ChunkedWriteBuffer::new(16);
    buf.write(&[b'x'; 13]);
    buf.write_eof();
    let blobs = drain(&mut buf);
    assert_eq!(blobs.len(), 2);
    assert_eq!(&blobs[0][..2], &[0x00, 0x0D]);
    assert_eq!(blobs[0].len(), 15);
    assert_eq!(blobs[1], vec![0x00, 0x00]);
}

#[test]
fn payload_splits_into_two_chunks() {
    // capacity 16, payload 15: a 14-byte chunk fills the blob, the last byte
    // travels as its own chunk with the end marker.
    let mut buf = ChunkedWriteBuffer::new(16);
    buf.write(&[b'x'; 15]);
    buf.write_eof();
    let blobs = drain(&mut buf);
    assert_eq!(blobs.len(), 2);
    assert_eq!(&blobs[0][..2], &[0x00, 0x0E]);
    assert_eq!(blobs[0].len(), 16);
    assert_eq!(blobs[1], vec![0x00, 0x01, b'x', 0x00, 0x00]);
}

#[test]
fn no_chunk_body_is_zero_length() {
    for payload_len in 1..64usize {
        let mut buf = ChunkedWriteBuffer::new(16);
        buf.write(&vec![0xAB; payload_len]);
        buf.write_eof();
        let wire: Vec<u8> = drain(&mut buf).concat();

        // Walk the chunk stream; bodies sum to the payload, none are empty,
        // and exactly one end marker closes the message.
        let mut pos = 0;
        let mut total = 0;
        let mut ended = false;
        while pos < wire.len() {
            let len = u16::from_be_bytes([wire[pos], wire[pos + 1]]) as usize;
            pos += 2;
            if len == 0 {
                ended = true;
                break;
            }
            total += len;
            pos += len;
        }
        assert!(ended, "payload_len {}", payload_len);
        assert_eq!(total, payload_len, "payload_len {}", payload_len);
        assert_eq!(pos, wire.len(), "payload_len {}", payload_len);
    }
}

#[test]
fn consecutive_messages_share_a_blob() {
    let mut buf = ChunkedWriteBuffer::new(16);
    buf.write(b"ab");
    buf.write_eof();
    buf.write(b"cd");
    buf.write_eof();
    let blobs = drain(&mut buf);
    assert_eq!(
        blobs,
        vec![b"\x00\x02ab\x00\x00\x00\x02cd\x00\x00".to_vec()]
    );
}

#[test]
fn sealing_avoids_zero_length_continuation() {
    // capacity 16 with 4 bytes remaining after the first message: a 1-byte
    // message needs 5 bytes, so the blob seals and the message starts fresh.
    let mut buf = ChunkedWriteBuffer::new(16);
    buf.write(b"ab");
    buf.write_eof();
    buf.write(b"cd");
    buf.write_eof();
    buf.write(b"e");
    buf.write_eof();
    let blobs = drain(&mut buf);
    assert_eq!(blobs.len(), 2);
    assert_eq!(blobs[0].len(), 12);
    assert_eq!(blobs[1], b"\x00\x01e\x00\x00".to_vec());
}

#[test]
fn flush_drains_the_queue() {
    let mut buf = ChunkedWriteBuffer::new(16);
    buf.write(b"ab");
    buf.write_eof();
    assert_eq!(drain(&mut buf).len(), 1);
    assert!(drain(&mut buf).is_empty());
}

#[test]
fn clear_discards_pending_output() {
    let mut buf = ChunkedWriteBuffer::new(16);
    buf.write(b"ab");
    buf.write_eof();
    buf.clear();
    assert!(drain(&mut buf).is_empty());
}

#[test]
fn chunking_roundtrips_for_any_capacity() {
    for capacity in 4..=40usize {
        for payload_len in 1..=80usize {
            let payload: Vec<u8> = (0..payload_len).map(|i| i as u8).collect();
            let mut buf = ChunkedWriteBuffer::new(capacity);
            buf.write(&payload);
            buf.write_eof();
            let wire: Vec<u8> = drain(&mut buf).concat();

            let mut parser = BoltParser::new();
            let mut read = ChunkedReadBuffer::new();
            parser.feed_data(&wire, &mut read);
            assert!(read.ready(), "capacity {} payload {}", capacity, payload_len);
            assert_eq!(
                read.read(payload_len).unwrap(),
                payload.as_slice(),
                "capacity {} payload {}",
                capacity,
                payload_len
            );
            assert!(!read.ready());
        }
    }
}

#[test]
fn read_buffer_serves_whole_messages() {
    let mut buf = ChunkedReadBuffer::new();
    assert!(!buf.ready());
    buf.feed_data(b"hel");
    assert!(!buf.ready());
    buf.feed_data(b"lo");
    buf.feed_eof();
    assert!(buf.ready());
    assert_eq!(buf.read(5).unwrap(), b"hello");
    assert!(!buf.ready());
}

#[test]
fn read_buffer_queues_messages_in_order() {
    let mut buf = ChunkedReadBuffer::new();
    buf.feed_data(b"first");
    buf.feed_eof();
    buf.feed_data(b"second");
    buf.feed_eof();
    assert_eq!(buf.read(5).unwrap(), b"first");
    // Exhausting the head message keeps the buffer ready for the next one.
    assert!(buf.ready());
    assert_eq!(buf.read(3).unwrap(), b"sec");
    assert_eq!(buf.read(3).unwrap(), b"ond");
    assert!(!buf.ready());
}

#[test]
fn read_past_message_end_is_an_error() {
    let mut buf = ChunkedReadBuffer::new();
    buf.feed_data(b"ab");
    buf.feed_eof();
    assert_eq!(buf.read(1).unwrap(), b"a");
    assert!(buf.read(2).is_err());
}

#[test]
fn read_from_empty_buffer_is_an_error() {
    let mut buf = ChunkedReadBuffer::new();
    assert!(buf.read(1).is_err());
    buf.feed_data(b"a");
    buf.feed_eof();
    buf.read(1).unwrap();
    assert!(buf.read(1).is_err());
}

#[test]
fn clear_drops_queued_messages() {
    let mut buf = ChunkedReadBuffer::new();
    buf.feed_data(b"ab");
    buf.feed_eof();
    buf.feed_data(b"cd");
    buf.clear();
    assert!(!buf.ready());
    assert!(buf.read(1).is_err());
}
