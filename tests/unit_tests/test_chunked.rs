// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use weft::http::chunked::{ChunkDecoder, ChunkError, ChunkEvent, encode_chunk};
use weft::net::buffer::Buffer;

#[test]
fn test_envelope_wire_bytes() {
    let mut wire = Vec::new();
    wire.extend_from_slice(&encode_chunk(b"abc"));
    wire.extend_from_slice(&encode_chunk(b"de"));
    wire.extend_from_slice(&encode_chunk(b""));
    assert_eq!(wire, b"3\r\nabc\r\n2\r\nde\r\n0\r\n\r\n");
}

#[test]
fn test_envelope_uses_hex_sizes() {
    let payload = vec![b'x'; 26];
    let framed = encode_chunk(&payload);
    assert!(framed.starts_with(b"1a\r\n"));
    assert!(framed.ends_with(b"\r\n"));
}

fn feed(decoder: &mut ChunkDecoder, buf: &mut Buffer, bytes: &[u8]) -> Vec<u8> {
    assert!(buf.append(bytes), "test buffer too small");
    let mut out = Vec::new();
    loop {
        match decoder.decode(buf).expect("decode") {
            ChunkEvent::Data(b) => out.extend_from_slice(&b),
            ChunkEvent::NeedData => break,
            ChunkEvent::Complete => break,
        }
    }
    out
}

#[test]
fn test_decode_whole_stream() {
    let mut decoder = ChunkDecoder::new();
    let mut buf = Buffer::new(256).expect("buffer");
    let body = feed(&mut decoder, &mut buf, b"3\r\nabc\r\n2\r\nde\r\n0\r\n\r\n");
    assert_eq!(body, b"abcde" as &[u8]);
    assert!(decoder.is_done());
    assert_eq!(buf.remaining_content_len(), 0);
}

#[test]
fn test_decode_across_arbitrary_splits() {
    let wire = b"3\r\nabc\r\n8\r\ndefghijk\r\n0\r\nTrailer: v\r\n\r\n";
    // Split the stream at every possible point and expect identical output.
    for split in 1..wire.len() {
        let mut decoder = ChunkDecoder::new();
        let mut buf = Buffer::new(256).expect("buffer");
        let mut body = feed(&mut decoder, &mut buf, &wire[..split]);
        body.extend_from_slice(&feed(&mut decoder, &mut buf, &wire[split..]));
        assert_eq!(body, b"abcdefghijk" as &[u8], "split at {split}");
        assert!(decoder.is_done(), "split at {split}");
    }
}

#[test]
fn test_decode_with_extension() {
    let mut decoder = ChunkDecoder::new();
    let mut buf = Buffer::new(64).expect("buffer");
    let body = feed(&mut decoder, &mut buf, b"2;name=val\r\nhi\r\n0\r\n\r\n");
    assert_eq!(body, b"hi" as &[u8]);
    assert!(decoder.is_done());
}

#[test]
fn test_bad_size_line_rejected() {
    let mut decoder = ChunkDecoder::new();
    let mut buf = Buffer::new(64).expect("buffer");
    buf.append(b"zz\r\n");
    assert_eq!(decoder.decode(&mut buf), Err(ChunkError::BadByte(b'z')));
}

#[test]
fn test_size_overflow_rejected() {
    let mut decoder = ChunkDecoder::new();
    let mut buf = Buffer::new(64).expect("buffer");
    buf.append(b"fffffffffffffffff\r\n");
    assert_eq!(decoder.decode(&mut buf), Err(ChunkError::SizeOverflow));
}

#[test]
fn test_error_display_carries_status_prefix() {
    let err = ChunkError::SizeOverflow.to_string();
    assert!(err.starts_with("400 "), "got: {err}");
}
