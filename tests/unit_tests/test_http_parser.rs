// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;
use weft::http::{HttpError, HttpParser, ParseEvent};
use weft::net::buffer::Buffer;

fn buffer_with(bytes: &[u8]) -> Buffer {
    let mut buf = Buffer::new(1024).expect("buffer");
    assert!(buf.append(bytes), "test payload too large");
    buf
}

/// Pulls events until one `MessageComplete`, panicking on `NeedData`.
fn drain_message(parser: &mut HttpParser, buf: &mut Buffer) -> Vec<ParseEvent> {
    let mut events = Vec::new();
    loop {
        let ev = parser.parse(buf).expect("parse");
        assert_ne!(ev, ParseEvent::NeedData, "message should be complete in buffer");
        let done = ev == ParseEvent::MessageComplete;
        events.push(ev);
        if done {
            return events;
        }
    }
}

#[test]
fn test_single_get_event_sequence() {
    let mut parser = HttpParser::request();
    let mut buf = buffer_with(b"GET /a HTTP/1.0\r\nHost: x\r\n\r\n");

    let events = drain_message(&mut parser, &mut buf);
    assert_eq!(
        events,
        vec![
            ParseEvent::MessageBegin,
            ParseEvent::Url(Bytes::from_static(b"/a")),
            ParseEvent::HeaderField(Bytes::from_static(b"Host")),
            ParseEvent::HeaderValue(Bytes::from_static(b"x")),
            ParseEvent::HeadersComplete,
            ParseEvent::MessageComplete,
        ]
    );
    assert!(!parser.should_keep_alive());
    assert_eq!(parser.req_method(), Some("GET"));
    assert_eq!(parser.http_major(), 1);
    assert_eq!(parser.http_minor(), 0);
    assert_eq!(parser.resp_status(), None);
}

#[test]
fn test_pipelined_requests_from_one_segment() {
    let mut parser = HttpParser::request();
    let mut buf = buffer_with(b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n");

    let first = drain_message(&mut parser, &mut buf);
    assert!(first.contains(&ParseEvent::Url(Bytes::from_static(b"/a"))));
    assert!(parser.should_keep_alive());
    // Leftover bytes stay buffered for the second message.
    assert!(buf.remaining_content_len() > 0);

    // No new bytes arrive; the driver re-initializes in place.
    let second = drain_message(&mut parser, &mut buf);
    assert!(second.contains(&ParseEvent::Url(Bytes::from_static(b"/b"))));

    assert_eq!(buf.position(), buf.len());
    assert_eq!(buf.remaining_content_len(), 0);
}

#[test]
fn test_headers_split_across_reads() {
    let mut parser = HttpParser::request();
    let mut buf = Buffer::new(1024).expect("buffer");

    buf.append(b"GET /long/path HTTP/1.1\r\nHos");
    assert_eq!(parser.parse(&mut buf).expect("partial"), ParseEvent::NeedData);

    buf.append(b"t: example\r\n\r\n");
    let events = drain_message(&mut parser, &mut buf);
    assert!(events.contains(&ParseEvent::HeaderValue(Bytes::from_static(b"example"))));
}

#[test]
fn test_content_length_body_fragments() {
    let mut parser = HttpParser::request();
    let mut buf = buffer_with(b"POST /u HTTP/1.1\r\nContent-Length: 5\r\n\r\nhe");

    let mut events = Vec::new();
    loop {
        match parser.parse(&mut buf).expect("parse") {
            ParseEvent::NeedData => break,
            ev => events.push(ev),
        }
    }
    assert_eq!(events.last(), Some(&ParseEvent::Body(Bytes::from_static(b"he"))));

    buf.append(b"llo");
    assert_eq!(
        parser.parse(&mut buf).expect("rest"),
        ParseEvent::Body(Bytes::from_static(b"llo"))
    );
    assert_eq!(parser.parse(&mut buf).expect("end"), ParseEvent::MessageComplete);
}

#[test]
fn test_chunked_request_body() {
    let mut parser = HttpParser::request();
    let mut buf = buffer_with(
        b"POST /c HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n0\r\n\r\n",
    );

    let events = drain_message(&mut parser, &mut buf);
    assert!(events.contains(&ParseEvent::Body(Bytes::from_static(b"abc"))));
    assert_eq!(events.last(), Some(&ParseEvent::MessageComplete));
}

#[test]
fn test_keep_alive_defaults_by_version() {
    let mut parser = HttpParser::request();
    let mut buf = buffer_with(b"GET / HTTP/1.1\r\n\r\n");
    drain_message(&mut parser, &mut buf);
    assert!(parser.should_keep_alive());

    let mut buf = buffer_with(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n");
    drain_message(&mut parser, &mut buf);
    assert!(!parser.should_keep_alive());

    let mut buf = buffer_with(b"GET / HTTP/1.0\r\nConnection: keep-alive\r\n\r\n");
    drain_message(&mut parser, &mut buf);
    assert!(parser.should_keep_alive());
}

#[test]
fn test_bad_request_carries_status_prefix() {
    let mut parser = HttpParser::request();
    let mut buf = buffer_with(b"GET\x01/ HTTP/1.1\r\n\r\n");
    let err = parser.parse(&mut buf).expect_err("garbage request line");
    assert!(err.to_string().starts_with("400 "), "got: {err}");
}

#[test]
fn test_bad_content_length_rejected() {
    let mut parser = HttpParser::request();
    let mut buf = buffer_with(b"POST / HTTP/1.1\r\nContent-Length: banana\r\n\r\n");
    assert_eq!(
        parser.parse(&mut buf).expect_err("bad length"),
        HttpError::BadContentLength
    );
}

#[test]
fn test_headers_too_large_for_buffer() {
    let mut parser = HttpParser::request();
    let mut buf = Buffer::new(32).expect("buffer");
    // Fill the whole buffer with an unfinished header section.
    assert!(buf.append(b"GET /aaaaaaaaaaaaaaaaaa HTTP/1.1"));
    assert_eq!(buf.remaining_capacity(), 0);
    assert_eq!(
        parser.parse(&mut buf).expect_err("oversized headers"),
        HttpError::HeadersTooLarge
    );
}

#[test]
fn test_response_with_content_length() {
    let mut parser = HttpParser::response();
    let mut buf = buffer_with(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi");

    let events = drain_message(&mut parser, &mut buf);
    assert!(events.contains(&ParseEvent::Status(Bytes::from_static(b"OK"))));
    assert!(events.contains(&ParseEvent::Body(Bytes::from_static(b"hi"))));
    assert_eq!(parser.resp_status(), Some(200));
    assert_eq!(parser.req_method(), None);
}

#[test]
fn test_response_body_to_eof() {
    let mut parser = HttpParser::response();
    let mut buf = buffer_with(b"HTTP/1.0 200 OK\r\n\r\npartial body");

    let mut saw_body = false;
    loop {
        match parser.parse(&mut buf).expect("parse") {
            ParseEvent::Body(b) => {
                assert_eq!(b, Bytes::from_static(b"partial body"));
                saw_body = true;
            }
            ParseEvent::NeedData => break,
            _ => {}
        }
    }
    assert!(saw_body);
    // The peer closing the stream ends the message.
    assert_eq!(parser.finish_eof().expect("eof"), ParseEvent::MessageComplete);
}
