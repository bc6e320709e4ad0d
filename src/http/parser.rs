// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::VecDeque;

use bytes::Bytes;
use thiserror::Error;

use crate::http::chunked::{ChunkDecoder, ChunkError, ChunkEvent};
use crate::net::buffer::Buffer;

const MAX_HEADERS: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HttpError {
    #[error("400 Error parsing HTTP fragment: {0}")]
    Parse(String),
    #[error("400 HTTP headers do not fit in the read buffer")]
    HeadersTooLarge,
    #[error("400 invalid Content-Length header")]
    BadContentLength,
    #[error(transparent)]
    Chunk(#[from] ChunkError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserKind {
    Request,
    Response,
}

/// One step of message lexing. `parse` hands these out in message order:
/// `MessageBegin`, `Url` or `Status`, alternating `HeaderField` /
/// `HeaderValue` pairs, `HeadersComplete`, zero or more `Body` fragments,
/// `MessageComplete`. `NeedData` means the buffer ran dry mid-message.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseEvent {
    NeedData,
    MessageBegin,
    Url(Bytes),
    Status(Bytes),
    HeaderField(Bytes),
    HeaderValue(Bytes),
    HeadersComplete,
    Body(Bytes),
    MessageComplete,
}

#[derive(Debug)]
enum Framing {
    Length(u64),
    Chunked(ChunkDecoder),
    UntilEof,
}

#[derive(Debug)]
enum Phase {
    Headers,
    Body(Framing),
    Done,
}

/// Pull-style driver for one HTTP/1.x message stream. Feed it the
/// connection's read buffer; it consumes exactly the bytes it has turned
/// into events, so pipelined messages survive in place for the next call.
/// After `MessageComplete` the driver re-initializes itself on the next
/// `parse`.
#[derive(Debug)]
pub struct HttpParser {
    kind: ParserKind,
    phase: Phase,
    pending: VecDeque<ParseEvent>,
    keep_alive: bool,
    http_major: u8,
    http_minor: u8,
    method: Option<String>,
    status_code: Option<u16>,
    content_length: Option<u64>,
    chunked: bool,
}

impl HttpParser {
    pub fn request() -> Self {
        Self::new(ParserKind::Request)
    }

    pub fn response() -> Self {
        Self::new(ParserKind::Response)
    }

    pub fn new(kind: ParserKind) -> Self {
        Self {
            kind,
            phase: Phase::Headers,
            pending: VecDeque::new(),
            keep_alive: false,
            http_major: 0,
            http_minor: 0,
            method: None,
            status_code: None,
            content_length: None,
            chunked: false,
        }
    }

    pub fn kind(&self) -> ParserKind {
        self.kind
    }

    /// Resets all per-message state for the next message on the same
    /// connection. Called implicitly by `parse` after `MessageComplete`.
    pub fn reinit(&mut self) {
        self.phase = Phase::Headers;
        self.pending.clear();
        self.keep_alive = false;
        self.http_major = 0;
        self.http_minor = 0;
        self.method = None;
        self.status_code = None;
        self.content_length = None;
        self.chunked = false;
    }

    /// Stable from `HeadersComplete` onward.
    pub fn should_keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn http_major(&self) -> u8 {
        self.http_major
    }

    pub fn http_minor(&self) -> u8 {
        self.http_minor
    }

    /// Request method; `None` on a response parser.
    pub fn req_method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Response status code; `None` on a request parser.
    pub fn resp_status(&self) -> Option<u16> {
        self.status_code
    }

    pub fn parse(&mut self, buf: &mut Buffer) -> Result<ParseEvent, HttpError> {
        if let Some(ev) = self.pending.pop_front() {
            return Ok(ev);
        }
        if matches!(self.phase, Phase::Done) {
            self.reinit();
        }
        match self.phase {
            Phase::Headers => self.parse_headers(buf),
            Phase::Body(_) => self.parse_body(buf),
            Phase::Done => Ok(ParseEvent::NeedData),
        }
    }

    /// Closes out a read-to-EOF response body once the peer has shut the
    /// stream down. Any other phase at EOF is a truncated message.
    pub fn finish_eof(&mut self) -> Result<ParseEvent, HttpError> {
        match self.phase {
            Phase::Body(Framing::UntilEof) => {
                self.phase = Phase::Done;
                Ok(ParseEvent::MessageComplete)
            }
            Phase::Done => Ok(ParseEvent::MessageComplete),
            _ => Err(HttpError::Parse("premature end of stream".to_string())),
        }
    }

    fn parse_headers(&mut self, buf: &mut Buffer) -> Result<ParseEvent, HttpError> {
        if buf.remaining_content_len() == 0 {
            return Ok(ParseEvent::NeedData);
        }
        let head_len = match self.kind {
            ParserKind::Request => self.parse_request_head(buf)?,
            ParserKind::Response => self.parse_response_head(buf)?,
        };
        let Some(consumed) = head_len else {
            if buf.remaining_capacity() == 0 && buf.position() == 0 {
                // The whole buffer holds an unfinished header section;
                // no amount of reading can complete it.
                return Err(HttpError::HeadersTooLarge);
            }
            return Ok(ParseEvent::NeedData);
        };
        buf.consume(consumed);
        self.begin_body();
        Ok(self.pending.pop_front().unwrap_or(ParseEvent::NeedData))
    }

    fn parse_request_head(&mut self, buf: &Buffer) -> Result<Option<usize>, HttpError> {
        let data = buf.read_slice();
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);
        let consumed = match req.parse(data) {
            Ok(httparse::Status::Complete(n)) => n,
            Ok(httparse::Status::Partial) => return Ok(None),
            Err(e) => return Err(HttpError::Parse(e.to_string())),
        };
        self.http_major = 1;
        self.http_minor = req.version.unwrap_or(1);
        self.method = req.method.map(str::to_owned);
        self.pending.push_back(ParseEvent::MessageBegin);
        if let Some(path) = req.path {
            self.pending.push_back(ParseEvent::Url(Bytes::copy_from_slice(path.as_bytes())));
        }
        self.ingest_headers(req.headers)?;
        self.pending.push_back(ParseEvent::HeadersComplete);
        Ok(Some(consumed))
    }

    fn parse_response_head(&mut self, buf: &Buffer) -> Result<Option<usize>, HttpError> {
        let data = buf.read_slice();
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut resp = httparse::Response::new(&mut headers);
        let consumed = match resp.parse(data) {
            Ok(httparse::Status::Complete(n)) => n,
            Ok(httparse::Status::Partial) => return Ok(None),
            Err(e) => return Err(HttpError::Parse(e.to_string())),
        };
        self.http_major = 1;
        self.http_minor = resp.version.unwrap_or(1);
        self.status_code = resp.code;
        self.pending.push_back(ParseEvent::MessageBegin);
        if let Some(reason) = resp.reason {
            self.pending
                .push_back(ParseEvent::Status(Bytes::copy_from_slice(reason.as_bytes())));
        }
        self.ingest_headers(resp.headers)?;
        self.pending.push_back(ParseEvent::HeadersComplete);
        Ok(Some(consumed))
    }

    fn ingest_headers(&mut self, headers: &[httparse::Header<'_>]) -> Result<(), HttpError> {
        let mut conn_close = false;
        let mut conn_keep_alive = false;
        self.content_length = None;
        self.chunked = false;

        for h in headers {
            self.pending
                .push_back(ParseEvent::HeaderField(Bytes::copy_from_slice(h.name.as_bytes())));
            self.pending
                .push_back(ParseEvent::HeaderValue(Bytes::copy_from_slice(h.value)));

            if h.name.eq_ignore_ascii_case("connection") {
                let v = String::from_utf8_lossy(h.value).to_ascii_lowercase();
                conn_close = conn_close || v.contains("close");
                conn_keep_alive = conn_keep_alive || v.contains("keep-alive");
            } else if h.name.eq_ignore_ascii_case("content-length") {
                let parsed = std::str::from_utf8(h.value)
                    .ok()
                    .and_then(|s| s.trim().parse::<u64>().ok())
                    .ok_or(HttpError::BadContentLength)?;
                self.content_length = Some(parsed);
            } else if h.name.eq_ignore_ascii_case("transfer-encoding") {
                let v = String::from_utf8_lossy(h.value).to_ascii_lowercase();
                self.chunked = self.chunked || v.contains("chunked");
            }
        }

        self.keep_alive = if self.http_minor >= 1 { !conn_close } else { conn_keep_alive };
        Ok(())
    }

    fn begin_body(&mut self) {
        if self.chunked {
            self.phase = Phase::Body(Framing::Chunked(ChunkDecoder::new()));
            return;
        }
        match self.content_length {
            Some(0) => {
                self.phase = Phase::Done;
                self.pending.push_back(ParseEvent::MessageComplete);
            }
            Some(len) => {
                self.phase = Phase::Body(Framing::Length(len));
            }
            None => match self.kind {
                ParserKind::Request => {
                    self.phase = Phase::Done;
                    self.pending.push_back(ParseEvent::MessageComplete);
                }
                // A response without declared framing runs to EOF.
                ParserKind::Response => {
                    self.phase = Phase::Body(Framing::UntilEof);
                }
            },
        }
    }

    fn parse_body(&mut self, buf: &mut Buffer) -> Result<ParseEvent, HttpError> {
        let Phase::Body(framing) = &mut self.phase else {
            return Ok(ParseEvent::NeedData);
        };
        match framing {
            Framing::Length(remaining) => {
                let available = buf.remaining_content_len();
                if available == 0 {
                    return Ok(ParseEvent::NeedData);
                }
                let take = usize::try_from(*remaining).unwrap_or(usize::MAX).min(available);
                let body = Bytes::copy_from_slice(&buf.read_slice()[..take]);
                buf.consume(take);
                *remaining -= take as u64;
                if *remaining == 0 {
                    self.phase = Phase::Done;
                    self.pending.push_back(ParseEvent::MessageComplete);
                }
                Ok(ParseEvent::Body(body))
            }
            Framing::Chunked(decoder) => match decoder.decode(buf)? {
                ChunkEvent::Data(body) => Ok(ParseEvent::Body(body)),
                ChunkEvent::NeedData => Ok(ParseEvent::NeedData),
                ChunkEvent::Complete => {
                    self.phase = Phase::Done;
                    Ok(ParseEvent::MessageComplete)
                }
            },
            Framing::UntilEof => {
                let available = buf.remaining_content_len();
                if available == 0 {
                    return Ok(ParseEvent::NeedData);
                }
                let body = Bytes::copy_from_slice(buf.read_slice());
                buf.consume(available);
                Ok(ParseEvent::Body(body))
            }
        }
    }
}
