// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;
use thiserror::Error;

use crate::net::buffer::Buffer;
use crate::utils::to_hex;

/// Frames one chunked-transfer body piece: `hex(len)\r\n … \r\n`. An empty
/// payload produces the stream terminator `0\r\n\r\n`.
pub fn encode_chunk(payload: &[u8]) -> Vec<u8> {
    if payload.is_empty() {
        return b"0\r\n\r\n".to_vec();
    }
    let size = to_hex(payload.len());
    let mut out = Vec::with_capacity(size.len() + payload.len() + 4);
    out.extend_from_slice(size.as_bytes());
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(payload);
    out.extend_from_slice(b"\r\n");
    out
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("400 invalid chunked encoding: unexpected byte 0x{0:02x}")]
    BadByte(u8),
    #[error("400 invalid chunked encoding: chunk size too large")]
    SizeOverflow,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChunkEvent {
    /// One run of decoded body bytes.
    Data(Bytes),
    /// Buffer exhausted mid-structure; feed more bytes and retry.
    NeedData,
    /// Terminating chunk and trailers fully consumed.
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Reading hex size digits; `true` once at least one digit was seen.
    Size(bool),
    /// Skipping a chunk extension up to CR.
    Ext,
    SizeLf,
    Data,
    DataCr,
    DataLf,
    /// At the start of a trailer line after the terminating chunk.
    TrailerStart,
    /// Inside a trailer field line.
    TrailerLine,
    TrailerLf,
    FinalLf,
    Done,
}

/// Incremental decoder for inbound `Transfer-Encoding: chunked` bodies.
/// Consumes from the connection buffer byte-structure by byte-structure and
/// hands decoded data runs back without additional framing.
#[derive(Debug)]
pub struct ChunkDecoder {
    state: State,
    size: u64,
}

impl Default for ChunkDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self { state: State::Size(false), size: 0 }
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Decodes as far as the buffered bytes allow. Returns after the first
    /// data run so callers see body fragments as they arrive.
    pub fn decode(&mut self, buf: &mut Buffer) -> Result<ChunkEvent, ChunkError> {
        loop {
            if self.state == State::Done {
                return Ok(ChunkEvent::Complete);
            }

            if self.state == State::Data {
                let available = buf.remaining_content_len();
                if available == 0 {
                    return Ok(ChunkEvent::NeedData);
                }
                let take = (self.size as usize).min(available);
                let data = Bytes::copy_from_slice(&buf.read_slice()[..take]);
                buf.consume(take);
                self.size -= take as u64;
                if self.size == 0 {
                    self.state = State::DataCr;
                }
                return Ok(ChunkEvent::Data(data));
            }

            let Some(&byte) = buf.read_slice().first() else {
                return Ok(ChunkEvent::NeedData);
            };
            buf.consume(1);
            self.step(byte)?;
        }
    }

    fn step(&mut self, byte: u8) -> Result<(), ChunkError> {
        self.state = match self.state {
            State::Size(any) => match byte {
                b'0'..=b'9' | b'a'..=b'f' | b'A'..=b'F' => {
                    let digit = (byte as char).to_digit(16).unwrap_or(0) as u64;
                    self.size = self
                        .size
                        .checked_mul(16)
                        .and_then(|v| v.checked_add(digit))
                        .ok_or(ChunkError::SizeOverflow)?;
                    State::Size(true)
                }
                b';' if any => State::Ext,
                b'\r' if any => State::SizeLf,
                _ => return Err(ChunkError::BadByte(byte)),
            },
            State::Ext => match byte {
                b'\r' => State::SizeLf,
                _ => State::Ext,
            },
            State::SizeLf => match byte {
                b'\n' if self.size > 0 => State::Data,
                b'\n' => State::TrailerStart,
                _ => return Err(ChunkError::BadByte(byte)),
            },
            State::Data => unreachable!("data runs are consumed in decode()"),
            State::DataCr => match byte {
                b'\r' => State::DataLf,
                _ => return Err(ChunkError::BadByte(byte)),
            },
            State::DataLf => match byte {
                b'\n' => State::Size(false),
                _ => return Err(ChunkError::BadByte(byte)),
            },
            State::TrailerStart => match byte {
                b'\r' => State::FinalLf,
                _ => State::TrailerLine,
            },
            State::TrailerLine => match byte {
                b'\r' => State::TrailerLf,
                _ => State::TrailerLine,
            },
            State::TrailerLf => match byte {
                b'\n' => State::TrailerStart,
                _ => return Err(ChunkError::BadByte(byte)),
            },
            State::FinalLf => match byte {
                b'\n' => State::Done,
                _ => return Err(ChunkError::BadByte(byte)),
            },
            State::Done => State::Done,
        };
        Ok(())
    }
}
