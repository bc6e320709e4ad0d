// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;

use crate::lpack::{LpackError, Marker, Value};

/// Outcome of one pull-decode step.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// A full value was decoded; `consumed` counts payload bytes only (the
    /// marker byte is read separately via [`read_marker`]).
    Complete { consumed: usize, value: Value },
    /// Not enough bytes. For fixed-width markers `required` is the marker's
    /// declared width; for string-like markers it is how many more bytes
    /// are needed before retrying.
    Partial { required: usize },
}

/// Reads the marker byte at `offset`. `Ok(None)` means no byte is
/// available yet; an offset past the buffer is caller error.
pub fn read_marker(buf: &[u8], offset: usize) -> Result<Option<Marker>, LpackError> {
    if offset > buf.len() {
        return Err(LpackError::Underflow(offset));
    }
    let Some(&b) = buf.get(offset) else {
        return Ok(None);
    };
    match Marker::from_byte(b) {
        Some(Marker::TypeMarker) | None => Err(LpackError::InvalidMarker(b)),
        Some(m) => Ok(Some(m)),
    }
}

fn be_u16(b: &[u8]) -> u16 {
    u16::from_be_bytes([b[0], b[1]])
}

fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

fn be_u64(b: &[u8]) -> u64 {
    u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}

fn fixed(marker: Marker, payload: &[u8]) -> Value {
    match marker {
        Marker::Uint8 => Value::Uint8(payload[0]),
        Marker::DictEntry => Value::DictEntry(payload[0]),
        Marker::Uint16 => Value::Uint16(be_u16(payload)),
        Marker::BigDictEntry => Value::BigDictEntry(be_u16(payload)),
        Marker::Uint32 => Value::Uint32(be_u32(payload)),
        Marker::Int8 => Value::Int8(payload[0] as i8),
        Marker::Int16 => Value::Int16(be_u16(payload) as i16),
        Marker::Int32 => Value::Int32(be_u32(payload) as i32),
        Marker::Int64 => Value::Int64(be_u64(payload) as i64),
        Marker::Float => Value::Float(f32::from_be_bytes([
            payload[0], payload[1], payload[2], payload[3],
        ])),
        // Only Double can reach here; the caller dispatches on fixed_width().
        _ => Value::Double(f64::from_bits(be_u64(payload))),
    }
}

fn string_value(marker: Marker, bytes: Bytes) -> Value {
    match marker {
        Marker::String => Value::String(bytes),
        Marker::BigString => Value::BigString(bytes),
        Marker::HugeString => Value::HugeString(bytes),
        Marker::DictUrl => Value::DictUrl(bytes),
        _ => Value::BigDictUrl(bytes),
    }
}

fn standalone_value(marker: Marker) -> Value {
    match marker {
        Marker::MapStart => Value::MapStart,
        Marker::ArrayStart => Value::ArrayStart,
        Marker::DictStart => Value::DictStart,
        Marker::RecordEnd => Value::RecordEnd,
        Marker::Nil => Value::Nil,
        Marker::BoolTrue => Value::Bool(true),
        _ => Value::Bool(false),
    }
}

/// Decodes the payload of `marker` starting at `offset`. The marker byte
/// itself must already have been consumed.
pub fn read_value(marker: Marker, buf: &[u8], offset: usize) -> Result<ReadOutcome, LpackError> {
    if offset > buf.len() {
        return Err(LpackError::Underflow(offset));
    }
    let rest = &buf[offset..];

    if marker == Marker::TypeMarker {
        return Err(LpackError::InvalidMarker(0));
    }
    if marker.is_standalone() {
        return Ok(ReadOutcome::Complete { consumed: 0, value: standalone_value(marker) });
    }
    if let Some(width) = marker.fixed_width() {
        if rest.len() < width {
            return Ok(ReadOutcome::Partial { required: width });
        }
        return Ok(ReadOutcome::Complete {
            consumed: width,
            value: fixed(marker, &rest[..width]),
        });
    }

    // String-like: big-endian length prefix, then raw bytes.
    let prefix = marker.length_prefix_width().ok_or(LpackError::NotADataMarker(marker))?;
    if rest.len() < prefix {
        return Ok(ReadOutcome::Partial { required: prefix });
    }
    let len = match prefix {
        1 => rest[0] as usize,
        2 => be_u16(&rest[..2]) as usize,
        _ => be_u32(&rest[..4]) as usize,
    };
    let total = prefix + len;
    if rest.len() < total {
        return Ok(ReadOutcome::Partial { required: total - rest.len() });
    }
    let bytes = Bytes::copy_from_slice(&rest[prefix..total]);
    Ok(ReadOutcome::Complete { consumed: total, value: string_value(marker, bytes) })
}

/// Walks a byte slice value-by-value. Truncated trailing values are an
/// error rather than a partial result; use [`read_value`] directly for the
/// incremental protocol.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn next_value(&mut self) -> Result<Option<Value>, LpackError> {
        let Some(marker) = read_marker(self.buf, self.offset)? else {
            return Ok(None);
        };
        match read_value(marker, self.buf, self.offset + 1)? {
            ReadOutcome::Complete { consumed, value } => {
                self.offset += 1 + consumed;
                Ok(Some(value))
            }
            ReadOutcome::Partial { required } => Err(LpackError::Truncated { required }),
        }
    }
}
