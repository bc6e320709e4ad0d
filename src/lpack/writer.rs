// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;

use crate::lpack::{LpackError, Marker, Value};

fn put_str(
    out: &mut Vec<u8>,
    marker: Marker,
    prefix_width: usize,
    bytes: &Bytes,
) -> Result<(), LpackError> {
    let len = bytes.len();
    let max = match prefix_width {
        1 => u8::MAX as usize,
        2 => u16::MAX as usize,
        _ => u32::MAX as usize,
    };
    if len > max {
        return Err(LpackError::ValueTooLong { marker, len });
    }
    match prefix_width {
        1 => out.push(len as u8),
        2 => out.extend_from_slice(&(len as u16).to_be_bytes()),
        _ => out.extend_from_slice(&(len as u32).to_be_bytes()),
    }
    out.extend_from_slice(bytes);
    Ok(())
}

/// Serializes a sequence of tagged values into one wire buffer: marker byte
/// first, then the big-endian payload the marker calls for.
pub fn serialize(values: &[Value]) -> Result<Vec<u8>, LpackError> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for v in values {
        let marker = v.marker();
        out.push(marker as u8);
        match v {
            Value::MapStart
            | Value::ArrayStart
            | Value::DictStart
            | Value::RecordEnd
            | Value::Nil
            | Value::Bool(_) => {}

            Value::Uint8(n) => out.push(*n),
            Value::DictEntry(n) => out.push(*n),
            Value::Uint16(n) => out.extend_from_slice(&n.to_be_bytes()),
            Value::BigDictEntry(n) => out.extend_from_slice(&n.to_be_bytes()),
            Value::Uint32(n) => out.extend_from_slice(&n.to_be_bytes()),
            Value::Int8(n) => out.extend_from_slice(&n.to_be_bytes()),
            Value::Int16(n) => out.extend_from_slice(&n.to_be_bytes()),
            Value::Int32(n) => out.extend_from_slice(&n.to_be_bytes()),
            Value::Int64(n) => out.extend_from_slice(&n.to_be_bytes()),
            Value::Float(n) => out.extend_from_slice(&n.to_be_bytes()),
            Value::Double(n) => out.extend_from_slice(&n.to_be_bytes()),

            Value::String(b) => put_str(&mut out, marker, 1, b)?,
            Value::BigString(b) => put_str(&mut out, marker, 2, b)?,
            Value::HugeString(b) => put_str(&mut out, marker, 4, b)?,
            Value::DictUrl(b) => put_str(&mut out, marker, 1, b)?,
            Value::BigDictUrl(b) => put_str(&mut out, marker, 2, b)?,
        }
    }
    Ok(out)
}
