// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! LPack: a compact, self-describing, tagged binary format. Every value on
//! the wire starts with a one-byte marker; fixed-width numerics carry a
//! big-endian payload, string-like markers carry a big-endian length prefix
//! and raw bytes, structural markers stand alone.

pub mod marker;
pub mod reader;
pub mod writer;

use bytes::Bytes;
use thiserror::Error;

pub use marker::Marker;
pub use reader::{ReadOutcome, Reader, read_marker, read_value};
pub use writer::serialize;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LpackError {
    #[error("invalid marker {0} encountered")]
    InvalidMarker(u8),
    #[error("marker {0:?} carries no data payload")]
    NotADataMarker(Marker),
    #[error("value of {len} bytes does not fit {marker:?}")]
    ValueTooLong { marker: Marker, len: usize },
    #[error("buffer underflow at offset {0}")]
    Underflow(usize),
    #[error("truncated value: {required} more bytes required")]
    Truncated { required: usize },
}

/// One decoded (or to-be-encoded) tagged value. The variant is the wire
/// marker; string-like variants hold their raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    MapStart,
    ArrayStart,
    DictStart,
    RecordEnd,
    Nil,
    Bool(bool),
    Uint8(u8),
    DictEntry(u8),
    Uint16(u16),
    BigDictEntry(u16),
    Uint32(u32),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    String(Bytes),
    BigString(Bytes),
    HugeString(Bytes),
    DictUrl(Bytes),
    BigDictUrl(Bytes),
}

impl Value {
    pub fn marker(&self) -> Marker {
        match self {
            Value::MapStart => Marker::MapStart,
            Value::ArrayStart => Marker::ArrayStart,
            Value::DictStart => Marker::DictStart,
            Value::RecordEnd => Marker::RecordEnd,
            Value::Nil => Marker::Nil,
            Value::Bool(true) => Marker::BoolTrue,
            Value::Bool(false) => Marker::BoolFalse,
            Value::Uint8(_) => Marker::Uint8,
            Value::DictEntry(_) => Marker::DictEntry,
            Value::Uint16(_) => Marker::Uint16,
            Value::BigDictEntry(_) => Marker::BigDictEntry,
            Value::Uint32(_) => Marker::Uint32,
            Value::Int8(_) => Marker::Int8,
            Value::Int16(_) => Marker::Int16,
            Value::Int32(_) => Marker::Int32,
            Value::Int64(_) => Marker::Int64,
            Value::Float(_) => Marker::Float,
            Value::Double(_) => Marker::Double,
            Value::String(_) => Marker::String,
            Value::BigString(_) => Marker::BigString,
            Value::HugeString(_) => Marker::HugeString,
            Value::DictUrl(_) => Marker::DictUrl,
            Value::BigDictUrl(_) => Marker::BigDictUrl,
        }
    }
}
