// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! HTTP/1.x surface: the pull-style parse driver, chunked transfer codec
//! and the URL helpers handlers call directly.

pub mod chunked;
pub mod parser;
pub mod url;

pub use chunked::{ChunkDecoder, encode_chunk};
pub use parser::{HttpError, HttpParser, ParseEvent, ParserKind};
