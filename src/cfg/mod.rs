// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Configuration file parsing, path resolution and logger setup.

/// Command-line path helpers.
pub mod cli;
/// Configuration file parsing and validation.
pub mod config;
/// Diagnostics subscriber initialization.
pub mod logger;
