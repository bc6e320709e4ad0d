// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::lookup_host;

#[derive(Debug, Error)]
pub enum DnsError {
    #[error("DNS resolution failed: {0}")]
    Lookup(#[source] std::io::Error),
    #[error("DNS resolution failed: no IPv4 address for {0}")]
    NoRecord(String),
}

/// Asynchronous A-record lookup. Returns the first IPv4 address of
/// `hostname` as a dotted-quad string.
pub async fn resolve(hostname: &str) -> Result<String, DnsError> {
    let addrs = lookup_host((hostname, 0u16)).await.map_err(DnsError::Lookup)?;
    for addr in addrs {
        if let SocketAddr::V4(v4) = addr {
            return Ok(v4.ip().to_string());
        }
    }
    Err(DnsError::NoRecord(hostname.to_string()))
}
