// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::net::{ToSocketAddrs, UdpSocket};
use std::sync::Mutex;

use tracing::warn;

/// Fire-and-forget UDP log sink. The server address is resolved once at
/// connect time; `send` never blocks and never reports failure.
pub struct Syslog {
    sock: Mutex<Option<UdpSocket>>,
}

impl Default for Syslog {
    fn default() -> Self {
        Self::new()
    }
}

impl Syslog {
    pub fn new() -> Self {
        Self { sock: Mutex::new(None) }
    }

    pub fn is_connected(&self) -> bool {
        self.sock.lock().expect("syslog lock poisoned").is_some()
    }

    /// Resolves the server address and prepares a non-blocking socket.
    /// Returns false when resolution or socket setup fails.
    pub fn connect(&self, host: &str, port: u16) -> bool {
        let addr = match (host, port).to_socket_addrs().map(|mut a| a.next()) {
            Ok(Some(addr)) => addr,
            Ok(None) | Err(_) => {
                warn!(host, port, "failed to resolve syslog server address");
                return false;
            }
        };
        let sock = match UdpSocket::bind("0.0.0.0:0")
            .and_then(|s| s.set_nonblocking(true).map(|_| s))
            .and_then(|s| s.connect(addr).map(|_| s))
        {
            Ok(s) => s,
            Err(e) => {
                warn!(host, port, "failed to set up syslog socket: {e}");
                return false;
            }
        };
        *self.sock.lock().expect("syslog lock poisoned") = Some(sock);
        true
    }

    /// Sends one datagram carrying `msg` verbatim. Errors (including a
    /// full socket buffer) are dropped on the floor.
    pub fn send(&self, msg: &[u8]) {
        if msg.is_empty() {
            return;
        }
        if let Some(sock) = &*self.sock.lock().expect("syslog lock poisoned") {
            let _ = sock.send(msg);
        }
    }

    pub fn close(&self) {
        *self.sock.lock().expect("syslog lock poisoned") = None;
    }
}
