// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::cfg::config::Config;
use crate::net::conn::Connection;

pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// The per-listener request handler: one invocation per accepted
/// connection, run on its own task.
pub type RequestHandler = Arc<dyn Fn(Connection) -> HandlerFuture + Send + Sync>;

struct Listener {
    ip: String,
    port: u16,
    handler: RequestHandler,
}

/// The listener set plus the machinery to run it: bind every listener,
/// accept in a loop, spawn one handler task per connection, and tear
/// everything down on SIGHUP or an explicit shutdown.
pub struct Server {
    listeners: Vec<Listener>,
    shutdown: CancellationToken,
    grace: Duration,
}

impl Server {
    pub fn new(cfg: &Config) -> Self {
        Self {
            listeners: Vec::new(),
            shutdown: CancellationToken::new(),
            grace: cfg.runtime.shutdown_grace(),
        }
    }

    /// Token that ends the server when cancelled; SIGHUP cancels it too.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn add_listener(&mut self, ip: impl Into<String>, port: u16, handler: RequestHandler) {
        self.listeners.push(Listener { ip: ip.into(), port, handler });
    }

    /// Binds every listener in registration order. On failure the already
    /// bound sockets are released in reverse order.
    pub async fn bind(self) -> Result<BoundServer> {
        let mut bound = Vec::with_capacity(self.listeners.len());
        for l in &self.listeners {
            let addr = format!("{}:{}", l.ip, l.port);
            let socket = match TcpListener::bind(&addr).await {
                Ok(s) => s,
                Err(e) => {
                    while bound.pop().is_some() {}
                    return Err(e).with_context(|| format!("failed to bind {addr}"));
                }
            };
            if let Ok(local) = socket.local_addr() {
                info!(%local, "listening");
            }
            bound.push((socket, l.handler.clone()));
        }
        Ok(BoundServer { bound, shutdown: self.shutdown, grace: self.grace })
    }

    /// Convenience for bind-then-serve.
    pub async fn run(self) -> Result<()> {
        self.bind().await?.serve().await
    }
}

pub struct BoundServer {
    bound: Vec<(TcpListener, RequestHandler)>,
    shutdown: CancellationToken,
    grace: Duration,
}

impl BoundServer {
    /// Bound addresses in listener registration order.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.bound.iter().filter_map(|(s, _)| s.local_addr().ok()).collect()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Accepts until shutdown, then drains handler tasks within the grace
    /// period. Returns cleanly on SIGHUP.
    pub async fn serve(self) -> Result<()> {
        let tracker = TaskTracker::new();

        #[cfg(unix)]
        {
            let shutdown = self.shutdown.clone();
            let mut hangup = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
                .context("failed to install SIGHUP handler")?;
            tokio::spawn(async move {
                if hangup.recv().await.is_some() {
                    info!("shutdown request received");
                    shutdown.cancel();
                }
            });
        }

        let mut accept_loops = Vec::with_capacity(self.bound.len());
        for (socket, handler) in self.bound {
            accept_loops.push(tokio::spawn(accept_loop(
                socket,
                handler,
                tracker.clone(),
                self.shutdown.clone(),
            )));
        }

        self.shutdown.cancelled().await;

        // Listeners close as their accept loops return; handlers already
        // running get the grace period to finish.
        for task in accept_loops {
            let _ = task.await;
        }
        tracker.close();
        if tokio::time::timeout(self.grace, tracker.wait()).await.is_err() {
            warn!("handler tasks still running at shutdown grace expiry");
        }
        Ok(())
    }
}

async fn accept_loop(
    socket: TcpListener,
    handler: RequestHandler,
    tracker: TaskTracker,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = socket.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "accepted connection");
                    let conn = Connection::from_stream(stream);
                    tracker.spawn((handler)(conn));
                }
                Err(e) => {
                    warn!("accept failed: {e}");
                }
            },
        }
    }
}
