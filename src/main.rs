// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};
use weft::{
    cfg::{cli::resolve_config_path, config::Config, logger::init_logger},
    http::{HttpParser, ParseEvent},
    net::{
        buffer::Buffer,
        conn::{Connection, ReadStatus},
        server::{RequestHandler, Server},
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    let config_arg = std::env::args()
        .nth(1)
        .context("Usage: weft_server <config file>")?;

    let cfg = resolve_config_path(&config_arg)
        .and_then(Config::load_from_file)
        .context("failed to resolve or load config")?;

    let _guard = init_logger(&cfg.logger.clone().unwrap_or_default())?;
    info!(
        ip = %cfg.server.server_ip,
        port = cfg.server.server_port,
        "starting server"
    );

    let handler = hello_handler(&cfg);
    let mut server = Server::new(&cfg);
    server.add_listener(cfg.server.server_ip.as_str(), cfg.server.server_port, handler);
    let result = server.run().await;
    weft::logging::syslog().close();
    result
}

/// Minimal built-in handler: drains one request through the parse driver
/// and answers 200, honoring keep-alive and pipelining. Applications
/// embedding the runtime register their own handler instead.
fn hello_handler(cfg: &Config) -> RequestHandler {
    let buffer_size = cfg.server.connection_buffer_size;
    let read_timeout = cfg.runtime.read_timeout();
    let write_timeout = cfg.runtime.write_timeout();

    Arc::new(move |conn: Connection| {
        Box::pin(async move {
            if let Err(e) = serve_connection(conn, buffer_size, read_timeout, write_timeout).await
            {
                debug!("connection handler finished: {e:#}");
            }
        })
    })
}

async fn serve_connection(
    conn: Connection,
    buffer_size: usize,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
) -> Result<()> {
    conn.start_reading()?;
    let mut buf = Buffer::new(buffer_size)?;
    let mut parser = HttpParser::request();

    loop {
        let Some(keep_alive) =
            drive_request(&conn, &mut parser, &mut buf, read_timeout).await?
        else {
            return Ok(());
        };

        let body = b"Hello from weft\n";
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: {}\r\n\r\n",
            body.len(),
            if keep_alive { "keep-alive" } else { "close" }
        );
        conn.write(head.as_bytes(), write_timeout).await?;
        conn.write(body, write_timeout).await?;

        if !keep_alive {
            conn.close();
            return Ok(());
        }
        if buf.remaining_content_len() == 0 {
            buf.clear();
        }
    }
}

/// Pulls parse events until the message completes. `None` means the peer
/// went away cleanly before a full message arrived.
async fn drive_request(
    conn: &Connection,
    parser: &mut HttpParser,
    buf: &mut Buffer,
    read_timeout: Option<Duration>,
) -> Result<Option<bool>> {
    loop {
        match parser.parse(buf)? {
            ParseEvent::MessageComplete => return Ok(Some(parser.should_keep_alive())),
            ParseEvent::NeedData => {
                if buf.remaining_capacity() == 0 {
                    buf.compact();
                }
                match conn.read(buf, read_timeout).await? {
                    ReadStatus::Data(_) => {}
                    ReadStatus::Eof => return Ok(None),
                }
            }
            _ => {}
        }
    }
}
