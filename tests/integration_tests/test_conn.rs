// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use weft::net::buffer::Buffer;
use weft::net::conn::{ConnError, Connection, ReadStatus};
use weft::net::dns::resolve;

/// One accepted server-side connection plus the raw client stream.
async fn socket_pair() -> Result<(Connection, TcpStream)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let client = TcpStream::connect(addr).await?;
    let (stream, _) = listener.accept().await?;
    Ok((Connection::from_stream(stream), client))
}

#[tokio::test]
async fn test_read_delivers_bytes_incrementally() -> Result<()> {
    let (conn, mut client) = socket_pair().await?;
    conn.start_reading()?;
    let mut buf = Buffer::new(64)?;

    client.write_all(b"hello").await?;
    let status = conn.read(&mut buf, Some(Duration::from_secs(2))).await?;
    assert_eq!(status, ReadStatus::Data(5));
    assert_eq!(buf.read_slice(), b"hello");

    client.write_all(b" world").await?;
    let status = conn.read(&mut buf, Some(Duration::from_secs(2))).await?;
    assert_eq!(status, ReadStatus::Data(11));
    assert_eq!(buf.read_slice(), b"hello world");
    Ok(())
}

#[tokio::test]
async fn test_read_timeout_closes_connection() -> Result<()> {
    let (conn, _client) = socket_pair().await?;
    conn.start_reading()?;
    let mut buf = Buffer::new(64)?;

    // Peer sends nothing; the 50ms deadline cancels the read and closes.
    let err = conn
        .read(&mut buf, Some(Duration::from_millis(50)))
        .await
        .expect_err("read should time out");
    assert!(matches!(err, ConnError::Cancelled));
    assert!(conn.is_closed());

    let err = conn.read(&mut buf, None).await.expect_err("closed conn");
    assert!(matches!(err, ConnError::Closed));
    assert_eq!(err.to_string(), "Connection closed");
    Ok(())
}

#[tokio::test]
async fn test_eof_closes_connection() -> Result<()> {
    let (conn, client) = socket_pair().await?;
    conn.start_reading()?;
    let mut buf = Buffer::new(64)?;

    drop(client);
    let status = conn.read(&mut buf, Some(Duration::from_secs(2))).await?;
    assert_eq!(status, ReadStatus::Eof);
    assert!(conn.is_closed());
    Ok(())
}

#[tokio::test]
async fn test_read_requires_start_reading() -> Result<()> {
    let (conn, _client) = socket_pair().await?;
    let mut buf = Buffer::new(64)?;

    let err = conn.read(&mut buf, None).await.expect_err("not armed");
    assert!(matches!(err, ConnError::NotReading));
    assert!(conn.is_closed());
    Ok(())
}

#[tokio::test]
async fn test_start_reading_twice_is_an_error() -> Result<()> {
    let (conn, _client) = socket_pair().await?;
    conn.start_reading()?;
    let err = conn.start_reading().expect_err("second arm");
    assert!(matches!(err, ConnError::AlreadyReading));
    Ok(())
}

#[tokio::test]
async fn test_read_into_full_buffer_is_overflow() -> Result<()> {
    let (conn, _client) = socket_pair().await?;
    conn.start_reading()?;
    let mut buf = Buffer::new(4)?;
    assert!(buf.append(b"full"));

    let err = conn.read(&mut buf, None).await.expect_err("full buffer");
    assert!(matches!(err, ConnError::Overflow));
    assert!(conn.is_closed());
    Ok(())
}

#[tokio::test]
async fn test_chunked_write_wire_bytes() -> Result<()> {
    let (conn, mut client) = socket_pair().await?;

    conn.write_chunk(b"abc", None).await?;
    conn.write_chunk(b"de", None).await?;
    conn.write_chunk(b"", None).await?;
    conn.close();
    drop(conn);

    let mut wire = Vec::new();
    client.read_to_end(&mut wire).await?;
    assert_eq!(wire, b"3\r\nabc\r\n2\r\nde\r\n0\r\n\r\n");
    Ok(())
}

#[tokio::test]
async fn test_write_after_close_fails() -> Result<()> {
    let (conn, _client) = socket_pair().await?;
    conn.close();
    conn.close(); // idempotent

    let err = conn.write(b"x", None).await.expect_err("closed");
    assert!(matches!(err, ConnError::Closed));
    Ok(())
}

#[tokio::test]
async fn test_empty_write_is_a_noop_success() -> Result<()> {
    let (conn, _client) = socket_pair().await?;
    assert_eq!(conn.write(b"", None).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_client_connect_round_trip() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let mut scratch = [0u8; 4];
        stream.read_exact(&mut scratch).await.expect("read ping");
        stream.write_all(b"pong").await.expect("write pong");
    });

    let conn =
        Connection::connect("127.0.0.1", addr.port(), Some(Duration::from_secs(2))).await?;
    conn.start_reading()?;
    assert_eq!(conn.write(b"ping", None).await?, 4);

    let mut buf = Buffer::new(16)?;
    conn.read(&mut buf, Some(Duration::from_secs(2))).await?;
    assert_eq!(buf.read_slice(), b"pong");

    server.await?;
    Ok(())
}

#[tokio::test]
async fn test_connect_rejects_bad_address() {
    let err = Connection::connect("not-an-ip", 80, None)
        .await
        .expect_err("bad address");
    assert!(matches!(err, ConnError::BadAddr(_, _)));

    let err = Connection::connect("127.0.0.1", 0, None)
        .await
        .expect_err("port zero");
    assert!(matches!(err, ConnError::BadAddr(_, _)));
}

#[tokio::test]
async fn test_dns_resolves_dotted_quad() -> Result<()> {
    assert_eq!(resolve("127.0.0.1").await?, "127.0.0.1");
    Ok(())
}

#[tokio::test]
async fn test_dns_failure_carries_context() {
    let err = resolve("definitely-not-a-real-host.invalid")
        .await
        .expect_err("bogus hostname");
    assert!(err.to_string().starts_with("DNS resolution failed"), "got: {err}");
}
