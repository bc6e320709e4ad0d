// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;
use weft::logging::file_log::{FileLog, LogState};
use weft::logging::syslog::Syslog;

async fn wait_for_state(log: &FileLog, want: LogState) -> bool {
    for _ in 0..100 {
        if log.state() == want {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    false
}

fn temp_log_path(tag: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("weft-test-{}-{tag}.log", std::process::id()))
}

#[tokio::test]
async fn test_file_log_lifecycle_and_bytes() -> Result<()> {
    let path = temp_log_path("lifecycle");
    let log = FileLog::new();
    assert_eq!(log.state(), LogState::NotOpen);

    log.open(&path);
    assert!(wait_for_state(&log, LogState::IsOpen).await, "log never opened");

    // Binary-transparent append: exactly the bytes given, no framing.
    assert_eq!(log.write(b"first "), LogState::IsOpen);
    assert_eq!(log.write(&[0x00, 0xff, 0x7f]), LogState::IsOpen);
    assert_eq!(log.rotate(b" last"), LogState::NotOpen);

    assert!(wait_for_state(&log, LogState::NotOpen).await);
    // Give the writer task a beat to flush and close.
    sleep(Duration::from_millis(50)).await;

    let written = std::fs::read(&path)?;
    assert_eq!(written, b"first \x00\xff\x7f last");

    std::fs::remove_file(&path).ok();
    Ok(())
}

#[tokio::test]
async fn test_file_log_open_is_single_shot() -> Result<()> {
    let path = temp_log_path("single");
    let log = FileLog::new();
    log.open(&path);
    // A second open while Opening/IsOpen is a no-op.
    log.open(temp_log_path("single-other"));
    assert!(wait_for_state(&log, LogState::IsOpen).await);

    log.rotate(b"bye");
    assert!(wait_for_state(&log, LogState::NotOpen).await);
    std::fs::remove_file(&path).ok();
    Ok(())
}

#[tokio::test]
async fn test_file_log_write_while_not_open_reports_state() {
    let log = FileLog::new();
    assert_eq!(log.write(b"dropped"), LogState::NotOpen);
}

#[tokio::test]
async fn test_syslog_datagrams_verbatim() -> Result<()> {
    let server = std::net::UdpSocket::bind("127.0.0.1:0")?;
    server.set_read_timeout(Some(Duration::from_secs(5)))?;
    let port = server.local_addr()?.port();

    let syslog = Syslog::new();
    assert!(!syslog.is_connected());
    assert!(syslog.connect("127.0.0.1", port));
    assert!(syslog.is_connected());

    syslog.send(b"hello syslog");
    let mut datagram = [0u8; 64];
    let (n, _) = server.recv_from(&mut datagram)?;
    assert_eq!(&datagram[..n], b"hello syslog");

    // Empty messages are dropped, and close releases the socket.
    syslog.send(b"");
    syslog.close();
    assert!(!syslog.is_connected());
    Ok(())
}

#[tokio::test]
async fn test_syslog_connect_failure_reports_false() {
    let syslog = Syslog::new();
    assert!(!syslog.connect("definitely-not-a-real-host.invalid", 514));
    assert!(!syslog.is_connected());
    // Sending without a socket is a silent no-op.
    syslog.send(b"nowhere");
}
