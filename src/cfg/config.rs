// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::cfg::logger::LoggerConfig;

/// Top-level server configuration. Unknown fields anywhere in the file are
/// ignored so config files can carry application-specific sections.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Config {
    /// Listener address and per-connection buffer sizing.
    #[serde(default)]
    pub server: ServerConfig,
    /// Timeouts and shutdown behavior.
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// Optional diagnostics logger section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logger: Option<LoggerConfig>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_server_ip")]
    pub server_ip: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    /// Capacity of each connection's read buffer in bytes.
    #[serde(default = "default_connection_buffer_size")]
    pub connection_buffer_size: usize,
}

fn default_server_ip() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    80
}

fn default_connection_buffer_size() -> usize {
    2048
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_ip: default_server_ip(),
            server_port: default_server_port(),
            connection_buffer_size: default_connection_buffer_size(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RuntimeConfig {
    /// Per-read deadline; zero disables the timer.
    #[serde(default, rename = "read_timeout_ms", with = "serde_millis")]
    pub read_timeout: Duration,
    /// Per-write deadline; zero disables the timer.
    #[serde(default, rename = "write_timeout_ms", with = "serde_millis")]
    pub write_timeout: Duration,
    /// How long handler tasks may keep running after shutdown begins.
    #[serde(
        default = "default_shutdown_grace",
        rename = "shutdown_grace_ms",
        with = "serde_millis"
    )]
    pub shutdown_grace: Duration,
}

fn default_shutdown_grace() -> Duration {
    Duration::from_millis(5000)
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::ZERO,
            write_timeout: Duration::ZERO,
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

impl RuntimeConfig {
    pub fn read_timeout(&self) -> Option<Duration> {
        (!self.read_timeout.is_zero()).then_some(self.read_timeout)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        (!self.write_timeout.is_zero()).then_some(self.write_timeout)
    }

    pub fn shutdown_grace(&self) -> Duration {
        self.shutdown_grace
    }
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(&path).with_context(|| {
            format!("failed to read config file {}", path.as_ref().display())
        })?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(self.server.server_port > 0, "server_port must be >= 1");
        ensure!(
            self.server.connection_buffer_size > 0,
            "connection_buffer_size must be >= 1"
        );
        ensure!(
            !self.server.server_ip.is_empty(),
            "server_ip must not be empty"
        );
        Ok(())
    }
}

/// Serde helpers for representing `Duration` as a number of milliseconds.
mod serde_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
