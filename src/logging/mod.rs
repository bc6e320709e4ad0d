// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Handler-visible log sinks: the async append-only file log and the
//! fire-and-forget UDP syslog. Both are process-scope singletons,
//! initialized on first use and shared by every handler task.

pub mod file_log;
pub mod syslog;

use once_cell::sync::Lazy;

use file_log::FileLog;
use syslog::Syslog;

static FILE_LOG: Lazy<FileLog> = Lazy::new(FileLog::new);
static SYSLOG: Lazy<Syslog> = Lazy::new(Syslog::new);

pub fn file_log() -> &'static FileLog {
    &FILE_LOG
}

pub fn syslog() -> &'static Syslog {
    &SYSLOG
}
