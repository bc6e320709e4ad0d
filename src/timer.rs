// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! One-shot user timers with an observable three-state lifecycle.
//!
//! `Init -> start -> Ticking`; a deadline that passes while somebody is in
//! [`Timer::wait`] completes that wait and drops back to `Init`; a deadline
//! that passes with no waiter parks the timer in `Elapsed` so the next
//! `wait` returns without suspending. `stop` and `close` cancel the single
//! pending waiter exactly once.

use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Init,
    Ticking,
    Elapsed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("timer is already closed")]
    Closed,
    #[error("timer is already in use by another task")]
    Busy,
    #[error("wait() on a timer that is not started")]
    NotTicking,
    #[error("invalid timeout value")]
    InvalidTimeout,
    #[error("operation canceled")]
    Cancelled,
}

#[derive(Debug)]
struct Inner {
    ticking: bool,
    deadline: Option<Instant>,
    waiter: bool,
    closed: bool,
}

#[derive(Debug)]
pub struct Timer {
    inner: Mutex<Inner>,
    // Bumped by stop()/close() to interrupt the pending waiter.
    interrupt: watch::Sender<u32>,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Self {
        let (interrupt, _) = watch::channel(0);
        Self {
            inner: Mutex::new(Inner {
                ticking: false,
                deadline: None,
                waiter: false,
                closed: false,
            }),
            interrupt,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("timer state lock poisoned")
    }

    fn derived_state(inner: &Inner) -> TimerState {
        if !inner.ticking {
            return TimerState::Init;
        }
        match inner.deadline {
            // A passed deadline with nobody waiting is exactly the
            // elapsed-without-waiter case.
            Some(d) if !inner.waiter && Instant::now() >= d => TimerState::Elapsed,
            _ => TimerState::Ticking,
        }
    }

    pub fn state(&self) -> TimerState {
        Self::derived_state(&self.lock())
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Arms the timer. Only legal from `Init`; an already ticking or
    /// elapsed timer belongs to whoever started it.
    pub fn start(&self, timeout: Duration) -> Result<(), TimerError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(TimerError::Closed);
        }
        if Self::derived_state(&inner) != TimerState::Init {
            return Err(TimerError::Busy);
        }
        if timeout.is_zero() {
            return Err(TimerError::InvalidTimeout);
        }
        inner.ticking = true;
        inner.deadline = Some(Instant::now() + timeout);
        Ok(())
    }

    /// Waits for the armed deadline. Returns immediately when the deadline
    /// already passed; otherwise suspends until it fires (`Ok`) or until
    /// `stop`/`close` cancels the wait. At most one waiter at a time.
    pub async fn wait(&self) -> Result<(), TimerError> {
        // Subscribe before inspecting state so an interrupt arriving
        // between the check and the select is not lost.
        let mut interrupted = self.interrupt.subscribe();

        let deadline = {
            let mut inner = self.lock();
            if inner.closed {
                return Err(TimerError::Closed);
            }
            match Self::derived_state(&inner) {
                TimerState::Elapsed => {
                    inner.ticking = false;
                    inner.deadline = None;
                    return Ok(());
                }
                TimerState::Init => return Err(TimerError::NotTicking),
                TimerState::Ticking => {}
            }
            if inner.waiter {
                return Err(TimerError::Busy);
            }
            let Some(deadline) = inner.deadline else {
                return Err(TimerError::NotTicking);
            };
            inner.waiter = true;
            deadline
        };

        tokio::select! {
            _ = sleep_until(deadline) => {
                let mut inner = self.lock();
                if !inner.waiter {
                    // stop()/close() got there first and already took the
                    // cancellation path for this waiter.
                    return Err(TimerError::Cancelled);
                }
                inner.waiter = false;
                inner.ticking = false;
                inner.deadline = None;
                Ok(())
            }
            _ = interrupted.changed() => {
                let mut inner = self.lock();
                inner.waiter = false;
                Err(TimerError::Cancelled)
            }
        }
    }

    /// Disarms a ticking timer, cancelling its waiter if any. A timer whose
    /// deadline already passed without a waiter stays `Elapsed`; a stopped
    /// or closed timer is untouched.
    pub fn stop(&self) {
        let mut inner = self.lock();
        if inner.closed || Self::derived_state(&inner) != TimerState::Ticking {
            return;
        }
        if inner.waiter {
            inner.waiter = false;
            self.interrupt.send_modify(|v| *v = v.wrapping_add(1));
        }
        inner.ticking = false;
        inner.deadline = None;
    }

    /// Idempotent, terminal. The pending waiter, if any, observes
    /// cancellation; every later operation fails with `Closed`.
    pub fn close(&self) {
        let mut inner = self.lock();
        if inner.closed {
            return;
        }
        inner.closed = true;
        if inner.waiter {
            inner.waiter = false;
            self.interrupt.send_modify(|v| *v = v.wrapping_add(1));
        }
        inner.ticking = false;
        inner.deadline = None;
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.close();
    }
}
