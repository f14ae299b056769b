//! Shared stop signal observed cooperatively by every stage

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    UserQuit,
    SourceExhausted,
    SourceFailed,
    ConnectionLost,
    DisplayFailed,
}

impl StopReason {
    /// Stages keep draining queued frames instead of stopping at once
    pub fn drains(self) -> bool {
        matches!(self, StopReason::SourceExhausted)
    }

    /// Ends the process with a failure status
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            StopReason::SourceFailed | StopReason::ConnectionLost | StopReason::DisplayFailed
        )
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::UserQuit => "user quit",
            StopReason::SourceExhausted => "source exhausted",
            StopReason::SourceFailed => "source failed",
            StopReason::ConnectionLost => "connection lost",
            StopReason::DisplayFailed => "display failed",
        };
        f.write_str(text)
    }
}

#[derive(Default)]
struct StopInner {
    stopped: AtomicBool,
    abort: AtomicBool,
    first: OnceCell<StopReason>,
    escalated: OnceCell<StopReason>,
}

/// Cloneable handle to the session's stop flag. Any holder may set it; all
/// holders observe it with acquire ordering.
#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<StopInner>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `reason` and raise the flag. Returns true for the first caller.
    pub fn trigger(&self, reason: StopReason) -> bool {
        let first = self.inner.first.set(reason).is_ok();
        if !reason.drains() {
            let _ = self.inner.escalated.set(reason);
            self.inner.abort.store(true, Ordering::Release);
        }
        self.inner.stopped.store(true, Ordering::Release);
        first
    }

    /// Stop every stage immediately without recording a reason
    pub fn halt(&self) {
        self.inner.abort.store(true, Ordering::Release);
        self.inner.stopped.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// True once stages must exit without draining their input
    pub fn should_abort(&self) -> bool {
        self.inner.abort.load(Ordering::Acquire)
    }

    /// The first aborting reason if any, else the first reason recorded
    pub fn reason(&self) -> Option<StopReason> {
        self.inner
            .escalated
            .get()
            .or_else(|| self.inner.first.get())
            .copied()
    }
}

impl fmt::Debug for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopSignal")
            .field("stopped", &self.is_set())
            .field("abort", &self.should_abort())
            .field("reason", &self.reason())
            .finish()
    }
}
