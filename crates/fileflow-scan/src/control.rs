//! Cooperative cancellation, pausing and deadlines for a running scan.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use fileflow_core::CancelReason;

/// Upper bound on a single wait while paused, so cancellation and
/// deadlines are noticed promptly.
const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Handle shared between a scan and whoever drives it.
///
/// Cloning is cheap; all clones control the same scan. Cancellation is
/// observed between batches and before each file task starts, never in
/// the middle of fingerprinting a file.
#[derive(Clone, Default)]
pub struct ScanControl {
    token: CancellationToken,
    pause: Arc<PauseGate>,
    deadline: Option<Instant>,
}

#[derive(Default)]
struct PauseGate {
    paused: Mutex<bool>,
    changed: Condvar,
}

impl ScanControl {
    /// A control with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel automatically once `deadline` passes.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Cancel automatically after `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Request cancellation. Also wakes a paused scan so it can stop.
    pub fn cancel(&self) {
        self.token.cancel();
        self.pause.changed.notify_all();
    }

    /// Hold the scan at the next batch boundary.
    pub fn pause(&self) {
        *self.lock_paused() = true;
    }

    /// Let a paused scan continue.
    pub fn resume(&self) {
        *self.lock_paused() = false;
        self.pause.changed.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        *self.lock_paused()
    }

    /// Whether the scan should stop, by request or by deadline.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_reason().is_some()
    }

    /// Why the scan should stop, if it should.
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            Some(CancelReason::Requested)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(CancelReason::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Configured deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Underlying token, for wiring into async code.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Block while paused. Returns the cancellation reason if the scan must
    /// stop instead of continuing.
    pub(crate) fn checkpoint_gate(&self) -> Result<(), CancelReason> {
        let mut paused = self.lock_paused();
        loop {
            if let Some(reason) = self.cancel_reason() {
                return Err(reason);
            }
            if !*paused {
                return Ok(());
            }

            let mut wait = PAUSE_POLL_INTERVAL;
            if let Some(deadline) = self.deadline {
                wait = wait.min(deadline.saturating_duration_since(Instant::now()));
            }
            paused = self
                .pause
                .changed
                .wait_timeout(paused, wait)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn lock_paused(&self) -> std::sync::MutexGuard<'_, bool> {
        self.pause.paused.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ScanControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanControl")
            .field("cancelled", &self.token.is_cancelled())
            .field("paused", &self.is_paused())
            .field("deadline", &self.deadline)
            .finish()
    }
}
