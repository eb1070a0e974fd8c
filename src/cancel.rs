//! Cooperative cancellation for analysis runs.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use crate::errors::{PerfSnapError, Result};

/// Anything that can report and request cancellation.
pub trait Cancellable {
    fn is_cancelled(&self) -> bool;

    fn cancel(&self);

    /// `Err(Cancelled)` once [`is_cancelled`](Self::is_cancelled) reports true.
    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(PerfSnapError::cancelled("cancellation requested"));
        }
        Ok(())
    }
}

/// Cancellation flag shared between the caller and analysis workers, with an
/// optional deadline after which it reports cancelled on its own.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    /// A timeout too large to represent as an instant means no deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `Err(Cancelled)` once cancelled or past the deadline.
    pub fn check(&self) -> Result<()> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(PerfSnapError::cancelled("cancellation requested"));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(PerfSnapError::cancelled("deadline exceeded"));
        }
        Ok(())
    }
}

impl Cancellable for CancellationToken {
    fn is_cancelled(&self) -> bool {
        self.check().is_err()
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    fn check(&self) -> Result<()> {
        CancellationToken::check(self)
    }
}
