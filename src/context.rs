//! Cooperative cancellation for validation runs
//!
//! A `Context` carries a cancellation token and an optional deadline. The
//! validator consults it before each object and each rule; the expression
//! interpreter consults it on every comprehension step.

use crate::error::Cancelled;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Cancellation signal threaded through validation
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled unless `cancel` is called on it
    pub fn background() -> Self {
        Self::default()
    }

    /// A child context cancelled when either it or `self` is cancelled
    pub fn with_cancel(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// A child context that expires after `timeout`
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// A child context that expires at `deadline` (or the parent's, if earlier)
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Wraps an existing token, e.g. one owned by a server's shutdown logic
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Cancels this context and all of its children
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the reason the context is done, or `None` while it is live
    pub fn err(&self) -> Option<Cancelled> {
        if self.token.is_cancelled() {
            return Some(Cancelled::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Cancelled::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }
}
