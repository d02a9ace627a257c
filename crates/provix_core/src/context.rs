//! Cancellation-bearing operation contexts.
//!
//! An [`OperationContext`] is handed to every hook and waiter. It carries an
//! optional absolute deadline (set from the resolved timeout) and a shared
//! cancellation signal raised by the host runtime. Both must be observed:
//! long-running work races against [`OperationContext::done`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use uuid::Uuid;

/// Why a context stopped.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    #[error("context canceled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Raises cancellation for every context derived from the same root.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Deadline and cancellation for one operation phase.
#[derive(Debug, Clone)]
pub struct OperationContext {
    id: Uuid,
    deadline: Option<Instant>,
    cancel: watch::Receiver<bool>,
    // Keeps the signal open for contexts nobody can cancel.
    _root: Option<Arc<watch::Sender<bool>>>,
}

impl OperationContext {
    /// A context without deadline that is never cancelled.
    pub fn background() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            id: Uuid::new_v4(),
            deadline: None,
            cancel: rx,
            _root: Some(Arc::new(tx)),
        }
    }

    /// A root context plus the handle that cancels it.
    pub fn with_cancel() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let tx = Arc::new(tx);
        let ctx = Self {
            id: Uuid::new_v4(),
            deadline: None,
            cancel: rx,
            _root: Some(tx.clone()),
        };
        (ctx, CancelHandle { tx })
    }

    /// Child context whose deadline is the earlier of the parent's and
    /// `now + timeout`. Cancellation of the parent propagates.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) if parent < candidate => parent,
            _ => candidate,
        };
        Self {
            id: self.id,
            deadline: Some(deadline),
            cancel: self.cancel.clone(),
            _root: self._root.clone(),
        }
    }

    /// Correlation id shared by the context and its children.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// The reason the context is done, if it is.
    pub fn err(&self) -> Option<ContextError> {
        if self.is_cancelled() {
            return Some(ContextError::Cancelled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ContextError {
        let mut rx = self.cancel.clone();
        let cancelled = async move {
            let closed = rx.wait_for(|c| *c).await.is_err();
            if closed {
                std::future::pending::<()>().await;
            }
        };

        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = cancelled => ContextError::Cancelled,
                _ = sleep_until(deadline) => ContextError::DeadlineExceeded,
            },
            None => {
                cancelled.await;
                ContextError::Cancelled
            }
        }
    }

    /// Run `fut` unless the context finishes first.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, ContextError> {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            out = fut => Ok(out),
        }
    }

    /// Like [`OperationContext::run`], but `fut` is polled first, so work
    /// that finishes at the deadline still reports its own outcome. Hooks
    /// are bounded with this.
    pub async fn bound<F: Future>(&self, fut: F) -> Result<F::Output, ContextError> {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            out = fut => Ok(out),
            err = self.done() => Err(err),
        }
    }

    /// Sleep for `duration`, returning early with an error if the context
    /// finishes first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), ContextError> {
        self.run(tokio::time::sleep(duration)).await
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::background()
    }
}
