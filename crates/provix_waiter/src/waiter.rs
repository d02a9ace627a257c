//! Bounded polling of eventually-consistent remote objects.
//!
//! A [`StateChangeConf`] describes which states are still in progress, which
//! ones end the wait, and how often to look. [`StateChangeConf::wait`] keeps
//! calling a refresh closure until the object settles, the time budget runs
//! out, or the operation context is cancelled.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use provix_core::{ApiError, ContextError, OperationContext};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{WaitError, WaitResult};

/// Wait before the first poll used by most consumers.
pub const DEFAULT_STATE_CHANGE_DELAY: Duration = Duration::from_secs(10);

/// Poll spacing used by most consumers.
pub const DEFAULT_STATE_CHANGE_MIN_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

// Floor for the poll spacing when neither min_timeout nor poll_interval is set.
const MIN_POLL_SPACING: Duration = Duration::from_millis(100);

/// What a refresh returns: the object (`None` when it does not exist) and
/// its current state.
pub type RefreshResult<T> = Result<(Option<T>, String), ApiError>;

/// What to do with a state that is neither pending nor a target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnexpectedStatePolicy {
    /// Treat it as an interim state and keep polling.
    #[default]
    KeepPolling,
    /// Abort with [`WaitError::UnexpectedState`].
    Fail,
}

/// Parameters of one convergence wait.
#[derive(Debug, Clone)]
pub struct StateChangeConf {
    pub pending: Vec<String>,
    /// Empty means "stop at the first state not in `pending`".
    pub target: Vec<String>,
    /// Wait before the first poll.
    pub delay: Duration,
    /// Minimum spacing between polls.
    pub min_timeout: Duration,
    /// Fixed spacing between polls, never below `min_timeout`.
    pub poll_interval: Option<Duration>,
    /// Overall budget, on top of whatever deadline the context carries.
    pub timeout: Duration,
    /// Consecutive target observations required for success.
    pub continuous_target_occurence: u32,
    /// Consecutive "object missing" refreshes tolerated.
    pub not_found_checks: u32,
    pub unexpected_state: UnexpectedStatePolicy,
}

impl StateChangeConf {
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: Vec::new(),
            target: Vec::new(),
            delay: Duration::ZERO,
            min_timeout: Duration::ZERO,
            poll_interval: None,
            timeout,
            continuous_target_occurence: 1,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
            unexpected_state: UnexpectedStatePolicy::default(),
        }
    }

    pub fn pending<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending = states.into_iter().map(Into::into).collect();
        self
    }

    pub fn target<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target = states.into_iter().map(Into::into).collect();
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn continuous_target_occurence(mut self, occurrences: u32) -> Self {
        self.continuous_target_occurence = occurrences;
        self
    }

    pub fn not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    pub fn unexpected_state(mut self, policy: UnexpectedStatePolicy) -> Self {
        self.unexpected_state = policy;
        self
    }

    /// Time between two polls.
    pub fn spacing(&self) -> Duration {
        let spacing = self
            .poll_interval
            .map_or(self.min_timeout, |p| p.max(self.min_timeout));
        if spacing.is_zero() {
            MIN_POLL_SPACING
        } else {
            spacing
        }
    }

    /// Poll `refresh` until the object converges.
    ///
    /// A refresh error aborts the wait immediately. Cancellation and the
    /// deadline interrupt both the delay and the sleep between polls.
    pub async fn wait<T, F, Fut>(&self, ctx: &OperationContext, mut refresh: F) -> WaitResult<Converged<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RefreshResult<T>>,
    {
        let ctx = ctx.with_timeout(self.timeout);
        let spacing = self.spacing();
        let required = self.continuous_target_occurence.max(1);

        let mut progress = Progress::new();

        debug!(
            "Waiting for state {:?} (pending {:?}, timeout {:?}, spacing {:?})",
            self.target, self.pending, self.timeout, spacing
        );

        if !self.delay.is_zero() {
            ctx.sleep(self.delay)
                .await
                .map_err(|e| self.interrupted(e, &progress.last_state))?;
        }

        loop {
            let (object, state) = match ctx.run(refresh()).await {
                Err(e) => return Err(self.interrupted(e, &progress.last_state)),
                Ok(Err(err)) => {
                    warn!("Refresh failed after {} polls: {}", progress.polls, err);
                    return Err(WaitError::Refresh(err));
                }
                Ok(Ok(observed)) => observed,
            };
            progress.polls += 1;

            match object {
                None => {
                    if self.target.is_empty() {
                        // Gone counts as settled when any state is acceptable.
                        progress.hits += 1;
                        if progress.hits >= required {
                            return Ok(progress.finish(None, state));
                        }
                    } else {
                        progress.not_found += 1;
                        debug!("Object not found ({}/{})", progress.not_found, self.not_found_checks);
                        if progress.not_found > self.not_found_checks {
                            return Err(WaitError::NotFound {
                                checks: progress.not_found,
                            });
                        }
                    }
                }
                Some(object) => {
                    progress.not_found = 0;
                    progress.last_state = state.clone();

                    if self.target.contains(&state) {
                        progress.hits += 1;
                        debug!("Reached target state {} ({}/{})", state, progress.hits, required);
                        if progress.hits >= required {
                            return Ok(progress.finish(Some(object), state));
                        }
                    } else if self.pending.contains(&state) {
                        progress.hits = 0;
                        debug!("Still in pending state {}", state);
                    } else if self.target.is_empty() {
                        return Ok(progress.finish(Some(object), state));
                    } else {
                        progress.hits = 0;
                        match self.unexpected_state {
                            UnexpectedStatePolicy::Fail => {
                                return Err(WaitError::UnexpectedState {
                                    state,
                                    expected: self.target.clone(),
                                });
                            }
                            UnexpectedStatePolicy::KeepPolling => {
                                warn!("Unexpected state {}, still waiting for {:?}", state, self.target);
                            }
                        }
                    }
                }
            }

            ctx.sleep(spacing)
                .await
                .map_err(|e| self.interrupted(e, &progress.last_state))?;
        }
    }

    fn interrupted(&self, err: ContextError, last_state: &str) -> WaitError {
        match err {
            ContextError::Cancelled => WaitError::Cancelled,
            ContextError::DeadlineExceeded => WaitError::Timeout {
                last_state: last_state.to_string(),
                expected: self.target.clone(),
                timeout: self.timeout,
            },
        }
    }
}

struct Progress {
    started_at: DateTime<Utc>,
    last_state: String,
    polls: u32,
    hits: u32,
    not_found: u32,
}

impl Progress {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            last_state: String::new(),
            polls: 0,
            hits: 0,
            not_found: 0,
        }
    }

    fn finish<T>(self, object: Option<T>, state: String) -> Converged<T> {
        let report = WaitReport {
            state,
            polls: self.polls,
            started_at: self.started_at,
            finished_at: Utc::now(),
        };
        info!("Converged to state {:?} after {} polls", report.state, report.polls);
        Converged { object, report }
    }
}

/// Summary of a successful wait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitReport {
    pub state: String,
    pub polls: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// The settled object and how it got there.
#[derive(Debug, Clone)]
pub struct Converged<T> {
    /// `None` when the object disappeared and that was acceptable.
    pub object: Option<T>,
    pub report: WaitReport,
}

impl<T> Converged<T> {
    pub fn state(&self) -> &str {
        &self.report.state
    }

    pub fn into_object(self) -> Option<T> {
        self.object
    }
}
