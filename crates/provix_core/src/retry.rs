//! Bounded retry of diagnostic-returning calls.
//!
//! Nothing is retried by default. A caller opts in per call site with a
//! predicate over the returned error diagnostics, so persistent failures are
//! never masked by a blanket policy.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::context::OperationContext;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::errmsg;

/// Retry budget.
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Total attempts, including the first one.
    pub attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
    /// Report only the last attempt's diagnostics instead of all of them.
    pub last_error_only: bool,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_secs(5),
            last_error_only: true,
        }
    }
}

impl RetryOptions {
    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn last_error_only(mut self, last_error_only: bool) -> Self {
        self.last_error_only = last_error_only;
        self
    }
}

/// Retry bookkeeping for loops whose call borrows caller state.
///
/// ```rust,ignore
/// let mut retry = Retry::new(ctx, options, retry_if_status(&[404]));
/// loop {
///     let diags = hooks.read(ctx, client, &mut state).await;
///     if !retry.again(&diags).await {
///         return retry.finish(diags);
///     }
/// }
/// ```
pub struct Retry<'a, P> {
    ctx: &'a OperationContext,
    options: RetryOptions,
    retry_if: P,
    attempt: u32,
    collected: Diagnostics,
    interrupted: Option<Diagnostic>,
}

impl<'a, P> Retry<'a, P>
where
    P: Fn(&Diagnostic) -> bool,
{
    pub fn new(ctx: &'a OperationContext, options: RetryOptions, retry_if: P) -> Self {
        Self {
            ctx,
            options,
            retry_if,
            attempt: 0,
            collected: Diagnostics::new(),
            interrupted: None,
        }
    }

    /// Record one attempt's diagnostics and decide whether to go again.
    /// Sleeps for the configured delay before returning `true`.
    pub async fn again(&mut self, diags: &Diagnostics) -> bool {
        self.attempt += 1;

        if !diags.has_error() || !diags.errors().any(|d| (self.retry_if)(d)) {
            return false;
        }
        if self.attempt >= self.options.attempts {
            warn!("Giving up after {} attempts", self.attempt);
            return false;
        }

        debug!(
            "Attempt {}/{} failed with a retryable error, retrying in {:?}",
            self.attempt, self.options.attempts, self.options.delay
        );
        if !self.options.last_error_only {
            self.collected.append(diags.clone());
        }

        if let Err(err) = self.ctx.sleep(self.options.delay).await {
            self.interrupted = Some(Diagnostic::error(errmsg::SUMMARY_CONTEXT_DONE, err.to_string()));
            return false;
        }
        true
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Final diagnostics given the last attempt's result.
    pub fn finish(self, last: Diagnostics) -> Diagnostics {
        let mut out = self.collected;
        out.append(last);
        if let Some(d) = self.interrupted {
            out.push(d);
        }
        out
    }
}

/// Re-invoke `op` while it fails with an error matching `retry_if`.
pub async fn retry_diags<F, Fut, P>(
    ctx: &OperationContext,
    options: RetryOptions,
    retry_if: P,
    mut op: F,
) -> Diagnostics
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Diagnostics>,
    P: Fn(&Diagnostic) -> bool,
{
    let mut retry = Retry::new(ctx, options, retry_if);
    loop {
        let diags = op().await;
        if !retry.again(&diags).await {
            return retry.finish(diags);
        }
    }
}

/// Predicate matching error diagnostics caused by a remote error with one of
/// the given HTTP statuses.
pub fn retry_if_status(statuses: &'static [u16]) -> impl Fn(&Diagnostic) -> bool {
    move |d: &Diagnostic| d.cause.as_ref().map(|e| e.has_status(statuses)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::ApiError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn failing(status: u16) -> Diagnostics {
        let mut d = Diagnostics::new();
        d.add_api_error("Boom", &ApiError::new(status, "boom"));
        d
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let ctx = OperationContext::background();
        let calls = &AtomicU32::new(0);

        let diags = retry_diags(&ctx, RetryOptions::default(), retry_if_status(&[404]), move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                failing(404)
            } else {
                Diagnostics::new()
            }
        })
        .await;

        assert!(!diags.has_error());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_does_not_retry_unmatched_errors() {
        let ctx = OperationContext::background();
        let calls = &AtomicU32::new(0);

        let diags = retry_diags(&ctx, RetryOptions::default(), retry_if_status(&[404]), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            failing(500)
        })
        .await;

        assert!(diags.has_error());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_after_budget_with_last_error_only() {
        let ctx = OperationContext::background();
        let calls = &AtomicU32::new(0);
        let options = RetryOptions::default().attempts(3).delay(Duration::from_secs(1));

        let diags = retry_diags(&ctx, options, retry_if_status(&[403]), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            failing(403)
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(diags.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_collects_all_attempts_when_requested() {
        let ctx = OperationContext::background();
        let options = RetryOptions::default().attempts(2).last_error_only(false);

        let diags = retry_diags(&ctx, options, retry_if_status(&[404]), move || async move { failing(404) }).await;
        assert_eq!(diags.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_stops_retrying() {
        let ctx = OperationContext::background().with_timeout(Duration::from_secs(7));
        let calls = &AtomicU32::new(0);

        let diags = retry_diags(&ctx, RetryOptions::default(), retry_if_status(&[404]), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            failing(404)
        })
        .await;

        // 0s, 5s, then the second sleep hits the 7s deadline.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(diags.has_error_summary(errmsg::SUMMARY_CONTEXT_DONE));
    }
}
