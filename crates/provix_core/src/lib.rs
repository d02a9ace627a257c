//! # provix_core
//!
//! Shared building blocks of the provix resource-lifecycle engine.
//!
//! # Architecture
//!
//! - **Diagnostics**: ordered, severity-tagged outcome of every operation
//! - **Identifiers**: composite `a/b/c` external ids
//! - **Timeouts**: per-operation deadline resolution
//! - **Context**: deadline and cancellation handed to hooks and waiters
//! - **Retry**: opt-in bounded retry of diagnostic-returning calls
//! - **Config**: provider-wide feature gates
//!
//! # Example
//!
//! ```rust,ignore
//! use provix_core::{resolve_timeout, OperationContext, TimeoutKey, Timeouts};
//!
//! let timeouts = Timeouts::new().with(TimeoutKey::Default, "30m");
//! let (timeout, diags) = resolve_timeout(Some(&timeouts), TimeoutKey::Create, config.default_timeout);
//! if diags.has_error() {
//!     return diags;
//! }
//! let ctx = OperationContext::background().with_timeout(timeout);
//! ```

pub mod config;
pub mod context;
pub mod diagnostics;
pub mod errmsg;
pub mod error;
pub mod identifier;
pub mod logging;
pub mod remote;
pub mod retry;
pub mod timeouts;

// Re-export main types for convenience
pub use config::ProviderConfig;
pub use context::{CancelHandle, ContextError, OperationContext};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, try_init_logging};
pub use remote::{is_critical, ApiError, ApiErrorKind};
pub use retry::{retry_diags, retry_if_status, Retry, RetryOptions};
pub use timeouts::{
    format_duration, parse_duration, resolve as resolve_timeout, DurationError, TimeoutKey, Timeouts,
    DEFAULT_TIMEOUT,
};
