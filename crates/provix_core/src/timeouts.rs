//! Per-operation timeout resolution.
//!
//! Resources carry an optional `timeouts` block with one duration string per
//! operation plus a `default`. Resolution order is: exact operation key, then
//! `default`, then the hard fallback passed by the caller.

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::debug;

use crate::diagnostics::Diagnostics;
use crate::errmsg;

/// Hard fallback when neither the operation key nor `default` is set.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// The nested `timeouts` record of a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl Timeouts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: TimeoutKey, value: impl Into<String>) -> Self {
        *self.slot_mut(key) = Some(value.into());
        self
    }

    pub fn get(&self, key: TimeoutKey) -> Option<&str> {
        match key {
            TimeoutKey::Create => self.create.as_deref(),
            TimeoutKey::Read => self.read.as_deref(),
            TimeoutKey::Update => self.update.as_deref(),
            TimeoutKey::Delete => self.delete.as_deref(),
            TimeoutKey::Default => self.default.as_deref(),
        }
    }

    fn slot_mut(&mut self, key: TimeoutKey) -> &mut Option<String> {
        match key {
            TimeoutKey::Create => &mut self.create,
            TimeoutKey::Read => &mut self.read,
            TimeoutKey::Update => &mut self.update,
            TimeoutKey::Delete => &mut self.delete,
            TimeoutKey::Default => &mut self.default,
        }
    }
}

/// Keys of the `timeouts` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutKey {
    Create,
    Read,
    Update,
    Delete,
    Default,
}

impl TimeoutKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeoutKey::Create => "create",
            TimeoutKey::Read => "read",
            TimeoutKey::Update => "update",
            TimeoutKey::Delete => "delete",
            TimeoutKey::Default => "default",
        }
    }

    pub fn all() -> [TimeoutKey; 5] {
        [
            TimeoutKey::Create,
            TimeoutKey::Read,
            TimeoutKey::Update,
            TimeoutKey::Delete,
            TimeoutKey::Default,
        ]
    }
}

impl fmt::Display for TimeoutKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolve the deadline for `key`.
///
/// Every present value is parsed, not only the one that wins, so a typo in
/// an unrelated key still fails the operation. On any parse error the
/// returned diagnostics carry an error and the duration must not be used.
pub fn resolve(timeouts: Option<&Timeouts>, key: TimeoutKey, fallback: Duration) -> (Duration, Diagnostics) {
    let mut diags = Diagnostics::new();
    let Some(timeouts) = timeouts else {
        return (fallback, diags);
    };

    let mut parsed: [Option<Duration>; 5] = [None; 5];
    for (i, k) in TimeoutKey::all().into_iter().enumerate() {
        let Some(raw) = timeouts.get(k) else { continue };
        match parse_duration(raw) {
            Ok(d) => parsed[i] = Some(d),
            Err(e) => diags.add_error(
                errmsg::SUMMARY_INVALID_TIMEOUT,
                errmsg::detail_invalid_timeout(k.as_str(), e),
            ),
        }
    }

    if diags.has_error() {
        return (fallback, diags);
    }

    let index = |k: TimeoutKey| TimeoutKey::all().iter().position(|x| *x == k).unwrap_or(0);
    let resolved = parsed[index(key)]
        .or(parsed[index(TimeoutKey::Default)])
        .unwrap_or(fallback);

    debug!("Resolved {} timeout to {:?}", key, resolved);
    (resolved, diags)
}

/// Errors produced by [`parse_duration`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    #[error("invalid duration {0:?}")]
    Invalid(String),

    #[error("negative duration {0:?}")]
    Negative(String),

    #[error("duration {0:?} out of range")]
    OutOfRange(String),
}

fn duration_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[+-]?(?:(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:ns|us|µs|μs|ms|s|m|h))+$").ok())
        .as_ref()
}

fn component_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"([0-9]+(?:\.[0-9]*)?|\.[0-9]+)(ns|us|µs|μs|ms|s|m|h)").ok())
        .as_ref()
}

/// Parse a duration such as `"1h30m"`, `"2.5s"` or `"500ms"`.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let s = input.trim();
    if matches!(s, "0" | "+0" | "-0") {
        return Ok(Duration::ZERO);
    }
    let (Some(whole), Some(component)) = (duration_pattern(), component_pattern()) else {
        return Err(DurationError::Invalid(input.to_string()));
    };
    if !whole.is_match(s) {
        return Err(DurationError::Invalid(input.to_string()));
    }

    let mut nanos = 0f64;
    for caps in component.captures_iter(s) {
        let value: f64 = caps[1]
            .parse()
            .map_err(|_| DurationError::Invalid(input.to_string()))?;
        let unit = match &caps[2] {
            "ns" => 1.0,
            "us" | "µs" | "μs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return Err(DurationError::Invalid(input.to_string())),
        };
        nanos += value * unit;
    }

    if !nanos.is_finite() || nanos > u64::MAX as f64 {
        return Err(DurationError::OutOfRange(input.to_string()));
    }
    if s.starts_with('-') && nanos > 0.0 {
        return Err(DurationError::Negative(input.to_string()));
    }
    Ok(Duration::from_nanos(nanos.round() as u64))
}

/// Render a duration in the same grammar [`parse_duration`] accepts.
pub fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    let sub = d.subsec_nanos();
    let mut out = String::new();
    if h > 0 {
        out.push_str(&format!("{h}h"));
    }
    if m > 0 {
        out.push_str(&format!("{m}m"));
    }
    if s > 0 || (out.is_empty() && sub == 0) {
        out.push_str(&format!("{s}s"));
    }
    if sub > 0 {
        if sub % 1_000_000 == 0 {
            out.push_str(&format!("{}ms", sub / 1_000_000));
        } else {
            out.push_str(&format!("{sub}ns"));
        }
    }
    out
}

/// Serde adapter for `Duration` fields written as duration strings.
pub mod serde_duration {
    use super::*;

    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
