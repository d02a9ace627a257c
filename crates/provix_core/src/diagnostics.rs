//! Severity-tagged diagnostics accumulated across the phases of an operation.
//!
//! A [`Diagnostics`] list is the only channel through which hooks, the
//! timeout resolver and the lifecycle adapter report outcomes to the host
//! runtime. Entries are appended in order and never discarded while an
//! operation is running; [`Diagnostics::has_error`] is the success/failure
//! verdict.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::remote::ApiError;

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single diagnostic message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    /// Attribute the diagnostic refers to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    /// Remote error that caused the diagnostic. Kept for classification only.
    #[serde(skip)]
    pub cause: Option<ApiError>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
            cause: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
            cause: None,
        }
    }

    /// Error diagnostic whose detail is the remote error text, verbatim.
    pub fn from_api_error(summary: impl Into<String>, err: &ApiError) -> Self {
        Self {
            cause: Some(err.clone()),
            ..Self::error(summary, err.to_string())
        }
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn with_cause(mut self, cause: ApiError) -> Self {
        self.cause = Some(cause);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.attribute {
            Some(attr) => write!(f, "{} ({}): {}: {}", self.severity, attr, self.summary, self.detail),
            None => write!(f, "{}: {}: {}", self.severity, self.summary, self.detail),
        }
    }
}

/// Ordered collection of diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn add_error(&mut self, summary: impl Into<String>, detail: impl Into<String>) {
        self.push(Diagnostic::error(summary, detail));
    }

    pub fn add_warning(&mut self, summary: impl Into<String>, detail: impl Into<String>) {
        self.push(Diagnostic::warning(summary, detail));
    }

    pub fn add_api_error(&mut self, summary: impl Into<String>, err: &ApiError) {
        self.push(Diagnostic::from_api_error(summary, err));
    }

    /// Append every entry of `other`, preserving order.
    pub fn append(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    /// True iff any entry has error severity.
    pub fn has_error(&self) -> bool {
        self.0.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter().filter(|d| d.is_warning())
    }

    pub fn first_error(&self) -> Option<&Diagnostic> {
        self.errors().next()
    }

    /// True when an error entry was caused by a remote error matching `pred`.
    pub fn has_api_error(&self, pred: impl Fn(&ApiError) -> bool) -> bool {
        self.errors()
            .any(|d| d.cause.as_ref().map(&pred).unwrap_or(false))
    }

    /// True when an error entry carries the given summary.
    pub fn has_error_summary(&self, summary: &str) -> bool {
        self.errors().any(|d| d.summary == summary)
    }

    /// Remove error entries caused by a remote error matching `pred`.
    pub fn drop_api_error(self, pred: impl Fn(&ApiError) -> bool) -> Self {
        self.0
            .into_iter()
            .filter(|d| !(d.is_error() && d.cause.as_ref().map(&pred).unwrap_or(false)))
            .collect()
    }

    /// Rewrite the detail of every error entry. Summary, severity and cause
    /// are kept.
    pub fn map_error_details(self, f: impl Fn(&Diagnostic) -> String) -> Self {
        self.0
            .into_iter()
            .map(|mut d| {
                if d.is_error() {
                    d.detail = f(&d);
                }
                d
            })
            .collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diagnostic: Diagnostic) -> Self {
        Self(vec![diagnostic])
    }
}

impl From<Vec<Diagnostic>> for Diagnostics {
    fn from(diagnostics: Vec<Diagnostic>) -> Self {
        Self(diagnostics)
    }
}

impl FromIterator<Diagnostic> for Diagnostics {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Diagnostic> for Diagnostics {
    fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{d}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_error_only_for_error_severity() {
        let mut diags = Diagnostics::new();
        assert!(!diags.has_error());

        diags.add_warning("Heads Up", "peer action required");
        assert!(!diags.has_error());

        diags.add_error("Boom", "something failed");
        assert!(diags.has_error());
        assert_eq!(diags.len(), 2);
        assert_eq!(diags.warnings().count(), 1);
    }

    #[test]
    fn test_append_preserves_order() {
        let mut first = Diagnostics::new();
        first.add_error("A", "first");
        let mut second = Diagnostics::new();
        second.add_warning("B", "second");
        second.add_error("C", "third");

        first.append(second);
        let summaries: Vec<_> = first.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(summaries, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_drop_api_error_keeps_other_entries() {
        let mut diags = Diagnostics::new();
        diags.add_api_error("Gone", &ApiError::not_found("missing"));
        diags.add_api_error("Broken", &ApiError::new(500, "boom"));
        diags.add_warning("Note", "kept");

        assert!(diags.has_api_error(ApiError::is_not_found));

        let rest = diags.drop_api_error(ApiError::is_not_found);
        assert_eq!(rest.len(), 2);
        assert!(!rest.has_api_error(ApiError::is_not_found));
        assert!(rest.has_error_summary("Broken"));
    }

    #[test]
    fn test_map_error_details_keeps_cause_and_warnings() {
        let mut diags = Diagnostics::new();
        diags.add_api_error("Gone", &ApiError::not_found("missing"));
        diags.add_warning("Note", "untouched");

        let diags = diags.map_error_details(|d| format!("while reading: {}", d.detail));

        let err = diags.first_error().unwrap();
        assert_eq!(err.detail, "while reading: [404]: missing");
        assert!(diags.has_api_error(ApiError::is_not_found));
        assert_eq!(diags.warnings().next().unwrap().detail, "untouched");
    }

    #[test]
    fn test_from_api_error_keeps_remote_detail_verbatim() {
        let err = ApiError::new(409, "already exists");
        let d = Diagnostic::from_api_error("Conflict", &err);
        assert_eq!(d.detail, "[409]: already exists");
        assert_eq!(d.cause, Some(err));
    }
}
