//! Core domain types for Periscope.
//!
//! This crate contains pure domain types with no IO and no async. The
//! severity taxonomy, the normalized diagnostic record, and the workspace
//! health policy all live here so every layer above can share them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder for diagnostics the host delivered without a message.
const NO_MESSAGE: &str = "No message";

/// Placeholder for diagnostics the host delivered without a source tool.
const UNKNOWN_SOURCE: &str = "unknown";

// ============================================================================
// Severity
// ============================================================================

/// Severity of a diagnostic.
///
/// A closed, totally ordered taxonomy: `Error > Warning > Information > Hint`.
/// Used both for filtering and for health-score weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Hint,
    Information,
    Warning,
    Error,
}

/// Error returned when a severity label is not one of the four taxonomy values.
#[derive(Debug, Error)]
#[error("invalid severity '{value}': must be one of error, warning, information, hint")]
pub struct InvalidSeverityError {
    value: String,
}

impl Severity {
    /// All severities, highest first. Iteration order matches the external
    /// reporting order (summaries list errors before hints).
    pub const ALL: [Severity; 4] = [
        Severity::Error,
        Severity::Warning,
        Severity::Information,
        Severity::Hint,
    ];

    /// Convert from the host's numeric code (0=error, 1=warning,
    /// 2=information, 3=hint).
    ///
    /// Returns `None` for values outside the host-defined range.
    /// Callers (boundary code) decide the fallback policy.
    #[must_use]
    pub fn from_raw(value: u64) -> Option<Self> {
        match value {
            0 => Some(Self::Error),
            1 => Some(Self::Warning),
            2 => Some(Self::Information),
            3 => Some(Self::Hint),
            _ => None,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Information => "information",
            Self::Hint => "hint",
        }
    }

    /// Penalty weight applied per diagnostic when scoring workspace health.
    #[must_use]
    pub fn weight(self) -> f64 {
        match self {
            Self::Error => 10.0,
            Self::Warning => 3.0,
            Self::Information => 1.0,
            Self::Hint => 0.5,
        }
    }
}

impl FromStr for Severity {
    type Err = InvalidSeverityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "error" => Ok(Self::Error),
            "warning" => Ok(Self::Warning),
            "information" => Ok(Self::Information),
            "hint" => Ok(Self::Hint),
            other => Err(InvalidSeverityError {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Diagnostic record
// ============================================================================

/// Source location of a diagnostic, 1-based for external reporting.
///
/// The host delivers 0-based positions; conversion happens at the boundary,
/// so a `Span` inside a [`DiagnosticRecord`] is always 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub line: u32,
    pub column: u32,
    #[serde(rename = "endLine")]
    pub end_line: u32,
    #[serde(rename = "endColumn")]
    pub end_column: u32,
}

impl Span {
    #[must_use]
    pub fn new(line: u32, column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            line,
            column,
            end_line,
            end_column,
        }
    }
}

/// One normalized diagnostic: location, severity, message, and provenance.
///
/// Fields are private; construction is the single normalization path, so a
/// record can never carry an empty message or an absent source. Records are
/// immutable once constructed - updates replace the whole per-document set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticRecord {
    #[serde(rename = "file")]
    document: String,
    #[serde(flatten)]
    span: Span,
    severity: Severity,
    message: String,
    source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl DiagnosticRecord {
    /// Construct a record, normalizing missing fields.
    ///
    /// An empty or whitespace-only message becomes a fixed placeholder, an
    /// absent source becomes `"unknown"`.
    #[must_use]
    pub fn new(
        document: String,
        severity: Severity,
        message: String,
        span: Span,
        source: Option<String>,
        code: Option<String>,
    ) -> Self {
        let message = if message.trim().is_empty() {
            NO_MESSAGE.to_string()
        } else {
            message
        };
        let source = source
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());
        Self {
            document,
            span,
            severity,
            message,
            source,
            code,
        }
    }

    #[must_use]
    pub fn document(&self) -> &str {
        &self.document
    }

    /// 1-based source location.
    #[must_use]
    pub fn span(&self) -> Span {
        self.span
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Originating tool (e.g. "rustc", "eslint"), or `"unknown"`.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Diagnostic code as text, regardless of whether the host supplied a
    /// number or a string.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

// ============================================================================
// Counts, summary, and health policy
// ============================================================================

/// Per-severity diagnostic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    error: u64,
    warning: u64,
    information: u64,
    hint: u64,
}

impl SeverityCounts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Error => self.error += 1,
            Severity::Warning => self.warning += 1,
            Severity::Information => self.information += 1,
            Severity::Hint => self.hint += 1,
        }
    }

    #[must_use]
    pub fn get(&self, severity: Severity) -> u64 {
        match severity {
            Severity::Error => self.error,
            Severity::Warning => self.warning,
            Severity::Information => self.information,
            Severity::Hint => self.hint,
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.error + self.warning + self.information + self.hint
    }

    /// Weighted penalty used by the health score.
    #[must_use]
    pub fn penalty(&self) -> f64 {
        Severity::ALL
            .iter()
            .map(|s| self.get(*s) as f64 * s.weight())
            .sum()
    }
}

/// Workspace-wide diagnostic counts plus the number of affected documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    #[serde(flatten)]
    counts: SeverityCounts,
    total: u64,
    #[serde(rename = "filesWithIssues")]
    files_with_issues: u64,
}

impl Summary {
    #[must_use]
    pub fn new(counts: SeverityCounts, files_with_issues: u64) -> Self {
        Self {
            counts,
            total: counts.total(),
            files_with_issues,
        }
    }

    #[must_use]
    pub fn counts(&self) -> SeverityCounts {
        self.counts
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    #[must_use]
    pub fn files_with_issues(&self) -> u64 {
        self.files_with_issues
    }
}

/// Status band for a health score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl HealthStatus {
    /// Band mapping over the rounded score. Boundaries are inclusive:
    /// a score of exactly 90 is still "excellent".
    #[must_use]
    pub fn from_score(score: u32) -> Self {
        match score {
            90..=100 => Self::Excellent,
            70..=89 => Self::Good,
            50..=69 => Self::Fair,
            30..=49 => Self::Poor,
            _ => Self::Critical,
        }
    }
}

/// Workspace health: a 0-100 score with its status band and breakdown.
///
/// The weighting and banding are a fixed policy constant, reproduced exactly
/// for compatibility with existing callers. Not configurable.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct HealthReport {
    #[serde(rename = "healthScore")]
    health_score: u32,
    status: HealthStatus,
    breakdown: SeverityCounts,
    recommendation: &'static str,
}

impl HealthReport {
    /// Score the given counts: `clamp(100 - penalty, 0, 100)` rounded to the
    /// nearest integer, where penalty is 10 per error, 3 per warning, 1 per
    /// information, and 0.5 per hint.
    #[must_use]
    pub fn from_counts(counts: SeverityCounts) -> Self {
        let score = (100.0 - counts.penalty()).clamp(0.0, 100.0).round() as u32;
        Self {
            health_score: score,
            status: HealthStatus::from_score(score),
            breakdown: counts,
            recommendation: recommendation_for(score),
        }
    }

    #[must_use]
    pub fn health_score(&self) -> u32 {
        self.health_score
    }

    #[must_use]
    pub fn status(&self) -> HealthStatus {
        self.status
    }

    #[must_use]
    pub fn breakdown(&self) -> SeverityCounts {
        self.breakdown
    }
}

fn recommendation_for(score: u32) -> &'static str {
    if score < 50 {
        "Address errors and warnings to improve code quality"
    } else if score < 90 {
        "Good progress! Consider addressing remaining warnings"
    } else {
        "Excellent! Workspace is in great shape"
    }
}
