//! Query engine - pure, side-effect-free reads over a store snapshot.
//!
//! Every function takes a [`StoreSnapshot`] and returns a serializable
//! result, so each query is a pure function of store content at call time.

use std::path::Path;

use serde::Serialize;
use url::Url;

use periscope_types::{DiagnosticRecord, HealthReport, Severity, SeverityCounts, Summary};

use crate::store::StoreSnapshot;

/// Every diagnostic in the workspace.
#[derive(Debug, Serialize)]
pub struct AllDiagnostics {
    pub total: usize,
    pub diagnostics: Vec<DiagnosticRecord>,
}

/// Diagnostics for a single document.
///
/// `total: 0` covers both "clean document" and "never seen" - the store only
/// tracks documents with diagnostics, so the two are indistinguishable by
/// design and neither is an error.
#[derive(Debug, Serialize)]
pub struct FileDiagnostics {
    pub file: String,
    pub total: usize,
    pub diagnostics: Vec<DiagnosticRecord>,
}

/// Diagnostics matching one severity level across all documents.
#[derive(Debug, Serialize)]
pub struct SeverityDiagnostics {
    pub severity: Severity,
    pub total: usize,
    pub diagnostics: Vec<DiagnosticRecord>,
}

/// Flatten every document's records, preserving document iteration order and
/// per-document record order.
#[must_use]
pub fn list_all(snapshot: &StoreSnapshot) -> AllDiagnostics {
    let diagnostics: Vec<DiagnosticRecord> = snapshot
        .documents()
        .iter()
        .flat_map(|(_, records)| records.iter().cloned())
        .collect();
    AllDiagnostics {
        total: diagnostics.len(),
        diagnostics,
    }
}

/// Diagnostics for one document identifier.
///
/// The identifier is tried verbatim and, when it is a plain path or a
/// `file://` URI, in its alternate spelling - hosts key by URI while callers
/// usually pass filesystem paths.
#[must_use]
pub fn list_for_document(snapshot: &StoreSnapshot, document: &str) -> FileDiagnostics {
    let records = snapshot
        .records_for(document)
        .or_else(|| {
            alternate_identifier(document)
                .and_then(|alternate| snapshot.records_for(&alternate))
        })
        .map(<[DiagnosticRecord]>::to_vec)
        .unwrap_or_default();
    FileDiagnostics {
        file: document.to_string(),
        total: records.len(),
        diagnostics: records,
    }
}

/// All diagnostics at exactly the given severity.
///
/// Severity validation happens where the label arrives as text (the dispatch
/// boundary); this function already holds a taxonomy value.
#[must_use]
pub fn filter_by_severity(snapshot: &StoreSnapshot, severity: Severity) -> SeverityDiagnostics {
    let diagnostics: Vec<DiagnosticRecord> = snapshot
        .documents()
        .iter()
        .flat_map(|(_, records)| records.iter())
        .filter(|record| record.severity() == severity)
        .cloned()
        .collect();
    SeverityDiagnostics {
        severity,
        total: diagnostics.len(),
        diagnostics,
    }
}

/// Per-severity counts, total, and the number of documents with issues, in a
/// single pass.
#[must_use]
pub fn summarize(snapshot: &StoreSnapshot) -> Summary {
    let mut counts = SeverityCounts::new();
    for (_, records) in snapshot.documents() {
        for record in records {
            counts.record(record.severity());
        }
    }
    Summary::new(counts, snapshot.documents().len() as u64)
}

/// Workspace health score from the current counts.
#[must_use]
pub fn health_score(snapshot: &StoreSnapshot) -> HealthReport {
    HealthReport::from_counts(summarize(snapshot).counts())
}

/// The other spelling of a document identifier: path for a `file://` URI,
/// URI for an absolute path. `None` when there is no alternate.
fn alternate_identifier(document: &str) -> Option<String> {
    if let Ok(uri) = Url::parse(document) {
        if uri.scheme() == "file" {
            return uri.to_file_path().ok().map(|p| p.display().to_string());
        }
        return None;
    }
    Url::from_file_path(Path::new(document))
        .ok()
        .map(|uri| uri.to_string())
}
