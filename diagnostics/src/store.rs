//! Diagnostics store - the per-document cache kept current from host events.

use std::collections::BTreeMap;

use periscope_types::DiagnosticRecord;

/// In-memory mapping from document identifier to its current diagnostics.
///
/// Owned exclusively by the session server; all mutation happens on its task.
/// The map never holds a document with an empty record list - a document
/// transitioning to zero diagnostics is removed, which is what keeps
/// "files with issues" counts honest.
#[derive(Debug, Default)]
pub struct DiagnosticsStore {
    data: BTreeMap<String, Vec<DiagnosticRecord>>,
}

impl DiagnosticsStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire mapping from a full host snapshot.
    ///
    /// Entries with no records are skipped, preserving the no-empty-lists
    /// invariant. An empty input yields an empty store.
    pub fn apply_snapshot(&mut self, entries: Vec<(String, Vec<DiagnosticRecord>)>) {
        self.data.clear();
        for (document, records) in entries {
            if !records.is_empty() {
                self.data.insert(document, records);
            }
        }
    }

    /// Replace the records for one document; the sole incremental path.
    ///
    /// Last write for a document wins. Empty `records` deletes the key.
    pub fn apply_change(&mut self, document: String, records: Vec<DiagnosticRecord>) {
        if records.is_empty() {
            self.data.remove(&document);
        } else {
            self.data.insert(document, records);
        }
    }

    /// Immutable view of the current mapping, for the query engine.
    ///
    /// Documents iterate in lexicographic identifier order; per-document
    /// record order is host-supplied.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            documents: self
                .data
                .iter()
                .map(|(document, records)| (document.clone(), records.clone()))
                .collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of documents with at least one diagnostic.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }
}

/// Immutable snapshot of the store at one point in time.
///
/// Queries are pure functions of a snapshot, so a caller can never observe
/// a mapping mid-mutation.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    documents: Vec<(String, Vec<DiagnosticRecord>)>,
}

impl StoreSnapshot {
    /// Per-document diagnostics in document iteration order.
    #[must_use]
    pub fn documents(&self) -> &[(String, Vec<DiagnosticRecord>)] {
        &self.documents
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Records for one document, if it currently has any.
    #[must_use]
    pub fn records_for(&self, document: &str) -> Option<&[DiagnosticRecord]> {
        self.documents
            .binary_search_by(|(id, _)| id.as_str().cmp(document))
            .ok()
            .map(|index| self.documents[index].1.as_slice())
    }
}
