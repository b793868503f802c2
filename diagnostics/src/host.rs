//! Host adapter boundary.
//!
//! The editor host is an external collaborator. This module defines the two
//! contracted operations (full snapshot, per-document pull) plus the change
//! subscription, the raw diagnostic shape the host delivers, and the single
//! conversion step into the normalized [`DiagnosticRecord`]. Everything
//! host-specific (0-based positions, numeric severity codes, number-or-string
//! codes) stays on this side of the boundary.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use periscope_types::{DiagnosticRecord, Severity, Span};

/// Capacity of a change-notification channel handed to a subscriber.
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// A diagnostic exactly as the host delivers it: 0-based positions and an
/// integer severity code (0=error, 1=warning, 2=information, 3=hint).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDiagnostic {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
    pub severity: u64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<RawCode>,
}

/// A diagnostic code as supplied by the host - a number or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawCode {
    Number(i64),
    Text(String),
}

impl RawCode {
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

impl RawDiagnostic {
    /// Normalize into the external record shape.
    ///
    /// Positions shift to 1-based, the severity code maps into the taxonomy
    /// (codes outside 0-3 normalize to `information`), and the record
    /// constructor fills message/source placeholders.
    #[must_use]
    pub fn to_record(&self, document: &str) -> DiagnosticRecord {
        DiagnosticRecord::new(
            document.to_string(),
            Severity::from_raw(self.severity).unwrap_or(Severity::Information),
            self.message.clone(),
            Span::new(
                self.start_line + 1,
                self.start_column + 1,
                self.end_line + 1,
                self.end_column + 1,
            ),
            self.source.clone(),
            self.code.as_ref().map(RawCode::as_text),
        )
    }
}

/// Push notification: the diagnostics for these documents changed.
///
/// Receivers re-fetch [`DiagnosticsHost::diagnostics_for`] per document to
/// obtain the new sets; an empty result signals removal.
#[derive(Debug, Clone)]
pub struct DiagnosticsChanged {
    pub documents: Vec<String>,
}

/// Failure raised by a host adapter.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("reading diagnostics snapshot {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing diagnostics snapshot {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("host unavailable: {0}")]
    Unavailable(String),
}

/// The editor-host contract.
///
/// Exactly the operations the core consumes: a full snapshot, a per-document
/// pull, and a change subscription. Implementations must be cheap to call -
/// queries run synchronously on the session task.
pub trait DiagnosticsHost: Send + Sync + 'static {
    /// Full snapshot of every document's current raw diagnostics.
    fn all_diagnostics(&self) -> Result<Vec<(String, Vec<RawDiagnostic>)>, HostError>;

    /// Current raw diagnostics for one document. Empty means "no longer has
    /// diagnostics".
    fn diagnostics_for(&self, document: &str) -> Result<Vec<RawDiagnostic>, HostError>;

    /// Register a change-notification subscriber.
    fn subscribe(&self) -> mpsc::Receiver<DiagnosticsChanged>;
}

/// Programmable in-process host.
///
/// Used by tests and by embedders that push diagnostics from their own
/// integration; also what the binary serves when no snapshot file is given.
#[derive(Default)]
pub struct InMemoryHost {
    state: Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    documents: BTreeMap<String, Vec<RawDiagnostic>>,
    subscribers: Vec<mpsc::Sender<DiagnosticsChanged>>,
}

impl InMemoryHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the diagnostics for one document and notify subscribers.
    ///
    /// An empty `items` removes the document, mirroring how editor hosts
    /// signal "this file is clean now".
    pub fn publish(&self, document: &str, items: Vec<RawDiagnostic>) {
        let mut state = self.lock_state();
        if items.is_empty() {
            state.documents.remove(document);
        } else {
            state.documents.insert(document.to_string(), items);
        }
        notify(&mut state.subscribers, &[document.to_string()]);
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DiagnosticsHost for InMemoryHost {
    fn all_diagnostics(&self) -> Result<Vec<(String, Vec<RawDiagnostic>)>, HostError> {
        let state = self.lock_state();
        Ok(state
            .documents
            .iter()
            .map(|(document, items)| (document.clone(), items.clone()))
            .collect())
    }

    fn diagnostics_for(&self, document: &str) -> Result<Vec<RawDiagnostic>, HostError> {
        let state = self.lock_state();
        Ok(state.documents.get(document).cloned().unwrap_or_default())
    }

    fn subscribe(&self) -> mpsc::Receiver<DiagnosticsChanged> {
        let (tx, rx) = mpsc::channel(CHANGE_CHANNEL_CAPACITY);
        self.lock_state().subscribers.push(tx);
        rx
    }
}

/// Fan a change notice out to every live subscriber.
///
/// Closed subscribers are dropped; a full queue keeps the subscriber but
/// loses the notice (the next full snapshot resynchronizes it).
pub(crate) fn notify(subscribers: &mut Vec<mpsc::Sender<DiagnosticsChanged>>, documents: &[String]) {
    subscribers.retain(|tx| {
        match tx.try_send(DiagnosticsChanged {
            documents: documents.to_vec(),
        }) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("subscriber queue full, dropping change notice");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    });
}
