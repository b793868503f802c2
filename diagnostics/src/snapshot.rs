//! File-backed diagnostics host.
//!
//! Serves a JSON diagnostics export (`{"documents": {id: [raw...]}}`) and
//! polls the file for changes, so anything that can dump its Problems panel
//! to disk becomes a live diagnostics source for the server. The editor-side
//! exporter stays external.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::host::{self, DiagnosticsChanged, DiagnosticsHost, HostError, RawDiagnostic};

/// On-disk export shape.
#[derive(Debug, Default, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    documents: BTreeMap<String, Vec<RawDiagnostic>>,
}

struct SharedState {
    documents: BTreeMap<String, Vec<RawDiagnostic>>,
    subscribers: Vec<mpsc::Sender<DiagnosticsChanged>>,
}

/// Host adapter that serves diagnostics from a snapshot file, re-reading it
/// on a fixed interval and notifying subscribers about changed documents.
pub struct SnapshotFileHost {
    state: Arc<Mutex<SharedState>>,
    poll_task: tokio::task::JoinHandle<()>,
}

impl SnapshotFileHost {
    /// Load the export and start polling it.
    ///
    /// Fails if the initial load fails; later read or parse failures are
    /// logged and the previously loaded content keeps being served.
    pub async fn open(path: PathBuf, poll_interval: Duration) -> Result<Self, HostError> {
        let documents = load_snapshot(&path).await?;
        tracing::info!(
            path = %path.display(),
            documents = documents.len(),
            "loaded diagnostics snapshot"
        );

        let state = Arc::new(Mutex::new(SharedState {
            documents,
            subscribers: Vec::new(),
        }));

        // tokio::time::interval panics on a zero period.
        let poll_interval = if poll_interval.is_zero() {
            Duration::from_secs(1)
        } else {
            poll_interval
        };

        let poll_state = Arc::clone(&state);
        let poll_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it, the initial
            // load already happened.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match load_snapshot(&path).await {
                    Ok(latest) => {
                        let mut state = lock_state(&poll_state);
                        let changed = changed_documents(&state.documents, &latest);
                        if changed.is_empty() {
                            continue;
                        }
                        tracing::debug!(documents = changed.len(), "snapshot file changed");
                        state.documents = latest;
                        host::notify(&mut state.subscribers, &changed);
                    }
                    Err(e) => {
                        tracing::warn!("re-reading diagnostics snapshot failed: {e}");
                    }
                }
            }
        });

        Ok(Self { state, poll_task })
    }
}

impl Drop for SnapshotFileHost {
    fn drop(&mut self) {
        self.poll_task.abort();
    }
}

impl DiagnosticsHost for SnapshotFileHost {
    fn all_diagnostics(&self) -> Result<Vec<(String, Vec<RawDiagnostic>)>, HostError> {
        let state = lock_state(&self.state);
        Ok(state
            .documents
            .iter()
            .map(|(document, items)| (document.clone(), items.clone()))
            .collect())
    }

    fn diagnostics_for(&self, document: &str) -> Result<Vec<RawDiagnostic>, HostError> {
        let state = lock_state(&self.state);
        Ok(state.documents.get(document).cloned().unwrap_or_default())
    }

    fn subscribe(&self) -> mpsc::Receiver<DiagnosticsChanged> {
        let (tx, rx) = mpsc::channel(host::CHANGE_CHANNEL_CAPACITY);
        lock_state(&self.state).subscribers.push(tx);
        rx
    }
}

fn lock_state(state: &Arc<Mutex<SharedState>>) -> std::sync::MutexGuard<'_, SharedState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn load_snapshot(path: &Path) -> Result<BTreeMap<String, Vec<RawDiagnostic>>, HostError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| HostError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let file: SnapshotFile = serde_json::from_str(&content).map_err(|source| HostError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(file.documents)
}

/// Documents whose entries differ between two snapshots, removals included.
fn changed_documents(
    old: &BTreeMap<String, Vec<RawDiagnostic>>,
    new: &BTreeMap<String, Vec<RawDiagnostic>>,
) -> Vec<String> {
    let mut changed = Vec::new();
    for (document, records) in new {
        if old.get(document) != Some(records) {
            changed.push(document.clone());
        }
    }
    for document in old.keys() {
        if !new.contains_key(document) {
            changed.push(document.clone());
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(severity: u64, message: &str) -> RawDiagnostic {
        RawDiagnostic {
            start_line: 0,
            start_column: 0,
            end_line: 0,
            end_column: 1,
            severity,
            message: message.to_string(),
            source: None,
            code: None,
        }
    }

    fn export(documents: &[(&str, Vec<RawDiagnostic>)]) -> String {
        let map: BTreeMap<String, Vec<RawDiagnostic>> = documents
            .iter()
            .map(|(id, items)| ((*id).to_string(), items.clone()))
            .collect();
        serde_json::to_string(&serde_json::json!({ "documents": map })).unwrap()
    }

    #[test]
    fn test_snapshot_file_missing_documents_key_is_empty() {
        let file: SnapshotFile = serde_json::from_str("{}").unwrap();
        assert!(file.documents.is_empty());
    }

    #[test]
    fn test_changed_documents_detects_all_transitions() {
        let mut old = BTreeMap::new();
        old.insert("/same.rs".to_string(), vec![raw(0, "e")]);
        old.insert("/modified.rs".to_string(), vec![raw(1, "w")]);
        old.insert("/removed.rs".to_string(), vec![raw(2, "i")]);

        let mut new = BTreeMap::new();
        new.insert("/same.rs".to_string(), vec![raw(0, "e")]);
        new.insert("/modified.rs".to_string(), vec![raw(1, "w"), raw(1, "w2")]);
        new.insert("/added.rs".to_string(), vec![raw(3, "h")]);

        let mut changed = changed_documents(&old, &new);
        changed.sort();
        assert_eq!(
            changed,
            vec![
                "/added.rs".to_string(),
                "/modified.rs".to_string(),
                "/removed.rs".to_string()
            ]
        );
    }

    #[test]
    fn test_changed_documents_identical_snapshots() {
        let mut map = BTreeMap::new();
        map.insert("/a.rs".to_string(), vec![raw(0, "e")]);
        assert!(changed_documents(&map, &map.clone()).is_empty());
    }

    #[tokio::test]
    async fn test_open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = SnapshotFileHost::open(
            dir.path().join("missing.json"),
            Duration::from_millis(50),
        )
        .await;
        assert!(matches!(result, Err(HostError::Io { .. })));
    }

    #[tokio::test]
    async fn test_initial_load_serves_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diagnostics.json");
        std::fs::write(&path, export(&[("/a.rs", vec![raw(0, "boom")])])).unwrap();

        let host = SnapshotFileHost::open(path, Duration::from_secs(60))
            .await
            .unwrap();
        let all = host.all_diagnostics().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(host.diagnostics_for("/a.rs").unwrap().len(), 1);
        assert!(host.diagnostics_for("/b.rs").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rewrite_notifies_changed_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diagnostics.json");
        std::fs::write(
            &path,
            export(&[
                ("/keep.rs", vec![raw(0, "e")]),
                ("/gone.rs", vec![raw(1, "w")]),
            ]),
        )
        .unwrap();

        let host = SnapshotFileHost::open(path.clone(), Duration::from_millis(25))
            .await
            .unwrap();
        let mut rx = host.subscribe();

        // Same content for /keep.rs, /gone.rs dropped, /new.rs added.
        std::fs::write(
            &path,
            export(&[
                ("/keep.rs", vec![raw(0, "e")]),
                ("/new.rs", vec![raw(2, "i")]),
            ]),
        )
        .unwrap();

        let notice = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("change notice within timeout")
            .expect("channel open");
        let mut documents = notice.documents;
        documents.sort();
        assert_eq!(documents, vec!["/gone.rs".to_string(), "/new.rs".to_string()]);

        assert!(host.diagnostics_for("/gone.rs").unwrap().is_empty());
        assert_eq!(host.diagnostics_for("/new.rs").unwrap().len(), 1);
    }
}
