//! Session server - the single owner of the diagnostics store.
//!
//! One spawned task receives session commands (requests, channel open/close)
//! and host change notifications over channels and processes them in arrival
//! order. Because every store mutation and every query runs on this task,
//! an in-flight query always observes a fully-applied prior mutation - no
//! lock is needed.

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};

use periscope_diagnostics::{DiagnosticsChanged, DiagnosticsHost, DiagnosticsStore};

use crate::protocol::{self, InboundMessage, ToolCallParams};
use crate::tools::{self, ToolOutcome};

/// Server name reported by `initialize` and the liveness probe.
pub const SERVER_NAME: &str = "periscope";

/// Identity reported in the `initialize` response.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

enum SessionCommand {
    Request {
        message: Value,
        reply: oneshot::Sender<Option<Value>>,
    },
    ChannelOpened,
    ChannelClosed,
}

/// Cheap cloneable handle for talking to the session task.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    /// Dispatch one inbound message and wait for the reply.
    ///
    /// `None` means the message was dropped (unparseable, or no correlation
    /// id) and no response exists - per the protocol, not an error.
    pub async fn request(&self, message: Value) -> Option<Value> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let command = SessionCommand::Request {
            message,
            reply: reply_tx,
        };
        if self.commands.send(command).is_err() {
            tracing::error!("session task is gone, dropping request");
            return None;
        }
        reply_rx.await.ok().flatten()
    }

    /// Mark a channel open for the lifetime of the returned guard.
    ///
    /// Entering the connected state makes the session take a full host
    /// snapshot, so the first query on a fresh channel sees current state.
    #[must_use]
    pub fn open_channel(&self) -> ChannelGuard {
        let _ = self.commands.send(SessionCommand::ChannelOpened);
        ChannelGuard {
            commands: self.commands.clone(),
        }
    }
}

/// Notifies the session of channel close on drop, so a client that simply
/// vanishes still returns the session to idle.
pub struct ChannelGuard {
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        let _ = self.commands.send(SessionCommand::ChannelClosed);
    }
}

/// The session task state. Constructed and consumed by [`SessionServer::spawn`].
pub struct SessionServer {
    store: DiagnosticsStore,
    host: Arc<dyn DiagnosticsHost>,
    info: ServerInfo,
    open_channels: usize,
    /// Set when the latest full-snapshot fetch failed. Tool calls surface it
    /// inside the result envelope until a snapshot succeeds again.
    host_fault: Option<String>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    changes: mpsc::Receiver<DiagnosticsChanged>,
    changes_open: bool,
}

impl SessionServer {
    /// Subscribe to the host and start the session task.
    pub fn spawn(host: Arc<dyn DiagnosticsHost>, info: ServerInfo) -> SessionHandle {
        let changes = host.subscribe();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let server = Self {
            store: DiagnosticsStore::new(),
            host,
            info,
            open_channels: 0,
            host_fault: None,
            commands: command_rx,
            changes,
            changes_open: true,
        };
        tokio::spawn(server.run());
        SessionHandle {
            commands: command_tx,
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                // Drain change notifications before commands: a query issued
                // after a notification must observe that notification's effect.
                biased;
                change = self.changes.recv(), if self.changes_open => match change {
                    Some(notice) => self.apply_change_notice(&notice),
                    None => {
                        tracing::info!("host change stream ended");
                        self.changes_open = false;
                    }
                },
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
            }
        }
        // All handles dropped: session teardown, store goes with it.
        tracing::debug!("session ended");
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Request { message, reply } => {
                let response = self.handle_message(message);
                let _ = reply.send(response);
            }
            SessionCommand::ChannelOpened => {
                self.open_channels += 1;
                if self.open_channels == 1 {
                    self.refresh_from_host();
                    tracing::info!(documents = self.store.len(), "channel connected");
                }
            }
            SessionCommand::ChannelClosed => {
                self.open_channels = self.open_channels.saturating_sub(1);
                if self.open_channels == 0 {
                    tracing::info!("channel closed");
                }
            }
        }
    }

    /// Replace the store from a full host snapshot.
    ///
    /// A host failure keeps the previous content and marks the session
    /// faulted; tool calls report the failure inside their result payloads
    /// instead of trusting stale data silently.
    fn refresh_from_host(&mut self) {
        match self.host.all_diagnostics() {
            Ok(entries) => {
                let converted = entries
                    .into_iter()
                    .map(|(document, raw)| {
                        let records = raw.iter().map(|r| r.to_record(&document)).collect();
                        (document, records)
                    })
                    .collect();
                self.store.apply_snapshot(converted);
                self.host_fault = None;
            }
            Err(e) => {
                tracing::error!("host snapshot failed: {e}");
                self.host_fault = Some(e.to_string());
            }
        }
    }

    /// Re-fetch every affected document; an empty fetch removes it.
    fn apply_change_notice(&mut self, notice: &DiagnosticsChanged) {
        for document in &notice.documents {
            match self.host.diagnostics_for(document) {
                Ok(raw) => {
                    let records = raw.iter().map(|r| r.to_record(document)).collect();
                    self.store.apply_change(document.clone(), records);
                }
                Err(e) => {
                    tracing::warn!(document = %document, "re-fetching diagnostics failed: {e}");
                }
            }
        }
        tracing::debug!(documents = notice.documents.len(), "diagnostics updated");
    }

    /// Dispatch one inbound message. `None` means no response is possible.
    fn handle_message(&self, raw: Value) -> Option<Value> {
        let message: InboundMessage = match serde_json::from_value(raw) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("dropping unparseable message: {e}");
                return None;
            }
        };
        let Some(id) = message.id else {
            tracing::debug!(method = %message.method, "dropping message without correlation id");
            return None;
        };

        let response = match message.method.as_str() {
            "initialize" => protocol::success(
                id,
                json!({
                    "protocolVersion": protocol::PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": self.info.name,
                        "version": self.info.version,
                    },
                }),
            ),
            "tools/list" => protocol::success(id, json!({ "tools": tools::descriptors() })),
            "tools/call" => self.handle_tool_call(id, message.params),
            other => {
                tracing::debug!(method = other, "unknown method");
                protocol::error(id, protocol::METHOD_NOT_FOUND, "Method not found")
            }
        };
        Some(response)
    }

    fn handle_tool_call(&self, id: Value, params: Option<Value>) -> Value {
        let params: ToolCallParams = match params.map(serde_json::from_value).transpose() {
            Ok(Some(params)) => params,
            Ok(None) => {
                return protocol::error(id, protocol::INTERNAL_ERROR, "tools/call requires params");
            }
            Err(e) => {
                return protocol::error(
                    id,
                    protocol::INTERNAL_ERROR,
                    format!("invalid tools/call params: {e}"),
                );
            }
        };

        tracing::debug!(tool = %params.name, "tool call");
        if let Some(fault) = &self.host_fault {
            // Host adapter failure: InternalError-shaped, but inside the
            // normal envelope so callers keep a uniform response shape.
            let message = format!("host snapshot failed: {fault}");
            return protocol::success(id, protocol::embedded_error(&message));
        }
        let snapshot = self.store.snapshot();
        match tools::call(&snapshot, &params.name, params.arguments.as_ref()) {
            ToolOutcome::Result(result) => protocol::success(id, result),
            ToolOutcome::UnknownTool(name) => protocol::error(
                id,
                protocol::METHOD_NOT_FOUND,
                format!("Unknown tool: {name}"),
            ),
            ToolOutcome::Internal(message) => {
                protocol::error(id, protocol::INTERNAL_ERROR, message)
            }
        }
    }
}
