//! Tool registry - the five diagnostics operations exposed over `tools/call`.

use serde_json::{Value, json};

use periscope_diagnostics::StoreSnapshot;
use periscope_diagnostics::query;
use periscope_types::Severity;

use crate::protocol;

pub(crate) const GET_ALL_DIAGNOSTICS: &str = "get_all_diagnostics";
pub(crate) const GET_FILE_DIAGNOSTICS: &str = "get_file_diagnostics";
pub(crate) const GET_DIAGNOSTICS_BY_SEVERITY: &str = "get_diagnostics_by_severity";
pub(crate) const GET_DIAGNOSTICS_SUMMARY: &str = "get_diagnostics_summary";
pub(crate) const GET_WORKSPACE_HEALTH: &str = "get_workspace_health";

/// Descriptors returned by `tools/list`: names, descriptions, and input
/// schemas for all five operations.
pub(crate) fn descriptors() -> Value {
    json!([
        {
            "name": GET_ALL_DIAGNOSTICS,
            "description": "Get all diagnostics (errors, warnings, info) from all files in the workspace",
            "inputSchema": {
                "type": "object",
                "properties": {},
            },
        },
        {
            "name": GET_FILE_DIAGNOSTICS,
            "description": "Get diagnostics for a specific file path",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "filePath": {
                        "type": "string",
                        "description": "Absolute path to the file",
                    },
                },
                "required": ["filePath"],
            },
        },
        {
            "name": GET_DIAGNOSTICS_BY_SEVERITY,
            "description": "Get diagnostics filtered by severity level",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "severity": {
                        "type": "string",
                        "enum": ["error", "warning", "information", "hint"],
                        "description": "Severity level to filter by",
                    },
                },
                "required": ["severity"],
            },
        },
        {
            "name": GET_DIAGNOSTICS_SUMMARY,
            "description": "Get a summary of diagnostics counts by severity",
            "inputSchema": {
                "type": "object",
                "properties": {},
            },
        },
        {
            "name": GET_WORKSPACE_HEALTH,
            "description": "Get overall workspace health score based on diagnostics",
            "inputSchema": {
                "type": "object",
                "properties": {},
            },
        },
    ])
}

/// Outcome of a tool invocation.
///
/// `Result` covers both successful payloads and argument/host failures
/// reported inside the envelope; only dispatch-layer failures escalate to a
/// JSON-RPC error.
pub(crate) enum ToolOutcome {
    Result(Value),
    UnknownTool(String),
    Internal(String),
}

/// Dispatch one tool call against a store snapshot.
pub(crate) fn call(snapshot: &StoreSnapshot, name: &str, arguments: Option<&Value>) -> ToolOutcome {
    let result = match name {
        GET_ALL_DIAGNOSTICS => protocol::text_content(&query::list_all(snapshot)),
        GET_FILE_DIAGNOSTICS => {
            let file_path = arguments
                .and_then(|args| args.get("filePath"))
                .and_then(Value::as_str);
            let Some(file_path) = file_path else {
                return ToolOutcome::Result(protocol::embedded_error("filePath is required"));
            };
            protocol::text_content(&query::list_for_document(snapshot, file_path))
        }
        GET_DIAGNOSTICS_BY_SEVERITY => {
            let label = arguments
                .and_then(|args| args.get("severity"))
                .and_then(Value::as_str);
            let Some(label) = label else {
                return ToolOutcome::Result(protocol::embedded_error("severity is required"));
            };
            match label.parse::<Severity>() {
                Ok(severity) => {
                    protocol::text_content(&query::filter_by_severity(snapshot, severity))
                }
                Err(e) => return ToolOutcome::Result(protocol::embedded_error(&e.to_string())),
            }
        }
        GET_DIAGNOSTICS_SUMMARY => protocol::text_content(&query::summarize(snapshot)),
        GET_WORKSPACE_HEALTH => protocol::text_content(&query::health_score(snapshot)),
        other => return ToolOutcome::UnknownTool(other.to_string()),
    };

    match result {
        Ok(envelope) => ToolOutcome::Result(envelope),
        Err(e) => ToolOutcome::Internal(format!("serializing tool result: {e}")),
    }
}
