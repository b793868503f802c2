//! JSON-RPC envelope types for the MCP dialect.
//!
//! Inbound messages are `{ jsonrpc: "2.0", id, method, params }`; outbound
//! messages share the envelope with either a `result` or an `error` member.
//! Tool results travel inside the MCP text-content envelope.

use serde::Deserialize;
use serde_json::{Value, json};

pub(crate) const JSONRPC_VERSION: &str = "2.0";

/// Protocol revision reported by `initialize`.
pub(crate) const PROTOCOL_VERSION: &str = "2024-11-05";

/// Unknown RPC method or unknown tool name.
pub(crate) const METHOD_NOT_FOUND: i64 = -32601;

/// Unexpected failure while computing or serializing a result.
pub(crate) const INTERNAL_ERROR: i64 = -32603;

/// An inbound request. Deserialization failure is the ParseError case:
/// logged and dropped, since no reply can be correlated.
#[derive(Debug, Deserialize)]
pub(crate) struct InboundMessage {
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// Parameters of a `tools/call` request.
#[derive(Debug, Deserialize)]
pub(crate) struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

pub(crate) fn success(id: Value, result: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "result": result,
    })
}

pub(crate) fn error(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": {
            "code": code,
            "message": message.into(),
        },
    })
}

/// Wrap an operation result in the MCP text-content envelope.
pub(crate) fn text_content(payload: &impl serde::Serialize) -> Result<Value, serde_json::Error> {
    let text = serde_json::to_string_pretty(payload)?;
    Ok(json!({
        "content": [{ "type": "text", "text": text }],
    }))
}

/// Envelope-shaped failure: the normal result shape carrying an `error`
/// payload, so callers never have to distinguish outcomes by channel state.
pub(crate) fn embedded_error(message: &str) -> Value {
    let body = json!({ "error": message });
    let text = serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string());
    json!({
        "content": [{ "type": "text", "text": text }],
    })
}
