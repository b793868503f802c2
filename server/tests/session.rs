//! End-to-end dispatch tests: a live session task backed by a programmable
//! host, exercised through the same handle the HTTP layer uses.

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::mpsc;

use periscope_diagnostics::{
    DiagnosticsChanged, DiagnosticsHost, HostError, InMemoryHost, RawDiagnostic,
};
use periscope_server::{ServerInfo, SessionHandle, SessionServer};

fn raw(severity: u64, message: &str) -> RawDiagnostic {
    RawDiagnostic {
        start_line: 0,
        start_column: 0,
        end_line: 0,
        end_column: 1,
        severity,
        message: message.to_string(),
        source: Some("test".to_string()),
        code: None,
    }
}

fn request(id: u64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

/// Call a tool and parse the JSON payload out of the text-content envelope.
async fn call_tool(handle: &SessionHandle, name: &str, arguments: Value) -> Value {
    let response = handle
        .request(request(
            1,
            "tools/call",
            json!({"name": name, "arguments": arguments}),
        ))
        .await
        .expect("tool call must produce a response");
    let text = response["result"]["content"][0]["text"]
        .as_str()
        .unwrap_or_else(|| panic!("expected text content, got: {response}"));
    serde_json::from_str(text).expect("payload is JSON")
}

#[tokio::test]
async fn test_initialize_reports_protocol_and_server_info() {
    let handle = SessionServer::spawn(Arc::new(InMemoryHost::new()), ServerInfo::default());
    let response = handle
        .request(json!({"jsonrpc": "2.0", "id": 42, "method": "initialize"}))
        .await
        .unwrap();

    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["id"], 42);
    assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(response["result"]["serverInfo"]["name"], "periscope");
    assert!(response["result"]["capabilities"]["tools"].is_object());
}

#[tokio::test]
async fn test_tools_list_returns_five_descriptors() {
    let handle = SessionServer::spawn(Arc::new(InMemoryHost::new()), ServerInfo::default());
    let response = handle
        .request(request(2, "tools/list", json!({})))
        .await
        .unwrap();

    let tools = response["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 5);
    assert!(tools.iter().all(|tool| tool["inputSchema"].is_object()));
}

#[tokio::test]
async fn test_channel_open_snapshots_host_diagnostics() {
    let host = Arc::new(InMemoryHost::new());
    host.publish("/a.rs", vec![raw(0, "boom"), raw(1, "meh")]);
    host.publish("/b.rs", vec![raw(1, "warn")]);

    let handle = SessionServer::spawn(Arc::clone(&host) as Arc<dyn DiagnosticsHost>, ServerInfo::default());
    let _channel = handle.open_channel();

    let result = call_tool(&handle, "get_all_diagnostics", json!({})).await;
    assert_eq!(result["total"], 3);
}

#[tokio::test]
async fn test_change_notification_is_visible_to_next_query() {
    let host = Arc::new(InMemoryHost::new());
    let handle = SessionServer::spawn(Arc::clone(&host) as Arc<dyn DiagnosticsHost>, ServerInfo::default());
    let _channel = handle.open_channel();

    let result = call_tool(&handle, "get_all_diagnostics", json!({})).await;
    assert_eq!(result["total"], 0);

    host.publish("/new.rs", vec![raw(0, "fresh error")]);
    let result = call_tool(&handle, "get_all_diagnostics", json!({})).await;
    assert_eq!(result["total"], 1);
    assert_eq!(result["diagnostics"][0]["message"], "fresh error");
    // Boundary conversion: host positions are 0-based, reported 1-based.
    assert_eq!(result["diagnostics"][0]["line"], 1);
}

#[tokio::test]
async fn test_clearing_a_document_removes_it_from_counts() {
    let host = Arc::new(InMemoryHost::new());
    host.publish("/a.rs", vec![raw(0, "e")]);
    host.publish("/b.rs", vec![raw(1, "w")]);

    let handle = SessionServer::spawn(Arc::clone(&host) as Arc<dyn DiagnosticsHost>, ServerInfo::default());
    let _channel = handle.open_channel();

    let summary = call_tool(&handle, "get_diagnostics_summary", json!({})).await;
    assert_eq!(summary["filesWithIssues"], 2);

    host.publish("/a.rs", vec![]);
    let summary = call_tool(&handle, "get_diagnostics_summary", json!({})).await;
    assert_eq!(summary["filesWithIssues"], 1);
    assert_eq!(summary["total"], 1);
}

#[tokio::test]
async fn test_file_diagnostics_for_unknown_file_is_empty() {
    let handle = SessionServer::spawn(Arc::new(InMemoryHost::new()), ServerInfo::default());
    let _channel = handle.open_channel();

    let result = call_tool(
        &handle,
        "get_file_diagnostics",
        json!({"filePath": "/never/seen.rs"}),
    )
    .await;
    assert_eq!(result["total"], 0);
    assert_eq!(result["file"], "/never/seen.rs");
}

#[tokio::test]
async fn test_severity_filter_and_invalid_severity() {
    let host = Arc::new(InMemoryHost::new());
    host.publish("/a.rs", vec![raw(0, "e"), raw(1, "w"), raw(1, "w2")]);

    let handle = SessionServer::spawn(Arc::clone(&host) as Arc<dyn DiagnosticsHost>, ServerInfo::default());
    let _channel = handle.open_channel();

    let result = call_tool(
        &handle,
        "get_diagnostics_by_severity",
        json!({"severity": "warning"}),
    )
    .await;
    assert_eq!(result["total"], 2);

    let result = call_tool(
        &handle,
        "get_diagnostics_by_severity",
        json!({"severity": "bogus"}),
    )
    .await;
    assert!(result["error"].as_str().unwrap().contains("bogus"));
}

#[tokio::test]
async fn test_workspace_health_bands() {
    let host = Arc::new(InMemoryHost::new());
    host.publish(
        "/a.rs",
        vec![raw(0, "1"), raw(0, "2"), raw(0, "3"), raw(0, "4"), raw(0, "5")],
    );

    let handle = SessionServer::spawn(Arc::clone(&host) as Arc<dyn DiagnosticsHost>, ServerInfo::default());
    let _channel = handle.open_channel();

    let result = call_tool(&handle, "get_workspace_health", json!({})).await;
    assert_eq!(result["healthScore"], 50);
    assert_eq!(result["status"], "fair");
    assert_eq!(result["breakdown"]["error"], 5);
}

#[tokio::test]
async fn test_unknown_tool_embeds_requested_name() {
    let handle = SessionServer::spawn(Arc::new(InMemoryHost::new()), ServerInfo::default());
    let response = handle
        .request(request(9, "tools/call", json!({"name": "get_coffee"})))
        .await
        .unwrap();

    assert_eq!(response["error"]["code"], -32601);
    assert!(
        response["error"]["message"]
            .as_str()
            .unwrap()
            .contains("get_coffee")
    );
}

#[tokio::test]
async fn test_unknown_method_is_rejected() {
    let handle = SessionServer::spawn(Arc::new(InMemoryHost::new()), ServerInfo::default());
    let response = handle
        .request(request(3, "resources/list", json!({})))
        .await
        .unwrap();
    assert_eq!(response["error"]["code"], -32601);
}

#[tokio::test]
async fn test_message_without_id_gets_no_response() {
    let handle = SessionServer::spawn(Arc::new(InMemoryHost::new()), ServerInfo::default());
    let response = handle
        .request(json!({"jsonrpc": "2.0", "method": "tools/list"}))
        .await;
    assert!(response.is_none());
}

#[tokio::test]
async fn test_server_keeps_serving_after_failed_requests() {
    let handle = SessionServer::spawn(Arc::new(InMemoryHost::new()), ServerInfo::default());
    let _channel = handle.open_channel();

    // A burst of failures of every kind...
    handle.request(json!({"bad": "message"})).await;
    handle.request(request(1, "nope", json!({}))).await;
    handle
        .request(request(2, "tools/call", json!({"name": "nope"})))
        .await;

    // ...and the channel still answers.
    let result = call_tool(&handle, "get_diagnostics_summary", json!({})).await;
    assert_eq!(result["total"], 0);
}

/// Host whose snapshot fetch always fails.
struct BrokenHost;

impl DiagnosticsHost for BrokenHost {
    fn all_diagnostics(&self) -> Result<Vec<(String, Vec<RawDiagnostic>)>, HostError> {
        Err(HostError::Unavailable("editor went away".to_string()))
    }

    fn diagnostics_for(&self, _document: &str) -> Result<Vec<RawDiagnostic>, HostError> {
        Err(HostError::Unavailable("editor went away".to_string()))
    }

    fn subscribe(&self) -> mpsc::Receiver<DiagnosticsChanged> {
        mpsc::channel(1).1
    }
}

#[tokio::test]
async fn test_host_failure_surfaces_inside_the_envelope() {
    let handle = SessionServer::spawn(Arc::new(BrokenHost), ServerInfo::default());
    let _channel = handle.open_channel();

    // The snapshot fetch failed: tool calls still answer, carrying the
    // failure inside the normal result envelope rather than a channel error.
    let result = call_tool(&handle, "get_all_diagnostics", json!({})).await;
    let message = result["error"].as_str().unwrap();
    assert!(message.contains("editor went away"));

    // Non-tool methods are unaffected, and the session keeps serving.
    let response = handle
        .request(request(5, "tools/list", json!({})))
        .await
        .unwrap();
    assert_eq!(response["result"]["tools"].as_array().unwrap().len(), 5);
}
