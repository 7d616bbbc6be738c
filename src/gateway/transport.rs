//! Line-delimited JSON-RPC 2.0 tool transport
//!
//! One request per line in, one response per line out. Requests are handled
//! concurrently, so responses may be written out of order; callers match
//! them by `id`.

use crate::gateway::{GatewayCore, ToolIo, list_tools};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    /// Absent for notifications
    #[serde(default)]
    pub id: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: Value,
}

impl RpcResponse {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
            id,
        }
    }
}

/// Serve requests from `io` until the reader reaches EOF
pub(crate) async fn serve(core: Arc<GatewayCore>, io: ToolIo) {
    let ToolIo { mut reader, mut writer } = io;
    let (tx, mut rx) = mpsc::channel::<String>(64);

    let read_loop = async move {
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Failed to read from tool transport");
                    break;
                }
            }

            let request: RpcRequest = match serde_json::from_str(line.trim()) {
                Ok(request) => request,
                Err(e) => {
                    debug!(error = %e, "Skipping malformed request line");
                    continue;
                }
            };

            let core = core.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let Some(response) = core.handle_request(request).await else {
                    return;
                };
                match serde_json::to_string(&response) {
                    Ok(encoded) => {
                        let _ = tx.send(encoded).await;
                    }
                    Err(e) => error!(error = %e, "Failed to encode response"),
                }
            });
        }
        debug!("Tool transport reader closed");
    };

    let write_loop = async move {
        while let Some(encoded) = rx.recv().await {
            let written = async {
                writer.write_all(encoded.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await
            };
            if let Err(e) = written.await {
                error!(error = %e, "Failed to write to tool transport");
                break;
            }
        }
    };

    tokio::join!(read_loop, write_loop);
}

impl GatewayCore {
    /// Answer one request; notifications yield `None`
    pub(crate) async fn handle_request(&self, request: RpcRequest) -> Option<RpcResponse> {
        let Some(id) = request.id else {
            debug!(method = %request.method, "Notification received");
            return None;
        };

        let response = match request.method.as_str() {
            "initialize" => RpcResponse::result(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }),
            ),
            "ping" => RpcResponse::result(id, json!({})),
            "tools/list" => RpcResponse::result(id, json!({ "tools": list_tools() })),
            "tools/call" => self.handle_tool_call(id, &request.params).await,
            method => {
                warn!(method, "Unknown method");
                RpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", method))
            }
        };

        Some(response)
    }

    async fn handle_tool_call(&self, id: Value, params: &Value) -> RpcResponse {
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return RpcResponse::error(id, INVALID_PARAMS, "Missing tool name");
        };
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

        match self.call_tool(name, &arguments).await {
            Ok(response) => match serde_json::to_value(response) {
                Ok(value) => RpcResponse::result(id, value),
                Err(e) => RpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
            },
            Err(e) => RpcResponse::error(id, INTERNAL_ERROR, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_without_id_is_notification() {
        let request: RpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
                .unwrap();
        assert!(request.id.is_none());
        assert_eq!(request.params, Value::Null);
    }

    #[test]
    fn test_error_response_omits_result() {
        let response = RpcResponse::error(json!(7), METHOD_NOT_FOUND, "Method not found: nope");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["error"]["code"], -32601);
        assert_eq!(value["id"], 7);
        assert!(value.get("result").is_none());
    }

    #[test]
    fn test_result_response_omits_error() {
        let response = RpcResponse::result(json!("a"), json!({ "ok": true }));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["result"]["ok"], true);
        assert!(value.get("error").is_none());
    }
}
