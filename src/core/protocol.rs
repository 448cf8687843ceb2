/// MCP wire types
///
/// JSON-RPC 2.0 envelopes plus the MCP result shapes this server produces.
/// Envelope parsing is done here so both transports reject malformed input the
/// same way, before anything reaches the dispatcher.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::dispatcher::{Arguments, ContentBlock, ErrorKind, ToolResult};

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: &str = "2025-06-18";
const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = [PROTOCOL_VERSION, "2025-03-26", "2024-11-05"];

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// JSON-RPC 2.0 request structure for MCP protocol.
///
/// `id` is `None` only when the member is absent (a notification, which never
/// gets a response). An explicit `"id": null` is `Some(Value::Null)`.
#[derive(Deserialize, Debug, Clone)]
pub struct McpRequest {
    pub jsonrpc: String,
    #[serde(default, deserialize_with = "present")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// Deserialize a field that is known to be present, keeping `null` as a value.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl McpRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 response structure.
///
/// Exactly one of `result` and `error` is present.
#[derive(Serialize, Debug, Clone)]
pub struct McpResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<McpError>,
}

impl McpResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, error: McpError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct McpError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl McpError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }
}

/// Malformed request envelopes, rejected before dispatch.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid Request: {0}")]
    InvalidRequest(String),
    #[error("Invalid params: {0}")]
    InvalidParams(String),
}

impl TransportError {
    pub fn code(&self) -> i32 {
        match self {
            Self::Parse(_) => PARSE_ERROR,
            Self::InvalidRequest(_) => INVALID_REQUEST,
            Self::InvalidParams(_) => INVALID_PARAMS,
        }
    }
}

impl From<&TransportError> for McpError {
    fn from(err: &TransportError) -> Self {
        McpError::new(err.code(), err.to_string())
    }
}

/// A request that failed to parse, with whatever id could be salvaged so the
/// error response can still be correlated.
#[derive(Debug, Clone)]
pub struct RejectedRequest {
    pub id: Option<Value>,
    pub error: TransportError,
}

/// Parse a JSON-RPC message body.
pub fn parse_request(body: &[u8]) -> Result<McpRequest, RejectedRequest> {
    let value: Value = serde_json::from_slice(body).map_err(|e| RejectedRequest {
        id: None,
        error: TransportError::Parse(e.to_string()),
    })?;

    let id = value.get("id").cloned();
    if !value.is_object() {
        return Err(RejectedRequest {
            id: None,
            error: TransportError::InvalidRequest("expected a JSON-RPC request object".to_string()),
        });
    }

    let request: McpRequest = serde_json::from_value(value).map_err(|e| RejectedRequest {
        id: id.clone(),
        error: TransportError::InvalidRequest(e.to_string()),
    })?;

    if request.jsonrpc != JSONRPC_VERSION {
        return Err(RejectedRequest {
            id,
            error: TransportError::InvalidRequest(format!(
                "unsupported jsonrpc version '{}'",
                request.jsonrpc
            )),
        });
    }
    Ok(request)
}

/// Pick the protocol version for `initialize`: the client's if we speak it,
/// otherwise our latest.
pub fn negotiate_protocol_version(params: Option<&Value>) -> &'static str {
    params
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str)
        .and_then(|requested| {
            SUPPORTED_PROTOCOL_VERSIONS
                .iter()
                .find(|v| **v == requested)
                .copied()
        })
        .unwrap_or(PROTOCOL_VERSION)
}

/// `tools/call` parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CallToolParams {
    pub name: String,
    pub arguments: Arguments,
}

impl CallToolParams {
    /// Validate `tools/call` params. Missing `arguments` means no arguments.
    pub fn from_params(params: Option<&Value>) -> Result<Self, TransportError> {
        let params = params
            .and_then(Value::as_object)
            .ok_or_else(|| TransportError::InvalidParams("params must be an object".to_string()))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| TransportError::InvalidParams("missing tool name".to_string()))?
            .to_string();

        let arguments = match params.get("arguments") {
            None | Some(Value::Null) => Arguments::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(TransportError::InvalidParams(
                    "arguments must be an object".to_string(),
                ))
            }
        };

        Ok(Self { name, arguments })
    }
}

/// MCP `tools/call` result body.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CallToolResult {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

/// Map a dispatcher outcome onto the wire.
///
/// Unknown tools become a JSON-RPC error; handler failures stay inside a
/// result with `isError: true` so the calling model can see the message.
pub fn tool_result_response(id: Option<Value>, result: ToolResult) -> McpResponse {
    let body = match result {
        ToolResult::Success { content } => CallToolResult {
            content,
            is_error: false,
        },
        ToolResult::Failure {
            kind: ErrorKind::UnknownTool,
            message,
        } => return McpResponse::error(id, McpError::new(INVALID_PARAMS, message)),
        ToolResult::Failure {
            kind: ErrorKind::HandlerError,
            message,
        } => CallToolResult {
            content: vec![ContentBlock::Text {
                text: format!("Error: {message}"),
            }],
            is_error: true,
        },
    };

    match serde_json::to_value(&body) {
        Ok(value) => McpResponse::success(id, value),
        Err(e) => McpResponse::error(id, McpError::new(INTERNAL_ERROR, e.to_string())),
    }
}
