/// Core Server Framework Module
///
/// - registry.rs: catalog of tool descriptors
/// - identity.rs: caller identity from gateway headers
/// - dispatcher.rs: tool invocation and fault isolation
/// - protocol.rs: JSON-RPC / MCP wire types
/// - session.rs: Streamable HTTP session lifecycle
/// - server.rs: HTTP and STDIO transports
/// - config.rs: environment configuration

pub mod config;
pub mod dispatcher;
pub mod identity;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;

use chrono::{SecondsFormat, Utc};

/// Current time as an ISO-8601 UTC timestamp with microsecond precision.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
