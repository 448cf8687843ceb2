/// Tool Dispatcher
///
/// Routes a `tools/call` to the handler bound to the tool name and turns every
/// outcome into a [`ToolResult`]. This is the fault-isolation boundary of the
/// server: handler errors, panics and timeouts all come back as structured
/// failures and never reach the transport as a crash.

use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::core::identity::IdentityContext;
use crate::core::registry::{RegistryError, ToolDescriptor, ToolRegistry};

/// Tool arguments as received in `tools/call` params.
pub type Arguments = serde_json::Map<String, serde_json::Value>;

/// Value produced by a successful handler.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Returned to the caller verbatim.
    Text(String),
    /// Rendered as pretty-printed JSON text.
    Json(serde_json::Value),
}

/// Tool handler function type definition.
///
/// Handlers receive the call arguments and the caller identity (if the gateway
/// asserted one) by shared reference. They run on the blocking pool, so they
/// must be `Send + Sync + 'static`.
pub type ToolHandler =
    Arc<dyn Fn(&Arguments, Option<&IdentityContext>) -> Result<ToolOutput, String> + Send + Sync>;

/// A typed unit of a tool's result payload.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnknownTool,
    HandlerError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolResult {
    Success { content: Vec<ContentBlock> },
    Failure { kind: ErrorKind, message: String },
}

impl ToolResult {
    fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Concatenated text of all content blocks, or the failure message.
    #[cfg(test)]
    pub fn text(&self) -> String {
        match self {
            Self::Success { content } => content
                .iter()
                .map(|ContentBlock::Text { text }| text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Failure { message, .. } => message.clone(),
        }
    }
}

impl ToolOutput {
    fn into_content(self) -> Result<Vec<ContentBlock>, serde_json::Error> {
        let text = match self {
            Self::Text(text) => text,
            Self::Json(value) => serde_json::to_string_pretty(&value)?,
        };
        Ok(vec![ContentBlock::Text { text }])
    }
}

/// Collects tool descriptors and their handlers during startup.
#[derive(Default)]
pub struct DispatcherBuilder {
    registry: ToolRegistry,
    handlers: HashMap<String, ToolHandler>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool descriptor together with its handler.
    ///
    /// # Errors
    /// Fails with [`RegistryError::DuplicateTool`] if the name is taken.
    pub fn tool<F>(&mut self, descriptor: ToolDescriptor, handler: F) -> Result<&mut Self, RegistryError>
    where
        F: Fn(&Arguments, Option<&IdentityContext>) -> Result<ToolOutput, String> + Send + Sync + 'static,
    {
        let name = descriptor.name.clone();
        self.registry.register(descriptor)?;
        self.handlers.insert(name, Arc::new(handler));
        Ok(self)
    }

    pub fn build(self, handler_timeout: Duration) -> Dispatcher {
        Dispatcher {
            registry: Arc::new(self.registry),
            handlers: self.handlers,
            handler_timeout,
        }
    }
}

/// Immutable name-to-handler table plus the registry it was built from.
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    handlers: HashMap<String, ToolHandler>,
    handler_timeout: Duration,
}

impl Dispatcher {
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn list_tools(&self) -> &[ToolDescriptor] {
        self.registry.list()
    }

    /// Invoke the tool named `name`.
    ///
    /// The handler runs on the blocking pool and is bounded by the configured
    /// timeout. A timed-out handler keeps its thread until it returns; its
    /// result is discarded.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Arguments,
        identity: Option<IdentityContext>,
    ) -> ToolResult {
        let handler = match self.handlers.get(name) {
            Some(handler) if self.registry.exists(name) => Arc::clone(handler),
            _ => {
                warn!(tool = name, "unknown tool requested");
                return ToolResult::failure(ErrorKind::UnknownTool, format!("Unknown tool: {name}"));
            }
        };

        debug!(tool = name, identity = identity.is_some(), "dispatching tool call");
        let task = tokio::task::spawn_blocking(move || handler(&arguments, identity.as_ref()));

        match tokio::time::timeout(self.handler_timeout, task).await {
            Ok(Ok(Ok(output))) => match output.into_content() {
                Ok(content) => ToolResult::Success { content },
                Err(e) => {
                    error!(tool = name, error = %e, "failed to render tool output");
                    ToolResult::failure(ErrorKind::HandlerError, format!("failed to render output: {e}"))
                }
            },
            Ok(Ok(Err(message))) => {
                warn!(tool = name, error = %message, "tool handler failed");
                ToolResult::failure(ErrorKind::HandlerError, message)
            }
            Ok(Err(join_error)) => {
                let message = if join_error.is_panic() {
                    format!("tool handler panicked: {}", panic_message(join_error.into_panic()))
                } else {
                    "tool handler was cancelled".to_string()
                };
                error!(tool = name, error = %message, "tool handler aborted");
                ToolResult::failure(ErrorKind::HandlerError, message)
            }
            Err(_) => {
                let message = format!(
                    "tool '{name}' timed out after {} ms",
                    self.handler_timeout.as_millis()
                );
                warn!(tool = name, "{message}");
                ToolResult::failure(ErrorKind::HandlerError, message)
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
