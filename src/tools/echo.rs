/// Echo Tool
///
/// Public tool: any caller the gateway lets through may use it.

use serde_json::json;

use crate::core::dispatcher::{Arguments, DispatcherBuilder, ToolOutput};
use crate::core::registry::{RegistryError, ToolDescriptor};

/// Register the echo tool.
pub fn register(builder: &mut DispatcherBuilder) -> Result<(), RegistryError> {
    let tool = ToolDescriptor::new(
        "echo",
        "Echo back a message. This is a public tool that any authenticated user can call.",
        json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The message to echo"
                }
            },
            "required": ["message"]
        }),
    );

    builder.tool(tool, |args, _identity| echo(args))?;
    Ok(())
}

fn echo(args: &Arguments) -> Result<ToolOutput, String> {
    let message = args
        .get("message")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "Missing required parameter: message".to_string())?;

    Ok(ToolOutput::Text(format!("Echo: {message}")))
}
