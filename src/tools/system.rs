/// system_status Tool
///
/// Returns a fixed status snapshot stamped with the call time.

use serde_json::{json, Value};

use crate::core::dispatcher::{DispatcherBuilder, ToolOutput};
use crate::core::registry::{RegistryError, ToolDescriptor};
use crate::core::timestamp;

pub fn register(builder: &mut DispatcherBuilder) -> Result<(), RegistryError> {
    let tool = ToolDescriptor::new(
        "system_status",
        "Get system status information. Requires 'admin' role.",
        json!({ "type": "object", "properties": {} }),
    );

    builder.tool(tool, |_args, _identity| Ok(ToolOutput::Json(system_status())))?;
    Ok(())
}

fn system_status() -> Value {
    json!({
        "status": "healthy",
        "uptime": "2h 34m",
        "version": "1.0.0",
        "memory_usage": "45%",
        "cpu_usage": "12%",
        "timestamp": timestamp(),
        "note": "This tool requires admin role"
    })
}
