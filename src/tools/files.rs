/// Simulated file tools: list_files and delete_file.
///
/// Both work against a fixed catalog injected at startup. Nothing on the real
/// filesystem is read or changed, and delete_file only acknowledges.

use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::core::dispatcher::{Arguments, DispatcherBuilder, ToolOutput};
use crate::core::registry::{RegistryError, ToolDescriptor};
use crate::core::timestamp;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DemoFile {
    pub name: String,
    pub size: String,
    pub modified: String,
}

impl DemoFile {
    fn new(name: &str, size: &str, modified: &str) -> Self {
        Self {
            name: name.to_string(),
            size: size.to_string(),
            modified: modified.to_string(),
        }
    }
}

/// The reference demo catalog.
pub fn demo_catalog() -> Arc<[DemoFile]> {
    Arc::from(vec![
        DemoFile::new("README.md", "1.2 KB", "2025-01-15"),
        DemoFile::new("config.yaml", "3.4 KB", "2025-01-14"),
        DemoFile::new("data.json", "15.7 KB", "2025-01-13"),
    ])
}

pub fn register(builder: &mut DispatcherBuilder, catalog: Arc<[DemoFile]>) -> Result<(), RegistryError> {
    let list = ToolDescriptor::new(
        "list_files",
        "List files in the system. Requires 'files:read' or 'files.read' scope.",
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list",
                    "default": "/"
                }
            }
        }),
    );
    builder.tool(list, move |args, _identity| list_files(&catalog, args))?;

    let delete = ToolDescriptor::new(
        "delete_file",
        "Delete a file from the system. Requires 'files:delete' or 'files.delete' scope AND 'admin' role.",
        json!({
            "type": "object",
            "properties": {
                "filename": {
                    "type": "string",
                    "description": "Name of the file to delete"
                }
            },
            "required": ["filename"]
        }),
    );
    builder.tool(delete, |args, _identity| delete_file(args))?;
    Ok(())
}

fn list_files(catalog: &[DemoFile], args: &Arguments) -> Result<ToolOutput, String> {
    let path = match args.get("path") {
        None | Some(serde_json::Value::Null) => "/",
        Some(value) => value
            .as_str()
            .ok_or_else(|| "Parameter 'path' must be a string".to_string())?,
    };

    Ok(ToolOutput::Json(json!({
        "path": path,
        "files": catalog,
        "total": catalog.len(),
        "timestamp": timestamp(),
    })))
}

fn delete_file(args: &Arguments) -> Result<ToolOutput, String> {
    let filename = args
        .get("filename")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "Missing required parameter: filename".to_string())?;

    Ok(ToolOutput::Json(json!({
        "status": "success",
        "message": format!("File '{filename}' would be deleted (simulated)"),
        "note": "This tool requires files:delete scope AND admin role",
        "timestamp": timestamp(),
    })))
}
