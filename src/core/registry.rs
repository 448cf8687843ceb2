/// Tool Registry
///
/// Holds the catalog of tool descriptors advertised by `tools/list`. The
/// registry is filled once during startup and then shared read-only behind an
/// `Arc`, so lookups never need a lock.

use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

/// MCP tool descriptor.
///
/// Each tool has a unique name, a human-readable description and a JSON
/// schema describing its input. Serialized as-is in `tools/list` responses.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    /// Unique tool identifier (e.g., "echo", "list_files")
    pub name: String,
    /// Human-readable description of what the tool does
    pub description: String,
    /// JSON Schema defining the tool's input parameters
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Errors raised while building the registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("duplicate tool registration: {0}")]
    DuplicateTool(String),
}

/// Ordered catalog of tool descriptors.
///
/// Insertion order is the listing order. The index map gives O(1) name lookups.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor to the end of the catalog.
    ///
    /// # Errors
    /// Returns [`RegistryError::DuplicateTool`] if a tool with the same name is
    /// already registered. The existing entry is left untouched.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<(), RegistryError> {
        if self.index.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateTool(descriptor.name));
        }
        self.index.insert(descriptor.name.clone(), self.tools.len());
        self.tools.push(descriptor);
        Ok(())
    }

    /// All descriptors in registration order.
    pub fn list(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn exists(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(name: &str) -> ToolDescriptor {
        ToolDescriptor::new(name, format!("{name} tool"), json!({"type": "object"}))
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(descriptor("echo")).unwrap();

        let mut second = descriptor("echo");
        second.description = "shadow".to_string();
        let err = registry.register(second).unwrap_err();

        assert_eq!(err, RegistryError::DuplicateTool("echo".to_string()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("echo").unwrap().description, "echo tool");
    }

    #[test]
    fn list_keeps_insertion_order_and_is_stable() {
        let mut registry = ToolRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(descriptor(name)).unwrap();
        }

        let first: Vec<_> = registry.list().to_vec();
        let second: Vec<_> = registry.list().to_vec();
        assert_eq!(first, second);

        let names: Vec<_> = first.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn exists_and_get() {
        let mut registry = ToolRegistry::new();
        assert_eq!(registry.len(), 0);
        registry.register(descriptor("echo")).unwrap();

        assert!(registry.exists("echo"));
        assert!(!registry.exists("Echo"));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn serializes_input_schema_in_camel_case() {
        let value = serde_json::to_value(descriptor("echo")).unwrap();
        assert!(value.get("inputSchema").is_some());
        assert!(value.get("input_schema").is_none());
    }
}
