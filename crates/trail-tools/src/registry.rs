use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use jsonschema::JSONSchema;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{ToolError, ToolResult, ToolSchema};

/// A callable tool. Arguments reaching `execute` have already passed the
/// tool's declared schema.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError>;

    fn to_schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters_schema(),
        }
    }
}

pub type SharedTool = Arc<dyn Tool>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool with name '{0}' already registered")]
    DuplicateTool(String),

    #[error("invalid tool: {0}")]
    InvalidTool(String),

    #[error("invalid schema for tool '{0}': {1}")]
    InvalidSchema(String, String),
}

struct RegisteredTool {
    tool: SharedTool,
    validator: Arc<JSONSchema>,
}

pub struct ToolRegistry {
    tools: DashMap<String, RegisteredTool>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: DashMap::new(),
        }
    }

    pub fn register<T>(&self, tool: T) -> Result<(), RegistryError>
    where
        T: Tool + 'static,
    {
        self.register_shared(Arc::new(tool))
    }

    pub fn register_shared(&self, tool: SharedTool) -> Result<(), RegistryError> {
        let name = tool.name().trim().to_string();

        if name.is_empty() {
            return Err(RegistryError::InvalidTool(
                "tool name cannot be empty".to_string(),
            ));
        }

        let schema = tool.parameters_schema();
        let validator = JSONSchema::options()
            .compile(&schema)
            .map_err(|e| RegistryError::InvalidSchema(name.clone(), e.to_string()))?;

        match self.tools.entry(name.clone()) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateTool(name)),
            Entry::Vacant(entry) => {
                entry.insert(RegisteredTool {
                    tool,
                    validator: Arc::new(validator),
                });
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<SharedTool> {
        self.tools.get(name).map(|entry| Arc::clone(&entry.tool))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn list_tools(&self) -> Vec<ToolSchema> {
        let mut tools: Vec<ToolSchema> = self
            .tools
            .iter()
            .map(|entry| entry.tool.to_schema())
            .collect();
        tools.sort_by(|left, right| left.name.cmp(&right.name));
        tools
    }

    pub fn list_tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Check `args` against the tool's schema, then run it.
    pub async fn execute(&self, name: &str, args: Value) -> Result<ToolResult, ToolError> {
        let (tool, validator) = {
            let entry = self
                .tools
                .get(name)
                .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
            (Arc::clone(&entry.tool), Arc::clone(&entry.validator))
        };

        // Clients may omit the arguments object entirely.
        let args = if args.is_null() {
            Value::Object(Default::default())
        } else {
            args
        };

        if let Err(errors) = validator.validate(&args) {
            let message = errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{}: {}", path, e)
                    }
                })
                .collect::<Vec<_>>()
                .join("; ");
            warn!("Rejected arguments for tool {}: {}", name, message);
            return Err(ToolError::InvalidArguments(message));
        }

        debug!("Executing tool {}", name);
        tool.execute(args).await
    }
}
