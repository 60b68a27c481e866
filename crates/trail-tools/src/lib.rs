//! CloudTrail tools exposed to agents.
//!
//! Every tool declares a JSON schema; the [`ToolRegistry`] validates
//! arguments against it before the tool runs, and every rendered response
//! passes through the token budget in [`ToolContext::gate`].

pub mod context;
pub mod registry;
pub mod tools;
pub mod types;

pub use context::{handle_failure, Clock, ToolContext};
pub use registry::{RegistryError, SharedTool, Tool, ToolRegistry};
pub use tools::{
    register_cloudtrail_tools, GetQueryResultsTool, GetQueryStatusTool, LakeQueryTool,
    ListEventDataStoresTool, LookupEventsTool, CLOUDTRAIL_TOOL_NAMES,
};
pub use types::{Result, ToolError, ToolResult, ToolSchema};
