//! `get_query_status`: status and statistics of a Lake query.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use trail_core::format::format_query_status;
use trail_core::TrailError;

use super::object_schema;
use crate::context::{handle_failure, ToolContext};
use crate::registry::Tool;
use crate::types::{ToolError, ToolResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetQueryStatusArgs {
    pub query_id: String,
    pub region: Option<String>,
    #[serde(default, rename = "break_token_rule")]
    pub break_token_rule: bool,
}

pub struct GetQueryStatusTool {
    context: Arc<ToolContext>,
}

impl GetQueryStatusTool {
    pub fn new(context: Arc<ToolContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for GetQueryStatusTool {
    fn name(&self) -> &str {
        "get_query_status"
    }

    fn description(&self) -> &str {
        "Get the status of a CloudTrail Lake query: QUEUED, RUNNING, FINISHED, FAILED, \
         CANCELLED or TIMED_OUT, with any error message and execution statistics."
    }

    fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        properties.insert(
            "queryId".to_string(),
            json!({
                "type": "string",
                "minLength": 1,
                "description": "Query ID returned by lake_query."
            }),
        );
        object_schema(properties, &["queryId"])
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        let args: GetQueryStatusArgs =
            serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let query_id = args.query_id.trim();
        if query_id.is_empty() {
            return handle_failure(
                "getting query status",
                TrailError::Validation("queryId must not be empty".to_string()),
            );
        }
        let (client, _region) = self.context.client(args.region.as_deref())?;

        let description = match client.describe_query(query_id).await {
            Ok(description) => description,
            Err(e) => return handle_failure("getting query status", e),
        };

        let text = format_query_status(&description);
        Ok(self.context.gate(self.name(), text, args.break_token_rule))
    }
}
