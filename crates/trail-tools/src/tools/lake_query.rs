//! `lake_query`: run CloudTrail Lake SQL.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use trail_core::format::format_query_outcome;
use trail_core::QueryLifecycle;

use super::object_schema;
use crate::context::{handle_failure, ToolContext};
use crate::registry::Tool;
use crate::types::{ToolError, ToolResult};

fn default_wait() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LakeQueryArgs {
    pub sql: String,
    #[serde(default = "default_wait")]
    pub wait_for_completion: bool,
    pub region: Option<String>,
    #[serde(default, rename = "break_token_rule")]
    pub break_token_rule: bool,
}

pub struct LakeQueryTool {
    context: Arc<ToolContext>,
}

impl LakeQueryTool {
    pub fn new(context: Arc<ToolContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for LakeQueryTool {
    fn name(&self) -> &str {
        "lake_query"
    }

    fn description(&self) -> &str {
        "Run a SQL query against a CloudTrail Lake event data store. Use the event data store \
         ID from list_event_data_stores as the table name. By default the call waits for the \
         query to finish and returns the first page of results; with waitForCompletion=false \
         it returns the query ID immediately for use with get_query_status and get_query_results."
    }

    fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        properties.insert(
            "sql".to_string(),
            json!({
                "type": "string",
                "minLength": 1,
                "description": "SQL statement, e.g. SELECT eventName, COUNT(*) FROM <event-data-store-id> GROUP BY eventName"
            }),
        );
        properties.insert(
            "waitForCompletion".to_string(),
            json!({
                "type": "boolean",
                "default": true,
                "description": "Wait for the query to finish before returning."
            }),
        );
        object_schema(properties, &["sql"])
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        let args: LakeQueryArgs =
            serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let (client, _region) = self.context.client(args.region.as_deref())?;

        let lifecycle = QueryLifecycle::new(client.as_ref(), self.context.poll_settings());
        let outcome = match lifecycle.execute(&args.sql, args.wait_for_completion).await {
            Ok(outcome) => outcome,
            Err(e) => return handle_failure("running CloudTrail Lake query", e),
        };

        let text = format_query_outcome(&outcome);
        Ok(self.context.gate(self.name(), text, args.break_token_rule))
    }
}
