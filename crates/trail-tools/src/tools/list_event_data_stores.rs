//! `list_event_data_stores`: enumerate CloudTrail Lake event data stores.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use trail_core::format::format_event_data_stores;
use trail_core::list_event_data_stores;

use super::object_schema;
use crate::context::{handle_failure, ToolContext};
use crate::registry::Tool;
use crate::types::{ToolError, ToolResult};

fn default_include_details() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEventDataStoresArgs {
    #[serde(default = "default_include_details")]
    pub include_details: bool,
    pub region: Option<String>,
    #[serde(default, rename = "break_token_rule")]
    pub break_token_rule: bool,
}

pub struct ListEventDataStoresTool {
    context: Arc<ToolContext>,
}

impl ListEventDataStoresTool {
    pub fn new(context: Arc<ToolContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for ListEventDataStoresTool {
    fn name(&self) -> &str {
        "list_event_data_stores"
    }

    fn description(&self) -> &str {
        "List CloudTrail Lake event data stores with their status and retention. With \
         includeDetails (default) each store also shows multi-region, organization and \
         event selector settings. The store ID at the end of the ARN is the table name \
         for lake_query."
    }

    fn parameters_schema(&self) -> Value {
        let mut properties = Map::new();
        properties.insert(
            "includeDetails".to_string(),
            json!({
                "type": "boolean",
                "default": true,
                "description": "Fetch per-store details (one extra request per store)."
            }),
        );
        object_schema(properties, &[])
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        let args: ListEventDataStoresArgs =
            serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let (client, region) = self.context.client(args.region.as_deref())?;

        let entries = match list_event_data_stores(client.as_ref(), args.include_details).await {
            Ok(entries) => entries,
            Err(e) => return handle_failure("listing event data stores", e),
        };

        let text = format_event_data_stores(&entries, args.include_details, &region);
        Ok(self.context.gate(self.name(), text, args.break_token_rule))
    }
}
