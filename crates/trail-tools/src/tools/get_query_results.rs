//! `get_query_results`: one page of a Lake query's rows.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use trail_core::fetch_result_page;
use trail_core::format::format_query_results;

use super::{next_token_schema, object_schema, page_size_schema};
use crate::context::{handle_failure, ToolContext};
use crate::registry::Tool;
use crate::types::{ToolError, ToolResult};

const DEFAULT_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetQueryResultsArgs {
    pub query_id: String,
    #[serde(default, deserialize_with = "super::lenient_page_size")]
    pub max_results: Option<i64>,
    pub next_token: Option<String>,
    pub region: Option<String>,
    #[serde(default, rename = "break_token_rule")]
    pub break_token_rule: bool,
}

pub struct GetQueryResultsTool {
    context: Arc<ToolContext>,
}

impl GetQueryResultsTool {
    pub fn new(context: Arc<ToolContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for GetQueryResultsTool {
    fn name(&self) -> &str {
        "get_query_results"
    }

    fn description(&self) -> &str {
        "Fetch a page of results from a CloudTrail Lake query. Use nextToken from the previous \
         page together with the same queryId to continue."
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
        properties.insert("maxResults".to_string(), page_size_schema(DEFAULT_PAGE_SIZE));
        properties.insert("nextToken".to_string(), next_token_schema("queryId"));
        object_schema(properties, &["queryId"])
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        let args: GetQueryResultsArgs =
            serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let (client, _region) = self.context.client(args.region.as_deref())?;

        let page = match fetch_result_page(
            client.as_ref(),
            &args.query_id,
            args.max_results.unwrap_or(DEFAULT_PAGE_SIZE as i64),
            args.next_token.as_deref(),
        )
        .await
        {
            Ok(page) => page,
            Err(e) => return handle_failure("getting query results", e),
        };

        let text = format_query_results(&page);
        Ok(self.context.gate(self.name(), text, args.break_token_rule))
    }
}
