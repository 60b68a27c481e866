//! `lookup_events`: management event history for the last 90 days.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use trail_core::format::format_events;
use trail_core::{
    fetch_event_page, parse_time, LookupAttribute, LookupAttributeKey, LookupParams, TrailError,
};

use super::{next_token_schema, object_schema, page_size_schema};
use crate::context::{handle_failure, ToolContext};
use crate::registry::Tool;
use crate::types::{ToolError, ToolResult};

const DEFAULT_START: &str = "1 day ago";
const DEFAULT_END: &str = "now";
const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupEventsArgs {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub attribute_key: Option<LookupAttributeKey>,
    pub attribute_value: Option<String>,
    #[serde(default, deserialize_with = "super::lenient_page_size")]
    pub max_results: Option<i64>,
    pub next_token: Option<String>,
    pub region: Option<String>,
    #[serde(default, rename = "break_token_rule")]
    pub break_token_rule: bool,
}

impl LookupEventsArgs {
    /// Resolve times and the optional filter into the query-defining parameters.
    pub fn to_params(&self, now: chrono::DateTime<chrono::Utc>) -> trail_core::Result<LookupParams> {
        let start_time = parse_time(self.start_time.as_deref().unwrap_or(DEFAULT_START), now)?;
        let end_time = parse_time(self.end_time.as_deref().unwrap_or(DEFAULT_END), now)?;

        let attribute = match (self.attribute_key, self.attribute_value.as_deref()) {
            (None, None) => None,
            (Some(key), Some(value)) if !value.trim().is_empty() => Some(LookupAttribute {
                key,
                value: value.to_string(),
            }),
            _ => {
                return Err(TrailError::Validation(
                    "attributeKey and attributeValue must be provided together".to_string(),
                ))
            }
        };

        Ok(LookupParams {
            start_time,
            end_time,
            attribute,
        })
    }
}

pub struct LookupEventsTool {
    context: Arc<ToolContext>,
}

impl LookupEventsTool {
    pub fn new(context: Arc<ToolContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl Tool for LookupEventsTool {
    fn name(&self) -> &str {
        "lookup_events"
    }

    fn description(&self) -> &str {
        "Look up CloudTrail management events from the last 90 days. Filter by a time range \
         and at most one attribute (event name, user name, resource, event source, ...). \
         Times accept 'now', '<n> <unit> ago' (second, minute, hour, day, week, month) or \
         ISO 8601. When paging with nextToken, resend the absolute startTime and endTime \
         shown in the previous response."
    }

    fn parameters_schema(&self) -> Value {
        let keys: Vec<&str> = LookupAttributeKey::ALL.iter().map(|k| k.as_str()).collect();
        let mut properties = Map::new();
        properties.insert(
            "startTime".to_string(),
            json!({
                "type": "string",
                "default": DEFAULT_START,
                "description": "Start of the time range, e.g. '2 hours ago' or '2024-01-15T10:00:00Z'."
            }),
        );
        properties.insert(
            "endTime".to_string(),
            json!({
                "type": "string",
                "default": DEFAULT_END,
                "description": "End of the time range, e.g. 'now' or '2024-01-16T10:00:00Z'."
            }),
        );
        properties.insert(
            "attributeKey".to_string(),
            json!({
                "type": "string",
                "enum": keys,
                "description": "Attribute to filter on. Requires attributeValue."
            }),
        );
        properties.insert(
            "attributeValue".to_string(),
            json!({
                "type": "string",
                "description": "Value of the attribute filter. Requires attributeKey."
            }),
        );
        properties.insert("maxResults".to_string(), page_size_schema(DEFAULT_PAGE_SIZE));
        properties.insert(
            "nextToken".to_string(),
            next_token_schema("startTime, endTime and attribute filter"),
        );
        object_schema(properties, &[])
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        let args: LookupEventsArgs =
            serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let params = match args.to_params(self.context.now()) {
            Ok(params) => params,
            Err(e) => return handle_failure("looking up CloudTrail events", e),
        };
        let (client, region) = self.context.client(args.region.as_deref())?;

        let page = match fetch_event_page(
            client.as_ref(),
            &params,
            args.max_results.unwrap_or(DEFAULT_PAGE_SIZE as i64),
            args.next_token.as_deref(),
        )
        .await
        {
            Ok(page) => page,
            Err(e) => return handle_failure("looking up CloudTrail events", e),
        };

        let text = format_events(&page, &params, &region);
        Ok(self.context.gate(self.name(), text, args.break_token_rule))
    }
}
