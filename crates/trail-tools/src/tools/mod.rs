//! The CloudTrail tool surface.

mod get_query_results;
mod get_query_status;
mod lake_query;
mod list_event_data_stores;
mod lookup_events;

pub use get_query_results::GetQueryResultsTool;
pub use get_query_status::GetQueryStatusTool;
pub use lake_query::LakeQueryTool;
pub use list_event_data_stores::ListEventDataStoresTool;
pub use lookup_events::LookupEventsTool;

use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use serde_json::{json, Map, Number, Value};

use crate::context::ToolContext;
use crate::registry::{RegistryError, ToolRegistry};

pub const CLOUDTRAIL_TOOL_NAMES: &[&str] = &[
    "lookup_events",
    "lake_query",
    "get_query_status",
    "get_query_results",
    "list_event_data_stores",
];

/// Register all CloudTrail tools against one shared context.
pub fn register_cloudtrail_tools(
    registry: &ToolRegistry,
    context: Arc<ToolContext>,
) -> Result<(), RegistryError> {
    registry.register(LookupEventsTool::new(Arc::clone(&context)))?;
    registry.register(LakeQueryTool::new(Arc::clone(&context)))?;
    registry.register(GetQueryStatusTool::new(Arc::clone(&context)))?;
    registry.register(GetQueryResultsTool::new(Arc::clone(&context)))?;
    registry.register(ListEventDataStoresTool::new(context))?;
    Ok(())
}

/// Build an object schema, appending the `region` and `break_token_rule`
/// parameters every tool accepts.
pub(crate) fn object_schema(mut properties: Map<String, Value>, required: &[&str]) -> Value {
    properties.insert(
        "region".to_string(),
        json!({
            "type": "string",
            "minLength": 1,
            "description": "AWS region to query. Defaults to the server's configured region."
        }),
    );
    properties.insert(
        "break_token_rule".to_string(),
        json!({
            "type": "boolean",
            "default": false,
            "description": "Skip the response token limit. Only for critical operations that need the full output."
        }),
    );
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

pub(crate) fn page_size_schema(default: u32) -> Value {
    json!({
        "type": "integer",
        "default": default,
        "description": format!(
            "Maximum number of items to return (1-50, default {}). Values outside the range are clamped.",
            default
        )
    })
}

pub(crate) fn next_token_schema(resend: &str) -> Value {
    json!({
        "type": "string",
        "description": format!(
            "Continuation token from a previous page. Must be sent together with the same {} as the call that produced it.",
            resend
        )
    })
}

/// Accept any JSON integer for a page size, including whole floats such as
/// `20.0` and values beyond `i64`, saturating so the clamp sees every request.
pub(crate) fn lenient_page_size<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Option::<Number>::deserialize(deserializer)?;
    Ok(number.as_ref().map(saturating_i64))
}

fn saturating_i64(number: &Number) -> i64 {
    if let Some(value) = number.as_i64() {
        return value;
    }
    if number.as_u64().is_some() {
        return i64::MAX;
    }
    // `as` saturates at the i64 bounds; NaN cannot appear in JSON.
    number.as_f64().map(|value| value as i64).unwrap_or(i64::MAX)
}
