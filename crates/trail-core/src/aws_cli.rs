//! CloudTrail collaborator backed by the AWS CLI.
//!
//! Each call spawns `aws cloudtrail <operation>` with the request encoded as
//! `--cli-input-json` and parses the JSON printed on stdout. Credentials and
//! region resolution are left entirely to the CLI's own configuration chain.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Map, Value};
use tokio::process::Command;
use tracing::{debug, error};

use crate::client::{ClientProvider, CloudTrailApi, SharedCloudTrail};
use crate::error::{Result, TrailError};
use crate::model::{
    EventDataStore, EventDataStoreDetail, EventDataStorePage, EventPage, EventResource,
    LookupParams, QueryDescription, QueryStatistics, QueryStatus, ResultPage, ResultRow,
    TrailEvent,
};

/// Settings shared by every CLI-backed client.
#[derive(Debug, Clone)]
pub struct AwsCliSettings {
    pub cli_path: String,
    pub profile: Option<String>,
}

impl Default for AwsCliSettings {
    fn default() -> Self {
        Self {
            cli_path: "aws".to_string(),
            profile: None,
        }
    }
}

/// A CloudTrail client for one region.
#[derive(Debug, Clone)]
pub struct AwsCliCloudTrail {
    settings: AwsCliSettings,
    region: String,
}

impl AwsCliCloudTrail {
    pub fn new(settings: AwsCliSettings, region: impl Into<String>) -> Self {
        Self {
            settings,
            region: region.into(),
        }
    }

    fn build_args(&self, operation: &str, input: &Value, single_page: bool) -> Vec<String> {
        let mut args = vec![
            "cloudtrail".to_string(),
            operation.to_string(),
            "--cli-input-json".to_string(),
            input.to_string(),
            "--output".to_string(),
            "json".to_string(),
            "--region".to_string(),
            self.region.clone(),
        ];
        if single_page {
            args.push("--no-paginate".to_string());
        }
        if let Some(profile) = &self.settings.profile {
            args.push("--profile".to_string());
            args.push(profile.clone());
        }
        args
    }

    async fn invoke<T: DeserializeOwned>(
        &self,
        operation: &str,
        input: Value,
        single_page: bool,
    ) -> std::result::Result<T, String> {
        let args = self.build_args(operation, &input, single_page);
        debug!("Invoking {} cloudtrail {} in {}", self.settings.cli_path, operation, self.region);

        let output = Command::new(&self.settings.cli_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| format!("failed to run {}: {}", self.settings.cli_path, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!("cloudtrail {} failed ({}): {}", operation, output.status, stderr);
            return Err(if stderr.is_empty() {
                format!("cloudtrail {} exited with {}", operation, output.status)
            } else {
                stderr
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let body = if stdout.trim().is_empty() { "{}" } else { stdout.trim() };
        serde_json::from_str(body)
            .map_err(|e| format!("unexpected cloudtrail {} response: {}", operation, e))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        operation: &str,
        input: Value,
        single_page: bool,
    ) -> Result<T> {
        self.invoke(operation, input, single_page)
            .await
            .map_err(TrailError::Collaborator)
    }
}

fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// The CLI prints ISO 8601 strings by default but epoch seconds when
/// `cli_timestamp_format` is left at its v1 default.
fn lenient_time<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Some(Value::Number(n)) => n.as_f64().and_then(|secs| {
            DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
        }),
        _ => None,
    })
}

pub(crate) fn lookup_events_input(
    params: &LookupParams,
    max_results: u32,
    next_token: Option<&str>,
) -> Value {
    let mut input = Map::new();
    input.insert("StartTime".into(), json!(timestamp(&params.start_time)));
    input.insert("EndTime".into(), json!(timestamp(&params.end_time)));
    input.insert("MaxResults".into(), json!(max_results));
    if let Some(attribute) = &params.attribute {
        input.insert(
            "LookupAttributes".into(),
            json!([{
                "AttributeKey": attribute.key.as_str(),
                "AttributeValue": attribute.value,
            }]),
        );
    }
    if let Some(token) = next_token {
        input.insert("NextToken".into(), json!(token));
    }
    Value::Object(input)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LookupEventsResponse {
    #[serde(default)]
    events: Vec<RawEvent>,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawEvent {
    event_id: Option<String>,
    event_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_time")]
    event_time: Option<DateTime<Utc>>,
    event_source: Option<String>,
    username: Option<String>,
    read_only: Option<String>,
    access_key_id: Option<String>,
    #[serde(default)]
    resources: Vec<RawResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawResource {
    resource_type: Option<String>,
    resource_name: Option<String>,
}

impl From<RawEvent> for TrailEvent {
    fn from(raw: RawEvent) -> Self {
        TrailEvent {
            event_id: raw.event_id,
            event_name: raw.event_name,
            event_time: raw.event_time,
            event_source: raw.event_source,
            username: raw.username,
            read_only: raw.read_only,
            access_key_id: raw.access_key_id,
            resources: raw
                .resources
                .into_iter()
                .map(|r| EventResource {
                    resource_type: r.resource_type,
                    resource_name: r.resource_name,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StartQueryResponse {
    query_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawStatistics {
    events_matched: Option<i64>,
    events_scanned: Option<i64>,
    bytes_scanned: Option<i64>,
    execution_time_in_millis: Option<i64>,
    results_count: Option<i64>,
    total_results_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient_time")]
    creation_time: Option<DateTime<Utc>>,
}

impl From<RawStatistics> for QueryStatistics {
    fn from(raw: RawStatistics) -> Self {
        QueryStatistics {
            events_matched: raw.events_matched,
            events_scanned: raw.events_scanned,
            bytes_scanned: raw.bytes_scanned,
            execution_time_ms: raw.execution_time_in_millis,
            results_count: raw.results_count,
            total_results_count: raw.total_results_count,
            creation_time: raw.creation_time,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeQueryResponse {
    query_id: Option<String>,
    query_string: Option<String>,
    query_status: Option<QueryStatus>,
    query_statistics: Option<RawStatistics>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetQueryResultsResponse {
    query_status: Option<QueryStatus>,
    query_statistics: Option<RawStatistics>,
    #[serde(default)]
    query_result_rows: Vec<Vec<HashMap<String, String>>>,
    next_token: Option<String>,
    error_message: Option<String>,
}

/// Each Lake row arrives as a list of single-entry maps; flatten while
/// keeping column order.
pub(crate) fn flatten_row(cells: Vec<HashMap<String, String>>) -> ResultRow {
    ResultRow {
        columns: cells.into_iter().flat_map(|cell| cell.into_iter()).collect(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListEventDataStoresResponse {
    #[serde(default)]
    event_data_stores: Vec<RawEventDataStore>,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawEventDataStore {
    event_data_store_arn: Option<String>,
    name: Option<String>,
    status: Option<String>,
    retention_period: Option<i64>,
    #[serde(default, deserialize_with = "lenient_time")]
    created_timestamp: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_time")]
    updated_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetEventDataStoreResponse {
    multi_region_enabled: Option<bool>,
    organization_enabled: Option<bool>,
    termination_protection_enabled: Option<bool>,
    #[serde(default)]
    advanced_event_selectors: Vec<Value>,
    billing_mode: Option<String>,
}

#[async_trait]
impl CloudTrailApi for AwsCliCloudTrail {
    async fn lookup_events(
        &self,
        params: &LookupParams,
        max_results: u32,
        next_token: Option<&str>,
    ) -> Result<EventPage> {
        let input = lookup_events_input(params, max_results, next_token);
        let response: LookupEventsResponse = self.call("lookup-events", input, true).await?;
        Ok(EventPage {
            events: response.events.into_iter().map(TrailEvent::from).collect(),
            next_token: response.next_token,
        })
    }

    async fn start_query(&self, sql: &str) -> Result<String> {
        let response: StartQueryResponse = self
            .invoke("start-query", json!({ "QueryStatement": sql }), false)
            .await
            .map_err(TrailError::Submission)?;
        response
            .query_id
            .ok_or_else(|| TrailError::Submission("service returned no query id".to_string()))
    }

    async fn describe_query(&self, query_id: &str) -> Result<QueryDescription> {
        let response: DescribeQueryResponse = self
            .call("describe-query", json!({ "QueryId": query_id }), false)
            .await?;
        Ok(QueryDescription {
            query_id: response.query_id.unwrap_or_else(|| query_id.to_string()),
            status: response.query_status.unwrap_or(QueryStatus::Unknown),
            query_string: response.query_string,
            error_message: response.error_message,
            statistics: response.query_statistics.map(QueryStatistics::from),
        })
    }

    async fn get_query_results(
        &self,
        query_id: &str,
        max_results: u32,
        next_token: Option<&str>,
    ) -> Result<ResultPage> {
        let mut input = json!({ "QueryId": query_id, "MaxQueryResults": max_results });
        if let Some(token) = next_token {
            input["NextToken"] = json!(token);
        }
        let response: GetQueryResultsResponse =
            self.call("get-query-results", input, true).await?;
        Ok(ResultPage {
            query_id: query_id.to_string(),
            status: response.query_status.unwrap_or(QueryStatus::Unknown),
            rows: response.query_result_rows.into_iter().map(flatten_row).collect(),
            next_token: response.next_token,
            statistics: response.query_statistics.map(QueryStatistics::from),
            error_message: response.error_message,
        })
    }

    async fn list_event_data_stores(
        &self,
        next_token: Option<&str>,
    ) -> Result<EventDataStorePage> {
        let input = match next_token {
            Some(token) => json!({ "NextToken": token }),
            None => json!({}),
        };
        let response: ListEventDataStoresResponse =
            self.call("list-event-data-stores", input, true).await?;
        Ok(EventDataStorePage {
            stores: response
                .event_data_stores
                .into_iter()
                .map(|raw| EventDataStore {
                    arn: raw.event_data_store_arn.unwrap_or_default(),
                    name: raw.name,
                    status: raw.status,
                    retention_period_days: raw.retention_period,
                    created_at: raw.created_timestamp,
                    updated_at: raw.updated_timestamp,
                })
                .collect(),
            next_token: response.next_token,
        })
    }

    async fn get_event_data_store(&self, arn: &str) -> Result<EventDataStoreDetail> {
        let response: GetEventDataStoreResponse = self
            .call("get-event-data-store", json!({ "EventDataStore": arn }), false)
            .await?;
        Ok(EventDataStoreDetail {
            multi_region_enabled: response.multi_region_enabled,
            organization_enabled: response.organization_enabled,
            termination_protection_enabled: response.termination_protection_enabled,
            advanced_event_selector_count: response.advanced_event_selectors.len(),
            billing_mode: response.billing_mode,
        })
    }
}

/// Builds per-region CLI clients on demand.
#[derive(Debug, Clone)]
pub struct AwsCliProvider {
    settings: AwsCliSettings,
    default_region: String,
}

impl AwsCliProvider {
    pub fn new(settings: AwsCliSettings, default_region: impl Into<String>) -> Self {
        Self {
            settings,
            default_region: default_region.into(),
        }
    }
}

impl ClientProvider for AwsCliProvider {
    fn client(&self, region: Option<&str>) -> Result<SharedCloudTrail> {
        let region = match region.map(str::trim) {
            Some("") | None => self.default_region.clone(),
            Some(region) => region.to_string(),
        };
        Ok(Arc::new(AwsCliCloudTrail::new(self.settings.clone(), region)))
    }

    fn default_region(&self) -> &str {
        &self.default_region
    }
}
