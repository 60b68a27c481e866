//! Domain types shared by the collaborator, the lifecycle manager and the formatter.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a CloudTrail Lake query as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryStatus {
    Queued,
    Running,
    Finished,
    Failed,
    Cancelled,
    TimedOut,
    #[serde(other)]
    Unknown,
}

impl QueryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            QueryStatus::Finished
                | QueryStatus::Failed
                | QueryStatus::Cancelled
                | QueryStatus::TimedOut
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryStatus::Queued => "QUEUED",
            QueryStatus::Running => "RUNNING",
            QueryStatus::Finished => "FINISHED",
            QueryStatus::Failed => "FAILED",
            QueryStatus::Cancelled => "CANCELLED",
            QueryStatus::TimedOut => "TIMED_OUT",
            QueryStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution statistics of a Lake query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStatistics {
    pub events_matched: Option<i64>,
    pub events_scanned: Option<i64>,
    pub bytes_scanned: Option<i64>,
    pub execution_time_ms: Option<i64>,
    pub results_count: Option<i64>,
    pub total_results_count: Option<i64>,
    pub creation_time: Option<DateTime<Utc>>,
}

/// Snapshot of a Lake query, observed through `describe_query`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDescription {
    pub query_id: String,
    pub status: QueryStatus,
    pub query_string: Option<String>,
    pub error_message: Option<String>,
    pub statistics: Option<QueryStatistics>,
}

/// One row of a Lake result set, columns in service order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub columns: Vec<(String, String)>,
}

impl ResultRow {
    pub fn new<K, V>(columns: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            columns: columns
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }
}

/// A page of Lake query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultPage {
    pub query_id: String,
    pub status: QueryStatus,
    pub rows: Vec<ResultRow>,
    pub next_token: Option<String>,
    pub statistics: Option<QueryStatistics>,
    pub error_message: Option<String>,
}

/// Attribute keys accepted by `LookupEvents`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookupAttributeKey {
    EventId,
    EventName,
    ReadOnly,
    Username,
    ResourceType,
    ResourceName,
    EventSource,
    AccessKeyId,
}

impl LookupAttributeKey {
    pub const ALL: [LookupAttributeKey; 8] = [
        LookupAttributeKey::EventId,
        LookupAttributeKey::EventName,
        LookupAttributeKey::ReadOnly,
        LookupAttributeKey::Username,
        LookupAttributeKey::ResourceType,
        LookupAttributeKey::ResourceName,
        LookupAttributeKey::EventSource,
        LookupAttributeKey::AccessKeyId,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LookupAttributeKey::EventId => "EventId",
            LookupAttributeKey::EventName => "EventName",
            LookupAttributeKey::ReadOnly => "ReadOnly",
            LookupAttributeKey::Username => "Username",
            LookupAttributeKey::ResourceType => "ResourceType",
            LookupAttributeKey::ResourceName => "ResourceName",
            LookupAttributeKey::EventSource => "EventSource",
            LookupAttributeKey::AccessKeyId => "AccessKeyId",
        }
    }
}

impl fmt::Display for LookupAttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single lookup filter. CloudTrail accepts at most one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupAttribute {
    pub key: LookupAttributeKey,
    pub value: String,
}

/// Query-defining parameters of an event lookup. These must stay constant
/// across pages fetched with a continuation token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupParams {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub attribute: Option<LookupAttribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResource {
    pub resource_type: Option<String>,
    pub resource_name: Option<String>,
}

/// A management event returned by `LookupEvents`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrailEvent {
    pub event_id: Option<String>,
    pub event_name: Option<String>,
    pub event_time: Option<DateTime<Utc>>,
    pub event_source: Option<String>,
    pub username: Option<String>,
    pub read_only: Option<String>,
    pub access_key_id: Option<String>,
    pub resources: Vec<EventResource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPage {
    pub events: Vec<TrailEvent>,
    pub next_token: Option<String>,
}

/// Summary entry from `ListEventDataStores`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDataStore {
    pub arn: String,
    pub name: Option<String>,
    pub status: Option<String>,
    pub retention_period_days: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Additional per-store attributes from `GetEventDataStore`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDataStoreDetail {
    pub multi_region_enabled: Option<bool>,
    pub organization_enabled: Option<bool>,
    pub termination_protection_enabled: Option<bool>,
    pub advanced_event_selector_count: usize,
    pub billing_mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDataStorePage {
    pub stores: Vec<EventDataStore>,
    pub next_token: Option<String>,
}

/// A store together with its optional enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDataStoreEntry {
    pub store: EventDataStore,
    pub detail: Option<EventDataStoreDetail>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(QueryStatus::Finished.is_terminal());
        assert!(QueryStatus::Failed.is_terminal());
        assert!(QueryStatus::Cancelled.is_terminal());
        assert!(QueryStatus::TimedOut.is_terminal());
        assert!(!QueryStatus::Queued.is_terminal());
        assert!(!QueryStatus::Running.is_terminal());
        assert!(!QueryStatus::Unknown.is_terminal());
    }

    #[test]
    fn status_deserializes_service_strings() {
        let status: QueryStatus = serde_json::from_str("\"TIMED_OUT\"").unwrap();
        assert_eq!(status, QueryStatus::TimedOut);
        let status: QueryStatus = serde_json::from_str("\"CANCELLED\"").unwrap();
        assert_eq!(status, QueryStatus::Cancelled);
        let unknown: QueryStatus = serde_json::from_str("\"PAUSED\"").unwrap();
        assert_eq!(unknown, QueryStatus::Unknown);
        assert_eq!(QueryStatus::TimedOut.to_string(), "TIMED_OUT");
    }

    #[test]
    fn attribute_key_deserializes_exact_names() {
        let key: LookupAttributeKey = serde_json::from_str("\"EventName\"").unwrap();
        assert_eq!(key, LookupAttributeKey::EventName);
        assert!(serde_json::from_str::<LookupAttributeKey>("\"eventname\"").is_err());
        assert!(LookupAttributeKey::ALL
            .iter()
            .all(|k| serde_json::to_value(k).unwrap() == k.as_str()));
    }

    #[test]
    fn result_row_lookup_by_column() {
        let row = ResultRow::new([("eventName", "ConsoleLogin"), ("userIdentity", "alice")]);
        assert_eq!(row.get("eventName"), Some("ConsoleLogin"));
        assert_eq!(row.get("missing"), None);
    }
}
