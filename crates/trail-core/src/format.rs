//! Plain-text rendering of CloudTrail results.
//!
//! Every renderer is pure: the same input always yields the same text.
//! Records are introduced by `--- <Kind> N ---` markers and a trailing
//! `--- More Results Available ---` block is emitted when a continuation
//! token exists.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::lifecycle::QueryOutcome;
use crate::model::{
    EventDataStoreEntry, EventPage, LookupParams, QueryDescription, QueryStatistics, ResultPage,
    TrailEvent,
};

fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn or_na(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => "N/A",
    }
}

fn yes_no(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "Yes",
        Some(false) => "No",
        None => "N/A",
    }
}

fn more_results(lines: &mut Vec<String>, token: &str, instructions: String) {
    lines.push(String::new());
    lines.push("--- More Results Available ---".to_string());
    lines.push(format!("Next Token: {}", token));
    lines.push(instructions);
}

fn push_event(lines: &mut Vec<String>, index: usize, event: &TrailEvent) {
    lines.push(format!("--- Event {} ---", index));
    lines.push(format!("Event Name: {}", or_na(event.event_name.as_deref())));
    lines.push(format!(
        "Event Time: {}",
        event
            .event_time
            .as_ref()
            .map(timestamp)
            .unwrap_or_else(|| "N/A".to_string())
    ));
    lines.push(format!("Event Source: {}", or_na(event.event_source.as_deref())));
    lines.push(format!("Username: {}", or_na(event.username.as_deref())));
    lines.push(format!("Event ID: {}", or_na(event.event_id.as_deref())));
    lines.push(format!("Read Only: {}", or_na(event.read_only.as_deref())));
    if let Some(key) = event.access_key_id.as_deref().filter(|k| !k.is_empty()) {
        lines.push(format!("Access Key ID: {}", key));
    }
    if !event.resources.is_empty() {
        lines.push("Resources:".to_string());
        for resource in &event.resources {
            lines.push(format!(
                "  - {}: {}",
                or_na(resource.resource_type.as_deref()),
                or_na(resource.resource_name.as_deref())
            ));
        }
    }
    lines.push(String::new());
}

/// Render one page of `lookup_events` results.
pub fn format_events(page: &EventPage, params: &LookupParams, region: &str) -> String {
    let mut lines = vec![
        format!("CloudTrail Events (Region: {})", region),
        format!(
            "Time Range: {} to {}",
            timestamp(&params.start_time),
            timestamp(&params.end_time)
        ),
    ];
    if let Some(attribute) = &params.attribute {
        lines.push(format!("Filter: {} = {}", attribute.key, attribute.value));
    }
    lines.push(format!("Found: {} event(s)", page.events.len()));
    lines.push(String::new());

    if page.events.is_empty() {
        lines.push("No events found matching the specified criteria.".to_string());
    }

    for (i, event) in page.events.iter().enumerate() {
        push_event(&mut lines, i + 1, event);
    }

    if let Some(token) = &page.next_token {
        more_results(
            &mut lines,
            token,
            format!(
                "Call lookup_events again with this nextToken and the same parameters: \
                 startTime=\"{}\", endTime=\"{}\"{}.",
                timestamp(&params.start_time),
                timestamp(&params.end_time),
                params
                    .attribute
                    .as_ref()
                    .map(|a| format!(
                        ", attributeKey=\"{}\", attributeValue=\"{}\"",
                        a.key, a.value
                    ))
                    .unwrap_or_default()
            ),
        );
    }

    finish(lines)
}

fn push_statistics(lines: &mut Vec<String>, stats: &QueryStatistics) {
    let mut entries = Vec::new();
    if let Some(v) = stats.events_matched {
        entries.push(format!("  Events Matched: {}", v));
    }
    if let Some(v) = stats.events_scanned {
        entries.push(format!("  Events Scanned: {}", v));
    }
    if let Some(v) = stats.results_count {
        entries.push(format!("  Results Count: {}", v));
    }
    if let Some(v) = stats.total_results_count {
        entries.push(format!("  Total Results Count: {}", v));
    }
    if let Some(v) = stats.bytes_scanned {
        entries.push(format!("  Bytes Scanned: {}", v));
    }
    if let Some(v) = stats.execution_time_ms {
        entries.push(format!("  Execution Time: {} ms", v));
    }
    if let Some(v) = &stats.creation_time {
        entries.push(format!("  Created: {}", timestamp(v)));
    }
    if !entries.is_empty() {
        lines.push("Statistics:".to_string());
        lines.extend(entries);
    }
}

fn push_status(lines: &mut Vec<String>, description: &QueryDescription) {
    lines.push(format!("Query ID: {}", description.query_id));
    lines.push(format!("Status: {}", description.status));
    if let Some(sql) = description.query_string.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("Query: {}", sql));
    }
    if let Some(error) = description.error_message.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("Error: {}", error));
    }
    if let Some(stats) = &description.statistics {
        push_statistics(lines, stats);
    }
}

/// Render the output of `get_query_status`.
pub fn format_query_status(description: &QueryDescription) -> String {
    let mut lines = vec!["CloudTrail Lake Query Status".to_string()];
    push_status(&mut lines, description);
    if !description.status.is_terminal() {
        lines.push(String::new());
        lines.push(
            "The query has not finished yet. Check again with get_query_status.".to_string(),
        );
    }
    finish(lines)
}

fn push_rows(lines: &mut Vec<String>, page: &ResultPage) {
    lines.push(format!("Rows Returned: {}", page.rows.len()));
    if let Some(first) = page.rows.first() {
        let columns: Vec<&str> = first.columns.iter().map(|(name, _)| name.as_str()).collect();
        lines.push(format!("Columns: {}", columns.join(", ")));
    }
    lines.push(String::new());

    if page.rows.is_empty() {
        lines.push("No rows returned.".to_string());
    }

    for (i, row) in page.rows.iter().enumerate() {
        lines.push(format!("--- Row {} ---", i + 1));
        for (name, value) in &row.columns {
            lines.push(format!("{}: {}", name, value));
        }
        lines.push(String::new());
    }

    if let Some(token) = &page.next_token {
        more_results(
            lines,
            token,
            format!(
                "Call get_query_results again with this nextToken and the same queryId \"{}\".",
                page.query_id
            ),
        );
    }
}

/// Render one page of `get_query_results`.
pub fn format_query_results(page: &ResultPage) -> String {
    let mut lines = vec![
        "CloudTrail Lake Query Results".to_string(),
        format!("Query ID: {}", page.query_id),
        format!("Status: {}", page.status),
    ];
    if let Some(error) = page.error_message.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("Error: {}", error));
    }
    if let Some(stats) = &page.statistics {
        push_statistics(&mut lines, stats);
    }
    push_rows(&mut lines, page);
    finish(lines)
}

/// Render the result of `lake_query` for every lifecycle outcome.
pub fn format_query_outcome(outcome: &QueryOutcome) -> String {
    let mut lines = Vec::new();
    match outcome {
        QueryOutcome::Submitted { query_id, status } => {
            lines.push("CloudTrail Lake Query Submitted".to_string());
            lines.push(format!("Query ID: {}", query_id));
            lines.push(format!("Status: {}", status));
            lines.push(String::new());
            lines.push(
                "The query is running asynchronously. Use get_query_status with this queryId \
                 to check progress, then get_query_results to fetch rows."
                    .to_string(),
            );
        }
        QueryOutcome::Completed { description, page } => {
            lines.push("CloudTrail Lake Query Completed".to_string());
            push_status(&mut lines, description);
            lines.push(String::new());
            push_rows(&mut lines, page);
        }
        QueryOutcome::Unsuccessful { description } => {
            lines.push("CloudTrail Lake Query Did Not Complete".to_string());
            push_status(&mut lines, description);
        }
        QueryOutcome::StillRunning { description, waited } => {
            lines.push("CloudTrail Lake Query Still Running".to_string());
            push_status(&mut lines, description);
            lines.push(String::new());
            lines.push(format!(
                "The query did not finish within {} seconds. Use get_query_status with this \
                 queryId to check progress, then get_query_results to fetch rows.",
                waited.as_secs()
            ));
        }
    }
    finish(lines)
}

/// Render the output of `list_event_data_stores`.
pub fn format_event_data_stores(
    entries: &[EventDataStoreEntry],
    include_details: bool,
    region: &str,
) -> String {
    let mut lines = vec![
        format!("CloudTrail Lake Event Data Stores (Region: {})", region),
        format!("Found: {} event data store(s)", entries.len()),
        String::new(),
    ];

    if entries.is_empty() {
        lines.push("No event data stores found.".to_string());
    }

    for (i, entry) in entries.iter().enumerate() {
        let store = &entry.store;
        lines.push(format!("--- Event Data Store {} ---", i + 1));
        lines.push(format!("Name: {}", or_na(store.name.as_deref())));
        lines.push(format!("ARN: {}", store.arn));
        lines.push(format!("Status: {}", or_na(store.status.as_deref())));
        lines.push(format!(
            "Retention Period: {}",
            store
                .retention_period_days
                .map(|d| format!("{} days", d))
                .unwrap_or_else(|| "N/A".to_string())
        ));
        if let Some(created) = &store.created_at {
            lines.push(format!("Created: {}", timestamp(created)));
        }
        if let Some(updated) = &store.updated_at {
            lines.push(format!("Updated: {}", timestamp(updated)));
        }
        if include_details {
            if let Some(detail) = &entry.detail {
                lines.push(format!("Multi-Region: {}", yes_no(detail.multi_region_enabled)));
                lines.push(format!(
                    "Organization Enabled: {}",
                    yes_no(detail.organization_enabled)
                ));
                lines.push(format!(
                    "Termination Protection: {}",
                    yes_no(detail.termination_protection_enabled)
                ));
                lines.push(format!(
                    "Advanced Event Selectors: {}",
                    detail.advanced_event_selector_count
                ));
                if let Some(mode) = detail.billing_mode.as_deref() {
                    lines.push(format!("Billing Mode: {}", mode));
                }
            }
        }
        lines.push(String::new());
    }

    finish(lines)
}

fn finish(lines: Vec<String>) -> String {
    let mut text = lines.join("\n");
    let trimmed = text.trim_end().len();
    text.truncate(trimmed);
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        EventDataStore, EventDataStoreDetail, EventResource, LookupAttribute,
        LookupAttributeKey, QueryStatus, ResultRow,
    };
    use chrono::TimeZone;
    use std::time::Duration;

    fn params() -> LookupParams {
        LookupParams {
            start_time: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap(),
            attribute: None,
        }
    }

    fn login_event() -> TrailEvent {
        TrailEvent {
            event_id: Some("e-1".to_string()),
            event_name: Some("ConsoleLogin".to_string()),
            event_time: Some(Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()),
            event_source: Some("signin.amazonaws.com".to_string()),
            username: Some("alice".to_string()),
            read_only: Some("false".to_string()),
            access_key_id: None,
            resources: vec![EventResource {
                resource_type: Some("AWS::IAM::User".to_string()),
                resource_name: Some("alice".to_string()),
            }],
        }
    }

    #[test]
    fn empty_event_page() {
        let page = EventPage {
            events: Vec::new(),
            next_token: None,
        };
        let text = format_events(&page, &params(), "us-east-1");

        assert!(text.contains("Region: us-east-1"));
        assert!(text.contains("Found: 0 event(s)"));
        assert!(text.contains("No events found"));
        assert!(!text.contains("More Results Available"));
    }

    #[test]
    fn event_sections_and_hint() {
        let mut p = params();
        p.attribute = Some(LookupAttribute {
            key: LookupAttributeKey::Username,
            value: "alice".to_string(),
        });
        let page = EventPage {
            events: vec![login_event(), login_event()],
            next_token: Some("tok-2".to_string()),
        };
        let text = format_events(&page, &p, "eu-west-1");

        assert!(text.contains("Filter: Username = alice"));
        assert!(text.contains("Found: 2 event(s)"));
        assert!(text.contains("--- Event 1 ---"));
        assert!(text.contains("--- Event 2 ---"));
        assert!(text.contains("Event Time: 2024-05-01T09:30:00Z"));
        assert!(text.contains("  - AWS::IAM::User: alice"));
        assert!(text.contains("Next Token: tok-2"));
        assert!(text.contains("startTime=\"2024-05-01T00:00:00Z\""));
        assert!(text.contains("attributeKey=\"Username\""));
    }

    #[test]
    fn rendering_is_deterministic() {
        let page = EventPage {
            events: vec![login_event()],
            next_token: None,
        };
        assert_eq!(
            format_events(&page, &params(), "us-east-1"),
            format_events(&page, &params(), "us-east-1")
        );
    }

    #[test]
    fn result_rows_keep_column_order() {
        let page = ResultPage {
            query_id: "q-1".to_string(),
            status: QueryStatus::Finished,
            rows: vec![ResultRow::new([("eventName", "PutObject"), ("awsRegion", "us-east-1")])],
            next_token: Some("rows:1".to_string()),
            statistics: None,
            error_message: None,
        };
        let text = format_query_results(&page);

        assert!(text.contains("Columns: eventName, awsRegion"));
        assert!(text.contains("--- Row 1 ---\neventName: PutObject\nawsRegion: us-east-1"));
        assert!(text.contains("same queryId \"q-1\""));
    }

    #[test]
    fn status_includes_error_and_statistics() {
        let description = QueryDescription {
            query_id: "q-9".to_string(),
            status: QueryStatus::Failed,
            query_string: Some("SELECT x".to_string()),
            error_message: Some("bad column".to_string()),
            statistics: Some(QueryStatistics {
                events_scanned: Some(100),
                bytes_scanned: Some(2048),
                execution_time_ms: Some(350),
                ..Default::default()
            }),
        };
        let text = format_query_status(&description);

        assert!(text.contains("Status: FAILED"));
        assert!(text.contains("Error: bad column"));
        assert!(text.contains("Events Scanned: 100"));
        assert!(text.contains("Execution Time: 350 ms"));
        assert!(!text.contains("has not finished"));
    }

    #[test]
    fn still_running_outcome_points_to_status_tool() {
        let outcome = QueryOutcome::StillRunning {
            description: QueryDescription {
                query_id: "q-2".to_string(),
                status: QueryStatus::Running,
                query_string: None,
                error_message: None,
                statistics: None,
            },
            waited: Duration::from_secs(300),
        };
        let text = format_query_outcome(&outcome);
        assert!(text.contains("Status: RUNNING"));
        assert!(text.contains("300 seconds"));
        assert!(text.contains("get_query_status"));
    }

    #[test]
    fn stores_with_and_without_details() {
        let entries = vec![EventDataStoreEntry {
            store: EventDataStore {
                arn: "arn:aws:cloudtrail:us-east-1:123:eventdatastore/abc".to_string(),
                name: Some("audit".to_string()),
                status: Some("ENABLED".to_string()),
                retention_period_days: Some(2557),
                ..Default::default()
            },
            detail: Some(EventDataStoreDetail {
                multi_region_enabled: Some(true),
                organization_enabled: Some(false),
                termination_protection_enabled: Some(true),
                advanced_event_selector_count: 2,
                billing_mode: None,
            }),
        }];

        let detailed = format_event_data_stores(&entries, true, "us-east-1");
        assert!(detailed.contains("Retention Period: 2557 days"));
        assert!(detailed.contains("Multi-Region: Yes"));
        assert!(detailed.contains("Organization Enabled: No"));
        assert!(detailed.contains("Advanced Event Selectors: 2"));

        let brief = format_event_data_stores(&entries, false, "us-east-1");
        assert!(brief.contains("Name: audit"));
        assert!(!brief.contains("Multi-Region"));
        assert!(!brief.contains("Organization Enabled"));
        assert!(!brief.contains("Advanced Event Selectors"));
    }
}
