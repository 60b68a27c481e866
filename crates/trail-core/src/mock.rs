//! Scripted in-memory CloudTrail used by tests.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::CloudTrailApi;
use crate::error::{Result, TrailError};
use crate::model::{
    EventDataStore, EventDataStoreDetail, EventDataStorePage, EventPage, LookupParams,
    QueryDescription, QueryStatistics, QueryStatus, ResultPage, ResultRow, TrailEvent,
};

#[derive(Debug, Clone)]
struct ScriptedQuery {
    sql: String,
    /// Statuses reported by successive `describe_query` calls; the last one sticks.
    statuses: VecDeque<QueryStatus>,
    rows: Vec<ResultRow>,
    error_message: Option<String>,
    statistics: Option<QueryStatistics>,
}

impl ScriptedQuery {
    fn current(&self) -> QueryStatus {
        self.statuses.front().copied().unwrap_or(QueryStatus::Unknown)
    }

    fn advance(&mut self) -> QueryStatus {
        let status = self.current();
        if self.statuses.len() > 1 {
            self.statuses.pop_front();
        }
        status
    }
}

#[derive(Debug, Clone)]
struct QueryScript {
    statuses: Vec<QueryStatus>,
    rows: Vec<ResultRow>,
    error_message: Option<String>,
}

#[derive(Default)]
struct State {
    events: Vec<TrailEvent>,
    queries: HashMap<String, ScriptedQuery>,
    next_script: Option<QueryScript>,
    submitted: usize,
    stores: Vec<(EventDataStore, Option<EventDataStoreDetail>)>,
    store_page_size: usize,
    failure: Option<String>,
    rejected_sql: Option<String>,
    lookup_calls: usize,
    last_lookup_page_size: Option<u32>,
    last_lookup_params: Option<LookupParams>,
    describe_calls: usize,
    result_calls: usize,
    detail_calls: usize,
}

/// In-memory stand-in for the CloudTrail service.
#[derive(Default)]
pub struct MockCloudTrail {
    state: Mutex<State>,
}

impl MockCloudTrail {
    pub fn new() -> Self {
        let mock = Self::default();
        mock.state.lock().store_page_size = 10;
        mock
    }

    pub fn set_events(&self, events: impl IntoIterator<Item = TrailEvent>) {
        self.state.lock().events = events.into_iter().collect();
    }

    /// Register an already-submitted query that reports `status` forever.
    pub fn add_query(&self, query_id: &str, status: QueryStatus, rows: Vec<ResultRow>) {
        self.add_scripted_query(query_id, vec![status], rows, None);
    }

    pub fn add_scripted_query(
        &self,
        query_id: &str,
        statuses: Vec<QueryStatus>,
        rows: Vec<ResultRow>,
        error_message: Option<String>,
    ) {
        let statistics = Some(QueryStatistics {
            events_matched: Some(rows.len() as i64),
            events_scanned: Some(rows.len() as i64 * 10),
            bytes_scanned: Some(rows.len() as i64 * 1024),
            execution_time_ms: Some(1500),
            ..Default::default()
        });
        self.state.lock().queries.insert(
            query_id.to_string(),
            ScriptedQuery {
                sql: String::new(),
                statuses: statuses.into(),
                rows,
                error_message,
                statistics,
            },
        );
    }

    /// Script the next query submitted through `start_query`.
    pub fn script_next_query(
        &self,
        statuses: Vec<QueryStatus>,
        rows: Vec<ResultRow>,
        error_message: Option<String>,
    ) {
        self.state.lock().next_script = Some(QueryScript {
            statuses,
            rows,
            error_message,
        });
    }

    pub fn reject_sql(&self, message: &str) {
        self.state.lock().rejected_sql = Some(message.to_string());
    }

    /// Make every call fail as if the service were unreachable.
    pub fn fail_with(&self, message: &str) {
        self.state.lock().failure = Some(message.to_string());
    }

    pub fn add_store(&self, store: EventDataStore, detail: Option<EventDataStoreDetail>) {
        self.state.lock().stores.push((store, detail));
    }

    pub fn set_store_page_size(&self, size: usize) {
        self.state.lock().store_page_size = size.max(1);
    }

    pub fn submitted_sql(&self, query_id: &str) -> Option<String> {
        self.state.lock().queries.get(query_id).map(|q| q.sql.clone())
    }

    pub fn lookup_calls(&self) -> usize {
        self.state.lock().lookup_calls
    }

    pub fn last_lookup_page_size(&self) -> Option<u32> {
        self.state.lock().last_lookup_page_size
    }

    pub fn last_lookup_params(&self) -> Option<LookupParams> {
        self.state.lock().last_lookup_params.clone()
    }

    pub fn describe_calls(&self) -> usize {
        self.state.lock().describe_calls
    }

    pub fn result_calls(&self) -> usize {
        self.state.lock().result_calls
    }

    pub fn detail_calls(&self) -> usize {
        self.state.lock().detail_calls
    }

    pub fn submitted_count(&self) -> usize {
        self.state.lock().submitted
    }

    fn check_failure(state: &State) -> Result<()> {
        match &state.failure {
            Some(message) => Err(TrailError::Collaborator(message.clone())),
            None => Ok(()),
        }
    }
}

fn parse_offset(token: Option<&str>, prefix: &str) -> Result<usize> {
    match token {
        None => Ok(0),
        Some(token) => token
            .strip_prefix(prefix)
            .and_then(|offset| offset.parse().ok())
            .ok_or_else(|| TrailError::Collaborator(format!("invalid NextToken '{}'", token))),
    }
}

fn page_of<T: Clone>(items: &[T], offset: usize, size: usize, prefix: &str) -> (Vec<T>, Option<String>) {
    let end = (offset + size).min(items.len());
    let slice = items.get(offset..end).unwrap_or_default().to_vec();
    let next = (end < items.len()).then(|| format!("{}{}", prefix, end));
    (slice, next)
}

fn matches_attribute(event: &TrailEvent, params: &LookupParams) -> bool {
    use crate::model::LookupAttributeKey as Key;

    let Some(attribute) = &params.attribute else {
        return true;
    };
    let field = match attribute.key {
        Key::EventId => event.event_id.as_deref(),
        Key::EventName => event.event_name.as_deref(),
        Key::ReadOnly => event.read_only.as_deref(),
        Key::Username => event.username.as_deref(),
        Key::EventSource => event.event_source.as_deref(),
        Key::AccessKeyId => event.access_key_id.as_deref(),
        Key::ResourceType => {
            return event
                .resources
                .iter()
                .any(|r| r.resource_type.as_deref() == Some(attribute.value.as_str()))
        }
        Key::ResourceName => {
            return event
                .resources
                .iter()
                .any(|r| r.resource_name.as_deref() == Some(attribute.value.as_str()))
        }
    };
    field == Some(attribute.value.as_str())
}

fn in_range(event: &TrailEvent, params: &LookupParams) -> bool {
    match event.event_time {
        Some(time) => time >= params.start_time && time <= params.end_time,
        None => true,
    }
}

#[async_trait]
impl CloudTrailApi for MockCloudTrail {
    async fn lookup_events(
        &self,
        params: &LookupParams,
        max_results: u32,
        next_token: Option<&str>,
    ) -> Result<EventPage> {
        let mut state = self.state.lock();
        state.lookup_calls += 1;
        state.last_lookup_page_size = Some(max_results);
        state.last_lookup_params = Some(params.clone());
        Self::check_failure(&state)?;

        let offset = parse_offset(next_token, "evt:")?;
        let matching: Vec<TrailEvent> = state
            .events
            .iter()
            .filter(|e| in_range(e, params) && matches_attribute(e, params))
            .cloned()
            .collect();
        let (events, next_token) = page_of(&matching, offset, max_results as usize, "evt:");
        Ok(EventPage { events, next_token })
    }

    async fn start_query(&self, sql: &str) -> Result<String> {
        let mut state = self.state.lock();
        if let Some(message) = &state.failure {
            return Err(TrailError::Submission(message.clone()));
        }
        if let Some(message) = &state.rejected_sql {
            return Err(TrailError::Submission(message.clone()));
        }

        state.submitted += 1;
        let query_id = format!("query-{:04}", state.submitted);
        let script = state.next_script.take().unwrap_or(QueryScript {
            statuses: vec![QueryStatus::Queued, QueryStatus::Running, QueryStatus::Finished],
            rows: Vec::new(),
            error_message: None,
        });
        let statistics = Some(QueryStatistics {
            events_matched: Some(script.rows.len() as i64),
            events_scanned: Some(script.rows.len() as i64 * 10),
            bytes_scanned: Some(script.rows.len() as i64 * 1024),
            execution_time_ms: Some(1500),
            ..Default::default()
        });
        state.queries.insert(
            query_id.clone(),
            ScriptedQuery {
                sql: sql.to_string(),
                statuses: script.statuses.into(),
                rows: script.rows,
                error_message: script.error_message,
                statistics,
            },
        );
        Ok(query_id)
    }

    async fn describe_query(&self, query_id: &str) -> Result<QueryDescription> {
        let mut state = self.state.lock();
        state.describe_calls += 1;
        Self::check_failure(&state)?;

        let query = state
            .queries
            .get_mut(query_id)
            .ok_or_else(|| TrailError::Collaborator(format!("QueryIdNotFoundException: {}", query_id)))?;
        let status = query.advance();
        Ok(QueryDescription {
            query_id: query_id.to_string(),
            status,
            query_string: Some(query.sql.clone()).filter(|s| !s.is_empty()),
            error_message: query.error_message.clone(),
            statistics: query.statistics.clone(),
        })
    }

    async fn get_query_results(
        &self,
        query_id: &str,
        max_results: u32,
        next_token: Option<&str>,
    ) -> Result<ResultPage> {
        let mut state = self.state.lock();
        state.result_calls += 1;
        Self::check_failure(&state)?;

        let query = state
            .queries
            .get(query_id)
            .ok_or_else(|| TrailError::Collaborator(format!("QueryIdNotFoundException: {}", query_id)))?;
        let offset = parse_offset(next_token, "rows:")?;
        let status = query.current();
        let (rows, next_token) = if status == QueryStatus::Finished {
            page_of(&query.rows, offset, max_results as usize, "rows:")
        } else {
            (Vec::new(), None)
        };
        Ok(ResultPage {
            query_id: query_id.to_string(),
            status,
            rows,
            next_token,
            statistics: Some(QueryStatistics {
                results_count: Some(query.rows.len() as i64),
                total_results_count: Some(query.rows.len() as i64),
                bytes_scanned: query.statistics.as_ref().and_then(|s| s.bytes_scanned),
                ..Default::default()
            }),
            error_message: query.error_message.clone(),
        })
    }

    async fn list_event_data_stores(
        &self,
        next_token: Option<&str>,
    ) -> Result<EventDataStorePage> {
        let state = self.state.lock();
        Self::check_failure(&state)?;

        let offset = parse_offset(next_token, "eds:")?;
        let stores: Vec<EventDataStore> = state.stores.iter().map(|(s, _)| s.clone()).collect();
        let (stores, next_token) = page_of(&stores, offset, state.store_page_size.max(1), "eds:");
        Ok(EventDataStorePage { stores, next_token })
    }

    async fn get_event_data_store(&self, arn: &str) -> Result<EventDataStoreDetail> {
        let mut state = self.state.lock();
        state.detail_calls += 1;
        Self::check_failure(&state)?;

        state
            .stores
            .iter()
            .find(|(store, _)| store.arn == arn)
            .and_then(|(_, detail)| detail.clone())
            .ok_or_else(|| TrailError::Collaborator(format!("EventDataStoreNotFoundException: {}", arn)))
    }
}
