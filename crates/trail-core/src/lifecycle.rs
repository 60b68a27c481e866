//! Lake query lifecycle: submit, optionally poll to a terminal state, then
//! hand off to the first results page.
//!
//! Polling only observes the query. Dropping the future (for example on
//! process shutdown) stops polling and leaves the query running on the
//! service; no cancel request is sent.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::client::CloudTrailApi;
use crate::error::{Result, TrailError};
use crate::model::{QueryDescription, QueryStatus, ResultPage};
use crate::pagination::{fetch_result_page, MAX_PAGE_SIZE};

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_MAX_WAIT_MS: u64 = 300_000;

/// Fixed-interval polling bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl PollSettings {
    pub fn from_millis(interval_ms: u64, max_wait_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            max_wait: Duration::from_millis(max_wait_ms),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from_millis(DEFAULT_POLL_INTERVAL_MS, DEFAULT_MAX_WAIT_MS)
    }
}

/// What a caller learns about a submitted query.
///
/// Only collaborator failures are errors; a failed, cancelled or still
/// running query is a normal outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Submitted without waiting.
    Submitted {
        query_id: String,
        status: QueryStatus,
    },
    /// Reached FINISHED; carries the first page of results.
    Completed {
        description: QueryDescription,
        page: ResultPage,
    },
    /// Reached FAILED, CANCELLED or TIMED_OUT.
    Unsuccessful { description: QueryDescription },
    /// Still not terminal when the wait budget ran out.
    StillRunning {
        description: QueryDescription,
        waited: Duration,
    },
}

impl QueryOutcome {
    pub fn query_id(&self) -> &str {
        match self {
            QueryOutcome::Submitted { query_id, .. } => query_id,
            QueryOutcome::Completed { description, .. }
            | QueryOutcome::Unsuccessful { description }
            | QueryOutcome::StillRunning { description, .. } => &description.query_id,
        }
    }

    pub fn status(&self) -> QueryStatus {
        match self {
            QueryOutcome::Submitted { status, .. } => *status,
            QueryOutcome::Completed { description, .. }
            | QueryOutcome::Unsuccessful { description }
            | QueryOutcome::StillRunning { description, .. } => description.status,
        }
    }
}

/// Drives one query through the service.
pub struct QueryLifecycle<'a> {
    client: &'a dyn CloudTrailApi,
    poll: PollSettings,
    first_page_size: u32,
}

impl<'a> QueryLifecycle<'a> {
    pub fn new(client: &'a dyn CloudTrailApi, poll: PollSettings) -> Self {
        Self {
            client,
            poll,
            first_page_size: MAX_PAGE_SIZE,
        }
    }

    pub fn with_first_page_size(mut self, size: u32) -> Self {
        self.first_page_size = size;
        self
    }

    /// Submit `sql` and return the service-assigned query id.
    pub async fn submit(&self, sql: &str) -> Result<String> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(TrailError::Validation("sql must not be empty".to_string()));
        }

        let query_id = self.client.start_query(sql).await.map_err(|e| match e {
            TrailError::Submission(message) | TrailError::Collaborator(message) => {
                TrailError::Submission(message)
            }
            other => other,
        })?;
        info!("Submitted Lake query {}", query_id);
        Ok(query_id)
    }

    /// Report the current status without waiting.
    pub async fn run_async(&self, query_id: &str) -> Result<QueryDescription> {
        self.client.describe_query(query_id).await
    }

    /// Poll at the fixed interval until the query is terminal or the wait
    /// budget is spent.
    pub async fn run_sync(&self, query_id: &str) -> Result<QueryOutcome> {
        let started = Instant::now();
        let mut polls = 0u32;

        loop {
            let description = self.client.describe_query(query_id).await?;
            polls += 1;
            debug!(
                "Query {} poll #{}: {}",
                query_id, polls, description.status
            );

            if description.status == QueryStatus::Finished {
                info!("Query {} finished after {} poll(s)", query_id, polls);
                let page =
                    fetch_result_page(self.client, query_id, self.first_page_size as i64, None)
                        .await?;
                return Ok(QueryOutcome::Completed { description, page });
            }

            if description.status.is_terminal() {
                info!(
                    "Query {} ended as {} after {} poll(s)",
                    query_id, description.status, polls
                );
                return Ok(QueryOutcome::Unsuccessful { description });
            }

            let waited = started.elapsed();
            if waited >= self.poll.max_wait {
                info!(
                    "Query {} still {} after {:?}; returning without results",
                    query_id, description.status, waited
                );
                return Ok(QueryOutcome::StillRunning { description, waited });
            }

            let remaining = self.poll.max_wait - waited;
            sleep(self.poll.interval.min(remaining)).await;
        }
    }

    /// Submit `sql` and, when `wait` is set, poll it to completion.
    pub async fn execute(&self, sql: &str, wait: bool) -> Result<QueryOutcome> {
        let query_id = self.submit(sql).await?;

        if wait {
            return self.run_sync(&query_id).await;
        }

        let status = match self.run_async(&query_id).await {
            Ok(description) => description.status,
            Err(e) => {
                warn!("Could not read status of submitted query {}: {}", query_id, e);
                QueryStatus::Unknown
            }
        };
        Ok(QueryOutcome::Submitted { query_id, status })
    }
}
