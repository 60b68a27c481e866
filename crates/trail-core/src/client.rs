//! Seam between the server and the CloudTrail service.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{
    EventDataStoreDetail, EventDataStorePage, EventPage, LookupParams, QueryDescription,
    ResultPage,
};

/// The subset of the CloudTrail API this server drives.
///
/// Implementations must pass continuation tokens through untouched.
#[async_trait]
pub trait CloudTrailApi: Send + Sync {
    async fn lookup_events(
        &self,
        params: &LookupParams,
        max_results: u32,
        next_token: Option<&str>,
    ) -> Result<EventPage>;

    /// Submit a Lake SQL statement and return the service-assigned query id.
    async fn start_query(&self, sql: &str) -> Result<String>;

    async fn describe_query(&self, query_id: &str) -> Result<QueryDescription>;

    async fn get_query_results(
        &self,
        query_id: &str,
        max_results: u32,
        next_token: Option<&str>,
    ) -> Result<ResultPage>;

    async fn list_event_data_stores(&self, next_token: Option<&str>)
        -> Result<EventDataStorePage>;

    async fn get_event_data_store(&self, arn: &str) -> Result<EventDataStoreDetail>;
}

pub type SharedCloudTrail = Arc<dyn CloudTrailApi>;

/// Hands out a client bound to a region, falling back to the configured default.
pub trait ClientProvider: Send + Sync {
    fn client(&self, region: Option<&str>) -> Result<SharedCloudTrail>;

    fn default_region(&self) -> &str;
}

/// Provider that returns the same client for every region. Used when the
/// backing client is region-agnostic, such as the in-memory fake.
pub struct StaticClientProvider {
    client: SharedCloudTrail,
    region: String,
}

impl StaticClientProvider {
    pub fn new(client: SharedCloudTrail, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }
}

impl ClientProvider for StaticClientProvider {
    fn client(&self, _region: Option<&str>) -> Result<SharedCloudTrail> {
        Ok(Arc::clone(&self.client))
    }

    fn default_region(&self) -> &str {
        &self.region
    }
}
