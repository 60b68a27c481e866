//! Core of the CloudTrail MCP server: the CloudTrail collaborator seam, Lake
//! query lifecycle, pagination, token budgeting and text rendering.

pub mod aws_cli;
pub mod budget;
pub mod client;
pub mod error;
pub mod format;
pub mod lifecycle;
pub mod model;
pub mod pagination;
pub mod stores;
pub mod time;

#[cfg(any(test, feature = "test-support"))]
pub mod mock;

pub use aws_cli::{AwsCliCloudTrail, AwsCliProvider, AwsCliSettings};
pub use budget::{
    check_token_limit, check_token_limit_with, shared_counter, HeuristicTokenCounter,
    SharedTokenCounter, TokenCheckResult, TokenCounter, DEFAULT_MAX_TOKENS,
};
pub use client::{ClientProvider, CloudTrailApi, SharedCloudTrail, StaticClientProvider};
pub use error::{Result, TrailError};
pub use lifecycle::{PollSettings, QueryLifecycle, QueryOutcome};
pub use model::*;
pub use pagination::{clamp_max_results, fetch_event_page, fetch_result_page, MAX_PAGE_SIZE};
pub use stores::list_event_data_stores;
pub use time::parse_time;
