//! Shared state handed to every CloudTrail tool.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use trail_core::{
    check_token_limit, ClientProvider, PollSettings, SharedCloudTrail, TrailError,
    DEFAULT_MAX_TOKENS,
};

use crate::types::{ToolError, ToolResult};

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct ToolContext {
    provider: Arc<dyn ClientProvider>,
    max_tokens: u32,
    poll: PollSettings,
    clock: Clock,
}

impl ToolContext {
    pub fn new(provider: Arc<dyn ClientProvider>) -> Self {
        Self {
            provider,
            max_tokens: DEFAULT_MAX_TOKENS,
            poll: PollSettings::default(),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn poll_settings(&self) -> PollSettings {
        self.poll
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Client and effective region name for an optional per-call override.
    pub fn client(&self, region: Option<&str>) -> Result<(SharedCloudTrail, String), ToolError> {
        let client = self
            .provider
            .client(region)
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        let region = region
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| self.provider.default_region())
            .to_string();
        Ok((client, region))
    }

    /// Apply the token budget to a rendered response.
    pub fn gate(&self, tool: &str, text: String, bypass: bool) -> ToolResult {
        let check = check_token_limit(&text, self.max_tokens, bypass);
        if bypass {
            info!("Token limit bypassed for {}", tool);
        }
        if check.allowed {
            return ToolResult::ok(text);
        }
        warn!(
            "{} response refused: {} tokens over limit {}",
            tool, check.tokens, self.max_tokens
        );
        ToolResult::failure(check.error.unwrap_or_default())
    }
}

/// Turn a core failure into the tool boundary's shape: bad input stays a
/// typed error, service failures become failure text for the agent.
pub fn handle_failure(action: &str, err: TrailError) -> Result<ToolResult, ToolError> {
    match err {
        TrailError::InvalidTimeFormat(_) | TrailError::Validation(_) => {
            Err(ToolError::InvalidArguments(err.to_string()))
        }
        other => {
            warn!("{} failed: {}", action, other);
            Ok(ToolResult::failure(format!("Error {}: {}", action, other)))
        }
    }
}
