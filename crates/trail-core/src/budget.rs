//! Token budget enforcement for tool responses.
//!
//! Responses are measured with a heuristic estimator (chars/4 + 10% margin)
//! and refused when they exceed the configured ceiling, unless the caller
//! explicitly bypasses the check.

use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

/// Default ceiling on the estimated token cost of a single tool response.
pub const DEFAULT_MAX_TOKENS: u32 = 25_000;

/// Trait for token counting implementations.
pub trait TokenCounter: Send + Sync {
    /// Count tokens in a plain text string.
    fn count_text(&self, text: &str) -> u32;
}

/// Heuristic token counter using character-based estimation.
///
/// Uses the approximation: tokens ≈ characters / 4, with a 10% safety margin.
/// This is intentionally conservative to avoid underestimating token usage.
#[derive(Debug, Clone)]
pub struct HeuristicTokenCounter {
    /// Characters per token ratio (default: 4)
    chars_per_token: f64,
    /// Safety margin multiplier (default: 1.1 = 10% extra)
    safety_margin: f64,
}

impl HeuristicTokenCounter {
    pub fn new(chars_per_token: f64, safety_margin: f64) -> Self {
        Self {
            chars_per_token,
            safety_margin,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(4.0, 1.1)
    }
}

impl Default for HeuristicTokenCounter {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl TokenCounter for HeuristicTokenCounter {
    fn count_text(&self, text: &str) -> u32 {
        if text.is_empty() {
            return 0;
        }

        let char_count = text.chars().count() as f64;
        let base_tokens = char_count / self.chars_per_token;
        let adjusted_tokens = base_tokens * self.safety_margin;

        adjusted_tokens.ceil().min(u32::MAX as f64) as u32
    }
}

/// Arc-wrapped token counter for easy sharing.
pub type SharedTokenCounter = Arc<dyn TokenCounter>;

static SHARED_COUNTER: OnceLock<SharedTokenCounter> = OnceLock::new();

/// The process-wide estimator, built on first use.
///
/// The counter keeps no per-call state, so repeated measurements never grow
/// memory; every tool response in one process is measured by the same instance.
pub fn shared_counter() -> SharedTokenCounter {
    Arc::clone(SHARED_COUNTER.get_or_init(|| Arc::new(HeuristicTokenCounter::default())))
}

/// Outcome of gating one rendered response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCheckResult {
    pub allowed: bool,
    pub tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Gate `text` against `max_tokens` using the shared estimator.
pub fn check_token_limit(text: &str, max_tokens: u32, bypass: bool) -> TokenCheckResult {
    check_token_limit_with(shared_counter().as_ref(), text, max_tokens, bypass)
}

/// Gate `text` against `max_tokens` using a specific estimator.
pub fn check_token_limit_with(
    counter: &dyn TokenCounter,
    text: &str,
    max_tokens: u32,
    bypass: bool,
) -> TokenCheckResult {
    if bypass {
        return TokenCheckResult {
            allowed: true,
            tokens: 0,
            error: None,
        };
    }

    let tokens = counter.count_text(text);
    if tokens > max_tokens {
        return TokenCheckResult {
            allowed: false,
            tokens,
            error: Some(limit_exceeded_message(tokens, max_tokens)),
        };
    }

    TokenCheckResult {
        allowed: true,
        tokens,
        error: None,
    }
}

fn limit_exceeded_message(tokens: u32, max_tokens: u32) -> String {
    format!(
        "Response too large: {} tokens exceeds the limit of {} tokens.\n\n\
         To reduce the response size, try one of the following:\n\
         - Reduce the page size (use a smaller maxResults value)\n\
         - Narrow the time range (use a later startTime or an earlier endTime)\n\
         - Add more specific filters (attributeKey/attributeValue or a tighter WHERE clause)\n\
         - Set break_token_rule to true to bypass this limit (use with caution)",
        tokens, max_tokens
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_counter_counts_text() {
        let counter = HeuristicTokenCounter::default();

        // "Hello, world!" = 13 chars -> 13/4 * 1.1 ≈ 3.57 -> 4 tokens
        let tokens = counter.count_text("Hello, world!");
        assert_eq!(tokens, 4);
    }

    #[test]
    fn heuristic_counter_counts_empty_text() {
        let counter = HeuristicTokenCounter::default();
        assert_eq!(counter.count_text(""), 0);
    }

    #[test]
    fn custom_chars_per_token() {
        let counter = HeuristicTokenCounter::new(2.0, 1.0);
        assert_eq!(counter.count_text("test"), 2);
    }

    #[test]
    fn shared_counter_is_reused() {
        let first = shared_counter();
        let second = shared_counter();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn bypass_always_allows_without_measuring() {
        let huge = "x".repeat(1_000_000);
        let result = check_token_limit(&huge, 1, true);
        assert!(result.allowed);
        assert_eq!(result.tokens, 0);
        assert!(result.error.is_none());
    }

    #[test]
    fn within_limit_is_allowed_and_measured() {
        let result = check_token_limit("Hello, world!", 4, false);
        assert!(result.allowed);
        assert_eq!(result.tokens, 4);
        assert!(result.error.is_none());
    }

    #[test]
    fn over_limit_is_refused_with_remediation() {
        let result = check_token_limit("Hello, world!", 3, false);
        assert!(!result.allowed);
        assert_eq!(result.tokens, 4);

        let message = result.error.expect("refusal carries a message");
        assert!(message.contains("4 tokens"));
        assert!(message.contains("limit of 3 tokens"));
        assert!(message.contains("page size"));
        assert!(message.contains("time range"));
        assert!(message.contains("filters"));
        assert!(message.contains("break_token_rule"));
    }

    #[test]
    fn refusal_is_exactly_above_the_limit() {
        let counter = HeuristicTokenCounter::new(1.0, 1.0);
        let text = "abcde";
        assert!(check_token_limit_with(&counter, text, 5, false).allowed);
        assert!(!check_token_limit_with(&counter, text, 4, false).allowed);
    }
}
