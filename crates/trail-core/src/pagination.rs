//! Single-page fetches for event lookups and Lake result sets.
//!
//! A continuation token is only meaningful together with the parameters that
//! produced it: the same time range and filter for lookups, the same query id
//! for Lake results. Tokens are forwarded as-is and never inspected here, so
//! keeping those parameters stable between pages is the caller's job.

use tracing::debug;

use crate::client::CloudTrailApi;
use crate::error::{Result, TrailError};
use crate::model::{EventPage, LookupParams, ResultPage};

/// Hard ceiling on rows or events returned per page.
pub const MAX_PAGE_SIZE: u32 = 50;
/// Floor on rows or events returned per page.
pub const MIN_PAGE_SIZE: u32 = 1;

/// Normalise a requested page size into `[1, 50]`. Out-of-range requests are
/// clamped rather than rejected.
pub fn clamp_max_results(requested: i64) -> u32 {
    requested.clamp(MIN_PAGE_SIZE as i64, MAX_PAGE_SIZE as i64) as u32
}

fn normalise_token(token: Option<&str>) -> Option<&str> {
    token.filter(|t| !t.is_empty())
}

/// Fetch one page of management events.
pub async fn fetch_event_page(
    client: &dyn CloudTrailApi,
    params: &LookupParams,
    max_results: i64,
    next_token: Option<&str>,
) -> Result<EventPage> {
    if params.start_time > params.end_time {
        return Err(TrailError::Validation(format!(
            "startTime ({}) must not be after endTime ({})",
            params.start_time.to_rfc3339(),
            params.end_time.to_rfc3339()
        )));
    }

    let page_size = clamp_max_results(max_results);
    let token = normalise_token(next_token);
    debug!(
        "Looking up events {} .. {} (page size {}, continued: {})",
        params.start_time,
        params.end_time,
        page_size,
        token.is_some()
    );

    let mut page = client.lookup_events(params, page_size, token).await?;
    page.events.truncate(page_size as usize);
    Ok(page)
}

/// Fetch one page of a Lake query's results.
pub async fn fetch_result_page(
    client: &dyn CloudTrailApi,
    query_id: &str,
    max_results: i64,
    next_token: Option<&str>,
) -> Result<ResultPage> {
    let query_id = query_id.trim();
    if query_id.is_empty() {
        return Err(TrailError::Validation("queryId must not be empty".to_string()));
    }

    let page_size = clamp_max_results(max_results);
    let token = normalise_token(next_token);
    debug!(
        "Fetching results for query {} (page size {}, continued: {})",
        query_id,
        page_size,
        token.is_some()
    );

    let mut page = client.get_query_results(query_id, page_size, token).await?;
    page.rows.truncate(page_size as usize);
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCloudTrail;
    use crate::model::{QueryStatus, ResultRow, TrailEvent};
    use chrono::{Duration, TimeZone, Utc};

    fn day_range() -> LookupParams {
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        LookupParams {
            start_time: end - Duration::days(1),
            end_time: end,
            attribute: None,
        }
    }

    fn rows(n: usize) -> Vec<ResultRow> {
        (0..n)
            .map(|i| ResultRow::new([("n", i.to_string())]))
            .collect()
    }

    #[test]
    fn clamps_page_size() {
        assert_eq!(clamp_max_results(0), 1);
        assert_eq!(clamp_max_results(-7), 1);
        assert_eq!(clamp_max_results(1), 1);
        assert_eq!(clamp_max_results(25), 25);
        assert_eq!(clamp_max_results(50), 50);
        assert_eq!(clamp_max_results(51), 50);
        assert_eq!(clamp_max_results(i64::MAX), 50);
    }

    #[test]
    fn clamp_matches_min_max_formula() {
        for requested in -100i64..200 {
            let expected = requested.min(50).max(1) as u32;
            assert_eq!(clamp_max_results(requested), expected);
        }
    }

    #[tokio::test]
    async fn event_page_forwards_clamped_size() {
        let mock = MockCloudTrail::new();
        mock.set_events((0..80).map(|i| TrailEvent {
            event_id: Some(format!("e-{}", i)),
            ..Default::default()
        }));

        let page = fetch_event_page(&mock, &day_range(), 500, None).await.unwrap();
        assert_eq!(page.events.len(), 50);
        assert!(page.next_token.is_some());
        assert_eq!(mock.last_lookup_page_size(), Some(50));
    }

    #[tokio::test]
    async fn event_pages_chain_with_token() {
        let mock = MockCloudTrail::new();
        mock.set_events((0..5).map(|i| TrailEvent {
            event_id: Some(format!("e-{}", i)),
            ..Default::default()
        }));

        let first = fetch_event_page(&mock, &day_range(), 3, None).await.unwrap();
        let second = fetch_event_page(&mock, &day_range(), 3, first.next_token.as_deref())
            .await
            .unwrap();

        assert_eq!(first.events.len(), 3);
        assert_eq!(second.events.len(), 2);
        assert!(second.next_token.is_none());
        assert_eq!(second.events[0].event_id.as_deref(), Some("e-3"));
    }

    #[tokio::test]
    async fn inverted_range_is_rejected_before_any_call() {
        let mock = MockCloudTrail::new();
        let mut params = day_range();
        std::mem::swap(&mut params.start_time, &mut params.end_time);

        let err = fetch_event_page(&mock, &params, 10, None).await.unwrap_err();
        assert!(matches!(err, TrailError::Validation(_)));
        assert_eq!(mock.lookup_calls(), 0);
    }

    #[tokio::test]
    async fn result_pages_are_disjoint_and_ordered() {
        let mock = MockCloudTrail::new();
        mock.add_query("q-1", QueryStatus::Finished, rows(7));

        let first = fetch_result_page(&mock, "q-1", 4, None).await.unwrap();
        let second = fetch_result_page(&mock, "q-1", 4, first.next_token.as_deref())
            .await
            .unwrap();

        let first_ids: Vec<_> = first.rows.iter().map(|r| r.get("n").unwrap()).collect();
        let second_ids: Vec<_> = second.rows.iter().map(|r| r.get("n").unwrap()).collect();
        assert_eq!(first_ids, vec!["0", "1", "2", "3"]);
        assert_eq!(second_ids, vec!["4", "5", "6"]);
        assert!(second.next_token.is_none());
    }

    #[tokio::test]
    async fn empty_token_starts_from_first_page() {
        let mock = MockCloudTrail::new();
        mock.add_query("q-1", QueryStatus::Finished, rows(2));

        let page = fetch_result_page(&mock, "q-1", 10, Some("")).await.unwrap();
        assert_eq!(page.rows.len(), 2);
    }

    #[tokio::test]
    async fn empty_result_set_is_not_an_error() {
        let mock = MockCloudTrail::new();
        mock.add_query("q-empty", QueryStatus::Finished, Vec::new());

        let page = fetch_result_page(&mock, "q-empty", 10, None).await.unwrap();
        assert!(page.rows.is_empty());
        assert!(page.next_token.is_none());
    }

    #[tokio::test]
    async fn blank_query_id_is_rejected() {
        let mock = MockCloudTrail::new();
        let err = fetch_result_page(&mock, "  ", 10, None).await.unwrap_err();
        assert!(matches!(err, TrailError::Validation(_)));
    }
}
