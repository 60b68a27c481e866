//! Event data store enumeration with optional per-store enrichment.

use tracing::{debug, warn};

use crate::client::CloudTrailApi;
use crate::error::Result;
use crate::model::EventDataStoreEntry;

/// Upper bound on list pages followed, so a misbehaving token chain cannot loop forever.
const MAX_LIST_PAGES: usize = 100;

/// List every event data store, following the service's pagination.
///
/// With `include_details`, each store is enriched from `get_event_data_store`.
/// A failed enrichment is logged and the store is returned without detail.
pub async fn list_event_data_stores(
    client: &dyn CloudTrailApi,
    include_details: bool,
) -> Result<Vec<EventDataStoreEntry>> {
    let mut entries = Vec::new();
    let mut token: Option<String> = None;

    for _ in 0..MAX_LIST_PAGES {
        let page = client.list_event_data_stores(token.as_deref()).await?;
        entries.extend(page.stores.into_iter().map(|store| EventDataStoreEntry {
            store,
            detail: None,
        }));

        token = page.next_token.filter(|t| !t.is_empty());
        if token.is_none() {
            break;
        }
    }

    if token.is_some() {
        warn!(
            "Stopped listing event data stores after {} pages",
            MAX_LIST_PAGES
        );
    }

    if include_details {
        for entry in &mut entries {
            match client.get_event_data_store(&entry.store.arn).await {
                Ok(detail) => entry.detail = Some(detail),
                Err(e) => warn!(
                    "Could not fetch details for event data store {}: {}",
                    entry.store.arn, e
                ),
            }
        }
    }

    debug!("Listed {} event data store(s)", entries.len());
    Ok(entries)
}
