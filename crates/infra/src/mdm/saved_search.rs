//! Adapter for saved advanced computer searches.

use async_trait::async_trait;
use mdmlink_common::error::{CommonError, CommonResult};
use mdmlink_core::SavedSearchBackend;
use mdmlink_domain::{DeviceRecord, EndpointPaths, SavedSearch};
use serde_json::Value;
use tracing::{debug, instrument};

use super::{id_text, records_at};
use crate::http::HttpClient;

#[derive(Debug, Clone)]
pub struct AdvancedSearchClient {
    http: HttpClient,
    endpoints: EndpointPaths,
}

impl AdvancedSearchClient {
    pub fn new(http: HttpClient, endpoints: EndpointPaths) -> Self {
        Self { http, endpoints }
    }
}

#[async_trait]
impl SavedSearchBackend for AdvancedSearchClient {
    #[instrument(skip(self))]
    async fn list_saved_searches(&self) -> CommonResult<Vec<SavedSearch>> {
        let url = self.http.endpoint(&self.endpoints.advanced_searches, &[])?;
        let body = self.http.get_json(url).await?;
        let searches: Vec<SavedSearch> = records_at(&body, "advanced_computer_searches")?
            .iter()
            .filter_map(|row| saved_search(row.as_value()))
            .collect();
        debug!(count = searches.len(), "listed saved searches");
        Ok(searches)
    }

    #[instrument(skip(self))]
    async fn run_saved_search(&self, search_id: &str) -> CommonResult<Vec<DeviceRecord>> {
        let url =
            self.http.endpoint(&self.endpoints.advanced_search_detail, &[("{id}", search_id)])?;
        let body = self.http.get_json(url).await?;
        let search = body.get("advanced_computer_search").ok_or_else(|| {
            CommonError::serialization_format("json", "expected `advanced_computer_search`")
        })?;
        records_at(search, "computers")
    }
}

/// Entries without a usable id are skipped; a missing name reads as empty.
fn saved_search(entry: &Value) -> Option<SavedSearch> {
    let id = entry.get("id").and_then(id_text)?;
    let name = entry.get("name").and_then(Value::as_str).unwrap_or_default();
    Some(SavedSearch::new(id, name))
}
