//! Adapter for the paginated JSON inventory API.

use async_trait::async_trait;
use mdmlink_common::error::CommonResult;
use mdmlink_core::InventoryBackend;
use mdmlink_domain::{BackendKind, DeviceRecord, EndpointPaths};
use tracing::{debug, instrument};
use url::Url;

use super::{record_at, records_at};
use crate::http::HttpClient;

const SECTIONS: [&str; 4] = ["GENERAL", "HARDWARE", "OPERATING_SYSTEM", "USER_AND_LOCATION"];

/// Fields the server-side filter matches a free-text query against
const FILTER_FIELDS: [&str; 3] =
    ["general.name", "hardware.serialNumber", "userAndLocation.username"];

#[derive(Debug, Clone)]
pub struct ModernInventoryClient {
    http: HttpClient,
    endpoints: EndpointPaths,
}

impl ModernInventoryClient {
    pub fn new(http: HttpClient, endpoints: EndpointPaths) -> Self {
        Self { http, endpoints }
    }

    fn inventory_url(&self, page_size: usize) -> CommonResult<Url> {
        let mut url = self.http.endpoint(&self.endpoints.modern_inventory, &[])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("page", "0").append_pair("page-size", &page_size.to_string());
            for section in SECTIONS {
                query.append_pair("section", section);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl InventoryBackend for ModernInventoryClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Modern
    }

    #[instrument(skip(self), fields(backend = "modern"))]
    async fn probe(&self) -> CommonResult<()> {
        let mut url = self.http.endpoint(&self.endpoints.modern_inventory, &[])?;
        url.query_pairs_mut()
            .append_pair("page", "0")
            .append_pair("page-size", "1")
            .append_pair("section", "GENERAL");
        self.http.get_json(url).await?;
        debug!("modern inventory reachable");
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "modern"))]
    async fn search(&self, query: &str, limit: usize) -> CommonResult<Vec<DeviceRecord>> {
        let mut url = self.inventory_url(limit)?;
        url.query_pairs_mut().append_pair("filter", &search_filter(query));
        let body = self.http.get_json(url).await?;
        let mut rows = records_at(&body, "results")?;
        rows.truncate(limit);
        Ok(rows)
    }

    #[instrument(skip(self), fields(backend = "modern"))]
    async fn get_details(&self, device_id: &str) -> CommonResult<DeviceRecord> {
        let url =
            self.http.endpoint(&self.endpoints.modern_inventory_detail, &[("{id}", device_id)])?;
        let body = self.http.get_json(url).await?;
        if body.is_object() {
            return Ok(DeviceRecord::new(body));
        }
        record_at(&body, "computer")
    }

    #[instrument(skip(self), fields(backend = "modern"))]
    async fn list(&self, limit: usize) -> CommonResult<Vec<DeviceRecord>> {
        let mut url = self.inventory_url(limit)?;
        url.query_pairs_mut().append_pair("sort", "general.name:asc");
        let body = self.http.get_json(url).await?;
        let mut rows = records_at(&body, "results")?;
        rows.truncate(limit);
        Ok(rows)
    }
}

/// RSQL disjunction of wildcard matches over [`FILTER_FIELDS`]
fn search_filter(query: &str) -> String {
    let escaped = query.trim().replace('\\', "\\\\").replace('"', "\\\"");
    FILTER_FIELDS
        .iter()
        .map(|field| format!("{field}==\"*{escaped}*\""))
        .collect::<Vec<_>>()
        .join(",")
}
