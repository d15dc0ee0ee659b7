//! Adapter for the classic resource API with snake_case payloads.

use async_trait::async_trait;
use mdmlink_common::error::CommonResult;
use mdmlink_core::InventoryBackend;
use mdmlink_domain::{BackendKind, DeviceRecord, EndpointPaths};
use tracing::instrument;

use super::{record_at, records_at};
use crate::http::HttpClient;

#[derive(Debug, Clone)]
pub struct ClassicInventoryClient {
    http: HttpClient,
    endpoints: EndpointPaths,
}

impl ClassicInventoryClient {
    pub fn new(http: HttpClient, endpoints: EndpointPaths) -> Self {
        Self { http, endpoints }
    }

    async fn all_computers(&self) -> CommonResult<Vec<DeviceRecord>> {
        let url = self.http.endpoint(&self.endpoints.classic_computers, &[])?;
        let body = self.http.get_json(url).await?;
        records_at(&body, "computers")
    }
}

#[async_trait]
impl InventoryBackend for ClassicInventoryClient {
    fn kind(&self) -> BackendKind {
        BackendKind::Classic
    }

    #[instrument(skip(self), fields(backend = "classic"))]
    async fn probe(&self) -> CommonResult<()> {
        self.all_computers().await.map(|_| ())
    }

    /// Server-side wildcard match on name, serial, user and address fields
    #[instrument(skip(self), fields(backend = "classic"))]
    async fn search(&self, query: &str, limit: usize) -> CommonResult<Vec<DeviceRecord>> {
        let pattern = format!("*{}*", query.trim());
        let url = self
            .http
            .endpoint(&self.endpoints.classic_computer_match, &[("{query}", pattern.as_str())])?;
        let body = self.http.get_json(url).await?;
        let mut rows = records_at(&body, "computers")?;
        rows.truncate(limit);
        Ok(rows)
    }

    #[instrument(skip(self), fields(backend = "classic"))]
    async fn get_details(&self, device_id: &str) -> CommonResult<DeviceRecord> {
        let url =
            self.http.endpoint(&self.endpoints.classic_computer_detail, &[("{id}", device_id)])?;
        let body = self.http.get_json(url).await?;
        record_at(&body, "computer")
    }

    #[instrument(skip(self), fields(backend = "classic"))]
    async fn list(&self, limit: usize) -> CommonResult<Vec<DeviceRecord>> {
        let mut rows = self.all_computers().await?;
        rows.truncate(limit);
        Ok(rows)
    }
}
