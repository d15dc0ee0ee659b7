//! REST adapters for the device-management server.
//!
//! One adapter per API surface, each implementing a port from
//! `mdmlink_core`. Adapters perform a single HTTP attempt; retry, breaking
//! and fallback are the selector's job.

use std::sync::Arc;

use mdmlink_common::error::{CommonError, CommonResult};
use mdmlink_core::BackendPorts;
use mdmlink_domain::{DeviceRecord, EndpointPaths, TransportSettings};
use serde_json::Value;

use crate::http::HttpClient;

pub mod classic;
pub mod management;
pub mod modern;
pub mod saved_search;

pub use classic::ClassicInventoryClient;
pub use management::ManagementClient;
pub use modern::ModernInventoryClient;
pub use saved_search::AdvancedSearchClient;

/// Wire every adapter against one server.
pub fn build_ports(http: &HttpClient, endpoints: &EndpointPaths) -> BackendPorts {
    BackendPorts::new()
        .with_modern(Arc::new(ModernInventoryClient::new(http.clone(), endpoints.clone())))
        .with_classic(Arc::new(ClassicInventoryClient::new(http.clone(), endpoints.clone())))
        .with_saved_searches(Arc::new(AdvancedSearchClient::new(http.clone(), endpoints.clone())))
        .with_management(Arc::new(ManagementClient::new(http.clone(), endpoints.clone())))
}

/// [`build_ports`] with a client built from transport settings
pub fn ports_from_settings(settings: &TransportSettings) -> CommonResult<BackendPorts> {
    let http = HttpClient::from_settings(settings)?;
    Ok(build_ports(&http, &settings.endpoints))
}

/// Records in the array under `key`; a missing or null key is an empty list.
pub(crate) fn records_at(body: &Value, key: &str) -> CommonResult<Vec<DeviceRecord>> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.iter().cloned().map(DeviceRecord::new).collect()),
        Some(_) => Err(CommonError::serialization_format(
            "json",
            format!("expected an array at `{key}`"),
        )),
    }
}

/// Single object under `key`
pub(crate) fn record_at(body: &Value, key: &str) -> CommonResult<DeviceRecord> {
    match body.get(key) {
        Some(value @ Value::Object(_)) => Ok(DeviceRecord::new(value.clone())),
        _ => Err(CommonError::serialization_format("json", format!("expected an object at `{key}`"))),
    }
}

/// Identifier text for string or numeric ids
pub(crate) fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
