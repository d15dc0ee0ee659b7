//! Shared test helpers for `mdmlink-core` integration tests.
//!
//! In-memory port fakes with call counters, payload builders for each
//! backend shape, and a resilience stack with short delays.

pub mod ports;

use std::sync::Arc;

use mdmlink_core::ResilienceStack;
use mdmlink_domain::{Config, DeviceRecord};
use serde_json::json;

/// Stack with one quick retry and a generous breaker threshold
pub fn quick_stack() -> Arc<ResilienceStack> {
    let mut config = Config::default();
    config.resilience.max_retries = 1;
    config.resilience.retry_initial_delay_ms = 10;
    config.resilience.retry_max_delay_ms = 50;
    config.breaker.failure_threshold = 10;
    Arc::new(ResilienceStack::from_config(&config).unwrap())
}

/// Device payload as the modern API reports it
pub fn modern_device(id: &str, name: &str, serial: &str) -> DeviceRecord {
    DeviceRecord::new(json!({
        "id": id,
        "general": { "name": name, "lastIpAddress": "10.0.0.1" },
        "hardware": { "serialNumber": serial, "model": "MacBook Air" },
        "userAndLocation": { "username": "operator" }
    }))
}

/// Device payload as the classic API reports it
pub fn classic_device(id: u64, name: &str, serial: &str) -> DeviceRecord {
    DeviceRecord::new(json!({
        "general": { "id": id, "name": name, "serial_number": serial },
        "location": { "username": "operator" }
    }))
}

/// Saved-search row keyed by display column names
pub fn search_row(id: u64, name: &str) -> DeviceRecord {
    DeviceRecord::new(json!({
        "Computer ID": id,
        "Computer Name": name,
        "Serial Number": format!("SN{id:04}"),
        "Operating System Version": "14.4"
    }))
}

/// `count` saved-search rows with sequential ids starting at `first`
pub fn search_rows(first: u64, count: u64) -> Vec<DeviceRecord> {
    (first..first + count).map(|id| search_row(id, &format!("mac-{id}"))).collect()
}
