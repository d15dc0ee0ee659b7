//! In-memory port fakes
//!
//! Each fake counts its calls so tests can assert how often the selector
//! reached the backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mdmlink_common::error::{CommonError, CommonResult};
use mdmlink_core::{InventoryBackend, ManagementBackend, SavedSearchBackend};
use mdmlink_domain::{
    BackendKind, DeviceField, DeviceRecord, InventoryUpdate, MutationKind, MutationReceipt,
    PolicyExecution, SavedSearch, ScriptDeployment,
};

/// Inventory fake whose probe either succeeds or fails with a fixed error
pub struct FakeInventory {
    kind: BackendKind,
    probe_error: Option<CommonError>,
    records: Vec<DeviceRecord>,
    pub probe_calls: AtomicU32,
    pub read_calls: AtomicU32,
}

impl FakeInventory {
    pub fn available(kind: BackendKind, records: Vec<DeviceRecord>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            probe_error: None,
            records,
            probe_calls: AtomicU32::new(0),
            read_calls: AtomicU32::new(0),
        })
    }

    pub fn failing(kind: BackendKind, error: CommonError) -> Arc<Self> {
        Arc::new(Self {
            kind,
            probe_error: Some(error),
            records: Vec::new(),
            probe_calls: AtomicU32::new(0),
            read_calls: AtomicU32::new(0),
        })
    }

    pub fn denied(kind: BackendKind) -> Arc<Self> {
        Self::failing(kind, CommonError::permission_denied(format!("{kind} inventory")))
    }

    pub fn probes(&self) -> u32 {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> u32 {
        self.read_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InventoryBackend for FakeInventory {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn probe(&self) -> CommonResult<()> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        match &self.probe_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn search(&self, query: &str, limit: usize) -> CommonResult<Vec<DeviceRecord>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.iter().filter(|r| r.matches_query(query)).take(limit).cloned().collect())
    }

    async fn get_details(&self, device_id: &str) -> CommonResult<DeviceRecord> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.records
            .iter()
            .find(|r| r.text(DeviceField::Id).as_deref() == Some(device_id))
            .cloned()
            .ok_or_else(|| CommonError::not_found_with_id("device", device_id))
    }

    async fn list(&self, limit: usize) -> CommonResult<Vec<DeviceRecord>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.iter().take(limit).cloned().collect())
    }
}

/// Saved-search fake with per-search outcomes
#[derive(Default)]
pub struct FakeSavedSearches {
    searches: Vec<SavedSearch>,
    outcomes: HashMap<String, CommonResult<Vec<DeviceRecord>>>,
    runs: Mutex<Vec<String>>,
}

impl FakeSavedSearches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, id: &str, name: &str, rows: Vec<DeviceRecord>) -> Self {
        self.searches.push(SavedSearch::new(id, name));
        self.outcomes.insert(id.to_owned(), Ok(rows));
        self
    }

    pub fn with_failing_search(mut self, id: &str, name: &str, error: CommonError) -> Self {
        self.searches.push(SavedSearch::new(id, name));
        self.outcomes.insert(id.to_owned(), Err(error));
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Ids passed to `run_saved_search`, in call order
    pub fn runs(&self) -> Vec<String> {
        self.runs.lock().unwrap().clone()
    }

    pub fn runs_of(&self, id: &str) -> usize {
        self.runs().iter().filter(|run| run.as_str() == id).count()
    }
}

#[async_trait]
impl SavedSearchBackend for FakeSavedSearches {
    async fn list_saved_searches(&self) -> CommonResult<Vec<SavedSearch>> {
        Ok(self.searches.clone())
    }

    async fn run_saved_search(&self, search_id: &str) -> CommonResult<Vec<DeviceRecord>> {
        self.runs.lock().unwrap().push(search_id.to_owned());
        self.outcomes
            .get(search_id)
            .cloned()
            .unwrap_or_else(|| Err(CommonError::not_found_with_id("saved search", search_id)))
    }
}

/// Management fake that accepts everything and records what it saw
#[derive(Default)]
pub struct FakeManagement {
    calls: Mutex<Vec<(MutationKind, String)>>,
}

impl FakeManagement {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<(MutationKind, String)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, kind: MutationKind, target: &str, devices: Vec<String>) -> MutationReceipt {
        self.calls.lock().unwrap().push((kind, target.to_owned()));
        MutationReceipt::accepted(kind, target, devices)
    }
}

#[async_trait]
impl ManagementBackend for FakeManagement {
    async fn execute_policy(&self, request: &PolicyExecution) -> CommonResult<MutationReceipt> {
        Ok(self.record(
            MutationKind::PolicyExecution,
            &request.policy_id,
            request.device_ids.clone(),
        ))
    }

    async fn deploy_script(&self, request: &ScriptDeployment) -> CommonResult<MutationReceipt> {
        Ok(self.record(
            MutationKind::ScriptDeployment,
            &request.script_id,
            request.device_ids.clone(),
        ))
    }

    async fn update_inventory(&self, request: &InventoryUpdate) -> CommonResult<MutationReceipt> {
        Ok(self.record(
            MutationKind::InventoryUpdate,
            &request.device_id,
            vec![request.device_id.clone()],
        ))
    }
}
