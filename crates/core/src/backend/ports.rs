//! Port interfaces for the device-management backends
//!
//! Each trait is one physical API surface. Implementations classify every
//! failure into a [`CommonError`] kind; the selector relies on those kinds to
//! decide between retrying, falling back and surfacing the error.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use mdmlink_common::error::CommonResult;
use mdmlink_domain::{
    BackendKind, DeviceRecord, InventoryUpdate, MutationReceipt, PolicyExecution, SavedSearch,
    ScriptDeployment,
};

/// Read access to device inventory (modern or classic surface)
#[async_trait]
pub trait InventoryBackend: Send + Sync {
    /// Which surface this adapter talks to
    fn kind(&self) -> BackendKind;

    /// Minimal authorized request proving the surface is usable.
    ///
    /// Must fail with `PermissionDenied` when the credentials lack access.
    async fn probe(&self) -> CommonResult<()>;

    /// Devices matching a free-text query
    async fn search(&self, query: &str, limit: usize) -> CommonResult<Vec<DeviceRecord>>;

    /// Full record for one device; `NotFound` when the id is unknown
    async fn get_details(&self, device_id: &str) -> CommonResult<DeviceRecord>;

    /// First `limit` devices in backend order
    async fn list(&self, limit: usize) -> CommonResult<Vec<DeviceRecord>>;
}

/// Saved server-side searches used as a read-only fallback dataset
#[async_trait]
pub trait SavedSearchBackend: Send + Sync {
    async fn list_saved_searches(&self) -> CommonResult<Vec<SavedSearch>>;

    /// Execute a saved search, returning every row
    async fn run_saved_search(&self, search_id: &str) -> CommonResult<Vec<DeviceRecord>>;
}

/// State-changing operations, served by the modern surface only
#[async_trait]
pub trait ManagementBackend: Send + Sync {
    async fn execute_policy(&self, request: &PolicyExecution) -> CommonResult<MutationReceipt>;

    async fn deploy_script(&self, request: &ScriptDeployment) -> CommonResult<MutationReceipt>;

    async fn update_inventory(&self, request: &InventoryUpdate) -> CommonResult<MutationReceipt>;
}

/// The adapters available to a selector. Any of them may be absent; a
/// missing inventory port counts as an unavailable backend.
#[derive(Clone, Default)]
pub struct BackendPorts {
    pub modern: Option<Arc<dyn InventoryBackend>>,
    pub classic: Option<Arc<dyn InventoryBackend>>,
    pub saved_searches: Option<Arc<dyn SavedSearchBackend>>,
    pub management: Option<Arc<dyn ManagementBackend>>,
}

impl BackendPorts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_modern(mut self, port: Arc<dyn InventoryBackend>) -> Self {
        self.modern = Some(port);
        self
    }

    pub fn with_classic(mut self, port: Arc<dyn InventoryBackend>) -> Self {
        self.classic = Some(port);
        self
    }

    pub fn with_saved_searches(mut self, port: Arc<dyn SavedSearchBackend>) -> Self {
        self.saved_searches = Some(port);
        self
    }

    pub fn with_management(mut self, port: Arc<dyn ManagementBackend>) -> Self {
        self.management = Some(port);
        self
    }

    /// Inventory port for a directly queryable backend
    pub fn inventory(&self, kind: BackendKind) -> Option<&Arc<dyn InventoryBackend>> {
        match kind {
            BackendKind::Modern => self.modern.as_ref(),
            BackendKind::Classic => self.classic.as_ref(),
            BackendKind::AdvancedSearch => None,
        }
    }
}

impl fmt::Debug for BackendPorts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendPorts")
            .field("modern", &self.modern.is_some())
            .field("classic", &self.classic.is_some())
            .field("saved_searches", &self.saved_searches.is_some())
            .field("management", &self.management.is_some())
            .finish()
    }
}
