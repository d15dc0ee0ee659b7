//! Backend detection and the uniform device contract
//!
//! The selector probes the modern inventory API first, then the classic
//! one. When neither is usable it falls back to a saved server-side search
//! whose rows form the device dataset. Probe outcomes and the chosen saved
//! search are memoized until [`BackendSelector::reset`]; the dataset itself
//! lives in a TTL cache because fetching it is a full-fleet scan.
//!
//! Every backend call runs through the shared [`ResilienceStack`] under a
//! breaker key of the form `"{backend}.{operation}"`.

use std::fmt;
use std::sync::Arc;

use mdmlink_common::cache::{BoundedCache, BoundedCacheConfig, CacheStats};
use mdmlink_common::error::{CommonError, CommonResult, ErrorKind};
use mdmlink_common::resilience::{batch_retry_with_breaker, Clock, SystemClock};
use mdmlink_domain::{
    Availability, BackendKind, BackendSettings, CapabilitySnapshot, Device, DeviceField,
    DeviceRecord, InventoryUpdate, MutationKind, MutationReceipt, PolicyExecution, SavedSearch,
    ScriptDeployment,
};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::ports::{BackendPorts, InventoryBackend, ManagementBackend};
use super::stack::ResilienceStack;
use crate::errors::IntoCommonError;

type Dataset = Arc<Vec<DeviceRecord>>;

/// Memoized detection results
#[derive(Debug, Default)]
struct CapabilityState {
    modern: Availability,
    classic: Availability,
    advanced_search: Availability,
    active: Option<BackendKind>,
    saved_search: Option<SavedSearch>,
}

impl CapabilityState {
    fn availability(&self, kind: BackendKind) -> Availability {
        match kind {
            BackendKind::Modern => self.modern,
            BackendKind::Classic => self.classic,
            BackendKind::AdvancedSearch => self.advanced_search,
        }
    }

    fn set_availability(&mut self, kind: BackendKind, availability: Availability) {
        match kind {
            BackendKind::Modern => self.modern = availability,
            BackendKind::Classic => self.classic = availability,
            BackendKind::AdvancedSearch => self.advanced_search = availability,
        }
    }
}

/// Failures that mean "this backend cannot serve us" rather than "the
/// caller must act". Authentication and validation errors propagate.
fn marks_unavailable(error: &CommonError) -> bool {
    matches!(
        error.kind(),
        ErrorKind::PermissionDenied
            | ErrorKind::NotFound
            | ErrorKind::Network
            | ErrorKind::Timeout
            | ErrorKind::Server
            | ErrorKind::RateLimited
            | ErrorKind::CircuitOpen
    )
}

/// Chooses the backend serving reads and gates mutations on the modern API.
pub struct BackendSelector<C: Clock = SystemClock> {
    ports: BackendPorts,
    stack: Arc<ResilienceStack>,
    settings: BackendSettings,
    capability: Mutex<CapabilityState>,
    dataset: BoundedCache<String, Dataset, C>,
    dataset_refresh: Mutex<()>,
}

impl BackendSelector<SystemClock> {
    pub fn new(
        ports: BackendPorts,
        stack: Arc<ResilienceStack>,
        settings: BackendSettings,
    ) -> CommonResult<Self> {
        Self::with_clock(ports, stack, settings, SystemClock)
    }
}

impl<C: Clock> BackendSelector<C> {
    /// Build a selector whose dataset cache reads time from `clock`
    pub fn with_clock(
        ports: BackendPorts,
        stack: Arc<ResilienceStack>,
        settings: BackendSettings,
        clock: C,
    ) -> CommonResult<Self> {
        let cache_config =
            BoundedCacheConfig::ttl_lru(settings.dataset_ttl(), settings.dataset_cache_capacity);
        let dataset = BoundedCache::with_clock(cache_config, clock)?
            .on_evict(|id: &String, _: &Dataset| debug!(saved_search = %id, "dataset dropped"));

        Ok(Self {
            ports,
            stack,
            settings,
            capability: Mutex::new(CapabilityState::default()),
            dataset,
            dataset_refresh: Mutex::new(()),
        })
    }

    pub fn stack(&self) -> &Arc<ResilienceStack> {
        &self.stack
    }

    pub fn settings(&self) -> &BackendSettings {
        &self.settings
    }

    /// Backend serving reads, resolved on first use and memoized.
    ///
    /// Concurrent callers wait for a single resolution.
    #[instrument(skip(self))]
    pub async fn active_backend(&self) -> CommonResult<BackendKind> {
        let mut state = self.capability.lock().await;
        if let Some(kind) = state.active {
            return Ok(kind);
        }

        let kind = self.resolve(&mut state).await?;
        state.active = Some(kind);
        info!(backend = %kind, "backend selected");
        Ok(kind)
    }

    async fn resolve(&self, state: &mut CapabilityState) -> CommonResult<BackendKind> {
        for kind in [BackendKind::Modern, BackendKind::Classic] {
            if self.probe(state, kind).await?.is_available() {
                return Ok(kind);
            }
        }

        if state.saved_search.is_none() {
            match self.locate_saved_search().await {
                Ok(search) => state.saved_search = Some(search),
                Err(err) => {
                    warn!(error = %err, "no backend can serve reads");
                    return Err(err);
                }
            }
        }
        state.set_availability(BackendKind::AdvancedSearch, Availability::Available);
        Ok(BackendKind::AdvancedSearch)
    }

    /// Probe an inventory backend once; later calls reuse the outcome
    async fn probe(
        &self,
        state: &mut CapabilityState,
        kind: BackendKind,
    ) -> CommonResult<Availability> {
        let known = state.availability(kind);
        if known.is_known() {
            return Ok(known);
        }

        let availability = match self.ports.inventory(kind) {
            None => {
                debug!(backend = %kind, "no adapter configured");
                Availability::Unavailable
            }
            Some(port) => {
                let key = kind.operation_key("probe");
                match self.stack.call(&key, move || port.probe()).await {
                    Ok(()) => Availability::Available,
                    Err(err) if marks_unavailable(&err) => {
                        warn!(backend = %kind, error = %err, "backend unavailable");
                        Availability::Unavailable
                    }
                    Err(err) => return Err(err),
                }
            }
        };

        debug!(backend = %kind, availability = %availability, "probe recorded");
        state.set_availability(kind, availability);
        Ok(availability)
    }

    /// Pick the saved search backing the fallback dataset.
    ///
    /// Keyword matches win in keyword priority order. Otherwise up to
    /// `max_saved_search_candidates` searches are run and the one returning
    /// the most rows is chosen; its rows seed the dataset cache.
    async fn locate_saved_search(&self) -> CommonResult<SavedSearch> {
        let port = self.ports.saved_searches.as_ref().ok_or_else(|| {
            CommonError::no_suitable_backend(
                "inventory APIs unavailable and no saved-search adapter configured",
            )
        })?;

        let key = BackendKind::AdvancedSearch.operation_key("list");
        let searches = match self.stack.call(&key, move || port.list_saved_searches()).await {
            Ok(searches) => searches,
            Err(err) if marks_unavailable(&err) => {
                return Err(CommonError::no_suitable_backend(format!(
                    "inventory APIs unavailable and saved searches unreadable: {err}"
                )));
            }
            Err(err) => return Err(err),
        };

        for keyword in &self.settings.saved_search_keywords {
            if let Some(search) = searches.iter().find(|search| search.matches_keyword(keyword)) {
                info!(saved_search = %search.name, keyword = %keyword, "saved search matched keyword");
                return Ok(search.clone());
            }
        }

        let candidates: Vec<&SavedSearch> =
            searches.iter().take(self.settings.max_saved_search_candidates).collect();
        if candidates.is_empty() {
            return Err(CommonError::no_suitable_backend(
                "inventory APIs unavailable and no saved searches are visible",
            ));
        }

        debug!(candidates = candidates.len(), "scanning saved searches");
        let operations = candidates.iter().map(move |search| {
            let id = search.id.as_str();
            move || port.run_saved_search(id)
        });
        let prefix = BackendKind::AdvancedSearch.operation_key("scan");
        let outcomes =
            batch_retry_with_breaker(operations, self.stack.breakers(), &prefix, self.stack.retry())
                .await;

        let mut best: Option<(&SavedSearch, Vec<DeviceRecord>)> = None;
        for (search, outcome) in candidates.into_iter().zip(outcomes) {
            match outcome {
                Ok(rows) => {
                    if best.as_ref().map_or(true, |(_, current)| rows.len() > current.len()) {
                        best = Some((search, rows));
                    }
                }
                Err(err) => debug!(saved_search = %search.name, error = %err, "candidate skipped"),
            }
        }

        let (search, rows) = best.ok_or_else(|| {
            CommonError::no_suitable_backend(
                "inventory APIs unavailable and no saved search could be run",
            )
        })?;
        info!(saved_search = %search.name, rows = rows.len(), "saved search chosen by size");
        self.dataset.set(search.id.clone(), Arc::new(rows));
        Ok(search.clone())
    }

    async fn chosen_saved_search(&self) -> CommonResult<SavedSearch> {
        self.capability.lock().await.saved_search.clone().ok_or_else(|| {
            CommonError::internal_with_context(
                "fallback backend active without a saved search",
                "backend_selector",
            )
        })
    }

    /// Rows of the chosen saved search, fetched again once the TTL lapses
    async fn dataset(&self) -> CommonResult<Dataset> {
        let search = self.chosen_saved_search().await?;
        if let Some(rows) = self.dataset.get(&search.id) {
            return Ok(rows);
        }

        let _refresh = self.dataset_refresh.lock().await;
        if let Some(rows) = self.dataset.get(&search.id) {
            return Ok(rows);
        }

        let port = self.ports.saved_searches.as_ref().ok_or_else(|| {
            CommonError::no_suitable_backend("saved-search adapter no longer configured")
        })?;
        let key = BackendKind::AdvancedSearch.operation_key("run");
        let id = search.id.as_str();
        let rows = Arc::new(self.stack.call(&key, move || port.run_saved_search(id)).await?);

        debug!(saved_search = %search.name, rows = rows.len(), "dataset refreshed");
        self.dataset.set(search.id.clone(), Arc::clone(&rows));
        Ok(rows)
    }

    fn inventory_port(&self, kind: BackendKind) -> CommonResult<&Arc<dyn InventoryBackend>> {
        self.ports.inventory(kind).ok_or_else(|| {
            CommonError::internal_with_context(
                format!("{kind} selected without an adapter"),
                "backend_selector",
            )
        })
    }

    fn resolve_limit(&self, limit: Option<usize>) -> CommonResult<usize> {
        match limit.unwrap_or(self.settings.default_search_limit) {
            0 => Err(CommonError::validation("limit", "must be greater than 0")),
            limit => Ok(limit),
        }
    }

    /// Devices matching `query`, at most `limit` (default 50)
    #[instrument(skip(self))]
    pub async fn search_devices(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> CommonResult<Vec<Device>> {
        let limit = self.resolve_limit(limit)?;
        let kind = self.active_backend().await?;

        let records = match kind {
            BackendKind::AdvancedSearch => self
                .dataset()
                .await?
                .iter()
                .filter(|record| record.matches_query(query))
                .take(limit)
                .cloned()
                .collect(),
            _ => {
                let port = self.inventory_port(kind)?;
                let key = kind.operation_key("search");
                let mut records =
                    self.stack.call(&key, move || port.search(query, limit)).await?;
                records.truncate(limit);
                records
            }
        };

        Ok(records.into_iter().map(|record| Device::from_record(kind, record)).collect())
    }

    /// Full record for one device
    #[instrument(skip(self))]
    pub async fn get_device_details(&self, device_id: &str) -> CommonResult<Device> {
        if device_id.trim().is_empty() {
            return Err(CommonError::validation("device_id", "must not be empty"));
        }
        let kind = self.active_backend().await?;

        let record = match kind {
            BackendKind::AdvancedSearch => self
                .dataset()
                .await?
                .iter()
                .find(|record| record.text(DeviceField::Id).as_deref() == Some(device_id))
                .cloned()
                .ok_or_else(|| CommonError::not_found_with_id("device", device_id))?,
            _ => {
                let port = self.inventory_port(kind)?;
                let key = kind.operation_key("details");
                self.stack.call(&key, move || port.get_details(device_id)).await?
            }
        };

        Ok(Device::from_record(kind, record))
    }

    /// First `limit` devices of the active backend
    #[instrument(skip(self))]
    pub async fn list_devices(&self, limit: Option<usize>) -> CommonResult<Vec<Device>> {
        let limit = self.resolve_limit(limit)?;
        let kind = self.active_backend().await?;

        let records = match kind {
            BackendKind::AdvancedSearch => {
                self.dataset().await?.iter().take(limit).cloned().collect()
            }
            _ => {
                let port = self.inventory_port(kind)?;
                let key = kind.operation_key("list");
                let mut records = self.stack.call(&key, move || port.list(limit)).await?;
                records.truncate(limit);
                records
            }
        };

        Ok(records.into_iter().map(|record| Device::from_record(kind, record)).collect())
    }

    /// Details for many devices, fanned out through the concurrency limiter.
    ///
    /// One outcome per id, in input order.
    #[instrument(skip(self, device_ids), fields(devices = device_ids.len()))]
    pub async fn get_device_details_batch(
        &self,
        device_ids: Vec<String>,
    ) -> Vec<CommonResult<Device>> {
        // Resolve before fanning out so no limiter slot is held while probing.
        if let Err(err) = self.active_backend().await {
            return device_ids.iter().map(|_| Err(err.clone())).collect();
        }

        self.stack
            .limiter()
            .map_settled(device_ids, |device_id| async move {
                self.get_device_details(&device_id).await
            })
            .await
    }

    /// Management port, provided the modern backend is usable
    async fn management_port(
        &self,
        operation: MutationKind,
    ) -> CommonResult<&Arc<dyn ManagementBackend>> {
        let port = self.ports.management.as_ref().ok_or_else(|| {
            CommonError::capability_unavailable(
                operation.to_string(),
                "no management adapter configured",
            )
        })?;

        let mut state = self.capability.lock().await;
        if !self.probe(&mut state, BackendKind::Modern).await?.is_available() {
            warn!(operation = %operation, "mutation refused: modern backend unavailable");
            return Err(CommonError::capability_unavailable(
                operation.to_string(),
                "modern backend unavailable; fallback backends are read-only",
            ));
        }
        Ok(port)
    }

    /// Run a policy on devices. `confirm` must be `true`.
    #[instrument(skip(self, device_ids), fields(devices = device_ids.len()))]
    pub async fn execute_policy(
        &self,
        policy_id: &str,
        device_ids: Vec<String>,
        confirm: bool,
    ) -> CommonResult<MutationReceipt> {
        let request = PolicyExecution::new(policy_id, device_ids, confirm);
        request.validate().map_err(IntoCommonError::into_common)?;

        let port = self.management_port(MutationKind::PolicyExecution).await?;
        let key = BackendKind::Modern.operation_key("execute_policy");
        let request = &request;
        let receipt = self.stack.call(&key, move || port.execute_policy(request)).await?;
        info!(policy_id, accepted = receipt.accepted, "policy execution submitted");
        Ok(receipt)
    }

    /// Deploy a script to devices. `confirm` must be `true`.
    #[instrument(skip(self, device_ids), fields(devices = device_ids.len()))]
    pub async fn deploy_script(
        &self,
        script_id: &str,
        device_ids: Vec<String>,
        confirm: bool,
    ) -> CommonResult<MutationReceipt> {
        self.deploy_script_with(ScriptDeployment::new(script_id, device_ids, confirm)).await
    }

    /// Deploy a script with explicit parameters
    pub async fn deploy_script_with(
        &self,
        request: ScriptDeployment,
    ) -> CommonResult<MutationReceipt> {
        request.validate().map_err(IntoCommonError::into_common)?;

        let port = self.management_port(MutationKind::ScriptDeployment).await?;
        let key = BackendKind::Modern.operation_key("deploy_script");
        let request = &request;
        let receipt = self.stack.call(&key, move || port.deploy_script(request)).await?;
        info!(script_id = %request.script_id, accepted = receipt.accepted, "script deployment submitted");
        Ok(receipt)
    }

    /// Ask a device to report fresh inventory
    #[instrument(skip(self))]
    pub async fn update_inventory(&self, device_id: &str) -> CommonResult<MutationReceipt> {
        let request = InventoryUpdate::new(device_id);
        request.validate().map_err(IntoCommonError::into_common)?;

        let port = self.management_port(MutationKind::InventoryUpdate).await?;
        let key = BackendKind::Modern.operation_key("update_inventory");
        let request = &request;
        self.stack.call(&key, move || port.update_inventory(request)).await
    }

    /// Current detection state without triggering any probe
    pub async fn capability_snapshot(&self) -> CapabilitySnapshot {
        let state = self.capability.lock().await;
        let dataset_cached =
            state.saved_search.as_ref().is_some_and(|search| self.dataset.has(&search.id));
        CapabilitySnapshot {
            modern: state.modern,
            classic: state.classic,
            advanced_search: state.advanced_search,
            active: state.active,
            saved_search: state.saved_search.clone(),
            dataset_cached,
        }
    }

    /// Drop the cached dataset; the next fallback read fetches it again
    pub fn invalidate_dataset(&self) {
        self.dataset.clear();
        debug!("saved-search dataset invalidated");
    }

    /// Forget probe results, the chosen saved search and the dataset
    pub async fn reset(&self) {
        *self.capability.lock().await = CapabilityState::default();
        self.dataset.clear();
        info!("backend detection reset");
    }

    pub fn dataset_stats(&self) -> CacheStats {
        self.dataset.stats()
    }
}

impl<C: Clock> fmt::Debug for BackendSelector<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendSelector")
            .field("ports", &self.ports)
            .field("settings", &self.settings)
            .field("dataset", &self.dataset)
            .finish_non_exhaustive()
    }
}
