//! Process wiring: configuration to adapters, resilience stack, selector
//! and lifecycle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mdmlink_common::error::{CommonResult, ErrorKind};
use mdmlink_common::lifecycle::{
    BoxedError, LifecycleController, ManagerLifecycle, ManagerStatus, ShutdownReport,
};
use mdmlink_core::{BackendPorts, BackendSelector, IntoCommonError, ResilienceStack};
use mdmlink_domain::{CapabilitySnapshot, Config};
use tracing::{info, warn};

use crate::{config, mdm};

/// Upper bound for each shutdown step
pub const SHUTDOWN_STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Fully wired client runtime.
///
/// Owns the selector shared by callers and the lifecycle controller that
/// warms backend detection on start and tears state down on shutdown.
pub struct MdmRuntime {
    config: Config,
    selector: Arc<BackendSelector>,
    lifecycle: LifecycleController,
}

impl MdmRuntime {
    /// Load configuration (see [`config::load`]) and bootstrap.
    pub fn from_env() -> CommonResult<Self> {
        Self::bootstrap(config::load()?)
    }

    /// Build REST adapters from `config.transport` and wire the runtime.
    pub fn bootstrap(config: Config) -> CommonResult<Self> {
        let ports = mdm::ports_from_settings(&config.transport)?;
        Self::with_ports(config, ports)
    }

    /// Wire the runtime over caller-supplied ports
    pub fn with_ports(config: Config, ports: BackendPorts) -> CommonResult<Self> {
        config.validate().map_err(IntoCommonError::into_common)?;

        let stack = Arc::new(ResilienceStack::from_config(&config)?);
        let selector = Arc::new(BackendSelector::new(ports, stack, config.backend.clone())?);

        let mut lifecycle = LifecycleController::new(SHUTDOWN_STEP_TIMEOUT);
        lifecycle.add_manager(SelectorManager::new(Arc::clone(&selector)));

        let stats_source = Arc::clone(&selector);
        lifecycle.on_shutdown("resilience-stats", move || async move {
            let limiter = stats_source.stack().limiter().stats();
            let dataset = stats_source.dataset_stats();
            info!(
                completed = limiter.completed,
                peak_running = limiter.peak_running,
                dataset_hits = dataset.hits,
                dataset_misses = dataset.misses,
                "final resilience statistics"
            );
        });

        Ok(Self { config, selector, lifecycle })
    }

    /// Initialize managers and report detected capabilities.
    pub async fn start(&mut self) -> CommonResult<CapabilitySnapshot> {
        self.lifecycle.initialize_all().await?;
        Ok(self.selector.capability_snapshot().await)
    }

    /// Tear down in reverse registration order; repeated calls are no-ops.
    pub async fn shutdown(&mut self) -> ShutdownReport {
        let report = self.lifecycle.shutdown_all().await;
        if !report.is_clean() {
            warn!(failed = report.failed.len(), "runtime shutdown finished with failures");
        }
        report
    }

    pub fn selector(&self) -> &Arc<BackendSelector> {
        &self.selector
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn status(&self) -> ManagerStatus {
        self.lifecycle.status()
    }
}

impl std::fmt::Debug for MdmRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MdmRuntime")
            .field("selector", &self.selector)
            .field("status", &self.lifecycle.status())
            .finish_non_exhaustive()
    }
}

/// Warms backend detection on start; forgets detection state and breaker
/// history on shutdown.
struct SelectorManager {
    selector: Arc<BackendSelector>,
    status: ManagerStatus,
}

impl SelectorManager {
    fn new(selector: Arc<BackendSelector>) -> Self {
        Self { selector, status: ManagerStatus::Created }
    }
}

#[async_trait]
impl ManagerLifecycle for SelectorManager {
    async fn initialize(&mut self) -> Result<(), BoxedError> {
        self.status = ManagerStatus::Initializing;
        match self.selector.active_backend().await {
            Ok(kind) => info!(backend = %kind, "backend detected"),
            // Bad credentials fail every surface alike
            Err(err) if err.kind() == ErrorKind::Authentication => {
                self.status = ManagerStatus::Error;
                return Err(Box::new(err));
            }
            Err(err) => warn!(error = %err, "backend detection deferred to first call"),
        }
        self.status = ManagerStatus::Running;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), BoxedError> {
        self.status = ManagerStatus::ShuttingDown;
        self.selector.reset().await;
        self.selector.stack().breakers().reset(None);
        self.status = ManagerStatus::Shutdown;
        Ok(())
    }

    fn name(&self) -> &str {
        "backend-selector"
    }

    fn status(&self) -> ManagerStatus {
        self.status
    }
}
