//! Explicit lifecycle controller
//!
//! The process entry point constructs one [`LifecycleController`] and passes
//! it by reference to whatever needs to register teardown work. Managers
//! (components with async init/shutdown) and plain cleanup callbacks share a
//! single registration order; shutdown walks it in reverse.

use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::time::timeout;

use crate::error::{CommonError, CommonResult};

/// Boxed error type returned by manager hooks
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

type CleanupHook = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Lifecycle state of a manager or of the controller itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerStatus {
    Created,
    Initializing,
    Running,
    ShuttingDown,
    Shutdown,
    Error,
}

impl std::fmt::Display for ManagerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Initializing => write!(f, "Initializing"),
            Self::Running => write!(f, "Running"),
            Self::ShuttingDown => write!(f, "Shutting Down"),
            Self::Shutdown => write!(f, "Shutdown"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Component with async initialization and shutdown
#[async_trait::async_trait]
pub trait ManagerLifecycle: Send + Sync {
    async fn initialize(&mut self) -> Result<(), BoxedError>;
    async fn shutdown(&mut self) -> Result<(), BoxedError>;
    fn name(&self) -> &str;
    fn status(&self) -> ManagerStatus;
}

enum Registration {
    Manager(Box<dyn ManagerLifecycle>),
    Cleanup { name: String, hook: Option<CleanupHook> },
}

impl Registration {
    fn name(&self) -> &str {
        match self {
            Self::Manager(manager) => manager.name(),
            Self::Cleanup { name, .. } => name,
        }
    }
}

/// Outcome of [`LifecycleController::shutdown_all`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Steps that finished, in the order they ran
    pub completed: Vec<String>,
    /// Steps that failed or timed out, with the reason
    pub failed: Vec<(String, String)>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Owns the process's teardown sequence
pub struct LifecycleController {
    registrations: Vec<Registration>,
    status: ManagerStatus,
    step_timeout: Duration,
}

impl LifecycleController {
    /// Create a controller that bounds each shutdown step by `step_timeout`
    pub fn new(step_timeout: Duration) -> Self {
        Self { registrations: Vec::new(), status: ManagerStatus::Created, step_timeout }
    }

    /// Add a manager; it is initialized in registration order
    pub fn add_manager<M: ManagerLifecycle + 'static>(&mut self, manager: M) {
        self.registrations.push(Registration::Manager(Box::new(manager)));
    }

    /// Register a callback to run once during shutdown
    pub fn on_shutdown<S, F, Fut>(&mut self, name: S, hook: F)
    where
        S: Into<String>,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let hook: CleanupHook = Box::new(move || hook().boxed());
        self.registrations.push(Registration::Cleanup { name: name.into(), hook: Some(hook) });
    }

    /// Initialize all managers in order
    pub async fn initialize_all(&mut self) -> CommonResult<()> {
        self.status = ManagerStatus::Initializing;

        for registration in &mut self.registrations {
            let Registration::Manager(manager) = registration else {
                continue;
            };
            tracing::info!(manager = manager.name(), "initializing manager");

            if let Err(e) = manager.initialize().await {
                tracing::error!(manager = manager.name(), error = %e, "manager failed to initialize");
                self.status = ManagerStatus::Error;
                return Err(CommonError::internal_with_context(
                    e.to_string(),
                    format!("manager_init_{}", manager.name()),
                ));
            }
        }

        self.status = ManagerStatus::Running;
        Ok(())
    }

    /// Run every shutdown step in reverse registration order.
    ///
    /// A failing or slow step is recorded and the remaining steps still run.
    /// Cleanup callbacks run at most once, so repeated calls are harmless.
    pub async fn shutdown_all(&mut self) -> ShutdownReport {
        if self.status == ManagerStatus::Shutdown {
            return ShutdownReport::default();
        }
        self.status = ManagerStatus::ShuttingDown;
        let step_timeout = self.step_timeout;
        let mut report = ShutdownReport::default();

        for registration in self.registrations.iter_mut().rev() {
            let name = registration.name().to_string();
            tracing::info!(step = %name, "running shutdown step");

            let outcome = match registration {
                Registration::Manager(manager) => {
                    match timeout(step_timeout, manager.shutdown()).await {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(e)) => Err(e.to_string()),
                        Err(_) => Err(format!("timed out after {step_timeout:?}")),
                    }
                }
                Registration::Cleanup { hook, .. } => match hook.take() {
                    Some(hook) => timeout(step_timeout, hook())
                        .await
                        .map_err(|_| format!("timed out after {step_timeout:?}")),
                    None => continue,
                },
            };

            match outcome {
                Ok(()) => report.completed.push(name),
                Err(reason) => {
                    tracing::error!(step = %name, reason = %reason, "shutdown step failed");
                    report.failed.push((name, reason));
                }
            }
        }

        self.status = ManagerStatus::Shutdown;
        report
    }

    /// Get controller status
    pub fn status(&self) -> ManagerStatus {
        self.status
    }

    /// Get status of all managers
    pub fn manager_statuses(&self) -> Vec<(String, ManagerStatus)> {
        self.registrations
            .iter()
            .filter_map(|registration| match registration {
                Registration::Manager(manager) => {
                    Some((manager.name().to_string(), manager.status()))
                }
                Registration::Cleanup { .. } => None,
            })
            .collect()
    }

    /// Number of registered managers and callbacks
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

impl Default for LifecycleController {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("status", &self.status)
            .field(
                "steps",
                &self.registrations.iter().map(Registration::name).collect::<Vec<_>>(),
            )
            .finish()
    }
}
