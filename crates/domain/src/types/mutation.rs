//! Mutating operation requests and receipts
//!
//! Mutations are only ever served by the modern backend. Requests validate
//! their own preconditions (explicit confirmation, non-empty targets) so the
//! check happens before any breaker or retry is involved.

use serde::{Deserialize, Serialize};

use crate::errors::{DomainError, Result};
use crate::impl_domain_enum_conversions;

/// Kinds of state-changing operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    PolicyExecution,
    ScriptDeployment,
    InventoryUpdate,
}

impl_domain_enum_conversions!(MutationKind {
    PolicyExecution => "execute_policy",
    ScriptDeployment => "deploy_script",
    InventoryUpdate => "update_inventory",
});

/// Run a policy on a set of devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyExecution {
    pub policy_id: String,
    pub device_ids: Vec<String>,
    /// Must be `true`; guards against accidental fleet-wide changes
    pub confirm: bool,
}

impl PolicyExecution {
    pub fn new(policy_id: impl Into<String>, device_ids: Vec<String>, confirm: bool) -> Self {
        Self { policy_id: policy_id.into(), device_ids, confirm }
    }

    pub fn validate(&self) -> Result<()> {
        validate_targeted("policy_id", &self.policy_id, &self.device_ids, self.confirm)
    }
}

/// Deploy a script to a set of devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptDeployment {
    pub script_id: String,
    pub device_ids: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<String>,
    pub confirm: bool,
}

impl ScriptDeployment {
    pub fn new(script_id: impl Into<String>, device_ids: Vec<String>, confirm: bool) -> Self {
        Self { script_id: script_id.into(), device_ids, parameters: Vec::new(), confirm }
    }

    pub fn with_parameters(mut self, parameters: Vec<String>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_targeted("script_id", &self.script_id, &self.device_ids, self.confirm)
    }
}

/// Ask a device to submit fresh inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryUpdate {
    pub device_id: String,
}

impl InventoryUpdate {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self { device_id: device_id.into() }
    }

    pub fn validate(&self) -> Result<()> {
        require_id("device_id", &self.device_id)
    }
}

/// Backend acknowledgement of a mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationReceipt {
    pub kind: MutationKind,
    /// Policy, script or device the mutation targeted
    pub target_id: String,
    pub device_ids: Vec<String>,
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MutationReceipt {
    pub fn accepted(kind: MutationKind, target_id: impl Into<String>, device_ids: Vec<String>) -> Self {
        Self { kind, target_id: target_id.into(), device_ids, accepted: true, message: None }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

fn require_id(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DomainError::invalid_input(field, "must not be empty"));
    }
    Ok(())
}

fn validate_targeted(id_field: &str, id: &str, device_ids: &[String], confirm: bool) -> Result<()> {
    require_id(id_field, id)?;
    if device_ids.is_empty() {
        return Err(DomainError::invalid_input("device_ids", "at least one device is required"));
    }
    if let Some(blank) = device_ids.iter().position(|d| d.trim().is_empty()) {
        return Err(DomainError::invalid_input(
            "device_ids",
            format!("entry {blank} is empty"),
        ));
    }
    if !confirm {
        return Err(DomainError::invalid_input(
            "confirm",
            "must be true to run a state-changing operation",
        ));
    }
    Ok(())
}
