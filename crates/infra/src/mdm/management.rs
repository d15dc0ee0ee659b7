//! Adapter for state-changing calls on the modern API.

use async_trait::async_trait;
use mdmlink_common::error::CommonResult;
use mdmlink_core::ManagementBackend;
use mdmlink_domain::{
    EndpointPaths, InventoryUpdate, MutationKind, MutationReceipt, PolicyExecution,
    ScriptDeployment,
};
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::http::HttpClient;

#[derive(Debug, Clone)]
pub struct ManagementClient {
    http: HttpClient,
    endpoints: EndpointPaths,
}

impl ManagementClient {
    pub fn new(http: HttpClient, endpoints: EndpointPaths) -> Self {
        Self { http, endpoints }
    }

    async fn submit(
        &self,
        template: &str,
        target_id: &str,
        body: &Value,
        receipt: MutationReceipt,
    ) -> CommonResult<MutationReceipt> {
        let url = self.http.endpoint(template, &[("{id}", target_id)])?;
        let response = self.http.post_json(url, body).await?;
        info!(kind = %receipt.kind, target_id, "mutation accepted");
        Ok(match response.get("message").and_then(Value::as_str) {
            Some(message) => receipt.with_message(message),
            None => receipt,
        })
    }
}

#[async_trait]
impl ManagementBackend for ManagementClient {
    #[instrument(skip_all, fields(policy_id = %request.policy_id))]
    async fn execute_policy(&self, request: &PolicyExecution) -> CommonResult<MutationReceipt> {
        let receipt = MutationReceipt::accepted(
            MutationKind::PolicyExecution,
            &request.policy_id,
            request.device_ids.clone(),
        );
        let body = json!({ "deviceIds": request.device_ids });
        self.submit(&self.endpoints.policy_execute, &request.policy_id, &body, receipt).await
    }

    #[instrument(skip_all, fields(script_id = %request.script_id))]
    async fn deploy_script(&self, request: &ScriptDeployment) -> CommonResult<MutationReceipt> {
        let receipt = MutationReceipt::accepted(
            MutationKind::ScriptDeployment,
            &request.script_id,
            request.device_ids.clone(),
        );
        let body = json!({ "deviceIds": request.device_ids, "parameters": request.parameters });
        self.submit(&self.endpoints.script_deploy, &request.script_id, &body, receipt).await
    }

    #[instrument(skip_all, fields(device_id = %request.device_id))]
    async fn update_inventory(&self, request: &InventoryUpdate) -> CommonResult<MutationReceipt> {
        let receipt = MutationReceipt::accepted(
            MutationKind::InventoryUpdate,
            &request.device_id,
            vec![request.device_id.clone()],
        );
        self.submit(&self.endpoints.inventory_update, &request.device_id, &json!({}), receipt)
            .await
    }
}
