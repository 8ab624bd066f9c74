use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::TokenProvider;
use crate::errors::{OpError, OpResult};
use crate::http_utils::{handle_api_response, parse_json_response};

/// Where a capability ("Calendar", "Contacts", "Mail", "MyFiles") lives
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityDiscoveryResult {
    pub capability: String,
    pub service_endpoint_uri: String,
    pub service_resource_id: String,
}

#[derive(Debug, Deserialize)]
struct DiscoveryResponse {
    value: Vec<CapabilityDiscoveryResult>,
}

#[async_trait]
pub trait ServiceDiscovery: Send + Sync {
    async fn discover_capability(&self, capability: &str) -> OpResult<CapabilityDiscoveryResult>;
}

/// Office 365 discovery service client
pub struct DiscoveryClient {
    endpoint: String,
    resource_id: String,
    auth: Arc<dyn TokenProvider>,
    http_client: reqwest::Client,
}

impl DiscoveryClient {
    pub fn new(
        endpoint: String,
        resource_id: String,
        auth: Arc<dyn TokenProvider>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            endpoint,
            resource_id,
            auth,
            http_client,
        }
    }
}

#[async_trait]
impl ServiceDiscovery for DiscoveryClient {
    async fn discover_capability(&self, capability: &str) -> OpResult<CapabilityDiscoveryResult> {
        let token = self
            .auth
            .get_token(&self.resource_id)
            .await?
            .ok_or(OpError::SignInCancelled)?;

        let url = format!("{}/services", self.endpoint.trim_end_matches('/'));
        debug!("Discovering capability {} at {}", capability, url);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await?;
        let response = handle_api_response(response, "Discovery").await?;
        let services: DiscoveryResponse = parse_json_response(response, "discovery response").await?;

        let result = find_capability(services.value, capability)?;
        info!("Discovered {} at {}", capability, result.service_endpoint_uri);
        Ok(result)
    }
}

fn find_capability(services: Vec<CapabilityDiscoveryResult>, capability: &str) -> OpResult<CapabilityDiscoveryResult> {
    services
        .into_iter()
        .find(|service| service.capability.eq_ignore_ascii_case(capability))
        .ok_or_else(|| OpError::not_found(format!("capability {}", capability)))
}
