use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::Page;
use crate::errors::{OpError, OpResult};
use crate::session::{ServiceDomain, Session};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub object_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub user_principal_name: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantDetail {
    pub object_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub object_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mail_enabled: Option<bool>,
}

#[async_trait]
pub trait DirectoryOperations: Send + Sync {
    async fn list_users(&self) -> OpResult<Vec<User>>;

    /// First entry of the tenant details collection
    async fn tenant_details(&self) -> OpResult<TenantDetail>;

    async fn list_groups(&self) -> OpResult<Vec<Group>>;
}

/// Users and groups through the Azure AD Graph
pub struct GraphDirectory {
    session: Arc<Session>,
}

impl GraphDirectory {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl DirectoryOperations for GraphDirectory {
    async fn list_users(&self) -> OpResult<Vec<User>> {
        let client = self.session.try_client(ServiceDomain::Directory).await?;
        let page: Page<User> = client.get_json("users").await?;

        debug!("Got {} users", page.value.len());
        Ok(page.value)
    }

    async fn tenant_details(&self) -> OpResult<TenantDetail> {
        let client = self.session.try_client(ServiceDomain::Directory).await?;
        let page: Page<TenantDetail> = client.get_json("tenantDetails").await?;

        let tenant = page
            .value
            .into_iter()
            .next()
            .ok_or_else(|| OpError::not_found("tenant details"))?;
        debug!("Got tenant: {}", tenant.object_id);
        Ok(tenant)
    }

    async fn list_groups(&self) -> OpResult<Vec<Group>> {
        let client = self.session.try_client(ServiceDomain::Directory).await?;
        let page: Page<Group> = client.get_json("groups").await?;

        debug!("Got {} groups", page.value.len());
        Ok(page.value)
    }
}
