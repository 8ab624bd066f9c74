use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::TokenProvider;
use crate::config::DirectoryConfig;
use crate::discovery::ServiceDiscovery;
use crate::errors::{OpError, OpResult, SentinelExt};
use crate::http_utils::{handle_api_response, parse_json_response};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceDomain {
    Calendar,
    Contacts,
    Mail,
    Files,
    Directory,
}

impl ServiceDomain {
    /// Capability name the discovery service knows this domain by
    pub fn capability(&self) -> Option<&'static str> {
        match self {
            ServiceDomain::Calendar => Some("Calendar"),
            ServiceDomain::Contacts => Some("Contacts"),
            ServiceDomain::Mail => Some("Mail"),
            ServiceDomain::Files => Some("MyFiles"),
            ServiceDomain::Directory => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServiceDomain::Calendar => "Calendar",
            ServiceDomain::Contacts => "Contacts",
            ServiceDomain::Mail => "Mail",
            ServiceDomain::Files => "Files",
            ServiceDomain::Directory => "Directory",
        }
    }
}

impl fmt::Display for ServiceDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Bytes(Vec<u8>),
}

/// Authenticated connection to one service root.
///
/// Every request asks the token provider for a bearer token, so an expired
/// token is refreshed transparently.
pub struct ServiceClient {
    domain: ServiceDomain,
    endpoint: String,
    resource_id: String,
    default_query: Vec<(String, String)>,
    auth: Arc<dyn TokenProvider>,
    http_client: reqwest::Client,
}

impl ServiceClient {
    pub fn new(
        domain: ServiceDomain,
        endpoint: String,
        resource_id: String,
        auth: Arc<dyn TokenProvider>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            domain,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            resource_id,
            default_query: Vec::new(),
            auth,
            http_client,
        }
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.default_query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    async fn token(&self) -> OpResult<String> {
        match self.auth.get_token(&self.resource_id).await? {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(OpError::SignInCancelled),
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: RequestBody,
    ) -> OpResult<reqwest::Response> {
        let token = self.token().await?;
        let url = self.url(path);
        debug!("{} {} {}", self.domain, method, url);

        let mut request = self
            .http_client
            .request(method, &url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&self.default_query)
            .query(query);

        request = match body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.json(&value),
            RequestBody::Bytes(bytes) => request
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(bytes),
        };

        let response = request.send().await?;
        handle_api_response(response, self.domain.name()).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> OpResult<T> {
        self.get_json_with_query(path, &[]).await
    }

    pub async fn get_json_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> OpResult<T> {
        let response = self.send(Method::GET, path, query, RequestBody::Empty).await?;
        parse_json_response(response, path).await
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> OpResult<T> {
        let response = self
            .send(Method::POST, path, &[], RequestBody::Json(serde_json::to_value(body)?))
            .await?;
        parse_json_response(response, path).await
    }

    /// POST for actions that answer with an empty 202/204
    pub async fn post_action<B: Serialize>(&self, path: &str, body: &B) -> OpResult<()> {
        self.send(Method::POST, path, &[], RequestBody::Json(serde_json::to_value(body)?))
            .await?;
        Ok(())
    }

    pub async fn patch_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> OpResult<T> {
        let response = self
            .send(Method::PATCH, path, &[], RequestBody::Json(serde_json::to_value(body)?))
            .await?;
        parse_json_response(response, path).await
    }

    pub async fn delete(&self, path: &str) -> OpResult<()> {
        self.send(Method::DELETE, path, &[], RequestBody::Empty).await?;
        Ok(())
    }

    pub async fn post_bytes(&self, path: &str, bytes: Vec<u8>) -> OpResult<()> {
        self.send(Method::POST, path, &[], RequestBody::Bytes(bytes)).await?;
        Ok(())
    }

    pub async fn get_bytes(&self, path: &str) -> OpResult<Vec<u8>> {
        let response = self.send(Method::GET, path, &[], RequestBody::Empty).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Long-lived holder of one client handle per service domain.
///
/// Handles are built lazily and reused until [`Session::invalidate`] or
/// [`Session::invalidate_all`] drops them, or the token provider forgets its
/// last authority. Building is serialized, so concurrent callers never race
/// to create duplicate handles.
pub struct Session {
    auth: Arc<dyn TokenProvider>,
    discovery: Arc<dyn ServiceDiscovery>,
    directory: DirectoryConfig,
    http_client: reqwest::Client,
    clients: Mutex<HashMap<ServiceDomain, Arc<ServiceClient>>>,
}

impl Session {
    pub fn new(
        auth: Arc<dyn TokenProvider>,
        discovery: Arc<dyn ServiceDiscovery>,
        directory: DirectoryConfig,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            auth,
            discovery,
            directory,
            http_client,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn auth(&self) -> &Arc<dyn TokenProvider> {
        &self.auth
    }

    /// Client handle for `domain`, or `None` when sign-in was cancelled or
    /// the service could not be reached.
    pub async fn client(&self, domain: ServiceDomain) -> Option<Arc<ServiceClient>> {
        let result = self.try_client(domain).await;
        match &result {
            Ok(_) => {}
            Err(OpError::SignInCancelled) => info!("Sign-in cancelled, no {} client", domain),
            Err(e) => warn!("Could not get a {} client: {}", domain, e),
        }
        result.ok_or_sentinel()
    }

    pub async fn try_client(&self, domain: ServiceDomain) -> OpResult<Arc<ServiceClient>> {
        let mut clients = self.clients.lock().await;

        if let Some(client) = clients.get(&domain) {
            // the directory handle is tenant-bound and never re-resolved
            if domain == ServiceDomain::Directory || self.auth.last_authority().is_some() {
                debug!("Got a cached client for {}", domain);
                return Ok(client.clone());
            }
        }

        match self.build_client(domain).await {
            Ok(client) => {
                info!("Got a client for {}", domain);
                clients.insert(domain, client.clone());
                Ok(client)
            }
            Err(OpError::SignInCancelled) => Err(OpError::SignInCancelled),
            Err(e) => {
                self.auth.clear_cache().await;
                Err(e)
            }
        }
    }

    async fn build_client(&self, domain: ServiceDomain) -> OpResult<Arc<ServiceClient>> {
        let authority = self
            .auth
            .last_authority()
            .unwrap_or_else(|| self.auth.common_authority());
        debug!("Building {} client against authority {}", domain, authority);

        let client = match domain.capability() {
            Some(capability) => {
                let result = self.discovery.discover_capability(capability).await?;
                self.require_token(&result.service_resource_id).await?;
                ServiceClient::new(
                    domain,
                    result.service_endpoint_uri,
                    result.service_resource_id,
                    self.auth.clone(),
                    self.http_client.clone(),
                )
            }
            None => {
                let resource_id = self.directory.resource_id.clone();
                self.require_token(&resource_id).await?;
                let tenant_id = self
                    .auth
                    .tenant_id()
                    .ok_or_else(|| OpError::config("Tenant id unknown after sign-in"))?;
                let endpoint = format!("{}/{}", self.directory.endpoint.trim_end_matches('/'), tenant_id);
                ServiceClient::new(domain, endpoint, resource_id, self.auth.clone(), self.http_client.clone())
                    .with_query("api-version", &self.directory.api_version)
            }
        };

        Ok(Arc::new(client))
    }

    async fn require_token(&self, resource_id: &str) -> OpResult<()> {
        match self.auth.get_token(resource_id).await? {
            Some(token) if !token.is_empty() => Ok(()),
            _ => Err(OpError::SignInCancelled),
        }
    }

    pub async fn invalidate(&self, domain: ServiceDomain) {
        if self.clients.lock().await.remove(&domain).is_some() {
            debug!("Dropped cached {} client", domain);
        }
    }

    pub async fn invalidate_all(&self) {
        self.clients.lock().await.clear();
        debug!("Dropped all cached clients");
    }

    pub async fn sign_out(&self) -> OpResult<()> {
        self.invalidate_all().await;
        self.auth.sign_out().await
    }
}
