use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use oauth2::{
    basic::BasicClient,
    reqwest::async_http_client,
    AuthType, AuthUrl, ClientId, DeviceAuthorizationUrl, DeviceCodeErrorResponseType,
    RefreshToken, RequestTokenError, StandardDeviceAuthorizationResponse, TokenResponse, TokenUrl,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::AuthConfig;
use crate::errors::{OpError, OpResult};

/// Identity collaborator every service client draws its bearer tokens from.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Bearer token for `resource_id`. `Ok(None)` means the user cancelled
    /// sign-in, which is an expected outcome and not an error.
    async fn get_token(&self, resource_id: &str) -> OpResult<Option<String>>;

    /// Authority used by the last successful sign-in
    fn last_authority(&self) -> Option<String>;

    fn common_authority(&self) -> String;

    fn tenant_id(&self) -> Option<String>;

    /// Mailbox of the signed-in user
    fn user_email(&self) -> Option<String>;

    /// Drop every cached token but keep the remembered authority
    async fn clear_cache(&self);

    async fn sign_out(&self) -> OpResult<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredToken {
    /// Usable for at least another five minutes
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + Duration::minutes(5) < expires_at,
            None => true,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct AuthState {
    last_authority: Option<String>,
    tenant_id: Option<String>,
    user_email: Option<String>,
    tokens: HashMap<String, StoredToken>,
}

#[derive(Debug, Default, Deserialize)]
struct TokenClaims {
    tid: Option<String>,
    upn: Option<String>,
    unique_name: Option<String>,
}

/// Azure AD authenticator using the device authorization grant.
///
/// Tokens are cached per resource in a JSON file and refreshed with the
/// multi-resource refresh token Azure AD hands out.
pub struct AadAuthenticator {
    client_id: String,
    common_authority: String,
    cache_path: PathBuf,
    state: RwLock<AuthState>,
}

impl AadAuthenticator {
    pub fn new(config: &AuthConfig, cache_path: PathBuf) -> Self {
        Self {
            client_id: config.client_id.clone(),
            common_authority: config.common_authority.trim_end_matches('/').to_string(),
            cache_path,
            state: RwLock::new(AuthState::default()),
        }
    }

    /// Build an authenticator and restore any token cache left on disk
    pub async fn load(config: &AuthConfig, cache_path: PathBuf) -> OpResult<Self> {
        let authenticator = Self::new(config, cache_path);

        if authenticator.cache_path.exists() {
            let data = fs::read_to_string(&authenticator.cache_path).await?;
            match serde_json::from_str::<AuthState>(&data) {
                Ok(state) => {
                    debug!("Restored {} cached tokens from {:?}", state.tokens.len(), authenticator.cache_path);
                    *authenticator.state.write() = state;
                }
                Err(e) => warn!("Ignoring unreadable token cache {:?}: {}", authenticator.cache_path, e),
            }
        }

        Ok(authenticator)
    }

    fn authority(&self) -> String {
        self.last_authority().unwrap_or_else(|| self.common_authority.clone())
    }

    /// Login host without the tenant segment, e.g. `https://login.microsoftonline.com`
    fn login_host(&self) -> &str {
        self.common_authority
            .rsplit_once('/')
            .map(|(host, _)| host)
            .unwrap_or(&self.common_authority)
    }

    fn oauth_client(&self, authority: &str) -> OpResult<BasicClient> {
        if self.client_id.is_empty() {
            return Err(OpError::config("No client id configured; set auth.client_id or O365_CLIENT_ID"));
        }

        let auth_url = AuthUrl::new(format!("{}/oauth2/authorize", authority))
            .map_err(|e| OpError::config(format!("Invalid authority {}: {}", authority, e)))?;
        let token_url = TokenUrl::new(format!("{}/oauth2/token", authority))
            .map_err(|e| OpError::config(format!("Invalid authority {}: {}", authority, e)))?;
        let device_url = DeviceAuthorizationUrl::new(format!("{}/oauth2/devicecode", authority))
            .map_err(|e| OpError::config(format!("Invalid authority {}: {}", authority, e)))?;

        Ok(BasicClient::new(ClientId::new(self.client_id.clone()), None, auth_url, Some(token_url))
            .set_auth_type(AuthType::RequestBody)
            .set_device_authorization_url(device_url))
    }

    fn cached_token(&self, resource_id: &str) -> Option<StoredToken> {
        self.state.read().tokens.get(resource_id).cloned()
    }

    /// Any refresh token works for every resource in the tenant
    fn any_refresh_token(&self) -> Option<String> {
        self.state
            .read()
            .tokens
            .values()
            .find_map(|token| token.refresh_token.clone())
    }

    async fn refresh(&self, client: &BasicClient, refresh_token: String, resource_id: &str) -> OpResult<StoredToken> {
        let result = client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
            .add_extra_param("resource", resource_id)
            .request_async(async_http_client)
            .await
            .map_err(|e| OpError::unauthorized("Azure AD", format!("Failed to refresh token: {}", e)))?;

        Ok(StoredToken {
            access_token: result.access_token().secret().clone(),
            refresh_token: result
                .refresh_token()
                .map(|token| token.secret().clone())
                .or(Some(refresh_token)),
            expires_at: result
                .expires_in()
                .map(|d| Utc::now() + Duration::seconds(d.as_secs() as i64)),
        })
    }

    async fn sign_in_interactively(&self, client: &BasicClient, resource_id: &str) -> OpResult<Option<StoredToken>> {
        let details: StandardDeviceAuthorizationResponse = client
            .exchange_device_code()
            .map_err(|e| OpError::config(format!("Device authorization unavailable: {}", e)))?
            .add_extra_param("resource", resource_id)
            .request_async(async_http_client)
            .await
            .map_err(|e| OpError::unauthorized("Azure AD", format!("Device code request failed: {}", e)))?;

        // stderr keeps stdout clean for machine-readable output
        eprintln!(
            "🔐 To sign in, open {} and enter the code {}",
            details.verification_uri().as_str(),
            details.user_code().secret()
        );

        let result = client
            .exchange_device_access_token(&details)
            .request_async(async_http_client, tokio::time::sleep, None)
            .await;

        match result {
            Ok(token) => Ok(Some(StoredToken {
                access_token: token.access_token().secret().clone(),
                refresh_token: token.refresh_token().map(|t| t.secret().clone()),
                expires_at: token
                    .expires_in()
                    .map(|d| Utc::now() + Duration::seconds(d.as_secs() as i64)),
            })),
            Err(RequestTokenError::ServerResponse(response))
                if matches!(
                    response.error(),
                    DeviceCodeErrorResponseType::AccessDenied | DeviceCodeErrorResponseType::ExpiredToken
                ) =>
            {
                info!("Interactive sign-in was declined or expired");
                Ok(None)
            }
            Err(e) => Err(OpError::unauthorized("Azure AD", format!("Sign-in failed: {}", e))),
        }
    }

    /// Record a fresh token and learn the tenant from its claims
    async fn remember(&self, resource_id: &str, token: StoredToken) -> OpResult<()> {
        let claims = decode_claims(&token.access_token).unwrap_or_default();
        {
            let mut state = self.state.write();
            if let Some(tid) = claims.tid {
                state.last_authority = Some(format!("{}/{}", self.login_host(), tid));
                state.tenant_id = Some(tid);
            }
            if let Some(email) = claims.upn.or(claims.unique_name) {
                state.user_email = Some(email);
            }
            state.tokens.insert(resource_id.to_string(), token);
        }
        self.persist().await
    }

    async fn persist(&self) -> OpResult<()> {
        let data = {
            let state = self.state.read();
            serde_json::to_string_pretty(&*state)?
        };

        if let Some(parent) = self.cache_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.cache_path, data).await?;
        debug!("Stored token cache to {:?}", self.cache_path);
        Ok(())
    }
}

#[async_trait]
impl TokenProvider for AadAuthenticator {
    async fn get_token(&self, resource_id: &str) -> OpResult<Option<String>> {
        if let Some(token) = self.cached_token(resource_id) {
            if token.is_fresh(Utc::now()) {
                return Ok(Some(token.access_token));
            }
        }

        let authority = self.authority();
        let client = self.oauth_client(&authority)?;

        if let Some(refresh_token) = self.any_refresh_token() {
            match self.refresh(&client, refresh_token, resource_id).await {
                Ok(token) => {
                    debug!("Refreshed token for {}", resource_id);
                    let access_token = token.access_token.clone();
                    self.remember(resource_id, token).await?;
                    return Ok(Some(access_token));
                }
                Err(e) => warn!("Token refresh for {} failed, signing in again: {}", resource_id, e),
            }
        }

        match self.sign_in_interactively(&client, resource_id).await? {
            Some(token) => {
                let access_token = token.access_token.clone();
                self.remember(resource_id, token).await?;
                info!("Signed in for {}", resource_id);
                Ok(Some(access_token))
            }
            None => Ok(None),
        }
    }

    fn last_authority(&self) -> Option<String> {
        self.state
            .read()
            .last_authority
            .clone()
            .filter(|authority| !authority.is_empty())
    }

    fn common_authority(&self) -> String {
        self.common_authority.clone()
    }

    fn tenant_id(&self) -> Option<String> {
        self.state.read().tenant_id.clone()
    }

    fn user_email(&self) -> Option<String> {
        self.state.read().user_email.clone()
    }

    async fn clear_cache(&self) {
        self.state.write().tokens.clear();
        if let Err(e) = self.persist().await {
            warn!("Failed to persist cleared token cache: {}", e);
        }
    }

    async fn sign_out(&self) -> OpResult<()> {
        *self.state.write() = AuthState::default();
        if self.cache_path.exists() {
            fs::remove_file(&self.cache_path).await?;
        }
        info!("Signed out");
        Ok(())
    }
}

/// Read the payload of a JWT without verifying it
fn decode_claims(access_token: &str) -> Option<TokenClaims> {
    let payload = access_token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}
