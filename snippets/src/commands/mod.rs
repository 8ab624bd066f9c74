use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::auth::AadAuthenticator;
use crate::config::Config;
use crate::discovery::DiscoveryClient;
use crate::operations::{GraphDirectory, MyFiles, OutlookCalendar, OutlookContacts, OutlookMail};
use crate::poll::CancelSignal;
use crate::session::Session;
use crate::stories::{StoryContext, StoryIdentifiers};

pub mod auth;
pub mod stories;

/// Trait for all command implementations
#[async_trait]
pub trait Command {
    /// Execute the command with the provided context
    async fn execute(&mut self, context: &CommandContext) -> Result<()>;
}

/// Shared context for all commands. Configuration and the live session are
/// only built for commands that need them.
pub struct CommandContext {
    pub config_path: Option<PathBuf>,
    pub cancel: CancelSignal,
}

impl CommandContext {
    pub fn new(config_path: Option<PathBuf>, cancel: CancelSignal) -> Self {
        Self { config_path, cancel }
    }

    pub async fn load_config(&self) -> Result<Config> {
        Config::load(self.config_path.as_deref())
            .await
            .context("Failed to load application configuration")
    }

    /// Authenticator and session wired to the configured tenant
    pub async fn session(&self, config: &Config) -> Result<Arc<Session>> {
        let http_client = reqwest::Client::builder()
            .timeout(config.get_http_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        let cache_path = Config::get_token_cache_path()?;
        let auth = Arc::new(
            AadAuthenticator::load(&config.auth, cache_path.clone())
                .await
                .with_context(|| format!("Failed to load token cache at {:?}", cache_path))?,
        );

        let discovery = Arc::new(DiscoveryClient::new(
            config.auth.discovery_endpoint.clone(),
            config.auth.discovery_resource_id.clone(),
            auth.clone(),
            http_client.clone(),
        ));

        debug!("Session ready, discovery at {}", config.auth.discovery_endpoint);
        Ok(Arc::new(Session::new(
            auth,
            discovery,
            config.directory.clone(),
            http_client,
        )))
    }

    pub async fn story_context(&self) -> Result<StoryContext> {
        let config = self.load_config().await?;
        let session = self.session(&config).await?;
        let timezone = config.get_timezone();

        Ok(StoryContext {
            calendar: Arc::new(OutlookCalendar::new(session.clone(), timezone)),
            contacts: Arc::new(OutlookContacts::new(session.clone())),
            mail: Arc::new(OutlookMail::new(session.clone())),
            files: Arc::new(MyFiles::new(session.clone())),
            directory: Arc::new(GraphDirectory::new(session.clone())),
            session,
            identifiers: StoryIdentifiers::generate(),
            poll_policy: config.poll_policy(),
            cancel: self.cancel.clone(),
            timezone,
            recipient: config.general.recipient_email.clone(),
        })
    }
}
