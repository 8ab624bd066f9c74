use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::info;

use super::{Command, CommandContext};

/// Command to sign in interactively and cache the tokens
pub struct SignInCommand;

/// Command to forget every cached token
pub struct SignOutCommand;

#[async_trait]
impl Command for SignInCommand {
    async fn execute(&mut self, context: &CommandContext) -> Result<()> {
        let config = context.load_config().await?;
        if config.auth.client_id.is_empty() {
            println!("❌ No client id configured!");
            println!("Register an application in Azure AD and either:");
            println!("  - set client_id under [auth] in the config file, or");
            println!("  - export O365_CLIENT_ID");
            return Ok(());
        }

        let session = context.session(&config).await?;
        info!("Signing in against {}", config.auth.common_authority);

        let auth = session.auth();
        match auth.get_token(&config.auth.discovery_resource_id).await? {
            Some(_) => {
                let user = auth.user_email().unwrap_or_else(|| "unknown user".to_string());
                println!("✅ Signed in as {}", user);
                if let Some(authority) = auth.last_authority() {
                    println!("   Authority: {}", authority);
                }
                Ok(())
            }
            None => bail!("Sign-in was cancelled"),
        }
    }
}

#[async_trait]
impl Command for SignOutCommand {
    async fn execute(&mut self, context: &CommandContext) -> Result<()> {
        let config = context.load_config().await?;
        let session = context.session(&config).await?;

        session.sign_out().await?;
        println!("✅ Signed out, cached tokens removed");
        Ok(())
    }
}
