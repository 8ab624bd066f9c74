use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::info;

use super::{Command, CommandContext};
use crate::formatters::formatter;
use crate::runner::{select_stories, StoryRunner};

/// Command to print the story catalogue
pub struct ListCommand {
    pub json: bool,
}

/// Command to run the selected stories against the live tenant
pub struct RunCommand {
    pub groups: Vec<String>,
    pub stories: Vec<String>,
    pub json: bool,
    pub no_color: bool,
}

#[async_trait]
impl Command for ListCommand {
    async fn execute(&mut self, _context: &CommandContext) -> Result<()> {
        print!("{}", formatter(self.json, true).format_catalogue()?);
        if self.json {
            println!();
        }
        Ok(())
    }
}

#[async_trait]
impl Command for RunCommand {
    async fn execute(&mut self, context: &CommandContext) -> Result<()> {
        // resolve names before touching the network
        let selection = select_stories(&self.groups, &self.stories)?;
        let story_context = context.story_context().await?;

        info!("Running {} stories", selection.len());
        let mut runner = StoryRunner::new(selection);
        let summary = runner.run(&story_context).await;

        let output = formatter(self.json, !self.no_color).format_results(runner.records(), &summary)?;
        print!("{}", output);
        if self.json {
            println!();
        }

        if summary.failed > 0 {
            bail!("{} of {} stories failed", summary.failed, summary.total());
        }
        if summary.not_run > 0 {
            bail!("Run cancelled with {} stories not run", summary.not_run);
        }
        Ok(())
    }
}
