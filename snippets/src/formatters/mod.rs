use anyhow::Result;

use crate::runner::{RunSummary, StoryRecord};

pub mod json;
pub mod terminal;

pub use json::JsonFormatter;
pub use terminal::TerminalFormatter;

/// Renders the story catalogue and run results for one output target
pub trait ResultsFormatter {
    fn format_catalogue(&self) -> Result<String>;

    fn format_results(&self, records: &[StoryRecord], summary: &RunSummary) -> Result<String>;
}

pub fn formatter(json: bool, use_colors: bool) -> Box<dyn ResultsFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(TerminalFormatter::new(use_colors))
    }
}
