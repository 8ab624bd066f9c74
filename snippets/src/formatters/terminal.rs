use anyhow::Result;

use super::ResultsFormatter;
use crate::runner::{RunSummary, StoryOutcome, StoryRecord};
use crate::stories::StoryGroup;

/// Terminal formatter for CLI output with color support
pub struct TerminalFormatter {
    pub use_colors: bool,
}

impl TerminalFormatter {
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.use_colors {
            match color {
                "red" => format!("\x1b[31m{}\x1b[0m", text),
                "gray" => format!("\x1b[90m{}\x1b[0m", text),
                "green" => format!("\x1b[32m{}\x1b[0m", text),
                "bold" => format!("\x1b[1m{}\x1b[0m", text),
                _ => text.to_string(),
            }
        } else {
            text.to_string()
        }
    }

    fn outcome_color(outcome: StoryOutcome) -> &'static str {
        match outcome {
            StoryOutcome::NotRun => "gray",
            StoryOutcome::Passed => "green",
            StoryOutcome::Failed => "red",
        }
    }
}

impl ResultsFormatter for TerminalFormatter {
    fn format_catalogue(&self) -> Result<String> {
        let mut output = String::new();

        for group in StoryGroup::ALL {
            output.push_str(&self.colorize(group.name(), "bold"));
            output.push('\n');
            for story in group.stories() {
                output.push_str(&format!("  {}\n", story.title()));
            }
        }

        Ok(output)
    }

    fn format_results(&self, records: &[StoryRecord], summary: &RunSummary) -> Result<String> {
        let mut output = String::new();
        let name_width = records
            .iter()
            .map(|record| record.story.full_name().len())
            .max()
            .unwrap_or(0);

        output.push_str(&self.colorize(&format!("{:<name_width$}  {:<8}  {:>8}", "Story", "Result", "ms"), "bold"));
        output.push('\n');

        for record in records {
            let elapsed = record
                .elapsed
                .map(|elapsed| elapsed.as_millis().to_string())
                .unwrap_or_else(|| "-".to_string());
            let line = format!(
                "{:<name_width$}  {:<8}  {:>8}",
                record.story.full_name(),
                record.outcome.label(),
                elapsed
            );
            output.push_str(&self.colorize(&line, Self::outcome_color(record.outcome)));
            output.push('\n');
        }

        output.push('\n');
        let totals = format!(
            "{} passed, {} failed, {} not run in {:.1}s",
            summary.passed,
            summary.failed,
            summary.not_run,
            summary.elapsed.as_secs_f64()
        );
        let color = if summary.failed > 0 {
            "red"
        } else if summary.not_run > 0 {
            "gray"
        } else {
            "green"
        };
        output.push_str(&self.colorize(&totals, color));
        output.push('\n');

        Ok(output)
    }
}
