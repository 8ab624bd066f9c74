use anyhow::Result;
use serde_json::json;

use super::ResultsFormatter;
use crate::runner::{RunSummary, StoryRecord};
use crate::stories::StoryGroup;

/// Machine-readable output for `--json`
pub struct JsonFormatter;

impl ResultsFormatter for JsonFormatter {
    fn format_catalogue(&self) -> Result<String> {
        let groups: Vec<_> = StoryGroup::ALL
            .iter()
            .map(|group| {
                json!({
                    "group": group.name(),
                    "stories": group.stories().map(|story| story.title()).collect::<Vec<_>>(),
                })
            })
            .collect();

        Ok(serde_json::to_string_pretty(&groups)?)
    }

    fn format_results(&self, records: &[StoryRecord], summary: &RunSummary) -> Result<String> {
        let stories: Vec<_> = records
            .iter()
            .map(|record| {
                json!({
                    "group": record.story.group().name(),
                    "title": record.story.title(),
                    "outcome": record.outcome.label(),
                    "elapsed_ms": record.elapsed.map(|elapsed| elapsed.as_millis() as u64),
                })
            })
            .collect();

        let output = json!({
            "stories": stories,
            "summary": {
                "passed": summary.passed,
                "failed": summary.failed,
                "not_run": summary.not_run,
                "elapsed_ms": summary.elapsed.as_millis() as u64,
            },
        });

        Ok(serde_json::to_string_pretty(&output)?)
    }
}
