use anyhow::{bail, Result};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::stories::{StoryContext, StoryGroup, StoryId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoryOutcome {
    NotRun,
    Passed,
    Failed,
}

impl StoryOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            StoryOutcome::NotRun => "not run",
            StoryOutcome::Passed => "passed",
            StoryOutcome::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoryRecord {
    pub story: StoryId,
    pub outcome: StoryOutcome,
    /// Wall time of the last run, including cleanup
    pub elapsed: Option<Duration>,
}

impl StoryRecord {
    fn pending(story: StoryId) -> Self {
        Self {
            story,
            outcome: StoryOutcome::NotRun,
            elapsed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    pub not_run: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.not_run
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.not_run == 0
    }
}

/// Resolve `--group` and `--story` filters into stories in catalogue order.
/// No filters selects every story.
pub fn select_stories(groups: &[String], stories: &[String]) -> Result<Vec<StoryId>> {
    if groups.is_empty() && stories.is_empty() {
        return Ok(StoryId::ALL.to_vec());
    }

    let mut selected_groups = Vec::new();
    for name in groups {
        match StoryGroup::find(name) {
            Some(group) => selected_groups.push(group),
            None => bail!(
                "Unknown story group '{}'. Known groups: {}",
                name,
                StoryGroup::ALL.map(|group| group.name()).join(", ")
            ),
        }
    }

    let mut selected_stories = Vec::new();
    for name in stories {
        match StoryId::find(name) {
            Some(story) => selected_stories.push(story),
            None => bail!("Unknown story '{}'. Use `list` to see story names", name),
        }
    }

    Ok(StoryId::ALL
        .into_iter()
        .filter(|story| selected_groups.contains(&story.group()) || selected_stories.contains(story))
        .collect())
}

/// Runs a fixed selection of stories one at a time
pub struct StoryRunner {
    records: Vec<StoryRecord>,
}

impl StoryRunner {
    pub fn new(stories: Vec<StoryId>) -> Self {
        Self {
            records: stories.into_iter().map(StoryRecord::pending).collect(),
        }
    }

    pub fn records(&self) -> &[StoryRecord] {
        &self.records
    }

    /// Mark every story as not run
    pub fn reset(&mut self) {
        for record in &mut self.records {
            record.outcome = StoryOutcome::NotRun;
            record.elapsed = None;
        }
    }

    pub async fn run(&mut self, ctx: &StoryContext) -> RunSummary {
        self.reset();
        let started = Instant::now();

        for index in 0..self.records.len() {
            if ctx.cancel.is_cancelled() {
                warn!("Run cancelled, {} stories not run", self.records.len() - index);
                break;
            }

            let story = self.records[index].story;
            let story_started = Instant::now();
            let passed = story.run(ctx).await;

            let record = &mut self.records[index];
            record.elapsed = Some(story_started.elapsed());
            record.outcome = if passed {
                StoryOutcome::Passed
            } else {
                StoryOutcome::Failed
            };
            info!("{} {}", story.full_name(), record.outcome.label());
        }

        self.summary(started.elapsed())
    }

    fn summary(&self, elapsed: Duration) -> RunSummary {
        let count = |outcome| self.records.iter().filter(|r| r.outcome == outcome).count();
        RunSummary {
            passed: count(StoryOutcome::Passed),
            failed: count(StoryOutcome::Failed),
            not_run: count(StoryOutcome::NotRun),
            elapsed,
        }
    }
}
