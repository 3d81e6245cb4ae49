//! Terminal progress output for research runs.

use deepresearch_core::research::{ProgressEvent, ResearchCallback, Stage};
use std::io::{self, Write};

pub(crate) const RULE_WIDTH: usize = 70;

pub(crate) fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// Print a heading framed by separator lines.
pub(crate) fn banner(title: &str) {
    println!("\n{}", rule());
    println!("{}", title);
    println!("{}", rule());
}

/// A callback that prints workflow progress to stdout.
///
/// In streaming mode every event is printed as it arrives. Otherwise only the
/// research brief, per-query lines, and revision notices are shown.
pub(crate) struct CliProgress {
    stream: bool,
}

impl CliProgress {
    pub(crate) fn new(stream: bool) -> Self {
        Self { stream }
    }

    /// What to print for `event`, if anything.
    pub(crate) fn render(&self, event: &ProgressEvent) -> Option<String> {
        if self.stream {
            return Some(event.message());
        }
        match event {
            ProgressEvent::BriefCreated { brief, .. } => Some(format!(
                "\n{rule}\nRESEARCH BRIEF\n{rule}\n{}\n\n{rule}",
                textwrap::fill(brief, RULE_WIDTH),
                rule = rule()
            )),
            ProgressEvent::ResearchStarted { .. } => {
                Some(format!("\n{rule}\nRESEARCH IN PROGRESS\n{rule}", rule = rule()))
            }
            ProgressEvent::QueryStarted { index, query } => {
                Some(format!("\nQuery {}: {}", index, query))
            }
            ProgressEvent::QueryFailed {
                index,
                query,
                error,
            } => Some(format!("  Query {} failed ({}): {}", index, query, error)),
            ProgressEvent::Revising { revision, max } => Some(format!(
                "\nREFLECTION: Revision needed (iteration {}/{})",
                revision, max
            )),
            ProgressEvent::Archived { url } => Some(format!("\nArchived: {}", url)),
            ProgressEvent::ArchiveFailed { error } => {
                Some(format!("\nFailed to archive report: {}", error))
            }
            _ => None,
        }
    }
}

impl ResearchCallback for CliProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        if let Some(text) = self.render(event) {
            println!("{}", text);
            let _ = io::stdout().flush();
        }
    }

    fn on_stage_change(&self, from: Stage, to: Stage) {
        tracing::debug!(from = %from, to = %to, "Stage change");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_mode_prints_everything() {
        let progress = CliProgress::new(true);
        assert_eq!(
            progress.render(&ProgressEvent::Writing).as_deref(),
            Some("✍️ **Writing report...** Creating comprehensive analysis")
        );
    }

    #[test]
    fn test_plain_mode_is_selective() {
        let progress = CliProgress::new(false);
        assert!(progress.render(&ProgressEvent::Writing).is_none());
        assert_eq!(
            progress
                .render(&ProgressEvent::QueryStarted {
                    index: 2,
                    query: "denver trails".into()
                })
                .as_deref(),
            Some("\nQuery 2: denver trails")
        );
        let brief = progress
            .render(&ProgressEvent::BriefCreated {
                brief: "Day hikes".into(),
                queries: 1,
                topics: 1,
            })
            .unwrap();
        assert!(brief.contains("RESEARCH BRIEF"));
        assert!(brief.contains("Day hikes"));
    }

    #[test]
    fn test_plain_mode_failure_names_query() {
        let progress = CliProgress::new(false);
        let line = progress
            .render(&ProgressEvent::QueryFailed {
                index: 3,
                query: "denver permits".into(),
                error: "request timed out".into(),
            })
            .unwrap();
        assert_eq!(line, "  Query 3 failed (denver permits): request timed out");
    }
}
