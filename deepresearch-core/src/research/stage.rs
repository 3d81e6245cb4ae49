//! Workflow stages and the transition function between them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A step of the research workflow.
///
/// A session's `stage` is the stage it will execute next. `AwaitingClarification`
/// and `Complete` are terminal: the workflow hands control back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Clarify,
    Plan,
    Research,
    Synthesize,
    Write,
    Critique,
    Finalize,
    AwaitingClarification,
    Complete,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::AwaitingClarification | Stage::Complete)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Clarify => "clarify",
            Stage::Plan => "plan",
            Stage::Research => "research",
            Stage::Synthesize => "synthesize",
            Stage::Write => "write",
            Stage::Critique => "critique",
            Stage::Finalize => "finalize",
            Stage::AwaitingClarification => "awaiting_clarification",
            Stage::Complete => "complete",
        };
        write!(f, "{}", name)
    }
}

/// What a stage produced, as far as routing is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutput {
    /// Output of Clarify.
    Clarification { need_clarification: bool },
    /// Output of Critique. `revision_count` is the count before this verdict.
    Verdict {
        needs_revision: bool,
        revision_count: u32,
        max_revisions: u32,
    },
    /// Any stage with a single successor.
    Done,
}

/// Decide the next stage from the current one and its output.
///
/// Terminal stages map to themselves. An output that does not belong to the
/// stage is treated as `Done`.
pub fn next_stage(stage: Stage, output: &StageOutput) -> Stage {
    match (stage, output) {
        (
            Stage::Clarify,
            StageOutput::Clarification {
                need_clarification: true,
            },
        ) => Stage::AwaitingClarification,
        (Stage::Clarify, _) => Stage::Plan,
        (Stage::Plan, _) => Stage::Research,
        (Stage::Research, _) => Stage::Synthesize,
        (Stage::Synthesize, _) => Stage::Write,
        (Stage::Write, _) => Stage::Critique,
        (
            Stage::Critique,
            StageOutput::Verdict {
                needs_revision: true,
                revision_count,
                max_revisions,
            },
        ) if revision_count < max_revisions => Stage::Write,
        (Stage::Critique, _) => Stage::Finalize,
        (Stage::Finalize, _) => Stage::Complete,
        (Stage::AwaitingClarification, _) => Stage::AwaitingClarification,
        (Stage::Complete, _) => Stage::Complete,
    }
}
