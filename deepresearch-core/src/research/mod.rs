//! Deep research workflow.
//!
//! A session moves through seven stages:
//! 1. **Clarify**: ask a question back if the request is too vague
//! 2. **Plan**: write a research brief, search queries, and key topics
//! 3. **Research**: run the queries and collect raw notes
//! 4. **Synthesize**: condense raw notes into organized notes
//! 5. **Write**: draft the report
//! 6. **Critique**: review the draft, looping back to Write a bounded number of times
//! 7. **Finalize**: format the report with its sources and archive it

pub mod engine;
pub mod output;
pub mod prompts;
pub mod session;
pub mod sources;
pub mod stage;

pub use engine::{FinalReport, ResearchWorkflow, WorkflowOutcome};
pub use output::{DEFAULT_TITLE, extract_title, format_final_report};
pub use session::{
    NoOpResearchCallback, ProgressEvent, RecordingCallback, ResearchCallback, ResearchSession,
    SessionSummary,
};
pub use sources::{RawNote, extract_sources};
pub use stage::{Stage, StageOutput, next_stage};
