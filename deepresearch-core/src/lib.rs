//! # DeepResearch Core
//!
//! Core library for the deepresearch report pipeline.
//! Provides the staged research workflow, the text-generation interface
//! (brain), the search and archive collaborators, structured-output parsing,
//! configuration, and fundamental types.

pub mod archive;
pub mod brain;
pub mod config;
pub mod error;
pub mod persistence;
pub mod providers;
pub mod research;
pub mod search;
pub mod structured;
pub mod types;

// Re-export commonly used types at the crate root.
pub use archive::{ArchiveStore, MemoryArchive, NotionArchive};
pub use brain::{Brain, LlmProvider, MockLlmProvider};
pub use config::{DeepResearchConfig, WorkflowConfig};
pub use error::{ArchiveError, ConfigError, LlmError, SearchError};
pub use research::{
    FinalReport, ProgressEvent, ResearchCallback, ResearchSession, ResearchWorkflow, Stage,
    WorkflowOutcome,
};
pub use search::{MockSearchProvider, SearchProvider, TavilySearch};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, TokenUsage};
