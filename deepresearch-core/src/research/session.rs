//! Research session record with persistence, and progress reporting.
//!
//! A session is the single mutable record threaded through every stage. It is
//! created at workflow start, filled in stage by stage, and saved to disk once
//! it reaches a terminal stage.

use super::sources::RawNote;
use super::stage::Stage;
use crate::persistence;
use crate::types::{Message, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A persistent research session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchSession {
    /// Unique session ID.
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Conversation history, oldest first.
    pub messages: Vec<Message>,
    /// Set once by the plan stage. Use [`ResearchSession::set_research_brief`].
    research_brief: Option<String>,
    pub search_queries: Vec<String>,
    pub key_topics: Vec<String>,
    /// Search-result fragments collected by the research stage.
    pub raw_notes: Vec<RawNote>,
    /// Synthesized note blocks.
    pub notes: Vec<String>,
    pub draft_report: String,
    /// Feedback from the latest accepted critique. Empty before the first one.
    pub critique_feedback: String,
    pub final_report: String,
    /// Accepted revision requests. Never exceeds `max_revisions`.
    pub revision_count: u32,
    pub max_revisions: u32,
    /// Archive page URL. Empty unless archiving succeeded.
    pub archive_url: String,
    /// Set when archiving was attempted and failed.
    pub archive_warning: Option<String>,
    /// The stage this session executes next.
    pub stage: Stage,
}

impl ResearchSession {
    /// Create a session whose conversation starts with the user's query.
    pub fn new(query: impl Into<String>, max_revisions: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            messages: vec![Message::user(query)],
            research_brief: None,
            search_queries: Vec::new(),
            key_topics: Vec::new(),
            raw_notes: Vec::new(),
            notes: Vec::new(),
            draft_report: String::new(),
            critique_feedback: String::new(),
            final_report: String::new(),
            revision_count: 0,
            max_revisions,
            archive_url: String::new(),
            archive_warning: None,
            stage: Stage::Clarify,
        }
    }

    /// The research brief, once planning has produced it.
    pub fn research_brief(&self) -> Option<&str> {
        self.research_brief.as_deref()
    }

    /// Record the research brief. Returns `false` and leaves the session
    /// untouched if a brief was already set.
    pub fn set_research_brief(&mut self, brief: impl Into<String>) -> bool {
        if self.research_brief.is_some() {
            return false;
        }
        self.research_brief = Some(brief.into());
        self.touch();
        true
    }

    /// The user's first message, used as the session headline.
    pub fn query(&self) -> &str {
        self.messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("")
    }

    /// Move to a new stage.
    pub fn transition(&mut self, stage: Stage) {
        self.stage = stage;
        self.touch();
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }

    /// The most recent assistant message, if any.
    pub fn last_assistant_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Path of this session's file under `sessions_dir`.
    pub fn path_in(&self, sessions_dir: &Path) -> PathBuf {
        sessions_dir.join(format!("{}.json", self.id))
    }

    /// Persist session to `sessions_dir/<id>.json`.
    pub fn save(&self, sessions_dir: &Path) -> Result<PathBuf, std::io::Error> {
        let path = self.path_in(sessions_dir);
        persistence::atomic_write_json(&path, self)?;
        Ok(path)
    }

    /// Load a session from disk.
    pub fn load(sessions_dir: &Path, session_id: &Uuid) -> Result<Self, std::io::Error> {
        let path = sessions_dir.join(format!("{session_id}.json"));
        persistence::load_json(&path)?.ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no session {} in {}", session_id, sessions_dir.display()),
            )
        })
    }

    /// List all saved sessions, most recently updated first.
    ///
    /// Files that fail to parse are skipped.
    pub fn list_sessions(sessions_dir: &Path) -> Vec<SessionSummary> {
        let files = match persistence::json_files(sessions_dir) {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(dir = %sessions_dir.display(), error = %e, "Cannot read sessions directory");
                return Vec::new();
            }
        };

        let mut summaries: Vec<SessionSummary> = files
            .iter()
            .filter_map(|path| match persistence::load_json::<ResearchSession>(path) {
                Ok(session) => session.map(|s| SessionSummary::from(&s)),
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable session");
                    None
                }
            })
            .collect();

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }
}

/// Summary of a research session for listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub query: String,
    pub stage: Stage,
    pub revision_count: u32,
    pub sources: usize,
    pub archive_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ResearchSession> for SessionSummary {
    fn from(session: &ResearchSession) -> Self {
        Self {
            id: session.id,
            query: session.query().to_string(),
            stage: session.stage,
            revision_count: session.revision_count,
            sources: session.raw_notes.len(),
            archive_url: session.archive_url.clone(),
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

/// A human-readable progress update emitted while the workflow runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Clarify found the request specific enough.
    Verified { verification: String },
    BriefCreated {
        brief: String,
        queries: usize,
        topics: usize,
    },
    ResearchStarted { queries: usize },
    QueryStarted { index: usize, query: String },
    QueryFailed {
        index: usize,
        query: String,
        error: String,
    },
    ResearchComplete { notes: usize },
    Synthesizing,
    Writing,
    Revising { revision: u32, max: u32 },
    Approved,
    Archived { url: String },
    ArchiveFailed { error: String },
}

impl ProgressEvent {
    pub fn message(&self) -> String {
        match self {
            ProgressEvent::Verified { verification } => {
                format!("✅ {}\n\n🔍 Starting research...", verification)
            }
            ProgressEvent::BriefCreated {
                brief,
                queries,
                topics,
            } => format!(
                "📋 **Research Brief Created**\n\n{}\n\n**Research Plan:**\n- {} search queries prepared\n- {} key topics identified\n\nMoving to research phase...",
                brief, queries, topics
            ),
            ProgressEvent::ResearchStarted { queries } => {
                format!("🔎 **Researching...** Executing {} search queries", queries)
            }
            ProgressEvent::QueryStarted { index, query } => format!("• Query {}: {}", index, query),
            ProgressEvent::QueryFailed {
                index,
                query,
                error,
            } => format!("  ⚠️ Query {} failed ({}): {}", index, query, error),
            ProgressEvent::ResearchComplete { notes } => {
                format!("✅ Research complete! Collected data from {} sources", notes)
            }
            ProgressEvent::Synthesizing => {
                "📝 **Synthesizing findings...** Analyzing and organizing research data".to_string()
            }
            ProgressEvent::Writing => {
                "✍️ **Writing report...** Creating comprehensive analysis".to_string()
            }
            ProgressEvent::Revising { revision, max } => {
                format!("🔄 **Refining report...** (Revision {}/{})", revision, max)
            }
            ProgressEvent::Approved => {
                "✅ **Report approved!** Finalizing and saving to Notion...".to_string()
            }
            ProgressEvent::Archived { url } => {
                format!("✅ **Saved to Notion!**\n\n📄 [Open Report in Notion]({})", url)
            }
            ProgressEvent::ArchiveFailed { error } => {
                format!("⚠️ Failed to save to Notion: {}", error)
            }
        }
    }
}

/// Callback trait for progressive research UI updates.
pub trait ResearchCallback: Send + Sync {
    /// Called for every progress event.
    fn on_progress(&self, event: &ProgressEvent);
    /// Called when the session moves to a new stage.
    fn on_stage_change(&self, from: Stage, to: Stage);
}

/// No-op callback.
pub struct NoOpResearchCallback;

impl ResearchCallback for NoOpResearchCallback {
    fn on_progress(&self, _event: &ProgressEvent) {}
    fn on_stage_change(&self, _from: Stage, _to: Stage) {}
}

/// Callback that records everything it receives.
#[derive(Default)]
pub struct RecordingCallback {
    events: std::sync::Mutex<Vec<ProgressEvent>>,
    stages: std::sync::Mutex<Vec<(Stage, Stage)>>,
}

impl RecordingCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn stage_changes(&self) -> Vec<(Stage, Stage)> {
        self.stages.lock().unwrap().clone()
    }

    /// How many times the session entered `stage`.
    pub fn entries_into(&self, stage: Stage) -> usize {
        self.stages
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, to)| *to == stage)
            .count()
    }
}

impl ResearchCallback for RecordingCallback {
    fn on_progress(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn on_stage_change(&self, from: Stage, to: Stage) {
        self.stages.lock().unwrap().push((from, to));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_new_session() {
        let session = ResearchSession::new("best hiking trails near Denver", 2);
        assert_eq!(session.stage, Stage::Clarify);
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.query(), "best hiking trails near Denver");
        assert!(session.research_brief().is_none());
        assert_eq!(session.revision_count, 0);
        assert!(session.archive_url.is_empty());
    }

    #[test]
    fn test_research_brief_set_once() {
        let mut session = ResearchSession::new("q", 2);
        assert!(session.set_research_brief("first"));
        assert!(!session.set_research_brief("second"));
        assert_eq!(session.research_brief(), Some("first"));
    }

    #[test]
    fn test_transition_updates_timestamp() {
        let mut session = ResearchSession::new("q", 2);
        let before = session.updated_at;
        session.transition(Stage::Plan);
        assert_eq!(session.stage, Stage::Plan);
        assert!(session.updated_at >= before);
        assert!(!session.is_terminal());
        session.transition(Stage::Complete);
        assert!(session.is_terminal());
    }

    #[test]
    fn test_save_load_list() {
        let dir = TempDir::new().unwrap();
        let mut first = ResearchSession::new("first question", 2);
        first.set_research_brief("brief");
        first.raw_notes.push(RawNote::new(Some("https://a.example".into()), "a"));
        first.save(dir.path()).unwrap();

        let mut second = ResearchSession::new("second question", 2);
        second.transition(Stage::Complete);
        second.save(dir.path()).unwrap();
        std::fs::write(dir.path().join("garbage.json"), "not json").unwrap();

        let loaded = ResearchSession::load(dir.path(), &first.id).unwrap();
        assert_eq!(loaded.research_brief(), Some("brief"));
        assert_eq!(loaded.raw_notes, first.raw_notes);

        let summaries = ResearchSession::list_sessions(dir.path());
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].query, "second question");
        assert_eq!(summaries[0].stage, Stage::Complete);
        assert_eq!(summaries[1].sources, 1);
    }

    #[test]
    fn test_load_missing_session() {
        let dir = TempDir::new().unwrap();
        let err = ResearchSession::load(dir.path(), &Uuid::new_v4()).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn test_progress_messages() {
        assert_eq!(
            ProgressEvent::Revising { revision: 1, max: 2 }.message(),
            "🔄 **Refining report...** (Revision 1/2)"
        );
        assert_eq!(
            ProgressEvent::ResearchComplete { notes: 4 }.message(),
            "✅ Research complete! Collected data from 4 sources"
        );
        let brief = ProgressEvent::BriefCreated {
            brief: "Denver hikes".into(),
            queries: 5,
            topics: 3,
        }
        .message();
        assert!(brief.contains("- 5 search queries prepared\n- 3 key topics identified"));
    }

    #[test]
    fn test_recording_callback() {
        let callback = RecordingCallback::new();
        callback.on_stage_change(Stage::Clarify, Stage::Plan);
        callback.on_stage_change(Stage::Critique, Stage::Write);
        callback.on_stage_change(Stage::Write, Stage::Critique);
        callback.on_progress(&ProgressEvent::Writing);
        assert_eq!(callback.entries_into(Stage::Write), 1);
        assert_eq!(callback.events(), vec![ProgressEvent::Writing]);
    }
}
