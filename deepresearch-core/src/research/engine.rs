//! Research workflow: drives a session through the stage machine.
//!
//! Each stage calls at most a few collaborators, records its results on the
//! session, and reports a [`StageOutput`] that [`next_stage`] routes on.
//! Collaborator failures never escape: structured judgments fall back to
//! their defaults, search failures are skipped, and archive failures leave a
//! warning on an otherwise complete session.

use super::output::{ReportMetadata, extract_title, format_final_report};
use super::prompts;
use super::session::{NoOpResearchCallback, ProgressEvent, ResearchCallback, ResearchSession};
use super::sources::{RawNote, extract_sources, render_notes};
use super::stage::{Stage, StageOutput, next_stage};
use crate::archive::{ArchivePage, ArchiveStore};
use crate::brain::Brain;
use crate::config::{TimeoutConfig, WorkflowConfig};
use crate::error::{ArchiveError, SearchError};
use crate::search::{SearchHit, SearchProvider};
use crate::structured::{
    ClarifyWithUser, Critique, ResearchPlan, ResearchQuestion, StructuredOutput, parse_structured,
    schema_prompt,
};
use crate::types::{Message, TokenUsage, render_conversation};
use chrono::Local;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the caller gets back when the workflow stops.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOutcome {
    /// The request is too vague. Reply with [`ResearchWorkflow::reply`] and run again.
    NeedsClarification { question: String },
    /// A final report was produced.
    Complete(FinalReport),
}

/// A finished report.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalReport {
    pub title: String,
    /// The formatted report, including the source list and footer.
    pub report: String,
    pub sources: Vec<String>,
    /// Archive page URL, when archiving succeeded.
    pub archive_url: Option<String>,
    /// Why archiving failed, when it did.
    pub warning: Option<String>,
}

/// The staged research workflow.
pub struct ResearchWorkflow {
    brain: Brain,
    search: Arc<dyn SearchProvider>,
    archive: Option<Arc<dyn ArchiveStore>>,
    workflow: WorkflowConfig,
    timeouts: TimeoutConfig,
    callback: Arc<dyn ResearchCallback>,
    stream_messages: bool,
    sessions_dir: Option<PathBuf>,
}

impl ResearchWorkflow {
    pub fn new(
        brain: Brain,
        search: Arc<dyn SearchProvider>,
        workflow: WorkflowConfig,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            brain,
            search,
            archive: None,
            workflow,
            timeouts,
            callback: Arc::new(NoOpResearchCallback),
            stream_messages: false,
            sessions_dir: None,
        }
    }

    /// Archive finalized reports to `archive`.
    pub fn with_archive(mut self, archive: Arc<dyn ArchiveStore>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub fn with_callback(mut self, callback: Arc<dyn ResearchCallback>) -> Self {
        self.callback = callback;
        self
    }

    /// Append progress messages to the conversation as assistant messages.
    pub fn with_stream_messages(mut self, enabled: bool) -> Self {
        self.stream_messages = enabled;
        self
    }

    /// Save terminal sessions under `dir`.
    pub fn with_sessions_dir(mut self, dir: PathBuf) -> Self {
        self.sessions_dir = Some(dir);
        self
    }

    /// Tokens spent by every generation this workflow has made.
    pub fn token_usage(&self) -> TokenUsage {
        self.brain.total_usage()
    }

    /// Start a new session for `query`.
    pub fn start(&self, query: impl Into<String>) -> ResearchSession {
        let session = ResearchSession::new(query, self.workflow.max_revisions);
        info!(session_id = %session.id, "Research session started");
        session
    }

    /// Append the user's answer to a clarifying question and re-enter Clarify.
    pub fn reply(&self, session: &mut ResearchSession, text: impl Into<String>) {
        session.messages.push(Message::user(text));
        if session.stage == Stage::AwaitingClarification {
            self.enter(session, Stage::Clarify);
        }
    }

    /// Stop clarifying and plan with whatever the conversation already holds.
    pub fn skip_clarification(&self, session: &mut ResearchSession) {
        if matches!(session.stage, Stage::Clarify | Stage::AwaitingClarification) {
            info!(session_id = %session.id, "Clarification abandoned, continuing with available information");
            self.enter(session, Stage::Plan);
        }
    }

    /// Run stages until the session reaches a terminal stage.
    pub async fn run(&self, session: &mut ResearchSession) -> WorkflowOutcome {
        while !session.is_terminal() {
            self.step(session).await;
        }
        self.persist(session);
        self.outcome(session)
    }

    /// Execute the session's current stage and move to the next one.
    ///
    /// Returns the new stage. Terminal stages are left unchanged.
    pub async fn step(&self, session: &mut ResearchSession) -> Stage {
        let stage = session.stage;
        debug!(session_id = %session.id, stage = %stage, "Executing stage");

        let output = match stage {
            Stage::Clarify => self.clarify(session).await,
            Stage::Plan => self.plan(session).await,
            Stage::Research => self.research(session).await,
            Stage::Synthesize => self.synthesize(session).await,
            Stage::Write => self.write(session).await,
            Stage::Critique => self.critique(session).await,
            Stage::Finalize => self.finalize(session).await,
            Stage::AwaitingClarification | Stage::Complete => return stage,
        };

        let next = next_stage(stage, &output);
        self.enter(session, next);
        next
    }

    fn enter(&self, session: &mut ResearchSession, next: Stage) {
        let from = session.stage;
        session.transition(next);
        self.callback.on_stage_change(from, next);
    }

    fn emit(&self, session: &mut ResearchSession, event: ProgressEvent) {
        self.callback.on_progress(&event);
        if self.stream_messages {
            session.messages.push(Message::assistant(event.message()));
        }
    }

    /// Ask for a structured judgment, falling back to the schema default on any failure.
    async fn judge<T: StructuredOutput>(&self, prompt: &str) -> T {
        match self.brain.generate(&schema_prompt::<T>(prompt)).await {
            Ok(text) => parse_structured::<T>(&text, prompt),
            Err(e) => {
                warn!(schema = T::NAME, error = %e, "Structured request failed, using fallback");
                T::fallback(prompt)
            }
        }
    }

    async fn clarify(&self, session: &mut ResearchSession) -> StageOutput {
        let prompt = prompts::clarify_prompt(&render_conversation(&session.messages));
        let judgment: ClarifyWithUser = self.judge(&prompt).await;

        if judgment.need_clarification {
            info!(session_id = %session.id, "Clarification needed");
            session.messages.push(Message::assistant(judgment.question));
        } else {
            let event = ProgressEvent::Verified {
                verification: judgment.verification.clone(),
            };
            self.callback.on_progress(&event);
            let content = if self.stream_messages {
                event.message()
            } else {
                judgment.verification
            };
            session.messages.push(Message::assistant(content));
        }

        StageOutput::Clarification {
            need_clarification: judgment.need_clarification,
        }
    }

    async fn plan(&self, session: &mut ResearchSession) -> StageOutput {
        let conversation = render_conversation(&session.messages);
        let question: ResearchQuestion = self.judge(&prompts::brief_prompt(&conversation)).await;
        if !session.set_research_brief(question.research_brief) {
            warn!(session_id = %session.id, "Research brief already set, keeping the first one");
        }
        let brief = session.research_brief().unwrap_or_default().to_string();

        let plan: ResearchPlan = self.judge(&prompts::plan_prompt(&brief)).await;
        info!(
            session_id = %session.id,
            queries = plan.search_queries.len(),
            topics = plan.key_topics.len(),
            "Research plan created"
        );
        session.search_queries = plan.search_queries;
        session.key_topics = plan.key_topics;

        let event = ProgressEvent::BriefCreated {
            brief,
            queries: session.search_queries.len(),
            topics: session.key_topics.len(),
        };
        self.emit(session, event);
        StageOutput::Done
    }

    async fn run_query(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let timeout = self.timeouts.search();
        match tokio::time::timeout(timeout, self.search.search(query)).await {
            Ok(result) => result,
            Err(_) => Err(SearchError::Timeout {
                query: query.to_string(),
                timeout_secs: timeout.as_secs(),
            }),
        }
    }

    async fn research(&self, session: &mut ResearchSession) -> StageOutput {
        let queries = session.search_queries.clone();
        let started = ProgressEvent::ResearchStarted {
            queries: queries.len(),
        };
        self.callback.on_progress(&started);
        let mut transcript = format!("{}\n\n", started.message());

        let results: Vec<(usize, String, Result<Vec<SearchHit>, SearchError>)> =
            stream::iter(queries.into_iter().enumerate())
                .map(|(i, query)| async move {
                    self.callback.on_progress(&ProgressEvent::QueryStarted {
                        index: i + 1,
                        query: query.clone(),
                    });
                    let result = self.run_query(&query).await;
                    (i + 1, query, result)
                })
                .buffered(self.workflow.max_concurrent_queries.max(1))
                .collect()
                .await;

        for (index, query, result) in results {
            transcript.push_str(&format!("• Query {}: {}\n", index, query));
            match result {
                Ok(hits) => {
                    let before = session.raw_notes.len();
                    session.raw_notes.extend(
                        hits.into_iter()
                            .filter(|hit| !hit.content.is_empty())
                            .map(|hit| RawNote::new(Some(hit.url), hit.content)),
                    );
                    debug!(query = %query, notes = session.raw_notes.len() - before, "Query finished");
                }
                Err(e) => {
                    warn!(query = %query, provider = self.search.name(), error = %e, "Search query failed, skipping");
                    let failed = ProgressEvent::QueryFailed {
                        index,
                        query,
                        error: e.to_string(),
                    };
                    self.callback.on_progress(&failed);
                    transcript.push_str(&format!("{}\n", failed.message()));
                }
            }
        }

        let complete = ProgressEvent::ResearchComplete {
            notes: session.raw_notes.len(),
        };
        self.callback.on_progress(&complete);
        transcript.push_str(&format!("\n{}", complete.message()));
        if self.stream_messages {
            session.messages.push(Message::assistant(transcript));
        }

        info!(session_id = %session.id, notes = session.raw_notes.len(), "Research stage complete");
        StageOutput::Done
    }

    async fn synthesize(&self, session: &mut ResearchSession) -> StageOutput {
        self.emit(session, ProgressEvent::Synthesizing);

        let raw = render_notes(&session.raw_notes);
        let prompt = prompts::synthesis_prompt(
            session.research_brief().unwrap_or_default(),
            &session.key_topics,
            &raw,
        );
        let notes = match self.brain.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Synthesis failed, using raw notes");
                raw
            }
        };
        session.notes = vec![notes];
        StageOutput::Done
    }

    async fn write(&self, session: &mut ResearchSession) -> StageOutput {
        self.emit(session, ProgressEvent::Writing);

        let notes = session.notes.join("\n");
        let prompt = prompts::writer_prompt(
            session.research_brief().unwrap_or_default(),
            &notes,
            &session.critique_feedback,
        );
        session.draft_report = match self.brain.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Report generation failed");
                format!("Error generating report: {}\n\nRaw Notes:\n{}", e.label(), notes)
            }
        };
        StageOutput::Done
    }

    async fn critique(&self, session: &mut ResearchSession) -> StageOutput {
        let prompt = prompts::critique_prompt(
            session.research_brief().unwrap_or_default(),
            &session.draft_report,
        );
        let critique: Critique = self.judge(&prompt).await;

        let output = StageOutput::Verdict {
            needs_revision: critique.needs_revision,
            revision_count: session.revision_count,
            max_revisions: session.max_revisions,
        };

        if next_stage(Stage::Critique, &output) == Stage::Write {
            session.revision_count += 1;
            session.critique_feedback = critique.to_feedback();
            info!(
                session_id = %session.id,
                revision = session.revision_count,
                max = session.max_revisions,
                "Revision requested"
            );
            let event = ProgressEvent::Revising {
                revision: session.revision_count,
                max: session.max_revisions,
            };
            self.emit(session, event);
        } else {
            if critique.needs_revision {
                info!(session_id = %session.id, "Revision limit reached, finalizing");
            }
            self.emit(session, ProgressEvent::Approved);
        }
        output
    }

    async fn archive_report(
        &self,
        archive: &dyn ArchiveStore,
        page: &ArchivePage,
    ) -> Result<String, ArchiveError> {
        let timeout = self.timeouts.archive();
        match tokio::time::timeout(timeout, archive.create_page(page)).await {
            Ok(result) => result.map(|created| created.url),
            Err(_) => Err(ArchiveError::Timeout {
                timeout_secs: timeout.as_secs(),
            }),
        }
    }

    async fn finalize(&self, session: &mut ResearchSession) -> StageOutput {
        let sources = extract_sources(&session.raw_notes, self.workflow.max_sources);
        let title = extract_title(&session.draft_report);
        let meta = ReportMetadata {
            generated_at: Local::now().naive_local(),
            notes_analyzed: session.raw_notes.len(),
            revisions: session.revision_count,
        };
        session.final_report = format_final_report(&session.draft_report, &sources, &meta);

        let status = match &self.archive {
            Some(archive) => {
                let page = ArchivePage {
                    title: title.clone(),
                    brief: session.research_brief().unwrap_or_default().to_string(),
                    report: session.final_report.clone(),
                    sources_count: sources.len(),
                    key_topics: session.key_topics.clone(),
                };
                let event = match self.archive_report(archive.as_ref(), &page).await {
                    Ok(url) => {
                        info!(session_id = %session.id, url = %url, "Report archived");
                        session.archive_url = url.clone();
                        ProgressEvent::Archived { url }
                    }
                    Err(e) => {
                        warn!(session_id = %session.id, error = %e, "Archiving failed, report kept locally");
                        session.archive_warning = Some(e.to_string());
                        ProgressEvent::ArchiveFailed {
                            error: e.to_string(),
                        }
                    }
                };
                self.callback.on_progress(&event);
                Some(event.message())
            }
            None => None,
        };

        if self.stream_messages {
            let content = match status {
                Some(status) => format!("{}\n\n---\n\n{}", status, session.final_report),
                None => session.final_report.clone(),
            };
            session.messages.push(Message::assistant(content));
        }

        info!(
            session_id = %session.id,
            title = %title,
            sources = sources.len(),
            revisions = session.revision_count,
            "Report finalized"
        );
        StageOutput::Done
    }

    fn persist(&self, session: &ResearchSession) {
        if !self.workflow.persist_sessions {
            return;
        }
        if let Some(dir) = &self.sessions_dir {
            match session.save(dir) {
                Ok(path) => debug!(path = %path.display(), "Session saved"),
                Err(e) => warn!(session_id = %session.id, error = %e, "Failed to save session"),
            }
        }
    }

    fn outcome(&self, session: &ResearchSession) -> WorkflowOutcome {
        match session.stage {
            Stage::AwaitingClarification => WorkflowOutcome::NeedsClarification {
                question: session
                    .last_assistant_message()
                    .unwrap_or_default()
                    .to_string(),
            },
            _ => WorkflowOutcome::Complete(FinalReport {
                title: extract_title(&session.draft_report),
                report: session.final_report.clone(),
                sources: extract_sources(&session.raw_notes, self.workflow.max_sources),
                archive_url: (!session.archive_url.is_empty()).then(|| session.archive_url.clone()),
                warning: session.archive_warning.clone(),
            }),
        }
    }
}
