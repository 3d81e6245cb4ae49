//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use crate::progress::{CliProgress, banner, rule};
use deepresearch_core::archive::{ArchiveEntry, ArchiveStats, ArchiveStore, NotionArchive};
use deepresearch_core::brain::Brain;
use deepresearch_core::config::{self, DeepResearchConfig};
use deepresearch_core::providers::create_provider;
use deepresearch_core::research::{ResearchSession, ResearchWorkflow, SessionSummary};
use deepresearch_core::search::TavilySearch;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    model: Option<String>,
) -> anyhow::Result<()> {
    if let Commands::Config { action } = command {
        return handle_config(action, workspace);
    }

    let mut config = load(workspace)?;
    if let Some(model) = model {
        config.llm.model = model;
    }
    match command {
        Commands::Research {
            query,
            stream,
            max_revisions,
        } => {
            if let Some(max) = max_revisions {
                config.workflow.max_revisions = max;
            }
            crate::repl::run_research(&config, query, stream).await
        }
        Commands::Search { keyword } => search_reports(&config, &keyword).await,
        Commands::List => list_reports(&config).await,
        Commands::Stats => show_stats(&config).await,
        Commands::Sessions => {
            print!("{}", format_sessions(&ResearchSession::list_sessions(&sessions_dir())));
            Ok(())
        }
        // Handled before the configuration is loaded.
        Commands::Config { .. } => Ok(()),
    }
}

pub(crate) fn load(workspace: &Path) -> anyhow::Result<DeepResearchConfig> {
    config::load_config(Some(workspace))
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))
}

fn sessions_dir() -> PathBuf {
    config::data_dir().join("sessions")
}

/// Build a workflow from configuration, wiring in the real collaborators.
///
/// Missing text-generation or search credentials are fatal. A missing archive
/// token only disables archiving.
pub(crate) fn build_workflow(
    config: &DeepResearchConfig,
    stream: bool,
) -> anyhow::Result<ResearchWorkflow> {
    config
        .validate_credentials()
        .map_err(|e| anyhow::anyhow!("{}. Set it in your environment or .env file.", e))?;
    for warning in config.llm.validate() {
        tracing::warn!("llm config: {}", warning);
    }

    let provider = create_provider(&config.llm)?;
    let brain = Brain::from_config(provider, &config.llm, config.timeouts.llm());
    let search = TavilySearch::new(&config.search)?;

    let mut workflow = ResearchWorkflow::new(
        brain,
        Arc::new(search),
        config.workflow.clone(),
        config.timeouts.clone(),
    )
    .with_callback(Arc::new(CliProgress::new(stream)))
    .with_stream_messages(stream)
    .with_sessions_dir(sessions_dir());

    if config.archive.enabled {
        match NotionArchive::new(&config.archive) {
            Ok(archive) => workflow = workflow.with_archive(Arc::new(archive)),
            Err(e) => tracing::warn!(error = %e, "Archiving disabled"),
        }
    }
    Ok(workflow)
}

fn open_archive(config: &DeepResearchConfig) -> anyhow::Result<NotionArchive> {
    if !config.archive.enabled {
        anyhow::bail!("Archiving is disabled in configuration (archive.enabled = false)");
    }
    Ok(NotionArchive::new(&config.archive)?)
}

pub(crate) async fn search_reports(config: &DeepResearchConfig, keyword: &str) -> anyhow::Result<()> {
    let archive = open_archive(config)?;
    println!("\nSearching Notion for: {}", keyword);
    print!("{}", search_output(&archive, keyword).await);
    Ok(())
}

pub(crate) async fn list_reports(config: &DeepResearchConfig) -> anyhow::Result<()> {
    let archive = open_archive(config)?;
    println!("\nAll Research Reports from Notion:");
    print!("{}", list_output(&archive).await);
    Ok(())
}

pub(crate) async fn show_stats(config: &DeepResearchConfig) -> anyhow::Result<()> {
    let archive = open_archive(config)?;
    banner("RESEARCH ANALYTICS DASHBOARD");
    match archive.stats().await {
        Ok(stats) => print!("{}", format_stats(&stats)),
        Err(e) => println!("Stats error: {}", e),
    }
    println!("{}", rule());
    Ok(())
}

async fn search_output(archive: &dyn ArchiveStore, keyword: &str) -> String {
    match archive.search(keyword).await {
        Ok(entries) => format_search_results(&entries),
        Err(e) => format!("Search error: {}\n", e),
    }
}

async fn list_output(archive: &dyn ArchiveStore) -> String {
    match archive.list_all().await {
        Ok(entries) => format_report_list(&entries),
        Err(e) => format!("List error: {}\n", e),
    }
}

fn date_label(entry: &ArchiveEntry) -> &str {
    entry.date.as_deref().unwrap_or("N/A")
}

fn format_search_results(entries: &[ArchiveEntry]) -> String {
    if entries.is_empty() {
        return "No results found.\n".to_string();
    }
    let mut out = format!("\nFound {} results:\n", entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let _ = write!(
            out,
            "\n{}. {}\n   Date: {}\n   URL: {}\n",
            i + 1,
            entry.title,
            date_label(entry),
            entry.url
        );
    }
    out
}

fn format_report_list(entries: &[ArchiveEntry]) -> String {
    if entries.is_empty() {
        return "No reports found.\n".to_string();
    }
    let mut out = format!("\nTotal: {} reports\n\n", entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let _ = write!(
            out,
            "{}. {}\n   Date: {} | Status: {} | Quality: {}\n   Sources: {} | URL: {}\n\n",
            i + 1,
            entry.title,
            date_label(entry),
            entry.status.as_deref().unwrap_or("N/A"),
            entry.quality.as_deref().unwrap_or("N/A"),
            entry.sources,
            entry.url
        );
    }
    out
}

fn format_stats(stats: &ArchiveStats) -> String {
    let mut out = format!(
        "\nTotal Reports: {}\nThis Month: {}\nTotal Sources Analyzed: {}\nAverage Sources per Report: {:.1}\n",
        stats.total_reports, stats.this_month, stats.total_sources, stats.avg_sources
    );
    if !stats.top_topics.is_empty() {
        out.push_str("\nTop Topics:\n");
        for (topic, count) in &stats.top_topics {
            let _ = writeln!(out, "  - {}: {} reports", topic, count);
        }
    }
    out
}

fn format_sessions(sessions: &[SessionSummary]) -> String {
    if sessions.is_empty() {
        return "No saved sessions.\n".to_string();
    }
    let mut out = format!("Saved sessions ({}):\n", sessions.len());
    for s in sessions {
        let _ = writeln!(
            out,
            "  {}  {:<22}  {}  revisions: {}  notes: {}\n      {}{}",
            s.id,
            s.stage.to_string(),
            s.updated_at.format("%Y-%m-%d %H:%M"),
            s.revision_count,
            s.sources,
            s.query,
            if s.archive_url.is_empty() {
                String::new()
            } else {
                format!("\n      {}", s.archive_url)
            }
        );
    }
    out
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".deepresearch");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&DeepResearchConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace)?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}
