//! Final report formatting and title extraction.

use chrono::NaiveDateTime;

/// Fallback title when no draft line qualifies.
pub const DEFAULT_TITLE: &str = "Research Report";

const SEPARATOR_WIDTH: usize = 70;
const SYSTEM_LABEL: &str = "Multi-Agent with Reflection & Chain of Thought";

/// Pick a report title from the draft.
///
/// Looks at the first 10 non-empty lines (trimmed), skips lines starting with
/// `=` or `#`, and takes the first line longer than 10 characters, truncated
/// to 100 characters.
pub fn extract_title(draft: &str) -> String {
    draft
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(10)
        .find(|line| {
            !line.starts_with('=')
                && !line.starts_with('#')
                && line.chars().count() > 10
        })
        .map(|line| line.chars().take(100).collect())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

/// Metadata printed in the report footer.
#[derive(Debug, Clone)]
pub struct ReportMetadata {
    pub generated_at: NaiveDateTime,
    /// Raw notes analyzed, counted before deduplication.
    pub notes_analyzed: usize,
    pub revisions: u32,
}

/// Assemble the final report: banner, draft, numbered sources, footer.
pub fn format_final_report(draft: &str, sources: &[String], meta: &ReportMetadata) -> String {
    let rule = "=".repeat(SEPARATOR_WIDTH);
    let mut report = format!(
        "\n{rule}\nAI DEEP RESEARCHER - COMPREHENSIVE REPORT\n{rule}\n\n{draft}\n\n{rule}\nSOURCES CONSULTED\n{rule}\n"
    );

    for (i, source) in sources.iter().enumerate() {
        report.push_str(&format!("{}. {}\n", i + 1, source));
    }

    report.push_str(&format!(
        "\n{rule}\nReport Generated: {}\nResearch Quality: {} sources analyzed\nReflection Iterations: {}\nSystem: {}\n{rule}",
        meta.generated_at.format("%Y-%m-%d %H:%M:%S"),
        meta.notes_analyzed,
        meta.revisions,
        SYSTEM_LABEL,
    ));
    report
}
