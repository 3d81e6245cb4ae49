//! Raw research notes and the source list derived from them.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const SOURCE_PREFIX: &str = "Source: ";

/// One unprocessed search-result fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawNote {
    /// Source identifier (URL). `None` when the search hit carried none.
    pub source: Option<String>,
    pub content: String,
}

impl RawNote {
    pub fn new(source: Option<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.filter(|s| !s.trim().is_empty()),
            content: content.into(),
        }
    }

    /// Text form fed to the synthesis prompt.
    ///
    /// The first line carries the source tag so the source list can be
    /// recovered from rendered notes alone.
    pub fn render(&self) -> String {
        match &self.source {
            Some(url) => format!("{}{}\n{}", SOURCE_PREFIX, url, self.content),
            None => format!("Query result:\n{}", self.content),
        }
    }
}

/// Pull the source identifier from a rendered note's first line.
pub fn source_of(rendered: &str) -> Option<&str> {
    rendered
        .lines()
        .next()
        .and_then(|first| first.strip_prefix(SOURCE_PREFIX))
}

/// Deduplicated source list, in first-seen order, capped at `max`.
///
/// Identifiers are compared by exact string equality; URLs are not normalized.
pub fn extract_sources(notes: &[RawNote], max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    notes
        .iter()
        .map(RawNote::render)
        .filter_map(|rendered| source_of(&rendered).map(str::to_string))
        .filter(|source| seen.insert(source.clone()))
        .take(max)
        .collect()
}

/// Join notes for prompts and fallbacks.
pub fn render_notes(notes: &[RawNote]) -> String {
    notes
        .iter()
        .map(RawNote::render)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn note(url: &str) -> RawNote {
        RawNote::new(Some(url.to_string()), format!("content from {}", url))
    }

    #[test]
    fn test_render_with_and_without_source() {
        assert_eq!(
            note("https://a.example").render(),
            "Source: https://a.example\ncontent from https://a.example"
        );
        assert_eq!(
            RawNote::new(None, "bare").render(),
            "Query result:\nbare"
        );
    }

    #[test]
    fn test_empty_source_becomes_none() {
        assert_eq!(RawNote::new(Some("  ".into()), "x").source, None);
    }

    #[test]
    fn test_extract_sources_first_seen_order() {
        let notes = vec![
            note("https://b.example"),
            note("https://a.example"),
            note("https://b.example"),
            RawNote::new(None, "no source"),
            note("https://c.example"),
        ];
        assert_eq!(
            extract_sources(&notes, 25),
            vec!["https://b.example", "https://a.example", "https://c.example"]
        );
    }

    #[test]
    fn test_extract_sources_no_url_normalization() {
        let notes = vec![note("https://a.example"), note("https://a.example/")];
        assert_eq!(extract_sources(&notes, 25).len(), 2);
    }

    #[test]
    fn test_extract_sources_cap() {
        let notes: Vec<RawNote> = (0..40)
            .map(|i| note(&format!("https://site{}.example", i)))
            .collect();
        let sources = extract_sources(&notes, 25);
        assert_eq!(sources.len(), 25);
        assert_eq!(sources[0], "https://site0.example");
        assert_eq!(sources[24], "https://site24.example");
    }

    #[test]
    fn test_extract_sources_empty() {
        assert!(extract_sources(&[], 25).is_empty());
    }

    #[test]
    fn test_source_of() {
        assert_eq!(source_of("Source: x\nbody"), Some("x"));
        assert_eq!(source_of("Query result:\nSource: x"), None);
        assert_eq!(source_of(""), None);
    }
}
