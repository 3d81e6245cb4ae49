//! Section extraction from a finished report.
//!
//! The archive page body is assembled from the report's executive summary,
//! key findings, detailed analysis, recommendations, and source list. Headings
//! are recognized loosely: any line containing one of the section keywords
//! (case-insensitive) starts that section.

/// Sections recovered from a report's text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportSections {
    pub executive_summary: Option<String>,
    pub key_findings: Vec<String>,
    pub detailed_analysis: Option<String>,
    pub recommendations: Vec<String>,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    ExecutiveSummary,
    KeyFindings,
    DetailedAnalysis,
    Recommendations,
    Sources,
}

impl Section {
    /// Classify a line as a section heading. Checked in this order.
    fn from_heading(line: &str) -> Option<Self> {
        let lower = line.trim().to_lowercase();
        if lower.contains("executive summary") {
            Some(Section::ExecutiveSummary)
        } else if lower.contains("key finding") {
            Some(Section::KeyFindings)
        } else if lower.contains("detailed analysis") {
            Some(Section::DetailedAnalysis)
        } else if lower.contains("recommendation") {
            Some(Section::Recommendations)
        } else if lower.contains("sources consulted") {
            Some(Section::Sources)
        } else {
            None
        }
    }
}

const BULLET_CHARS: &str = "-•*0123456789. ";
const NUMBER_CHARS: &str = "0123456789. ";

/// Split a report into its archive sections.
///
/// Blank lines and lines starting with `=` are dropped. Text before the first
/// heading is ignored. A heading that appears twice keeps the last body.
pub fn parse_report_sections(report: &str) -> ReportSections {
    let mut bodies: Vec<(Section, Vec<&str>)> = Vec::new();

    for line in report.lines() {
        if let Some(section) = Section::from_heading(line) {
            bodies.retain(|(s, _)| *s != section);
            bodies.push((section, Vec::new()));
        } else if !line.trim().is_empty() && !line.starts_with('=') {
            if let Some((_, body)) = bodies.last_mut() {
                body.push(line);
            }
        }
    }

    let mut sections = ReportSections::default();
    for (section, lines) in bodies {
        let text = lines.join("\n").trim().to_string();
        match section {
            Section::ExecutiveSummary => sections.executive_summary = non_empty(text),
            Section::KeyFindings => sections.key_findings = list_items(&text),
            Section::DetailedAnalysis => sections.detailed_analysis = non_empty(text),
            Section::Recommendations => sections.recommendations = list_items(&text),
            Section::Sources => sections.sources = source_items(&text),
        }
    }
    sections
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}

fn starts_with_digit(line: &str) -> bool {
    line.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// Bullet or numbered lines, with their markers stripped.
fn list_items(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| {
            line.starts_with('-')
                || line.starts_with('•')
                || line.starts_with('*')
                || starts_with_digit(line)
        })
        .map(|line| {
            line.trim_start_matches(|c| BULLET_CHARS.contains(c))
                .trim()
                .to_string()
        })
        .filter(|item| !item.is_empty())
        .collect()
}

/// URL or numbered lines longer than 10 characters once numbering is stripped.
fn source_items(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| line.starts_with("http") || starts_with_digit(line))
        .map(|line| {
            line.trim_start_matches(|c| NUMBER_CHARS.contains(c))
                .trim()
                .to_string()
        })
        .filter(|item| item.chars().count() > 10)
        .collect()
}

/// Normalize a topic into a tag the archive accepts.
///
/// Commas are not allowed in multi-select options.
pub fn clean_tag(tag: &str) -> String {
    let cleaned = tag.replace(',', " -");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return "General".to_string();
    }
    if cleaned.chars().count() > 100 {
        let mut truncated: String = cleaned.chars().take(97).collect();
        truncated.push_str("...");
        truncated
    } else {
        cleaned.to_string()
    }
}

/// Truncate to at most `max` characters.
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const REPORT: &str = "\
======================================================================
AI DEEP RESEARCHER - COMPREHENSIVE REPORT
======================================================================

Best Hiking Trails Near Denver

EXECUTIVE SUMMARY
Denver offers dozens of trails within an hour's drive.

KEY FINDINGS
1. Mount Falcon Park has 12 miles of trails.
- Red Rocks Trail is a 6-mile loop.
• Parking fills by 8am on weekends.
Not a bullet line.

DETAILED ANALYSIS
Trail conditions vary by season.
Spring brings mud.

PRACTICAL RECOMMENDATIONS
1. Arrive early.
2. Check COTREX for closures.

======================================================================
SOURCES CONSULTED
======================================================================
1. https://www.alltrails.com/denver
2. https://short.io
3. tiny
";

    #[test]
    fn test_parse_all_sections() {
        let sections = parse_report_sections(REPORT);
        assert_eq!(
            sections.executive_summary.as_deref(),
            Some("Denver offers dozens of trails within an hour's drive.")
        );
        assert_eq!(
            sections.key_findings,
            vec![
                "Mount Falcon Park has 12 miles of trails.",
                "Red Rocks Trail is a 6-mile loop.",
                "Parking fills by 8am on weekends.",
            ]
        );
        assert_eq!(
            sections.detailed_analysis.as_deref(),
            Some("Trail conditions vary by season.\nSpring brings mud.")
        );
        assert_eq!(
            sections.recommendations,
            vec!["Arrive early.", "Check COTREX for closures."]
        );
        assert_eq!(
            sections.sources,
            vec!["https://www.alltrails.com/denver", "https://short.io"]
        );
    }

    #[test]
    fn test_parse_no_headings() {
        let sections = parse_report_sections("Just some text\nwith no headings");
        assert_eq!(sections, ReportSections::default());
    }

    #[test]
    fn test_heading_is_case_insensitive() {
        let sections = parse_report_sections("## Executive Summary\nShort.\n");
        assert_eq!(sections.executive_summary.as_deref(), Some("Short."));
    }

    #[test]
    fn test_clean_tag() {
        assert_eq!(clean_tag(""), "General");
        assert_eq!(clean_tag("   "), "General");
        assert_eq!(clean_tag("hiking, trails"), "hiking - trails");
        assert_eq!(clean_tag("  Denver  "), "Denver");

        let long = "x".repeat(150);
        let cleaned = clean_tag(&long);
        assert_eq!(cleaned.chars().count(), 100);
        assert!(cleaned.ends_with("..."));
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("⭐⭐⭐", 2), "⭐⭐");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
