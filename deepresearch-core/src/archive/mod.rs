//! Report archive collaborator.
//!
//! Finalized reports are written to a document database (Notion by default)
//! as one page per report. The archive also answers read-only queries for the
//! CLI: keyword search, a full listing, and aggregate statistics.

pub mod notion;
pub mod sections;

use crate::error::ArchiveError;
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

pub use notion::NotionArchive;
pub use sections::{ReportSections, clean_tag, parse_report_sections};

/// Everything needed to create an archive page for one report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivePage {
    pub title: String,
    pub brief: String,
    /// The fully formatted final report.
    pub report: String,
    pub sources_count: usize,
    pub key_topics: Vec<String>,
}

/// Reference to a page the archive created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivedPage {
    pub page_id: String,
    pub url: String,
    pub title: String,
}

/// One archived report as returned by search and listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub page_id: String,
    pub title: String,
    /// ISO-8601 date or datetime. `None` when the page has no date.
    pub date: Option<String>,
    pub status: Option<String>,
    pub quality: Option<String>,
    pub sources: u64,
    pub tags: Vec<String>,
    pub url: String,
}

impl ArchiveEntry {
    /// `YYYY-MM` prefix of the entry date, if it has a well-formed one.
    fn month_key(&self) -> Option<&str> {
        let date = self.date.as_deref()?;
        let key = date.get(0..7)?;
        let bytes = key.as_bytes();
        let well_formed = bytes[4] == b'-'
            && bytes[..4].iter().all(u8::is_ascii_digit)
            && bytes[5..].iter().all(u8::is_ascii_digit);
        well_formed.then_some(key)
    }
}

/// Aggregate statistics over every archived report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveStats {
    pub total_reports: usize,
    pub this_month: usize,
    pub total_sources: u64,
    /// Mean sources per report, rounded to one decimal.
    pub avg_sources: f64,
    /// Up to five tags with their report counts, most frequent first.
    pub top_topics: Vec<(String, usize)>,
}

/// Compute statistics from a full listing.
///
/// `today` decides which entries count toward `this_month` (same year and month).
/// Ties in tag frequency keep first-seen order.
pub fn compute_stats(entries: &[ArchiveEntry], today: NaiveDate) -> ArchiveStats {
    let current_month = today.format("%Y-%m").to_string();
    let this_month = entries
        .iter()
        .filter(|e| e.month_key() == Some(current_month.as_str()))
        .count();

    let total_sources: u64 = entries.iter().map(|e| e.sources).sum();
    let avg_sources = if entries.is_empty() {
        0.0
    } else {
        (total_sources as f64 / entries.len() as f64 * 10.0).round() / 10.0
    };

    let mut counts: Vec<(String, usize)> = Vec::new();
    for tag in entries.iter().flat_map(|e| e.tags.iter()) {
        match counts.iter_mut().find(|(name, _)| name == tag) {
            Some((_, count)) => *count += 1,
            None => counts.push((tag.clone(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(5);

    ArchiveStats {
        total_reports: entries.len(),
        this_month,
        total_sources,
        avg_sources,
        top_topics: counts,
    }
}

/// Trait for report archives.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Create a page for a finalized report.
    async fn create_page(&self, page: &ArchivePage) -> Result<ArchivedPage, ArchiveError>;

    /// Find reports whose title, topic, or brief contains `keyword`.
    async fn search(&self, keyword: &str) -> Result<Vec<ArchiveEntry>, ArchiveError>;

    /// Every archived report, newest first.
    async fn list_all(&self) -> Result<Vec<ArchiveEntry>, ArchiveError>;

    /// Aggregate statistics over `list_all`.
    async fn stats(&self) -> Result<ArchiveStats, ArchiveError> {
        let entries = self.list_all().await?;
        Ok(compute_stats(&entries, Local::now().date_naive()))
    }
}

/// An in-process archive used by tests and by runs with archiving disabled
/// in favor of local review.
#[derive(Default)]
pub struct MemoryArchive {
    pages: std::sync::Mutex<Vec<(ArchiveEntry, ArchivePage)>>,
    fail_writes: Option<String>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// An archive whose `create_page` always fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            pages: std::sync::Mutex::new(Vec::new()),
            fail_writes: Some(message.to_string()),
        }
    }

    /// Insert an entry directly, bypassing `create_page`.
    pub fn insert_entry(&self, entry: ArchiveEntry) {
        let page = ArchivePage {
            title: entry.title.clone(),
            brief: String::new(),
            report: String::new(),
            sources_count: entry.sources as usize,
            key_topics: entry.tags.clone(),
        };
        self.pages.lock().unwrap().push((entry, page));
    }

    /// Pages created so far, in creation order.
    pub fn pages(&self) -> Vec<ArchivePage> {
        self.pages
            .lock()
            .unwrap()
            .iter()
            .map(|(_, page)| page.clone())
            .collect()
    }
}

#[async_trait]
impl ArchiveStore for MemoryArchive {
    async fn create_page(&self, page: &ArchivePage) -> Result<ArchivedPage, ArchiveError> {
        if let Some(message) = &self.fail_writes {
            return Err(ArchiveError::Request {
                message: message.clone(),
            });
        }

        let page_id = uuid::Uuid::new_v4().to_string();
        let url = format!("memory://archive/{}", page_id);
        let entry = ArchiveEntry {
            page_id: page_id.clone(),
            title: page.title.clone(),
            date: Some(Local::now().to_rfc3339()),
            status: Some("Complete".to_string()),
            quality: Some(notion::QUALITY_LABEL.to_string()),
            sources: page.sources_count as u64,
            tags: page.key_topics.iter().take(3).map(|t| clean_tag(t)).collect(),
            url: url.clone(),
        };
        self.pages.lock().unwrap().push((entry, page.clone()));

        Ok(ArchivedPage {
            page_id,
            url,
            title: page.title.clone(),
        })
    }

    async fn search(&self, keyword: &str) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let pages = self.pages.lock().unwrap();
        Ok(pages
            .iter()
            .filter(|(entry, page)| {
                entry.title.contains(keyword) || page.brief.contains(keyword)
            })
            .map(|(entry, _)| entry.clone())
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let mut entries: Vec<ArchiveEntry> = self
            .pages
            .lock()
            .unwrap()
            .iter()
            .map(|(entry, _)| entry.clone())
            .collect();
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(entries)
    }
}
