//! Notion database archive.
//!
//! Each report becomes a page in a Notion database with these properties:
//! `Name` (title), `Topic`, `Date`, `Status`, `Quality`, `Sources`, `Tags`,
//! and `Brief`. The page body is rebuilt from the report's sections.

use super::sections::{ReportSections, clean_tag, parse_report_sections, truncate_chars};
use super::{ArchiveEntry, ArchivePage, ArchiveStore, ArchivedPage};
use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, ConfigError};
use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";

/// Notion's per-text-object limit.
const MAX_TEXT_CHARS: usize = 2000;
const MAX_LIST_ITEMS: usize = 10;
const MAX_SOURCE_ITEMS: usize = 25;

pub(crate) const QUALITY_LABEL: &str = "⭐⭐⭐⭐⭐";

/// Archive backed by a Notion database.
pub struct NotionArchive {
    client: Client,
    base_url: String,
    token: String,
    database_id: String,
}

impl NotionArchive {
    /// Create an archive reading the token and database ID from the configured env vars.
    pub fn new(config: &ArchiveConfig) -> Result<Self, ConfigError> {
        let read = |var: &str| {
            std::env::var(var)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::EnvVarMissing {
                    var: var.to_string(),
                })
        };
        let token = read(&config.token_env)?;
        let database_id = read(&config.database_id_env)?;
        Self::new_with_credentials(config, token, database_id)
    }

    pub fn new_with_credentials(
        config: &ArchiveConfig,
        token: String,
        database_id: String,
    ) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ConfigError::Invalid {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            token,
            database_id,
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ArchiveError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(url = url.as_str(), "Sending Notion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| ArchiveError::Request {
                message: e.without_url().to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| ArchiveError::Request {
            message: format!("Failed to read response body: {}", e.without_url()),
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v["message"].as_str().map(str::to_string))
                .unwrap_or(text);
            return Err(ArchiveError::Http {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text).map_err(|e| ArchiveError::ResponseParse {
            message: e.to_string(),
        })
    }

    /// Query the database, following pagination until every page is read.
    async fn query(&self, filter: Option<Value>, sorts: Option<Value>) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let path = format!("databases/{}/query", self.database_id);
        let mut entries = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({"page_size": 100});
            if let Some(filter) = &filter {
                body["filter"] = filter.clone();
            }
            if let Some(sorts) = &sorts {
                body["sorts"] = sorts.clone();
            }
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }

            let response = self.post(&path, &body).await?;
            let results = response["results"]
                .as_array()
                .ok_or_else(|| ArchiveError::ResponseParse {
                    message: "Missing 'results' array in query response".to_string(),
                })?;
            entries.extend(results.iter().map(page_to_entry));

            match (
                response["has_more"].as_bool(),
                response["next_cursor"].as_str(),
            ) {
                (Some(true), Some(next)) => cursor = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(entries)
    }
}

fn rich_text(content: &str) -> Value {
    json!([{"type": "text", "text": {"content": truncate_chars(content, MAX_TEXT_CHARS)}}])
}

fn text_block(kind: &str, content: &str) -> Value {
    json!({"object": "block", "type": kind, kind: {"rich_text": rich_text(content)}})
}

fn divider() -> Value {
    json!({"object": "block", "type": "divider", "divider": {}})
}

/// Page properties for a new report.
pub(crate) fn page_properties(page: &ArchivePage, date: &str) -> Value {
    let tags: Vec<Value> = page
        .key_topics
        .iter()
        .take(3)
        .map(|topic| json!({"name": clean_tag(topic)}))
        .collect();

    json!({
        "Name": {"title": [{"text": {"content": page.title}}]},
        "Topic": {"rich_text": [{"text": {"content": truncate_chars(&page.title, 100)}}]},
        "Date": {"date": {"start": date}},
        "Status": {"select": {"name": "Complete"}},
        "Quality": {"select": {"name": QUALITY_LABEL}},
        "Sources": {"number": page.sources_count},
        "Tags": {"multi_select": tags},
        "Brief": {"rich_text": [{"text": {"content": truncate_chars(&page.brief, MAX_TEXT_CHARS)}}]},
    })
}

/// Page body blocks built from the report's sections.
pub(crate) fn page_blocks(sections: &ReportSections, sources_count: usize, generated: &str) -> Vec<Value> {
    let mut children = vec![text_block("heading_1", "📊 Research Report"), divider()];

    if let Some(summary) = &sections.executive_summary {
        children.push(text_block("heading_2", "🎯 Executive Summary"));
        children.push(text_block("paragraph", summary));
    }

    if !sections.key_findings.is_empty() {
        children.push(text_block("heading_2", "🔑 Key Findings"));
        children.extend(
            sections
                .key_findings
                .iter()
                .take(MAX_LIST_ITEMS)
                .map(|finding| text_block("bulleted_list_item", finding)),
        );
    }

    if let Some(analysis) = &sections.detailed_analysis {
        children.push(text_block("heading_2", "📈 Detailed Analysis"));
        children.push(text_block("paragraph", analysis));
    }

    if !sections.recommendations.is_empty() {
        children.push(text_block("heading_2", "💡 Recommendations"));
        children.extend(
            sections
                .recommendations
                .iter()
                .take(MAX_LIST_ITEMS)
                .map(|rec| text_block("numbered_list_item", rec)),
        );
    }

    if !sections.sources.is_empty() {
        children.push(text_block("heading_2", "🔗 Sources"));
        let source_blocks: Vec<Value> = sections
            .sources
            .iter()
            .take(MAX_SOURCE_ITEMS)
            .map(|source| text_block("paragraph", source))
            .collect();
        children.push(json!({
            "object": "block",
            "type": "toggle",
            "toggle": {
                "rich_text": rich_text(&format!("View all {} sources", sources_count)),
                "children": source_blocks,
            }
        }));
    }

    children.push(divider());
    children.push(json!({
        "object": "block",
        "type": "callout",
        "callout": {
            "rich_text": rich_text(&format!(
                "Generated: {} | Sources: {} | System: AI Deep Researcher",
                generated, sources_count
            )),
            "icon": {"emoji": "🤖"}
        }
    }));

    children
}

/// Read the fields we list from a Notion page object. Missing fields degrade to `None`/0.
fn page_to_entry(page: &Value) -> ArchiveEntry {
    let props = &page["properties"];
    let title = props["Name"]["title"][0]["text"]["content"]
        .as_str()
        .or_else(|| props["Name"]["title"][0]["plain_text"].as_str())
        .unwrap_or("Untitled")
        .to_string();
    let select = |name: &str| props[name]["select"]["name"].as_str().map(str::to_string);

    ArchiveEntry {
        page_id: page["id"].as_str().unwrap_or_default().to_string(),
        title,
        date: props["Date"]["date"]["start"].as_str().map(str::to_string),
        status: select("Status"),
        quality: select("Quality"),
        sources: props["Sources"]["number"]
            .as_f64()
            .map(|n| n.max(0.0) as u64)
            .unwrap_or(0),
        tags: props["Tags"]["multi_select"]
            .as_array()
            .map(|tags| {
                tags.iter()
                    .filter_map(|t| t["name"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default(),
        url: page["url"].as_str().unwrap_or_default().to_string(),
    }
}

fn keyword_filter(keyword: &str) -> Value {
    json!({
        "or": [
            {"property": "Name", "title": {"contains": keyword}},
            {"property": "Topic", "rich_text": {"contains": keyword}},
            {"property": "Brief", "rich_text": {"contains": keyword}},
        ]
    })
}

#[async_trait]
impl ArchiveStore for NotionArchive {
    async fn create_page(&self, page: &ArchivePage) -> Result<ArchivedPage, ArchiveError> {
        let now = Local::now();
        let sections = parse_report_sections(&page.report);
        let body = json!({
            "parent": {"database_id": self.database_id},
            "properties": page_properties(page, &now.to_rfc3339()),
            "children": page_blocks(
                &sections,
                page.sources_count,
                &now.format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
        });

        let created = self.post("pages", &body).await?;
        let page_id = created["id"].as_str().ok_or_else(|| ArchiveError::ResponseParse {
            message: "Missing 'id' in created page".to_string(),
        })?;
        let url = created["url"].as_str().unwrap_or_default();

        info!(page_id, url, "Archived report to Notion");
        Ok(ArchivedPage {
            page_id: page_id.to_string(),
            url: url.to_string(),
            title: page.title.clone(),
        })
    }

    async fn search(&self, keyword: &str) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        self.query(Some(keyword_filter(keyword)), None).await
    }

    async fn list_all(&self) -> Result<Vec<ArchiveEntry>, ArchiveError> {
        let sorts = json!([{"property": "Date", "direction": "descending"}]);
        self.query(None, Some(sorts)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_page() -> ArchivePage {
        ArchivePage {
            title: "Best Hiking Trails Near Denver".to_string(),
            brief: "b".repeat(2500),
            report: String::new(),
            sources_count: 7,
            key_topics: vec![
                "Trails, difficulty".to_string(),
                "".to_string(),
                "Parking".to_string(),
                "Weather".to_string(),
            ],
        }
    }

    #[test]
    fn test_page_properties() {
        let props = page_properties(&sample_page(), "2025-03-14T09:00:00+00:00");
        assert_eq!(
            props["Name"]["title"][0]["text"]["content"],
            "Best Hiking Trails Near Denver"
        );
        assert_eq!(props["Date"]["date"]["start"], "2025-03-14T09:00:00+00:00");
        assert_eq!(props["Status"]["select"]["name"], "Complete");
        assert_eq!(props["Quality"]["select"]["name"], QUALITY_LABEL);
        assert_eq!(props["Sources"]["number"], 7);
        assert_eq!(
            props["Tags"]["multi_select"],
            json!([{"name": "Trails - difficulty"}, {"name": "General"}, {"name": "Parking"}])
        );
        let brief = props["Brief"]["rich_text"][0]["text"]["content"]
            .as_str()
            .unwrap();
        assert_eq!(brief.len(), 2000);
    }

    #[test]
    fn test_page_blocks_full() {
        let sections = ReportSections {
            executive_summary: Some("Summary".into()),
            key_findings: (1..=12).map(|i| format!("Finding {}", i)).collect(),
            detailed_analysis: Some("a".repeat(3000)),
            recommendations: vec!["Go early".into()],
            sources: (1..=30).map(|i| format!("https://example.com/{}", i)).collect(),
        };
        let blocks = page_blocks(&sections, 30, "2025-03-14 09:00:00");

        assert_eq!(blocks[0]["type"], "heading_1");
        assert_eq!(blocks[1]["type"], "divider");
        let bullets = blocks
            .iter()
            .filter(|b| b["type"] == "bulleted_list_item")
            .count();
        assert_eq!(bullets, 10);

        let analysis = blocks
            .iter()
            .find(|b| {
                b["type"] == "paragraph"
                    && b["paragraph"]["rich_text"][0]["text"]["content"]
                        .as_str()
                        .is_some_and(|s| s.starts_with("aaa"))
            })
            .unwrap();
        assert_eq!(
            analysis["paragraph"]["rich_text"][0]["text"]["content"]
                .as_str()
                .unwrap()
                .len(),
            2000
        );

        let toggle = blocks.iter().find(|b| b["type"] == "toggle").unwrap();
        assert_eq!(toggle["toggle"]["children"].as_array().unwrap().len(), 25);
        assert_eq!(
            toggle["toggle"]["rich_text"][0]["text"]["content"],
            "View all 30 sources"
        );

        let callout = blocks.last().unwrap();
        assert_eq!(callout["type"], "callout");
        assert_eq!(callout["callout"]["icon"]["emoji"], "🤖");
        assert_eq!(
            callout["callout"]["rich_text"][0]["text"]["content"],
            "Generated: 2025-03-14 09:00:00 | Sources: 30 | System: AI Deep Researcher"
        );
    }

    #[test]
    fn test_page_blocks_empty_sections() {
        let blocks = page_blocks(&ReportSections::default(), 0, "now");
        let kinds: Vec<&str> = blocks.iter().filter_map(|b| b["type"].as_str()).collect();
        assert_eq!(kinds, vec!["heading_1", "divider", "divider", "callout"]);
    }

    #[test]
    fn test_page_to_entry() {
        let page = json!({
            "id": "page-1",
            "url": "https://www.notion.so/page-1",
            "properties": {
                "Name": {"title": [{"text": {"content": "Denver Trails"}, "plain_text": "Denver Trails"}]},
                "Date": {"date": {"start": "2025-03-14T09:00:00.000+00:00"}},
                "Status": {"select": {"name": "Complete"}},
                "Quality": {"select": null},
                "Sources": {"number": 7},
                "Tags": {"multi_select": [{"name": "hiking"}, {"name": "denver"}]}
            }
        });
        let entry = page_to_entry(&page);
        assert_eq!(entry.title, "Denver Trails");
        assert_eq!(entry.date.as_deref(), Some("2025-03-14T09:00:00.000+00:00"));
        assert_eq!(entry.status.as_deref(), Some("Complete"));
        assert_eq!(entry.quality, None);
        assert_eq!(entry.sources, 7);
        assert_eq!(entry.tags, vec!["hiking", "denver"]);
    }

    #[test]
    fn test_page_to_entry_missing_fields() {
        let entry = page_to_entry(&json!({"id": "x", "url": "u", "properties": {"Name": {"title": []}}}));
        assert_eq!(entry.title, "Untitled");
        assert_eq!(entry.date, None);
        assert_eq!(entry.sources, 0);
        assert!(entry.tags.is_empty());
    }

    #[test]
    fn test_keyword_filter() {
        let filter = keyword_filter("denver");
        assert_eq!(filter["or"].as_array().unwrap().len(), 3);
        assert_eq!(filter["or"][2]["property"], "Brief");
    }

    #[test]
    fn test_new_missing_env() {
        let config = ArchiveConfig {
            token_env: "DEEPRESEARCH_TEST_NOTION_TOKEN_MISSING".into(),
            ..Default::default()
        };
        // SAFETY: test-only env var manipulation
        unsafe { std::env::remove_var("DEEPRESEARCH_TEST_NOTION_TOKEN_MISSING") };
        assert!(matches!(
            NotionArchive::new(&config),
            Err(ConfigError::EnvVarMissing { var }) if var == "DEEPRESEARCH_TEST_NOTION_TOKEN_MISSING"
        ));
    }
}
