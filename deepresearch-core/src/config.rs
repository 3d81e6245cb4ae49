//! Configuration system for deepresearch.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/deepresearch/config.toml` and/or
//! `.deepresearch/config.toml` in the workspace directory. Credentials are never
//! stored in these files; each section names the environment variable that holds them.

use crate::error::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration for a deepresearch installation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeepResearchConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

/// Text-generation provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name. Only "gemini" ships today.
    pub provider: String,
    /// Model identifier (e.g., "gemini-2.0-flash").
    pub model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Optional base URL override for the API endpoint.
    pub base_url: Option<String>,
    /// Maximum tokens to generate in a response.
    pub max_tokens: usize,
    /// Default temperature for generation.
    pub temperature: f32,
    /// Retry policy for transient provider errors.
    pub retry: RetryConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            base_url: None,
            max_tokens: 8192,
            temperature: 0.7,
            retry: RetryConfig::default(),
        }
    }
}

impl LlmConfig {
    /// Validate this LLM config and return any warnings.
    ///
    /// Returns an empty Vec if the config is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.temperature < 0.0 || self.temperature > 2.0 {
            warnings.push(format!(
                "temperature ({}) is outside the typical range 0.0–2.0",
                self.temperature
            ));
        }
        if self.max_tokens == 0 {
            warnings.push("max_tokens is 0; every generation will be empty".to_string());
        }
        warnings
    }
}

/// Exponential backoff policy for transient LLM errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum retry attempts after the first call.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_backoff_ms: u64,
    /// Upper bound on any single delay.
    pub max_backoff_ms: u64,
    /// Growth factor between attempts.
    pub backoff_multiplier: f64,
    /// Add up to 25% random jitter.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 60_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Web-search collaborator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Environment variable name containing the Tavily API key.
    pub api_key_env: String,
    /// Optional base URL override.
    pub base_url: Option<String>,
    /// Results requested per query.
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: "TAVILY_API_KEY".to_string(),
            base_url: None,
            max_results: 5,
        }
    }
}

/// Archive (Notion database) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Whether finalized reports are archived at all.
    pub enabled: bool,
    /// Environment variable name containing the Notion integration token.
    pub token_env: String,
    /// Environment variable name containing the target database ID.
    pub database_id_env: String,
    /// Optional base URL override.
    pub base_url: Option<String>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token_env: "NOTION_TOKEN".to_string(),
            database_id_env: "NOTION_DATABASE_ID".to_string(),
            base_url: None,
        }
    }
}

/// Workflow limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Maximum critique-driven revisions of the draft.
    pub max_revisions: u32,
    /// Maximum number of sources listed in the final report.
    pub max_sources: usize,
    /// Maximum clarification rounds before research starts anyway.
    pub max_clarification_rounds: usize,
    /// Search queries in flight at once during the research stage.
    pub max_concurrent_queries: usize,
    /// Persist terminal sessions under the data directory.
    pub persist_sessions: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_revisions: 2,
            max_sources: 25,
            max_clarification_rounds: 7,
            max_concurrent_queries: 4,
            persist_sessions: true,
        }
    }
}

/// Per-call timeouts around every collaborator invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub llm_secs: u64,
    pub search_secs: u64,
    pub archive_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            llm_secs: 120,
            search_secs: 30,
            archive_secs: 30,
        }
    }
}

impl TimeoutConfig {
    pub fn llm(&self) -> Duration {
        Duration::from_secs(self.llm_secs)
    }

    pub fn search(&self) -> Duration {
        Duration::from_secs(self.search_secs)
    }

    pub fn archive(&self) -> Duration {
        Duration::from_secs(self.archive_secs)
    }
}

impl DeepResearchConfig {
    /// Check that the credentials required to start a session are present.
    ///
    /// The text-generation and search keys are mandatory. The archive token is
    /// optional: without it finalized reports are simply not archived.
    pub fn validate_credentials(&self) -> Result<(), ConfigError> {
        for var in [&self.llm.api_key_env, &self.search.api_key_env] {
            match std::env::var(var) {
                Ok(value) if !value.trim().is_empty() => {}
                _ => return Err(ConfigError::EnvVarMissing { var: var.clone() }),
            }
        }
        if self.workflow.max_concurrent_queries == 0 {
            return Err(ConfigError::Invalid {
                message: "workflow.max_concurrent_queries must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Platform project directories for deepresearch.
pub fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "deepresearch", "deepresearch")
}

/// Directory holding logs and persisted sessions.
pub fn data_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".deepresearch"))
}

/// Load configuration by merging defaults, config files, and environment variables.
pub fn load_config(workspace: Option<&Path>) -> Result<DeepResearchConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(DeepResearchConfig::default()));

    // User-level config
    if let Some(config_dir) = project_dirs() {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".deepresearch").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (DEEPRESEARCH_LLM__MODEL, DEEPRESEARCH_WORKFLOW__MAX_REVISIONS, etc.)
    figment = figment.merge(Env::prefixed("DEEPRESEARCH_").split("__"));

    figment.extract().map_err(Box::new)
}

/// Check whether any deepresearch configuration file exists (user-level or workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if let Some(config_dir) = project_dirs()
        && config_dir.config_dir().join("config.toml").exists()
    {
        return true;
    }

    if let Some(ws) = workspace
        && ws.join(".deepresearch").join("config.toml").exists()
    {
        return true;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DeepResearchConfig::default();
        assert_eq!(config.llm.provider, "gemini");
        assert_eq!(config.llm.model, "gemini-2.0-flash");
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.workflow.max_revisions, 2);
        assert_eq!(config.workflow.max_sources, 25);
        assert_eq!(config.workflow.max_clarification_rounds, 7);
        assert!(config.archive.enabled);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = DeepResearchConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: DeepResearchConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized.llm.model, config.llm.model);
        assert_eq!(
            deserialized.workflow.max_revisions,
            config.workflow.max_revisions
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: DeepResearchConfig = toml::from_str(
            r#"
[workflow]
max_revisions = 4
"#,
        )
        .unwrap();
        assert_eq!(config.workflow.max_revisions, 4);
        assert_eq!(config.workflow.max_sources, 25);
        assert_eq!(config.llm.api_key_env, "GEMINI_API_KEY");
    }

    #[test]
    fn test_load_config_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(".deepresearch");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(
            config_dir.join("config.toml"),
            r#"
[llm]
model = "gemini-1.5-pro"

[search]
max_results = 8

[archive]
enabled = false
"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path())).unwrap();
        assert_eq!(config.llm.model, "gemini-1.5-pro");
        assert_eq!(config.search.max_results, 8);
        assert!(!config.archive.enabled);
        assert!(config_exists(Some(dir.path())));
    }

    #[test]
    fn test_config_exists_false_for_empty_workspace() {
        let dir = tempfile::tempdir().unwrap();
        if project_dirs().is_some_and(|d| d.config_dir().join("config.toml").exists()) {
            return;
        }
        assert!(!config_exists(Some(dir.path())));
    }

    #[test]
    fn test_validate_credentials_missing_env() {
        let mut config = DeepResearchConfig::default();
        config.llm.api_key_env = "DEEPRESEARCH_TEST_MISSING_LLM_KEY".to_string();
        // SAFETY: test-only env var manipulation
        unsafe { std::env::remove_var("DEEPRESEARCH_TEST_MISSING_LLM_KEY") };
        let err = config.validate_credentials().unwrap_err();
        match err {
            ConfigError::EnvVarMissing { var } => {
                assert_eq!(var, "DEEPRESEARCH_TEST_MISSING_LLM_KEY");
            }
            other => panic!("Expected EnvVarMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_credentials_present() {
        let mut config = DeepResearchConfig::default();
        config.llm.api_key_env = "DEEPRESEARCH_TEST_LLM_KEY_OK".to_string();
        config.search.api_key_env = "DEEPRESEARCH_TEST_SEARCH_KEY_OK".to_string();
        // SAFETY: test-only env var manipulation
        unsafe {
            std::env::set_var("DEEPRESEARCH_TEST_LLM_KEY_OK", "llm-key");
            std::env::set_var("DEEPRESEARCH_TEST_SEARCH_KEY_OK", "search-key");
        }
        assert!(config.validate_credentials().is_ok());
    }

    #[test]
    fn test_llm_validate_warnings() {
        let mut llm = LlmConfig::default();
        assert!(llm.validate().is_empty());
        llm.temperature = 3.0;
        assert_eq!(llm.validate().len(), 1);
    }

    #[test]
    fn test_timeouts_as_durations() {
        let timeouts = TimeoutConfig::default();
        assert_eq!(timeouts.llm(), Duration::from_secs(120));
        assert_eq!(timeouts.search(), Duration::from_secs(30));
        assert_eq!(timeouts.archive(), Duration::from_secs(30));
    }
}
