//! Error types for the deepresearch core library.
//!
//! One `thiserror` enum per collaborator domain plus configuration.
//! The workflow recovers from every collaborator error locally; these types
//! surface only from direct collaborator calls and from startup checks.

/// Errors from text-generation provider interactions.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },
}

impl LlmError {
    /// Rate limits, dropped connections and timeouts may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. } | LlmError::Connection { .. } | LlmError::Timeout { .. }
        )
    }

    /// A short description of the failure that carries no provider payload.
    ///
    /// Safe to place in reports and session files.
    pub fn label(&self) -> &'static str {
        match self {
            LlmError::ApiRequest { .. } => "the provider rejected the request",
            LlmError::ResponseParse { .. } => "the provider returned an unreadable response",
            LlmError::AuthFailed { .. } => "authentication with the provider failed",
            LlmError::RateLimited { .. } => "the provider rate limit was exceeded",
            LlmError::Timeout { .. } => "the provider did not respond in time",
            LlmError::Connection { .. } => "the provider could not be reached",
        }
    }
}

/// Errors from the web-search collaborator.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Search query cannot be empty")]
    EmptyQuery,

    #[error("Search request failed: {message}")]
    Request { message: String },

    #[error("HTTP {status} from search API: {body}")]
    Http { status: u16, body: String },

    #[error("Failed to parse search response: {message}")]
    ResponseParse { message: String },

    #[error("Search for '{query}' timed out after {timeout_secs}s")]
    Timeout { query: String, timeout_secs: u64 },
}

/// Errors from the archive (document database) collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Archive request failed: {message}")]
    Request { message: String },

    #[error("HTTP {status} from archive API: {message}")]
    Http { status: u16, message: String },

    #[error("Failed to parse archive response: {message}")]
    ResponseParse { message: String },

    #[error("Archive call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::ApiRequest {
            message: "connection refused".into(),
        };
        assert_eq!(err.to_string(), "API request failed: connection refused");
    }

    #[test]
    fn test_label_omits_provider_message() {
        let err = LlmError::Connection {
            message: "error sending request for url (https://host/models/m?key=abc)".into(),
        };
        assert_eq!(err.label(), "the provider could not be reached");
        assert!(!err.label().contains("abc"));
    }

    #[test]
    fn test_search_http_display() {
        let err = SearchError::Http {
            status: 432,
            body: "plan limit".into(),
        };
        assert_eq!(err.to_string(), "HTTP 432 from search API: plan limit");
    }

    #[test]
    fn test_archive_http_display() {
        let err = ArchiveError::Http {
            status: 400,
            message: "validation_error".into(),
        };
        assert_eq!(
            err.to_string(),
            "HTTP 400 from archive API: validation_error"
        );
    }

    #[test]
    fn test_config_env_var_display() {
        let err = ConfigError::EnvVarMissing {
            var: "TAVILY_API_KEY".into(),
        };
        assert_eq!(err.to_string(), "Environment variable not set: TAVILY_API_KEY");
    }

    #[test]
    fn test_search_timeout_display() {
        let err = SearchError::Timeout {
            query: "denver trails".into(),
            timeout_secs: 30,
        };
        assert_eq!(
            err.to_string(),
            "Search for 'denver trails' timed out after 30s"
        );
    }
}
