//! Error types for the Delve core library.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering the LLM, web leaf services, research phases, and configuration.

/// Top-level error type for the Delve core library.
#[derive(Debug, thiserror::Error)]
pub enum DelveError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Web error: {0}")]
    Web(#[from] WebError),

    #[error("Research error: {0}")]
    Research(#[from] ResearchError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from LLM provider interactions.
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

    /// The model answered, but not in the requested shape.
    #[error("Structured output for '{tag}' did not match the expected shape: {message}")]
    StructuredOutput { tag: String, message: String },
}

/// Errors from the search gateway and content fetcher.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("Invalid arguments for {operation}: {reason}")]
    InvalidArguments { operation: String, reason: String },

    #[error("Missing credentials: environment variable {var} is not set")]
    MissingCredentials { var: String },

    #[error("Request to {url} failed: {message}")]
    RequestFailed { url: String, message: String },

    #[error("HTTP {status} for URL: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Failed to parse response from {url}: {message}")]
    ResponseParse { url: String, message: String },
}

/// Errors that abort a research phase.
#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Investigation requires a research plan, but none was generated")]
    MissingPlan,
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `DelveError`.
pub type Result<T> = std::result::Result<T, DelveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_llm() {
        let err = DelveError::Llm(LlmError::ApiRequest {
            message: "connection refused".into(),
        });
        assert_eq!(
            err.to_string(),
            "LLM error: API request failed: connection refused"
        );
    }

    #[test]
    fn test_error_display_web() {
        let err = DelveError::Web(WebError::HttpStatus {
            status: 404,
            url: "https://example.com/missing".into(),
        });
        assert_eq!(
            err.to_string(),
            "Web error: HTTP 404 for URL: https://example.com/missing"
        );
    }

    #[test]
    fn test_structured_output_display() {
        let err = LlmError::StructuredOutput {
            tag: "synthesis".into(),
            message: "expected value at line 1 column 1".into(),
        };
        assert_eq!(
            err.to_string(),
            "Structured output for 'synthesis' did not match the expected shape: expected value at line 1 column 1"
        );
    }

    #[test]
    fn test_research_error_is_transparent_over_llm() {
        let err: ResearchError = LlmError::Timeout { timeout_secs: 30 }.into();
        assert_eq!(err.to_string(), "Request timed out after 30s");
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = ResearchError::InvalidTransition {
            from: "synthesizing".into(),
            to: "searching".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid phase transition: synthesizing -> searching"
        );
    }

    #[test]
    fn test_error_display_config() {
        let err = DelveError::Config(ConfigError::Invalid {
            message: "results_per_query must be at least 1".into(),
        });
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid configuration: results_per_query must be at least 1"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DelveError = io_err.into();
        assert!(matches!(err, DelveError::Io(_)));
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: DelveError = serde_err.into();
        assert!(matches!(err, DelveError::Serialization(_)));
    }
}
