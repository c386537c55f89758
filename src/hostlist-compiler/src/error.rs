//! Error types for the hostlist compiler.

use thiserror::Error;

/// Result type for compiler operations.
pub type Result<T> = std::result::Result<T, CompilerError>;

/// Errors that can occur during compilation.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CompilerError {
    /// The declarative configuration failed schema validation.
    #[error("Invalid configuration at {path}: {}", details.join("; "))]
    ConfigurationInvalid {
        /// Config location (file path or logical path inside the document).
        path: String,
        /// Individual validation failures.
        details: Vec<String>,
    },

    /// A source could not be fetched.
    #[error("Failed to fetch source '{source_name}': {cause}")]
    SourceFetchFailed {
        /// Source name or URL.
        source_name: String,
        /// Underlying failure description.
        cause: String,
        /// Whether retrying could have succeeded.
        retryable: bool,
    },

    /// A network request failed.
    #[error("Network error for {url} (status: {status_code:?})")]
    NetworkError {
        /// Request URL (sanitized).
        url: String,
        /// HTTP status code, if a response was received.
        status_code: Option<u16>,
        /// Whether the failure is retryable.
        retryable: bool,
    },

    /// A network request exceeded its deadline.
    #[error("Network timeout for {0}")]
    NetworkTimeout(String),

    /// A remote include referenced a different host than its parent source.
    #[error("Cross-origin include: '{include}' from source '{origin}'")]
    CrossOriginInclude {
        /// The offending include reference.
        include: String,
        /// The enclosing source.
        origin: String,
    },

    /// Include directives form a cycle.
    #[error("Include cycle detected at '{0}'")]
    IncludeCycle(String),

    /// Include nesting exceeded the maximum depth.
    #[error("Include depth exceeded ({depth} > {max}) at '{include}'")]
    IncludeDepthExceeded {
        /// Depth reached.
        depth: usize,
        /// Configured maximum.
        max: usize,
        /// The include that tripped the limit.
        include: String,
    },

    /// A rule could not be parsed.
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// A transformation failed.
    #[error("Transformation '{transformation}' failed: {cause}")]
    TransformationFailed {
        /// Transformation name.
        transformation: String,
        /// Number of rules being processed, if known.
        rule_count: Option<usize>,
        /// Underlying failure description.
        cause: String,
    },

    /// A local file was not found.
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// A local file could not be accessed.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// A cache operation failed.
    #[error("Storage operation failed: {0}")]
    StorageOperationFailed(String),

    /// Compilation was cancelled.
    #[error("Compilation cancelled")]
    Cancelled,

    /// A wildcard pattern was empty.
    #[error("Empty wildcard pattern")]
    EmptyPattern,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parsing error.
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parse error.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Regex compilation error.
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl CompilerError {
    /// Create a configuration validation error.
    pub fn configuration(path: impl Into<String>, details: Vec<String>) -> Self {
        Self::ConfigurationInvalid {
            path: path.into(),
            details,
        }
    }

    /// Create a source fetch error.
    pub fn source_fetch(
        source: impl Into<String>,
        cause: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self::SourceFetchFailed {
            source_name: source.into(),
            cause: cause.into(),
            retryable,
        }
    }

    /// Create a transformation error.
    pub fn transformation(
        transformation: impl Into<String>,
        rule_count: Option<usize>,
        cause: impl Into<String>,
    ) -> Self {
        Self::TransformationFailed {
            transformation: transformation.into(),
            rule_count,
            cause: cause.into(),
        }
    }

    /// Map an IO error to `FileNotFound`/`PermissionDenied` for a given path.
    pub fn from_io(path: impl Into<String>, err: &std::io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileNotFound(path),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            _ => Self::SourceFetchFailed {
                source_name: path,
                cause: err.to_string(),
                retryable: false,
            },
        }
    }

    /// Whether this error is retryable per the fetch policy.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkError { retryable, .. } | Self::SourceFetchFailed { retryable, .. } => {
                *retryable
            }
            Self::NetworkTimeout(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_message() {
        let err = CompilerError::configuration(
            "config.json",
            vec!["missing name".to_string(), "empty sources".to_string()],
        );
        let msg = err.to_string();
        assert!(msg.contains("config.json"));
        assert!(msg.contains("missing name; empty sources"));
    }

    #[test]
    fn test_retryable() {
        assert!(CompilerError::NetworkTimeout("https://example.org".to_string()).is_retryable());
        assert!(CompilerError::NetworkError {
            url: "https://example.org".to_string(),
            status_code: Some(503),
            retryable: true,
        }
        .is_retryable());
        assert!(!CompilerError::Cancelled.is_retryable());
    }

    #[test]
    fn test_from_io_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(matches!(
            CompilerError::from_io("list.txt", &io),
            CompilerError::FileNotFound(_)
        ));
    }
}
