//! Error types for docflow.
//!
//! Every variant carries a stable machine-readable code so callers (and
//! workflow authors reading CLI output) can match on failures
//! programmatically instead of parsing messages.

use thiserror::Error;

/// Result type alias for docflow operations.
pub type Result<T> = std::result::Result<T, Error>;

/// docflow error taxonomy.
///
/// Validation and input errors abort a run before any step executes.
/// Per-step errors are recovered into failed step results by the engine and
/// never surface through this type during execution; output-stage errors are
/// reported per output.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad workflow description. Carries every violation found, not just
    /// the first.
    #[error("Workflow validation failed:\n{}", .0.join("\n"))]
    Validation(Vec<String>),

    /// Missing or malformed declared input.
    #[error("Input error: {0}")]
    Input(String),

    /// A template referenced a variable, step, or capability that does not
    /// exist in its context.
    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    /// Malformed template syntax (unclosed placeholder, bad call syntax).
    #[error("Template syntax error: {0}")]
    TemplateSyntax(String),

    /// The data source could not be opened.
    #[error("Data source unreachable: {0}")]
    DataSourceUnreachable(String),

    /// Query referenced a table the schema does not contain.
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Search criteria referenced a column the table does not contain.
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// The generation service is unreachable or returned a transport error.
    #[error("Generation service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A step exceeded its timeout.
    #[error("Timed out after {0}s")]
    Timeout(u64),

    /// Output-stage rendering failure.
    #[error("Render error: {0}")]
    Render(String),

    /// A document input has an extension the loader does not support.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the stable error code for this variant.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Input(_) => "INPUT_ERROR",
            Error::UnresolvedReference(_) => "UNRESOLVED_REFERENCE",
            Error::TemplateSyntax(_) => "TEMPLATE_SYNTAX_ERROR",
            Error::DataSourceUnreachable(_) => "DATA_SOURCE_UNREACHABLE",
            Error::UnknownTable(_) => "UNKNOWN_TABLE",
            Error::UnknownColumn(_) => "UNKNOWN_COLUMN",
            Error::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Error::Timeout(_) => "TIMEOUT",
            Error::Render(_) => "RENDER_ERROR",
            Error::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            Error::Parse(_) => "PARSE_ERROR",
            Error::Database(_) => "DATABASE_ERROR",
            Error::Yaml(_) => "YAML_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Http(_) => "HTTP_ERROR",
            Error::Io(_) => "IO_ERROR",
        }
    }

    /// Whether this error kind is transient from the caller's point of view.
    ///
    /// Transient errors may succeed if the whole run is resubmitted; the
    /// engine itself never retries.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::ServiceUnavailable(_) | Error::Timeout(_) | Error::Http(_)
        )
    }
}
