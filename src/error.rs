//! Error taxonomy for the analyzer.
//!
//! Language- and query-resolution errors are terminal for a request and carry
//! the offending identifier. Element- and cache-level errors are recovered
//! locally and surfaced as [`ErrorRecord`]s on the result.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::elements::ElementCategory;

/// Terminal errors for a single analysis request.
#[derive(Error, Debug, Clone)]
pub enum AnalysisError {
    #[error("unsupported language: {identifier}")]
    UnsupportedLanguage { identifier: String },
    #[error("language plugin {language} failed to initialize: {reason}")]
    PluginConstruction { language: String, reason: String },
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },
    #[error("analysis task failed: {0}")]
    Join(String),
}

impl AnalysisError {
    /// Stable kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::UnsupportedLanguage { .. } => ErrorKind::UnsupportedLanguage,
            AnalysisError::PluginConstruction { .. } => ErrorKind::PluginConstruction,
            AnalysisError::Query(e) => e.kind(),
            AnalysisError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            AnalysisError::Parse { .. } => ErrorKind::Parse,
            AnalysisError::Join(_) => ErrorKind::Unexpected,
        }
    }

    /// The identifier the error is about (language id, query key, path).
    pub fn identifier(&self) -> Option<&str> {
        match self {
            AnalysisError::UnsupportedLanguage { identifier } => Some(identifier),
            AnalysisError::PluginConstruction { language, .. } => Some(language),
            AnalysisError::Query(e) => e.identifier(),
            AnalysisError::Parse { path, .. } => Some(path),
            AnalysisError::InvalidRequest(_) | AnalysisError::Join(_) => None,
        }
    }
}

/// Query-stage failures. Each stage of query execution has its own variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("unsupported language: {language}")]
    UnsupportedLanguage { language: String },
    #[error("query {key:?} is not defined for {language}")]
    UnsupportedQuery { language: String, key: String },
    #[error("query syntax error at {row}:{column}: {message}")]
    Syntax {
        row: usize,
        column: usize,
        message: String,
    },
    #[error("failed to process capture {capture:?}: {message}")]
    CaptureProcessing { capture: String, message: String },
    #[error("unexpected query failure: {message}")]
    Unexpected { message: String },
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::UnsupportedLanguage { .. } => ErrorKind::UnsupportedLanguage,
            QueryError::UnsupportedQuery { .. } => ErrorKind::UnsupportedQuery,
            QueryError::Syntax { .. } => ErrorKind::QuerySyntax,
            QueryError::CaptureProcessing { .. } => ErrorKind::CaptureProcessing,
            QueryError::Unexpected { .. } => ErrorKind::UnexpectedQuery,
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        match self {
            QueryError::UnsupportedLanguage { language } => Some(language),
            QueryError::UnsupportedQuery { key, .. } => Some(key),
            QueryError::CaptureProcessing { capture, .. } => Some(capture),
            QueryError::Syntax { .. } | QueryError::Unexpected { .. } => None,
        }
    }
}

/// A handler failed on one node; only that element is skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("failed to extract {category} from {node_kind} at line {line}: {message}")]
pub struct ElementExtractionError {
    pub category: ElementCategory,
    pub node_kind: String,
    pub line: usize,
    pub message: String,
}

/// The cache could not serve or store a value; the caller computes directly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cache unavailable for {operation}: {message}")]
pub struct CacheComputationError {
    pub operation: String,
    pub message: String,
}

/// Stable, serializable error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedLanguage,
    PluginConstruction,
    UnsupportedQuery,
    QuerySyntax,
    CaptureProcessing,
    UnexpectedQuery,
    ElementExtraction,
    CacheComputation,
    InvalidRequest,
    Parse,
    Unexpected,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedLanguage => "unsupported_language",
            ErrorKind::PluginConstruction => "plugin_construction",
            ErrorKind::UnsupportedQuery => "unsupported_query",
            ErrorKind::QuerySyntax => "query_syntax",
            ErrorKind::CaptureProcessing => "capture_processing",
            ErrorKind::UnexpectedQuery => "unexpected_query",
            ErrorKind::ElementExtraction => "element_extraction",
            ErrorKind::CacheComputation => "cache_computation",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Parse => "parse",
            ErrorKind::Unexpected => "unexpected",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A recovered error, recorded on the analysis result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub message: String,
}

impl From<&ElementExtractionError> for ErrorRecord {
    fn from(e: &ElementExtractionError) -> Self {
        Self {
            kind: ErrorKind::ElementExtraction,
            identifier: Some(format!("{}:{}", e.node_kind, e.line)),
            message: e.to_string(),
        }
    }
}

impl From<&CacheComputationError> for ErrorRecord {
    fn from(e: &CacheComputationError) -> Self {
        Self {
            kind: ErrorKind::CacheComputation,
            identifier: Some(e.operation.clone()),
            message: e.to_string(),
        }
    }
}
