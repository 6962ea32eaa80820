//! treescope - multi-language structural code analysis.
//!
//! treescope parses source files with tree-sitter and extracts a normalized
//! inventory of code elements: functions, classes, fields, variables and
//! imports, with spans, doc comments and cyclomatic complexity.
//!
//! # Architecture
//!
//! - `languages`: one [`LanguageProvider`] per grammar (handlers, decision
//!   sets, named queries)
//! - `plugin`: plugin construction, the handler API, and the registry that
//!   resolves files to languages
//! - `extract`: the shared traversal that turns a tree into elements
//! - `query`: named and raw structural queries plus the filter language
//! - `cache`: content-addressed single-flight cache, with optional disk
//!   persistence for extractions
//! - `engine`: request handling on top of all of the above
//!
//! # Adding a New Language
//!
//! See `src/languages/` for examples. Implement [`LanguageProvider`] and add
//! the provider to `languages::builtin()`.

pub mod cache;
pub mod cli;
pub mod config;
pub mod elements;
pub mod engine;
pub mod error;
pub mod extract;
pub mod languages;
pub mod logging;
pub mod plugin;
pub mod query;
pub mod report;
pub mod source;

pub use cache::{CacheKey, CacheService, CacheStats};
pub use config::Config;
pub use elements::{CodeElement, ElementCategory, Span, Visibility};
pub use engine::{AnalysisEngine, AnalyzeRequest, AnalyzeResult, FormatOptions, Summary};
pub use error::{AnalysisError, ErrorKind, ErrorRecord, QueryError};
pub use extract::{extract, extract_all, Extraction};
pub use plugin::{LanguagePlugin, LanguageProvider, ParsedSource, PluginRegistry};
pub use query::{FilterChain, QueryEngine, QueryOptions, QueryRef, QueryResult};
pub use source::{Fingerprint, SourceUnit};
