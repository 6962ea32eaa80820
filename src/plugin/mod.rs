//! Language plugins.
//!
//! A plugin is plain data: a grammar, handler tables per element category, a
//! decision set for complexity, a library of named queries and the bits of
//! comment syntax needed to find doc comments. Each language describes itself
//! through [`LanguageProvider`]; [`LanguagePlugin::build`] turns that
//! description into the shared, read-only value the pipeline works with.

pub mod handlers;
pub mod registry;
pub mod sniff;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tree_sitter::{Language, Node, Parser as TsParser, Query, QueryErrorKind, Tree};

use crate::elements::ElementCategory;
use crate::error::{AnalysisError, QueryError};
use crate::source::SourceUnit;

pub use handlers::{ElementDraft, ElementHandler, HandlerContext, HandlerRegistry, HandlerSpec};
pub use registry::PluginRegistry;

/// Plugin-specific doc comment lookup, used instead of the line scan.
pub type DocExtractor = fn(Node<'_>, &SourceUnit) -> Option<String>;

/// Node kinds and operator tokens that each add one decision point.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionSet {
    pub kinds: &'static [&'static str],
    /// `(parent node kind, operator token text)` pairs.
    pub operators: &'static [(&'static str, &'static str)],
    /// Nested nodes with their own complexity, such as lambdas, that no
    /// function handler claims. Function handler kinds are always scopes.
    pub scopes: &'static [&'static str],
}

/// An entry in a plugin's query library.
#[derive(Debug, Clone, Copy)]
pub struct NamedQuery {
    pub key: &'static str,
    pub description: &'static str,
    pub source: &'static str,
}

/// Everything a language has to say about itself.
///
/// Only the identity, grammar and extensions are required. A provider that
/// leaves the rest at the defaults still parses, but yields no elements and no
/// queries, and every function scores complexity 1.
pub trait LanguageProvider: Send + Sync {
    /// Canonical language id, e.g. "python".
    fn id(&self) -> &'static str;

    fn grammar(&self) -> Language;

    /// File extensions without the leading dot, lowercase.
    fn extensions(&self) -> &'static [&'static str];

    /// Exact file names, e.g. "Rakefile".
    fn file_names(&self) -> &'static [&'static str] {
        &[]
    }

    /// Interpreter names recognised on a shebang line.
    fn interpreters(&self) -> &'static [&'static str] {
        &[]
    }

    /// Tokens counted by the content sniff.
    fn sniff_keywords(&self) -> &'static [&'static str] {
        &[]
    }

    fn handlers(&self) -> HandlerRegistry {
        HandlerRegistry::default()
    }

    fn decisions(&self) -> DecisionSet {
        DecisionSet::default()
    }

    fn queries(&self) -> &'static [NamedQuery] {
        &[]
    }

    /// Line prefixes that start a doc comment, e.g. "///" or "#".
    fn comment_markers(&self) -> &'static [&'static str] {
        &[]
    }

    /// Line prefixes skipped while scanning upward for a doc comment,
    /// e.g. "@" for decorators or "#[" for attributes.
    fn annotation_prefixes(&self) -> &'static [&'static str] {
        &[]
    }

    fn doc_extractor(&self) -> Option<DocExtractor> {
        None
    }
}

/// A constructed language plugin. Shared read-only across requests.
pub struct LanguagePlugin {
    id: &'static str,
    language: Language,
    extensions: &'static [&'static str],
    file_names: &'static [&'static str],
    interpreters: &'static [&'static str],
    sniff_keywords: &'static [&'static str],
    handlers: HandlerRegistry,
    decisions: DecisionSet,
    queries: &'static [NamedQuery],
    comment_markers: &'static [&'static str],
    annotation_prefixes: &'static [&'static str],
    doc_extractor: Option<DocExtractor>,
    function_kinds: HashSet<&'static str>,
    /// Compiled queries keyed by query source.
    compiled: DashMap<String, Arc<Query>>,
}

impl fmt::Debug for LanguagePlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LanguagePlugin")
            .field("id", &self.id)
            .field("extensions", &self.extensions)
            .field("queries", &self.queries.len())
            .finish_non_exhaustive()
    }
}

impl LanguagePlugin {
    /// Build a plugin from its provider.
    ///
    /// Fails when the grammar's ABI is not accepted by the linked tree-sitter
    /// runtime. Handler kinds the grammar does not know are logged and kept;
    /// they simply never match.
    pub fn build(provider: &dyn LanguageProvider) -> Result<Self, AnalysisError> {
        let id = provider.id();
        let language = provider.grammar();

        let mut parser = TsParser::new();
        parser
            .set_language(&language)
            .map_err(|e| AnalysisError::PluginConstruction {
                language: id.to_string(),
                reason: e.to_string(),
            })?;

        let handlers = provider.handlers();
        for category in ElementCategory::ALL {
            for kind in handlers.kinds(category) {
                if language.id_for_node_kind(kind, true) == 0 {
                    tracing::warn!(language = id, kind, %category, "handler registered for unknown node kind");
                }
            }
        }

        let decisions = provider.decisions();
        for kind in decisions.kinds.iter().chain(decisions.scopes) {
            if language.id_for_node_kind(kind, true) == 0 {
                tracing::warn!(language = id, kind, "decision kind not in grammar");
            }
        }

        let function_kinds = handlers.kinds(ElementCategory::Function).collect();

        Ok(Self {
            id,
            language,
            extensions: provider.extensions(),
            file_names: provider.file_names(),
            interpreters: provider.interpreters(),
            sniff_keywords: provider.sniff_keywords(),
            handlers,
            decisions,
            queries: provider.queries(),
            comment_markers: provider.comment_markers(),
            annotation_prefixes: provider.annotation_prefixes(),
            doc_extractor: provider.doc_extractor(),
            function_kinds,
            compiled: DashMap::new(),
        })
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn extensions(&self) -> &'static [&'static str] {
        self.extensions
    }

    pub fn file_names(&self) -> &'static [&'static str] {
        self.file_names
    }

    pub fn interpreters(&self) -> &'static [&'static str] {
        self.interpreters
    }

    pub fn sniff_keywords(&self) -> &'static [&'static str] {
        self.sniff_keywords
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn decisions(&self) -> &DecisionSet {
        &self.decisions
    }

    pub fn queries(&self) -> &'static [NamedQuery] {
        self.queries
    }

    pub fn named_query(&self, key: &str) -> Option<&'static NamedQuery> {
        self.queries.iter().find(|q| q.key == key)
    }

    pub fn comment_markers(&self) -> &'static [&'static str] {
        self.comment_markers
    }

    pub fn annotation_prefixes(&self) -> &'static [&'static str] {
        self.annotation_prefixes
    }

    pub fn doc_extractor(&self) -> Option<DocExtractor> {
        self.doc_extractor
    }

    /// Whether nodes of this kind are extracted as functions.
    pub fn is_function_kind(&self, kind: &str) -> bool {
        self.function_kinds.contains(kind)
    }

    /// Parse a source unit into a CST.
    pub fn parse(&self, unit: Arc<SourceUnit>) -> Result<ParsedSource, AnalysisError> {
        let mut parser = TsParser::new();
        parser
            .set_language(&self.language)
            .map_err(|e| AnalysisError::Parse {
                path: unit.path().to_string(),
                reason: e.to_string(),
            })?;
        let tree = parser
            .parse(unit.bytes(), None)
            .ok_or_else(|| AnalysisError::Parse {
                path: unit.path().to_string(),
                reason: "parser returned no tree".to_string(),
            })?;
        Ok(ParsedSource { unit, tree })
    }

    /// Compile a query against this grammar, reusing an earlier compilation
    /// of the same source.
    pub fn compile_query(&self, source: &str) -> Result<Arc<Query>, QueryError> {
        if let Some(query) = self.compiled.get(source) {
            return Ok(Arc::clone(&query));
        }
        let query = Query::new(&self.language, source).map_err(convert_query_error)?;
        let query = Arc::new(query);
        self.compiled
            .entry(source.to_string())
            .or_insert_with(|| Arc::clone(&query));
        Ok(query)
    }
}

/// Classify a tree-sitter compile error.
///
/// Malformed query text is a syntax error. Names the grammar does not know
/// (node types, fields, captures referenced by predicates) are capture
/// processing errors, keyed by the offending name.
fn convert_query_error(e: tree_sitter::QueryError) -> QueryError {
    match e.kind {
        QueryErrorKind::Syntax | QueryErrorKind::Structure | QueryErrorKind::Predicate => {
            QueryError::Syntax {
                row: e.row + 1,
                column: e.column + 1,
                message: e.message,
            }
        }
        QueryErrorKind::NodeType | QueryErrorKind::Field | QueryErrorKind::Capture => {
            let what = match e.kind {
                QueryErrorKind::NodeType => "node type",
                QueryErrorKind::Field => "field",
                _ => "capture",
            };
            QueryError::CaptureProcessing {
                message: format!("unknown {} {:?} at {}:{}", what, e.message, e.row + 1, e.column + 1),
                capture: e.message,
            }
        }
        QueryErrorKind::Language => QueryError::Unexpected {
            message: format!("query language mismatch: {}", e.message),
        },
    }
}

/// A parsed file: the tree plus the source it was parsed from.
pub struct ParsedSource {
    unit: Arc<SourceUnit>,
    tree: Tree,
}

impl fmt::Debug for ParsedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedSource")
            .field("path", &self.unit.path())
            .field("language", &self.unit.language())
            .field("has_errors", &self.tree.root_node().has_error())
            .finish()
    }
}

impl ParsedSource {
    pub fn unit(&self) -> &SourceUnit {
        &self.unit
    }

    pub fn shared_unit(&self) -> Arc<SourceUnit> {
        Arc::clone(&self.unit)
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }
}
