//! Structural query execution.
//!
//! A request names a query from the plugin's library or carries raw query
//! text. Matches become [`QueryResult`]s, each mapped to the element that
//! owns it, then narrowed by a [`FilterChain`].

pub mod filter;

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use streaming_iterator::StreamingIterator;
use tree_sitter::{QueryCapture, QueryCursor};

use crate::elements::{CodeElement, ElementCategory, Span};
use crate::error::QueryError;
use crate::plugin::{LanguagePlugin, ParsedSource, PluginRegistry};

pub use filter::{FilterChain, FilterError, Predicate};

/// Default cap on in-progress matches held by a query cursor.
pub const DEFAULT_MATCH_LIMIT: u32 = 10_000;

/// Which query to run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "value")]
pub enum QueryRef {
    /// A key in the language's named query library.
    Named(String),
    /// Query text compiled as given.
    Raw(String),
}

impl QueryRef {
    pub fn named(key: impl Into<String>) -> Self {
        QueryRef::Named(key.into())
    }

    pub fn raw(source: impl Into<String>) -> Self {
        QueryRef::Raw(source.into())
    }
}

/// Capture selection and truncation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryOptions {
    /// One result per capture instead of one per match.
    #[serde(default)]
    pub all_captures: bool,
    /// Only results for this capture name.
    #[serde(default)]
    pub capture: Option<String>,
    /// Maximum number of results, applied after filtering.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Input to [`QueryEngine::execute`].
pub struct QueryRequest<'a> {
    pub parsed: &'a ParsedSource,
    /// Language name or alias the query is written for.
    pub language: &'a str,
    pub query: &'a QueryRef,
    pub filter: &'a FilterChain,
    pub options: &'a QueryOptions,
    /// Elements extracted from the same tree, used to resolve owners.
    pub elements: Option<&'a [CodeElement]>,
}

/// The element a result belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRef {
    pub category: ElementCategory,
    pub name: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub start_line: usize,
}

impl From<&CodeElement> for ElementRef {
    fn from(e: &CodeElement) -> Self {
        Self {
            category: e.category,
            name: e.name.clone(),
            kind: e.kind.clone(),
            parent: e.parent.clone(),
            start_line: e.span.start_line,
        }
    }
}

/// One captured node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    pub capture: String,
    pub node_kind: String,
    pub text: String,
    /// Text of the `name` capture of the same match, if the query has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub span: Span,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<ElementRef>,
}

/// Element whose span is exactly `span`, else the smallest one enclosing it.
pub fn owning_element<'e>(elements: &'e [CodeElement], span: &Span) -> Option<&'e CodeElement> {
    elements
        .iter()
        .find(|e| e.span.start_byte == span.start_byte && e.span.end_byte == span.end_byte)
        .or_else(|| {
            elements
                .iter()
                .filter(|e| e.span.contains(span))
                .min_by_key(|e| e.span.byte_len())
        })
}

/// Runs structural queries against parsed sources.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    registry: Arc<PluginRegistry>,
    match_limit: u32,
}

impl QueryEngine {
    pub fn new(registry: Arc<PluginRegistry>, match_limit: u32) -> Self {
        Self {
            registry,
            match_limit,
        }
    }

    pub fn match_limit(&self) -> u32 {
        self.match_limit
    }

    /// Execute a query. Results come back in match order.
    ///
    /// Panics raised while executing are caught and reported as
    /// [`QueryError::Unexpected`].
    pub fn execute(&self, request: &QueryRequest<'_>) -> Result<Vec<QueryResult>, QueryError> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.run(request))) {
            Ok(result) => result,
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "query execution panicked".to_string());
                tracing::error!(language = request.language, %message, "query execution panicked");
                Err(QueryError::Unexpected { message })
            }
        }
    }

    /// Resolve the plugin a request's language names.
    fn plugin(&self, language: &str) -> Result<Arc<LanguagePlugin>, QueryError> {
        let id = self
            .registry
            .normalize(language)
            .ok_or_else(|| QueryError::UnsupportedLanguage {
                language: language.to_string(),
            })?;
        self.registry
            .by_language(id)
            .map_err(|e| QueryError::Unexpected {
                message: e.to_string(),
            })
    }

    fn run(&self, request: &QueryRequest<'_>) -> Result<Vec<QueryResult>, QueryError> {
        let plugin = self.plugin(request.language)?;
        let tree_language = request.parsed.unit().language();
        if plugin.id() != tree_language {
            return Err(QueryError::Unexpected {
                message: format!(
                    "query language {} does not match tree language {}",
                    plugin.id(),
                    tree_language
                ),
            });
        }

        let source = match request.query {
            QueryRef::Named(key) => {
                plugin
                    .named_query(key)
                    .ok_or_else(|| QueryError::UnsupportedQuery {
                        language: plugin.id().to_string(),
                        key: key.clone(),
                    })?
                    .source
            }
            QueryRef::Raw(text) => text.as_str(),
        };
        let query = plugin.compile_query(source)?;
        let names = query.capture_names();

        let wanted = match &request.options.capture {
            Some(capture) => Some(query.capture_index_for_name(capture).ok_or_else(|| {
                QueryError::CaptureProcessing {
                    capture: capture.clone(),
                    message: "query has no capture with this name".to_string(),
                }
            })?),
            None => None,
        };
        let name_index = query.capture_index_for_name("name");

        let bytes = request.parsed.unit().bytes();
        let elements = request.elements.unwrap_or(&[]);
        let limit = request.options.limit.unwrap_or(usize::MAX);

        let mut cursor = QueryCursor::new();
        cursor.set_match_limit(self.match_limit);
        let mut matches = cursor.matches(&query, request.parsed.root(), bytes);

        let mut seen: HashSet<(u32, usize)> = HashSet::new();
        let mut results = Vec::new();

        while let Some(m) = matches.next() {
            if results.len() >= limit {
                break;
            }

            let selected: Vec<&QueryCapture<'_>> = if let Some(index) = wanted {
                m.captures.iter().filter(|c| c.index == index).collect()
            } else if request.options.all_captures {
                m.captures.iter().collect()
            } else {
                primary_capture(m.captures).into_iter().collect()
            };

            let name = match name_index.and_then(|i| m.captures.iter().find(|c| c.index == i)) {
                Some(c) => Some(capture_text(c, names, bytes)?.to_string()),
                None => None,
            };

            for capture in selected {
                if !seen.insert((capture.index, capture.node.id())) {
                    continue;
                }
                let capture_name = names.get(capture.index as usize).ok_or_else(|| {
                    QueryError::CaptureProcessing {
                        capture: capture.index.to_string(),
                        message: "capture index out of range".to_string(),
                    }
                })?;
                let text = capture_text(capture, names, bytes)?;
                let span = Span::from_node(capture.node);
                let owner = owning_element(elements, &span);

                let mut result = QueryResult {
                    capture: capture_name.to_string(),
                    node_kind: capture.node.kind().to_string(),
                    text: text.to_string(),
                    name: name.clone(),
                    span,
                    element: None,
                };
                if !request.filter.matches_result(&result, owner) {
                    continue;
                }
                result.element = owner.map(ElementRef::from);
                results.push(result);
                if results.len() >= limit {
                    break;
                }
            }
        }

        tracing::debug!(
            language = plugin.id(),
            path = request.parsed.unit().path(),
            results = results.len(),
            "query executed"
        );
        Ok(results)
    }
}

/// The capture spanning the most bytes; the first one wins ties.
fn primary_capture<'c, 't>(captures: &'c [QueryCapture<'t>]) -> Option<&'c QueryCapture<'t>> {
    let mut best: Option<&QueryCapture<'t>> = None;
    for capture in captures {
        let len = capture.node.byte_range().len();
        if best.map_or(true, |b| len > b.node.byte_range().len()) {
            best = Some(capture);
        }
    }
    best
}

fn capture_text<'s>(
    capture: &QueryCapture<'_>,
    names: &[&str],
    bytes: &'s [u8],
) -> Result<&'s str, QueryError> {
    let range = capture.node.byte_range();
    let slice = bytes.get(range).ok_or_else(|| QueryError::CaptureProcessing {
        capture: capture_label(capture, names),
        message: "capture lies outside the source".to_string(),
    })?;
    std::str::from_utf8(slice).map_err(|e| QueryError::CaptureProcessing {
        capture: capture_label(capture, names),
        message: format!("capture text is not UTF-8: {}", e),
    })
}

fn capture_label(capture: &QueryCapture<'_>, names: &[&str]) -> String {
    names
        .get(capture.index as usize)
        .map_or_else(|| capture.index.to_string(), |n| n.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::ElementCategory;
    use crate::extract::{extract_all, DEFAULT_MAX_DOC_LINES};
    use crate::source::SourceUnit;

    const SOURCE: &str = r#"class Alpha:
    def run(self, x):
        return helper(x)


def helper(value):
    return value


class Beta:
    pass
"#;

    struct Fixture {
        registry: Arc<PluginRegistry>,
        parsed: ParsedSource,
        elements: Vec<CodeElement>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(PluginRegistry::default());
        let plugin = registry.by_language("python").unwrap();
        let unit = Arc::new(SourceUnit::new("mod.py", SOURCE, "python"));
        let parsed = plugin.parse(unit).unwrap();
        let elements = extract_all(
            &parsed,
            &plugin,
            &[ElementCategory::Function, ElementCategory::Class],
            DEFAULT_MAX_DOC_LINES,
        )
        .elements;
        Fixture {
            registry,
            parsed,
            elements,
        }
    }

    fn run(
        fx: &Fixture,
        language: &str,
        query: QueryRef,
        filter: &str,
        options: QueryOptions,
    ) -> Result<Vec<QueryResult>, QueryError> {
        let engine = QueryEngine::new(Arc::clone(&fx.registry), DEFAULT_MATCH_LIMIT);
        let filter = FilterChain::parse(filter).unwrap();
        engine.execute(&QueryRequest {
            parsed: &fx.parsed,
            language,
            query: &query,
            filter: &filter,
            options: &options,
            elements: Some(&fx.elements),
        })
    }

    #[test]
    fn test_classes_query_in_source_order() {
        let fx = fixture();
        let results = run(&fx, "python", QueryRef::named("classes"), "", QueryOptions::default()).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name.as_deref(), Some("Alpha"));
        assert_eq!(results[1].name.as_deref(), Some("Beta"));
        assert_eq!(results[0].capture, "class");
        assert_eq!(results[0].node_kind, "class_definition");
        let owner = results[0].element.as_ref().unwrap();
        assert_eq!(owner.name, "Alpha");
        assert_eq!(owner.category, ElementCategory::Class);
    }

    #[test]
    fn test_alias_and_filter() {
        let fx = fixture();
        let results = run(&fx, "PY", QueryRef::named("functions"), "kind=function,params=1", QueryOptions::default()).unwrap();
        let names: Vec<&str> = results.iter().filter_map(|r| r.name.as_deref()).collect();
        assert_eq!(names, vec!["helper"]);
    }

    #[test]
    fn test_all_captures_and_capture_option() {
        let fx = fixture();
        let all = run(
            &fx,
            "python",
            QueryRef::named("classes"),
            "",
            QueryOptions {
                all_captures: true,
                ..QueryOptions::default()
            },
        )
        .unwrap();
        assert_eq!(all.len(), 4);

        let only_names = run(
            &fx,
            "python",
            QueryRef::named("classes"),
            "",
            QueryOptions {
                capture: Some("name".to_string()),
                ..QueryOptions::default()
            },
        )
        .unwrap();
        let texts: Vec<&str> = only_names.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["Alpha", "Beta"]);
    }

    #[test]
    fn test_raw_query_owner_is_smallest_enclosing() {
        let fx = fixture();
        let results = run(
            &fx,
            "python",
            QueryRef::raw("(call function: (identifier) @callee) @call"),
            "",
            QueryOptions::default(),
        )
        .unwrap();
        assert_eq!(results.len(), 1);
        let owner = results[0].element.as_ref().unwrap();
        assert_eq!(owner.name, "run");
        assert_eq!(owner.parent.as_deref(), Some("Alpha"));
    }

    #[test]
    fn test_limit_applies_after_filter() {
        let fx = fixture();
        let results = run(
            &fx,
            "python",
            QueryRef::named("functions"),
            "name=helper",
            QueryOptions {
                limit: Some(1),
                ..QueryOptions::default()
            },
        )
        .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name.as_deref(), Some("helper"));
    }

    #[test]
    fn test_error_tiers() {
        let fx = fixture();
        let err = run(&fx, "cobol", QueryRef::named("classes"), "", QueryOptions::default()).unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedLanguage { .. }));

        let err = run(&fx, "python", QueryRef::named("widgets"), "", QueryOptions::default()).unwrap_err();
        assert_eq!(
            err,
            QueryError::UnsupportedQuery {
                language: "python".to_string(),
                key: "widgets".to_string()
            }
        );

        let err = run(&fx, "python", QueryRef::raw("(class_definition"), "", QueryOptions::default()).unwrap_err();
        assert!(matches!(err, QueryError::Syntax { .. }), "{:?}", err);

        let err = run(&fx, "python", QueryRef::raw("(no_such_node) @x"), "", QueryOptions::default()).unwrap_err();
        assert!(matches!(err, QueryError::CaptureProcessing { .. }), "{:?}", err);

        let err = run(
            &fx,
            "python",
            QueryRef::named("classes"),
            "",
            QueryOptions {
                capture: Some("missing".to_string()),
                ..QueryOptions::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::CaptureProcessing { .. }));
    }

    #[test]
    fn test_language_mismatch_is_unexpected() {
        let fx = fixture();
        let err = run(&fx, "rust", QueryRef::named("functions"), "", QueryOptions::default()).unwrap_err();
        assert!(matches!(err, QueryError::Unexpected { .. }));
    }
}
