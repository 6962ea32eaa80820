//! Extraction pipeline: one iterative pre-order traversal per
//! (tree, category), dispatching to the plugin's handlers.

pub mod complexity;
pub mod metadata;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use crate::elements::{CodeElement, ElementCategory};
use crate::error::ElementExtractionError;
use crate::plugin::{HandlerContext, LanguagePlugin, ParsedSource};

/// Default cap on doc comment lines collected above an element.
pub const DEFAULT_MAX_DOC_LINES: usize = 50;

/// Output of one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub elements: Vec<CodeElement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ElementExtractionError>,
    /// Node ids claimed during traversal, in claim order. Only meaningful for
    /// the tree that produced them, so never persisted.
    #[serde(skip)]
    pub claimed: Vec<usize>,
}

impl Extraction {
    /// Append another extraction's output.
    pub fn merge(&mut self, other: Extraction) {
        self.elements.extend(other.elements);
        self.errors.extend(other.errors);
        self.claimed.extend(other.claimed);
    }

    pub fn of_category(&self, category: ElementCategory) -> impl Iterator<Item = &CodeElement> {
        self.elements.iter().filter(move |e| e.category == category)
    }
}

/// Extract all elements of one category.
pub fn extract(
    parsed: &ParsedSource,
    plugin: &LanguagePlugin,
    category: ElementCategory,
    max_doc_lines: usize,
) -> Extraction {
    let mut out = Extraction::default();
    if !plugin.handlers().supports(category) {
        return out;
    }

    let unit = parsed.unit();
    let root = parsed.root();
    let mut claimed: HashSet<usize> = HashSet::new();
    let mut cursor = root.walk();
    let mut stack: Vec<Node<'_>> = vec![root];

    while let Some(node) = stack.pop() {
        let mut descend = true;

        // Keyword tokens can share a kind name with a named node (`class`)
        let spec = if !node.is_named() || claimed.contains(&node.id()) {
            None
        } else {
            plugin.handlers().lookup(category, node.kind())
        };

        if let Some(spec) = spec {
            let mut ctx = HandlerContext::new(node, unit, plugin, category, max_doc_lines);
            match (spec.handler)(&mut ctx) {
                Ok(Some(draft)) => {
                    let (meta, extra) = ctx.finish();
                    for id in std::iter::once(node.id()).chain(extra) {
                        if claimed.insert(id) {
                            out.claimed.push(id);
                        }
                    }
                    out.elements.push(draft.into_element(category, meta));
                    descend = spec.descend;
                }
                Ok(None) => {}
                Err(e) => {
                    let line = node.start_position().row + 1;
                    tracing::warn!(
                        path = unit.path(),
                        kind = node.kind(),
                        line,
                        %category,
                        "element extraction failed: {:#}",
                        e
                    );
                    out.errors.push(ElementExtractionError {
                        category,
                        node_kind: node.kind().to_string(),
                        line,
                        message: format!("{:#}", e),
                    });
                    descend = spec.descend;
                }
            }
        }

        if descend {
            let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
    }

    out
}

/// Extract several categories, in the order given, into one result.
pub fn extract_all(
    parsed: &ParsedSource,
    plugin: &LanguagePlugin,
    categories: &[ElementCategory],
    max_doc_lines: usize,
) -> Extraction {
    let mut out = Extraction::default();
    for category in categories {
        out.merge(extract(parsed, plugin, *category, max_doc_lines));
    }
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::elements::Visibility;
    use crate::plugin::{ElementDraft, HandlerRegistry, LanguageProvider};
    use crate::source::SourceUnit;

    struct Flaky;

    fn function(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
        let name = ctx
            .field_text("name")
            .ok_or_else(|| anyhow::anyhow!("function without name"))?;
        if name == "broken" {
            anyhow::bail!("refusing to extract {}", name);
        }
        if name.starts_with('_') {
            return Ok(None);
        }
        Ok(Some(
            ElementDraft::new(name, "function").visibility(Visibility::Public),
        ))
    }

    fn keyword(_ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
        anyhow::bail!("handler ran on a keyword token")
    }

    impl LanguageProvider for Flaky {
        fn id(&self) -> &'static str {
            "python"
        }

        fn grammar(&self) -> tree_sitter::Language {
            tree_sitter_python::LANGUAGE.into()
        }

        fn extensions(&self) -> &'static [&'static str] {
            &["py"]
        }

        fn handlers(&self) -> HandlerRegistry {
            HandlerRegistry::new()
                .on(ElementCategory::Function, &["function_definition"], function)
                .on(ElementCategory::Class, &["class"], keyword)
        }
    }

    fn parse(source: &str) -> (LanguagePlugin, ParsedSource) {
        let plugin = LanguagePlugin::build(&Flaky).unwrap();
        let unit = Arc::new(SourceUnit::new("t.py", source, "python"));
        let parsed = plugin.parse(unit).unwrap();
        (plugin, parsed)
    }

    #[test]
    fn test_failing_handler_keeps_siblings() {
        let (plugin, parsed) = parse("def a():\n    pass\n\ndef broken():\n    pass\n\ndef c():\n    pass\n");
        let out = extract(&parsed, &plugin, ElementCategory::Function, DEFAULT_MAX_DOC_LINES);

        let names: Vec<&str> = out.elements.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].node_kind, "function_definition");
        assert_eq!(out.errors[0].line, 4);
    }

    #[test]
    fn test_declined_node_children_still_visited() {
        let (plugin, parsed) = parse("def _outer():\n    def inner():\n        pass\n");
        let out = extract(&parsed, &plugin, ElementCategory::Function, DEFAULT_MAX_DOC_LINES);
        assert_eq!(out.elements.len(), 1);
        assert_eq!(out.elements[0].name, "inner");
        assert_eq!(out.claimed.len(), 1);
    }

    #[test]
    fn test_keyword_tokens_never_reach_handlers() {
        let (plugin, parsed) = parse("class A:\n    pass\n\nclass B:\n    pass\n");
        let out = extract(&parsed, &plugin, ElementCategory::Class, DEFAULT_MAX_DOC_LINES);
        assert!(out.elements.is_empty());
        assert!(out.errors.is_empty(), "{:?}", out.errors);
    }

    #[test]
    fn test_unsupported_category_is_empty() {
        let (plugin, parsed) = parse("import os\n");
        let out = extract(&parsed, &plugin, ElementCategory::Import, DEFAULT_MAX_DOC_LINES);
        assert!(out.elements.is_empty());
        assert!(out.errors.is_empty());
    }

    #[test]
    fn test_span_and_raw_text() {
        let (plugin, parsed) = parse("x = 1\n\ndef f(a):\n    return a\n");
        let out = extract(&parsed, &plugin, ElementCategory::Function, DEFAULT_MAX_DOC_LINES);
        let f = &out.elements[0];
        assert_eq!(f.span.start_line, 3);
        assert_eq!(f.span.end_line, 4);
        assert_eq!(f.raw_text, "def f(a):\n    return a");
        assert!(f.span_is_consistent());
        assert_eq!(f.complexity, Some(1));
    }
}
