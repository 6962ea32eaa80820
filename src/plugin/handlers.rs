//! Handler registry: node kind → extractor function, per element category.

use std::cell::OnceCell;
use std::collections::{BTreeSet, HashMap};

use tree_sitter::Node;

use crate::elements::{CodeElement, ElementCategory, Visibility};
use crate::extract::complexity;
use crate::extract::metadata::{self, CommonMetadata};
use crate::source::SourceUnit;

use super::LanguagePlugin;

/// Extractor for one node kind. Returns `Ok(None)` to decline the node, in
/// which case it is not claimed and its children are traversed.
pub type ElementHandler = fn(&mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>>;

/// A registered handler and whether traversal continues below a claimed node.
#[derive(Clone, Copy)]
pub struct HandlerSpec {
    pub handler: ElementHandler,
    pub descend: bool,
}

impl std::fmt::Debug for HandlerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerSpec")
            .field("descend", &self.descend)
            .finish_non_exhaustive()
    }
}

/// Per-category tables of node kind → handler.
#[derive(Debug, Clone, Default)]
pub struct HandlerRegistry {
    tables: HashMap<ElementCategory, HashMap<&'static str, HandlerSpec>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler whose claimed nodes are still descended into.
    pub fn on(
        self,
        category: ElementCategory,
        kinds: &[&'static str],
        handler: ElementHandler,
    ) -> Self {
        self.insert(category, kinds, HandlerSpec { handler, descend: true })
    }

    /// Register a handler whose claimed nodes end traversal of that subtree.
    pub fn on_leaf(
        self,
        category: ElementCategory,
        kinds: &[&'static str],
        handler: ElementHandler,
    ) -> Self {
        self.insert(
            category,
            kinds,
            HandlerSpec {
                handler,
                descend: false,
            },
        )
    }

    fn insert(mut self, category: ElementCategory, kinds: &[&'static str], spec: HandlerSpec) -> Self {
        let table = self.tables.entry(category).or_default();
        for kind in kinds {
            table.insert(*kind, spec);
        }
        self
    }

    pub fn lookup(&self, category: ElementCategory, kind: &str) -> Option<&HandlerSpec> {
        self.tables.get(&category)?.get(kind)
    }

    /// Node kinds registered for a category.
    pub fn kinds(&self, category: ElementCategory) -> impl Iterator<Item = &'static str> + '_ {
        self.tables
            .get(&category)
            .into_iter()
            .flat_map(|table| table.keys().copied())
    }

    pub fn supports(&self, category: ElementCategory) -> bool {
        self.tables.get(&category).is_some_and(|t| !t.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.tables.values().all(HashMap::is_empty)
    }
}

/// The language-specific part of an element. The pipeline merges it with the
/// common metadata (span, raw text, doc comment, complexity).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementDraft {
    pub name: String,
    pub kind: String,
    pub signature: String,
    pub parameters: Vec<String>,
    pub return_type: Option<String>,
    pub parent: Option<String>,
    pub visibility: Visibility,
    pub tags: BTreeSet<String>,
}

impl ElementDraft {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }

    pub fn parameters(mut self, parameters: Vec<String>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn returns(mut self, return_type: Option<impl Into<String>>) -> Self {
        self.return_type = return_type.map(Into::into);
        self
    }

    pub fn parent(mut self, parent: Option<impl Into<String>>) -> Self {
        self.parent = parent.map(Into::into);
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn tag_if(self, condition: bool, tag: impl Into<String>) -> Self {
        if condition {
            self.tag(tag)
        } else {
            self
        }
    }

    pub(crate) fn into_element(self, category: ElementCategory, meta: CommonMetadata) -> CodeElement {
        CodeElement {
            category,
            name: self.name,
            kind: self.kind,
            signature: self.signature,
            parameters: self.parameters,
            return_type: self.return_type,
            parent: self.parent,
            span: meta.span,
            visibility: self.visibility,
            raw_text: meta.raw_text,
            doc: meta.doc,
            complexity: meta.complexity,
            tags: self.tags,
        }
    }
}

/// What a handler sees: the matched node, the source, and lazily computed
/// common metadata.
pub struct HandlerContext<'a, 't> {
    node: Node<'t>,
    unit: &'a SourceUnit,
    plugin: &'a LanguagePlugin,
    category: ElementCategory,
    max_doc_lines: usize,
    metadata: OnceCell<CommonMetadata>,
    extra_claims: Vec<usize>,
}

impl<'a, 't> HandlerContext<'a, 't> {
    pub(crate) fn new(
        node: Node<'t>,
        unit: &'a SourceUnit,
        plugin: &'a LanguagePlugin,
        category: ElementCategory,
        max_doc_lines: usize,
    ) -> Self {
        Self {
            node,
            unit,
            plugin,
            category,
            max_doc_lines,
            metadata: OnceCell::new(),
            extra_claims: Vec::new(),
        }
    }

    pub fn node(&self) -> Node<'t> {
        self.node
    }

    pub fn unit(&self) -> &'a SourceUnit {
        self.unit
    }

    pub fn plugin(&self) -> &'a LanguagePlugin {
        self.plugin
    }

    pub fn category(&self) -> ElementCategory {
        self.category
    }

    /// Original text of any node in this tree.
    pub fn text(&self, node: Node<'_>) -> &'a str {
        self.unit.slice(node.byte_range())
    }

    /// Original text of the matched node.
    pub fn node_text(&self) -> &'a str {
        self.text(self.node)
    }

    pub fn field(&self, name: &str) -> Option<Node<'t>> {
        self.node.child_by_field_name(name)
    }

    pub fn field_text(&self, name: &str) -> Option<&'a str> {
        self.field(name).map(|n| self.text(n))
    }

    /// Claim another node for this traversal, e.g. the definition wrapped by a
    /// decorator node, so no other handler picks it up.
    pub fn claim(&mut self, node: Node<'_>) {
        self.extra_claims.push(node.id());
    }

    /// Span, raw text and doc comment of the matched node, computed on first
    /// use. Complexity is filled in once the handler has returned.
    pub fn metadata(&self) -> &CommonMetadata {
        self.metadata.get_or_init(|| {
            metadata::compute(self.node, self.unit, self.plugin, self.max_doc_lines)
        })
    }

    pub(crate) fn finish(self) -> (CommonMetadata, Vec<usize>) {
        let HandlerContext {
            node,
            unit,
            plugin,
            category,
            max_doc_lines,
            metadata: cell,
            extra_claims,
        } = self;
        let mut meta = cell
            .into_inner()
            .unwrap_or_else(|| metadata::compute(node, unit, plugin, max_doc_lines));
        if category == ElementCategory::Function {
            meta.complexity = Some(complexity::cyclomatic(node, plugin, &extra_claims));
        }
        (meta, extra_claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
        Ok(None)
    }

    #[test]
    fn test_registry_lookup() {
        let registry = HandlerRegistry::new()
            .on(ElementCategory::Function, &["function_definition"], noop)
            .on_leaf(ElementCategory::Import, &["import_statement", "import_from_statement"], noop);

        assert!(registry.lookup(ElementCategory::Function, "function_definition").is_some());
        assert!(registry.lookup(ElementCategory::Class, "function_definition").is_none());
        let import = registry
            .lookup(ElementCategory::Import, "import_from_statement")
            .unwrap();
        assert!(!import.descend);
        assert!(registry.supports(ElementCategory::Import));
        assert!(!registry.supports(ElementCategory::Field));
        assert_eq!(registry.kinds(ElementCategory::Import).count(), 2);
    }

    #[test]
    fn test_empty_registry() {
        let registry = HandlerRegistry::default();
        assert!(registry.is_empty());
        assert!(!registry.supports(ElementCategory::Function));
    }

    #[test]
    fn test_draft_builder() {
        let draft = ElementDraft::new("run", "method")
            .signature("def run(self, x)")
            .parameters(vec!["x".to_string()])
            .returns(Some("int"))
            .parent(Some("Worker"))
            .visibility(Visibility::Public)
            .tag("async")
            .tag_if(false, "static");
        assert_eq!(draft.name, "run");
        assert_eq!(draft.return_type.as_deref(), Some("int"));
        assert_eq!(draft.parent.as_deref(), Some("Worker"));
        assert!(draft.tags.contains("async"));
        assert!(!draft.tags.contains("static"));
    }
}
