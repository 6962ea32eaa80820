//! Language-agnostic element model extracted from CSTs.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Source location span with byte offsets and 1-based inclusive lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (0-indexed).
    pub start_byte: usize,
    /// End byte offset (0-indexed, exclusive).
    pub end_byte: usize,
    /// Start line (1-indexed).
    pub start_line: usize,
    /// End line (1-indexed, inclusive).
    pub end_line: usize,
}

impl Span {
    /// Create a span from a tree-sitter node.
    ///
    /// A node that ends at column 0 of a later row (its trailing newline is
    /// part of the node) ends on the previous line.
    pub fn from_node(node: tree_sitter::Node) -> Self {
        let start = node.start_position();
        let end = node.end_position();
        let start_line = start.row + 1; // tree-sitter is 0-indexed
        let mut end_line = end.row + 1;
        if end.column == 0 && end.row > start.row {
            end_line -= 1;
        }
        Self {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line,
            end_line,
        }
    }

    /// Number of lines covered.
    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }

    /// Whether `other` lies within this span (byte-wise).
    pub fn contains(&self, other: &Span) -> bool {
        self.start_byte <= other.start_byte && other.end_byte <= self.end_byte
    }

    pub fn byte_len(&self) -> usize {
        self.end_byte - self.start_byte
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_line, self.end_line)
    }
}

/// Element category requested from the extraction pipeline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ElementCategory {
    Function,
    Class,
    Field,
    Variable,
    Import,
}

impl ElementCategory {
    /// All categories in extraction order.
    pub const ALL: [ElementCategory; 5] = [
        ElementCategory::Function,
        ElementCategory::Class,
        ElementCategory::Field,
        ElementCategory::Variable,
        ElementCategory::Import,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementCategory::Function => "function",
            ElementCategory::Class => "class",
            ElementCategory::Field => "field",
            ElementCategory::Variable => "variable",
            ElementCategory::Import => "import",
        }
    }

    /// Parse a category name; plural forms are accepted.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "function" | "functions" | "method" | "methods" => Some(ElementCategory::Function),
            "class" | "classes" | "type" | "types" => Some(ElementCategory::Class),
            "field" | "fields" => Some(ElementCategory::Field),
            "variable" | "variables" => Some(ElementCategory::Variable),
            "import" | "imports" => Some(ElementCategory::Import),
            _ => None,
        }
    }
}

impl fmt::Display for ElementCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Declared visibility of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Protected,
    Private,
    Internal,
    Package,
    #[default]
    Unknown,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
            Visibility::Internal => "internal",
            Visibility::Package => "package",
            Visibility::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" | "pub" => Some(Visibility::Public),
            "protected" => Some(Visibility::Protected),
            "private" => Some(Visibility::Private),
            "internal" | "crate" => Some(Visibility::Internal),
            "package" => Some(Visibility::Package),
            "unknown" => Some(Visibility::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Well-known tags. The tag set is open; these are the ones the built-in
/// plugins emit.
pub mod tags {
    pub const STATIC: &str = "static";
    pub const ASYNC: &str = "async";
    pub const ABSTRACT: &str = "abstract";
    pub const CONSTRUCTOR: &str = "constructor";
    pub const DESTRUCTOR: &str = "destructor";
    pub const METHOD: &str = "method";
    pub const PROPERTY: &str = "property";
    pub const DECORATED: &str = "decorated";
    pub const GENERATOR: &str = "generator";
    pub const VIRTUAL: &str = "virtual";
    pub const FINAL: &str = "final";
    pub const CONST: &str = "const";
    pub const EXPORTED: &str = "exported";
    pub const WILDCARD: &str = "wildcard";
    pub const RELATIVE: &str = "relative";
    pub const EMBEDDED: &str = "embedded";
    pub const UNSAFE: &str = "unsafe";
}

/// A code element extracted from a CST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeElement {
    pub category: ElementCategory,
    pub name: String,
    /// Language-level kind, e.g. "method", "struct", "constant".
    pub kind: String,
    /// Free-form declaration header (parameters and return type).
    pub signature: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    /// Name of the enclosing type, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub span: Span,
    pub visibility: Visibility,
    pub raw_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    /// Cyclomatic complexity; only set for executable elements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<u32>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
}

impl CodeElement {
    pub fn start_line(&self) -> usize {
        self.span.start_line
    }

    pub fn end_line(&self) -> usize {
        self.span.end_line
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn is_static(&self) -> bool {
        self.has_tag(tags::STATIC)
    }

    /// Qualified name (`Parent.name` for members).
    pub fn qualified_name(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{}.{}", parent, self.name),
            None => self.name.clone(),
        }
    }

    /// Whether the span and raw text agree on line count.
    pub fn span_is_consistent(&self) -> bool {
        self.span.start_line >= 1
            && self.span.start_line <= self.span.end_line
            && self.raw_text.split('\n').count() == self.span.line_count()
    }
}
