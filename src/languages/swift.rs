//! Swift plugin.

use tree_sitter::{Language, Node};

use super::common::{self, header};
use crate::elements::{tags, ElementCategory, Visibility};
use crate::plugin::{
    DecisionSet, ElementDraft, HandlerContext, HandlerRegistry, LanguageProvider, NamedQuery,
};

const QUERIES: &[NamedQuery] = &[
    NamedQuery {
        key: "functions",
        description: "Function declarations",
        source: "(function_declaration name: (simple_identifier) @name) @function",
    },
    NamedQuery {
        key: "types",
        description: "Classes, structs, enums, actors and extensions",
        source: "(class_declaration name: (_) @name) @type",
    },
    NamedQuery {
        key: "protocols",
        description: "Protocol declarations",
        source: "(protocol_declaration name: (type_identifier) @name) @protocol",
    },
    NamedQuery {
        key: "initializers",
        description: "Initializers",
        source: "(init_declaration) @init",
    },
    NamedQuery {
        key: "properties",
        description: "Property declarations",
        source: "(property_declaration) @property",
    },
    NamedQuery {
        key: "imports",
        description: "Import declarations",
        source: "(import_declaration (identifier) @module) @import",
    },
    NamedQuery {
        key: "closures",
        description: "Closure literals",
        source: "(lambda_literal) @closure",
    },
    NamedQuery {
        key: "comments",
        description: "Comments",
        source: "[(comment) (multiline_comment)] @comment",
    },
];

const DECISIONS: DecisionSet = DecisionSet {
    kinds: &[
        "if_statement",
        "guard_statement",
        "for_statement",
        "while_statement",
        "repeat_while_statement",
        "switch_entry",
        "catch_block",
        "ternary_expression",
        "conjunction_expression",
        "disjunction_expression",
    ],
    operators: &[],
    scopes: &["lambda_literal"],
};

const TYPE_KINDS: &[&str] = &["class_declaration", "protocol_declaration"];
const FUNCTION_KINDS: &[&str] = &[
    "function_declaration",
    "init_declaration",
    "deinit_declaration",
    "protocol_function_declaration",
];

pub struct Swift;

impl LanguageProvider for Swift {
    fn id(&self) -> &'static str {
        "swift"
    }

    fn grammar(&self) -> Language {
        tree_sitter_swift::LANGUAGE.into()
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["swift"]
    }

    fn interpreters(&self) -> &'static [&'static str] {
        &["swift"]
    }

    fn sniff_keywords(&self) -> &'static [&'static str] {
        &["func", "let", "var", "guard", "protocol", "extension", "struct", "import", "self", "init"]
    }

    fn handlers(&self) -> HandlerRegistry {
        HandlerRegistry::new()
            .on(ElementCategory::Function, FUNCTION_KINDS, function)
            .on(ElementCategory::Class, TYPE_KINDS, type_declaration)
            .on_leaf(
                ElementCategory::Field,
                &["property_declaration", "protocol_property_declaration"],
                field,
            )
            .on_leaf(ElementCategory::Field, &["enum_entry"], enum_entry)
            .on_leaf(ElementCategory::Variable, &["property_declaration"], variable)
            .on_leaf(ElementCategory::Import, &["import_declaration"], import)
    }

    fn decisions(&self) -> DecisionSet {
        DECISIONS
    }

    fn queries(&self) -> &'static [NamedQuery] {
        QUERIES
    }

    fn comment_markers(&self) -> &'static [&'static str] {
        &["///", "//", "/**", "/*", "*/", "*"]
    }

    fn annotation_prefixes(&self) -> &'static [&'static str] {
        &["@"]
    }
}

fn owner(node: Node<'_>) -> Option<Node<'_>> {
    common::enclosing(node, TYPE_KINDS, FUNCTION_KINDS)
}

fn owner_name(ctx: &HandlerContext<'_, '_>) -> Option<String> {
    owner(ctx.node())
        .and_then(|o| o.child_by_field_name("name"))
        .map(|n| ctx.text(n).to_string())
}

/// Declared visibility; Swift's default is `internal`.
fn visibility(words: &[&str]) -> Visibility {
    common::visibility_from(words, Visibility::Internal)
}

fn function(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let (name, kind) = match node.kind() {
        "init_declaration" => ("init", "initializer"),
        "deinit_declaration" => ("deinit", "deinitializer"),
        _ => {
            let name = ctx
                .field_text("name")
                .ok_or_else(|| anyhow::anyhow!("func without a name"))?;
            (name, "function")
        }
    };
    let words = common::modifier_words(ctx, &["modifiers"]);
    let parent = owner_name(ctx);
    let kind = if kind == "function" && parent.is_some() {
        "method"
    } else {
        kind
    };

    let mut params = Vec::new();
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
    for child in children {
        if child.kind() == "parameter" {
            params.push(common::collapse_ws(ctx.text(child)));
        }
    }

    Ok(Some(
        ElementDraft::new(name, kind)
            .signature(header(ctx, ctx.field("body")))
            .parameters(params)
            .returns(ctx.field_text("return_type").map(common::collapse_ws))
            .visibility(visibility(&words))
            .tag_if(parent.is_some(), tags::METHOD)
            .tag_if(kind == "initializer", tags::CONSTRUCTOR)
            .tag_if(kind == "deinitializer", tags::DESTRUCTOR)
            .tag_if(words.contains(&"static") || words.contains(&"class"), tags::STATIC)
            .tag_if(node.kind() == "protocol_function_declaration", tags::ABSTRACT)
            .tag_if(words.contains(&"override"), "override")
            .tag_if(words.contains(&"mutating"), "mutating")
            .tag_if(common::has_child_kind(node, "async"), tags::ASYNC)
            .tag_if(common::has_child_kind(node, "throws"), "throws")
            .parent(parent),
    ))
}

fn type_declaration(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("type without a name"))?;
    let words = common::modifier_words(ctx, &["modifiers"]);
    let kind = if node.kind() == "protocol_declaration" {
        "protocol"
    } else {
        ctx.field_text("declaration_kind").unwrap_or("class")
    };
    let inherits: Vec<String> = {
        let mut cursor = node.walk();
        let specs: Vec<Node<'_>> = node
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "inheritance_specifier")
            .collect();
        specs.into_iter().map(|s| common::collapse_ws(ctx.text(s))).collect()
    };

    Ok(Some(
        ElementDraft::new(name, kind)
            .signature(header(ctx, ctx.field("body")))
            .parameters(inherits)
            .visibility(visibility(&words))
            .tag_if(kind == "protocol", tags::ABSTRACT)
            .tag_if(words.contains(&"final"), tags::FINAL)
            .parent(owner_name(ctx)),
    ))
}

/// `let`/`var` keyword of a property.
fn binding_keyword<'a>(ctx: &HandlerContext<'a, '_>) -> &'a str {
    common::child_of_kind(ctx.node(), &["value_binding_pattern"])
        .map(|b| ctx.text(b).trim())
        .unwrap_or("var")
}

fn property(ctx: &HandlerContext<'_, '_>) -> anyhow::Result<ElementDraft> {
    let node = ctx.node();
    let name = ctx
        .field("name")
        .or_else(|| common::child_of_kind(node, &["pattern"]))
        .map(|n| common::collapse_ws(ctx.text(n)))
        .ok_or_else(|| anyhow::anyhow!("property without a name"))?;
    let words = common::modifier_words(ctx, &["modifiers"]);
    let keyword = binding_keyword(ctx);
    let ty = common::child_of_kind(node, &["type_annotation"])
        .map(|t| common::collapse_ws(ctx.text(t).trim_start_matches(':')));
    let computed = common::has_child_kind(node, "computed_property");
    let signature = match ctx.field("value") {
        Some(value) => {
            let head = ctx.unit().slice(node.start_byte()..value.start_byte());
            common::collapse_ws(head).trim_end_matches('=').trim_end().to_string()
        }
        None => header(ctx, common::child_of_kind(node, &["computed_property"])),
    };

    Ok(ElementDraft::new(name, if keyword == "let" { "constant" } else { "property" })
        .signature(signature)
        .returns(ty)
        .visibility(visibility(&words))
        .tag_if(keyword == "let", tags::CONST)
        .tag_if(words.contains(&"static") || words.contains(&"class"), tags::STATIC)
        .tag_if(words.contains(&"lazy"), "lazy")
        .tag_if(words.contains(&"weak"), "weak")
        .tag_if(computed, "computed"))
}

fn field(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    if owner(ctx.node()).is_none() {
        return Ok(None);
    }
    let abstract_ = ctx.node().kind() == "protocol_property_declaration";
    let parent = owner_name(ctx);
    Ok(Some(property(ctx)?.tag_if(abstract_, tags::ABSTRACT).parent(parent)))
}

fn variable(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let top_level = ctx.node().parent().is_some_and(|p| p.kind() == "source_file");
    if !top_level {
        return Ok(None);
    }
    property(ctx).map(Some)
}

fn enum_entry(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("enum case without a name"))?;
    let parent = owner_name(ctx);
    Ok(Some(
        ElementDraft::new(name, "enum_case")
            .signature(common::collapse_ws(ctx.node_text()))
            .visibility(Visibility::Public)
            .tag(tags::CONST)
            .parent(parent),
    ))
}

fn import(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let module = common::child_of_kind(ctx.node(), &["identifier"])
        .map(|m| ctx.text(m))
        .ok_or_else(|| anyhow::anyhow!("import without a module"))?;
    let words = common::modifier_words(ctx, &["modifiers", "attribute"]);
    Ok(Some(
        ElementDraft::new(module, "import")
            .signature(common::collapse_ws(ctx.node_text()))
            .visibility(Visibility::Public)
            .tag_if(words.contains(&"testable"), "testable"),
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::elements::CodeElement;
    use crate::extract::{extract, DEFAULT_MAX_DOC_LINES};
    use crate::plugin::LanguagePlugin;
    use crate::source::SourceUnit;

    fn run(source: &str, category: ElementCategory) -> Vec<CodeElement> {
        let plugin = LanguagePlugin::build(&Swift).unwrap();
        let unit = Arc::new(SourceUnit::new("Tally.swift", source, "swift"));
        let parsed = plugin.parse(unit).unwrap();
        let out = extract(&parsed, &plugin, category, DEFAULT_MAX_DOC_LINES);
        assert!(out.errors.is_empty(), "Unexpected errors: {:?}", out.errors);
        out.elements
    }

    const SOURCE: &str = r#"import Foundation
import UIKit

/// Keeps a tally.
public class Tally {
    private var count: Int = 0
    let name: String

    init(name: String) {
        self.name = name
    }

    public func add(_ n: Int) -> Int {
        if n > 0 && count < 100 {
            count += n
        }
        return count
    }
}

struct Point {
    var x: Double
}

protocol Shape {
    func area() -> Double
}

let origin = Point(x: 0)
"#;

    #[test]
    fn test_swift_functions() {
        let functions = run(SOURCE, ElementCategory::Function);
        let names: Vec<(&str, &str)> = functions.iter().map(|f| (f.name.as_str(), f.kind.as_str())).collect();
        assert_eq!(
            names,
            vec![("init", "initializer"), ("add", "method"), ("area", "method")]
        );

        let add = &functions[1];
        assert_eq!(add.parent.as_deref(), Some("Tally"));
        assert_eq!(add.visibility, Visibility::Public);
        assert_eq!(add.complexity, Some(3));
        assert_eq!(add.return_type.as_deref(), Some("Int"));
        assert!(functions[2].has_tag(tags::ABSTRACT));
    }

    #[test]
    fn test_swift_types() {
        let types = run(SOURCE, ElementCategory::Class);
        let names: Vec<(&str, &str)> = types.iter().map(|t| (t.name.as_str(), t.kind.as_str())).collect();
        assert_eq!(
            names,
            vec![("Tally", "class"), ("Point", "struct"), ("Shape", "protocol")]
        );
        assert_eq!(types[0].doc.as_deref(), Some("Keeps a tally."));
        assert_eq!(types[1].visibility, Visibility::Internal);
    }

    #[test]
    fn test_swift_properties_and_imports() {
        let fields = run(SOURCE, ElementCategory::Field);
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["count", "name", "x"]);
        assert_eq!(fields[0].visibility, Visibility::Private);
        assert_eq!(fields[1].kind, "constant");

        let vars = run(SOURCE, ElementCategory::Variable);
        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].name, "origin");

        let imports = run(SOURCE, ElementCategory::Import);
        let names: Vec<&str> = imports.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Foundation", "UIKit"]);
    }
}
