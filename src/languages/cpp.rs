//! C++ plugin, built on the C declarator helpers.

use tree_sitter::{Language, Node};

use super::c;
use super::common::{self, header};
use crate::elements::{tags, ElementCategory, Visibility};
use crate::plugin::{
    DecisionSet, ElementDraft, HandlerContext, HandlerRegistry, LanguageProvider, NamedQuery,
};

const QUERIES: &[NamedQuery] = &[
    NamedQuery {
        key: "functions",
        description: "Function and method definitions",
        source: r#"
(function_definition
  declarator: [(function_declarator declarator: (_) @name)
               (pointer_declarator declarator: (function_declarator declarator: (_) @name))]) @function
"#,
    },
    NamedQuery {
        key: "methods",
        description: "Out-of-line method definitions",
        source: r#"
(function_definition
  declarator: (function_declarator
    declarator: (qualified_identifier scope: (_) @scope name: (_) @name))) @method
"#,
    },
    NamedQuery {
        key: "classes",
        description: "Class definitions",
        source: "(class_specifier name: (_) @name body: (field_declaration_list)) @class",
    },
    NamedQuery {
        key: "structs",
        description: "Struct definitions",
        source: "(struct_specifier name: (_) @name body: (field_declaration_list)) @struct",
    },
    NamedQuery {
        key: "namespaces",
        description: "Namespace definitions",
        source: "(namespace_definition name: (_) @name) @namespace",
    },
    NamedQuery {
        key: "templates",
        description: "Template declarations",
        source: "(template_declaration) @template",
    },
    NamedQuery {
        key: "includes",
        description: "Include directives",
        source: "(preproc_include path: (_) @path) @include",
    },
    NamedQuery {
        key: "lambdas",
        description: "Lambda expressions",
        source: "(lambda_expression) @lambda",
    },
    NamedQuery {
        key: "comments",
        description: "Comments",
        source: "(comment) @comment",
    },
];

const DECISIONS: DecisionSet = DecisionSet {
    kinds: &[
        "if_statement",
        "for_statement",
        "for_range_loop",
        "while_statement",
        "do_statement",
        "case_statement",
        "catch_clause",
        "conditional_expression",
    ],
    operators: &[
        ("binary_expression", "&&"),
        ("binary_expression", "||"),
        ("binary_expression", "and"),
        ("binary_expression", "or"),
    ],
    scopes: &["lambda_expression"],
};

const RECORD_KINDS: &[&str] = &["class_specifier", "struct_specifier", "union_specifier"];

pub struct Cpp;

impl LanguageProvider for Cpp {
    fn id(&self) -> &'static str {
        "cpp"
    }

    fn grammar(&self) -> Language {
        tree_sitter_cpp::LANGUAGE.into()
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["cpp", "cc", "cxx", "c++", "hpp", "hh", "hxx", "h"]
    }

    fn sniff_keywords(&self) -> &'static [&'static str] {
        &[
            "namespace", "template", "typename", "class", "public", "private", "virtual", "std",
            "nullptr", "auto", "override", "const",
        ]
    }

    fn handlers(&self) -> HandlerRegistry {
        HandlerRegistry::new()
            .on(ElementCategory::Function, &["function_definition"], function)
            .on_leaf(
                ElementCategory::Function,
                &["declaration", "field_declaration"],
                declared_function,
            )
            .on(
                ElementCategory::Class,
                &["class_specifier", "struct_specifier", "union_specifier", "enum_specifier"],
                record,
            )
            .on(ElementCategory::Class, &["namespace_definition"], namespace)
            .on_leaf(ElementCategory::Field, &["field_declaration"], field)
            .on_leaf(ElementCategory::Field, &["enumerator"], c::enumerator)
            .on_leaf(ElementCategory::Variable, &["declaration"], c::variable)
            .on_leaf(ElementCategory::Import, &["preproc_include"], c::include)
            .on_leaf(
                ElementCategory::Import,
                &["using_declaration", "alias_declaration"],
                using,
            )
    }

    fn decisions(&self) -> DecisionSet {
        DECISIONS
    }

    fn queries(&self) -> &'static [NamedQuery] {
        QUERIES
    }

    fn comment_markers(&self) -> &'static [&'static str] {
        c::MARKERS
    }

    fn annotation_prefixes(&self) -> &'static [&'static str] {
        &["[[", "template"]
    }
}

fn enclosing_record(node: Node<'_>) -> Option<Node<'_>> {
    common::enclosing(node, RECORD_KINDS, &["function_definition", "lambda_expression"])
}

/// Access level of a class member: the nearest preceding access specifier,
/// else the record's default.
fn member_access(ctx: &HandlerContext<'_, '_>, record: Node<'_>) -> Visibility {
    let mut member = ctx.node();
    if let Some(template) = member.parent().filter(|p| p.kind() == "template_declaration") {
        member = template;
    }
    let mut sibling = member.prev_sibling();
    while let Some(s) = sibling {
        if s.kind() == "access_specifier" {
            let word = ctx.text(s).trim().trim_end_matches(':').trim();
            return common::visibility_from(&[word], Visibility::Unknown);
        }
        sibling = s.prev_sibling();
    }
    if record.kind() == "class_specifier" {
        Visibility::Private
    } else {
        Visibility::Public
    }
}

/// Words from every specifier on the declaration and its function declarator.
fn specifier_words<'a>(ctx: &HandlerContext<'a, '_>, fd: Option<Node<'_>>) -> Vec<&'a str> {
    let mut words = common::modifier_words(
        ctx,
        &[
            "storage_class_specifier",
            "type_qualifier",
            "virtual",
            "virtual_function_specifier",
            "explicit_function_specifier",
        ],
    );
    if let Some(fd) = fd {
        let mut cursor = fd.walk();
        for child in fd.children(&mut cursor) {
            if matches!(child.kind(), "type_qualifier" | "virtual_specifier" | "noexcept") {
                words.push(ctx.text(child));
            }
        }
    }
    words
}

/// Shared tail for definitions and declarations of functions.
fn function_draft(
    ctx: &HandlerContext<'_, '_>,
    declarator: Node<'_>,
    fd: Node<'_>,
    declared_only: bool,
) -> anyhow::Result<ElementDraft> {
    let node = ctx.node();
    let name_node = c::declared_name(fd).ok_or_else(|| anyhow::anyhow!("function without a name"))?;
    let full = ctx.text(name_node);
    // `ns::Type::method` splits into scope `ns::Type` and name `method`
    let (name, scope) = match full.rsplit_once("::") {
        Some((scope, name)) if name_node.kind() == "qualified_identifier" => {
            (name, Some(scope.to_string()))
        }
        _ => (full, None),
    };
    let words = specifier_words(ctx, Some(fd));
    let record = enclosing_record(node);
    let parent = record
        .and_then(c::record_name)
        .map(|n| ctx.text(n).to_string())
        .or(scope);
    let visibility = match record {
        Some(r) => member_access(ctx, r),
        None => c::linkage(&words),
    };
    let owner = parent.as_deref().map(|p| p.rsplit("::").next().unwrap_or(p));
    let constructor = owner == Some(name);
    let destructor = name.starts_with('~');
    let pure = declared_only
        && ctx
            .node_text()
            .split_whitespace()
            .collect::<String>()
            .ends_with("=0;");
    let templated = node.parent().is_some_and(|p| p.kind() == "template_declaration");

    let signature = if declared_only {
        common::collapse_ws(ctx.node_text()).trim_end_matches(';').to_string()
    } else {
        header(ctx, ctx.field("body"))
    };
    let kind = if constructor {
        "constructor"
    } else if destructor {
        "destructor"
    } else if parent.is_some() {
        "method"
    } else if declared_only {
        "prototype"
    } else {
        "function"
    };

    Ok(ElementDraft::new(name, kind)
        .signature(signature)
        .parameters(c::parameters(ctx, fd))
        .returns(c::return_type(ctx, declarator))
        .visibility(visibility)
        .tag_if(parent.is_some(), tags::METHOD)
        .tag_if(constructor, tags::CONSTRUCTOR)
        .tag_if(destructor, tags::DESTRUCTOR)
        .tag_if(words.contains(&"static"), tags::STATIC)
        .tag_if(words.contains(&"virtual"), tags::VIRTUAL)
        .tag_if(pure || (declared_only && parent.is_none()), tags::ABSTRACT)
        .tag_if(words.contains(&"override"), "override")
        .tag_if(words.contains(&"final"), tags::FINAL)
        .tag_if(words.contains(&"const") && parent.is_some(), tags::CONST)
        .tag_if(words.contains(&"inline"), "inline")
        .tag_if(templated, "template")
        .parent(parent))
}

fn function(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let declarator = ctx
        .field("declarator")
        .ok_or_else(|| anyhow::anyhow!("function without a declarator"))?;
    let fd = c::function_declarator(declarator)
        .ok_or_else(|| anyhow::anyhow!("function without a parameter list"))?;
    function_draft(ctx, declarator, fd, false).map(Some)
}

/// Prototypes and in-class method declarations.
fn declared_function(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let Some(declarator) = ctx.field("declarator") else {
        return Ok(None);
    };
    let Some(fd) = c::function_declarator(declarator) else {
        return Ok(None);
    };
    function_draft(ctx, declarator, fd, true).map(Some)
}

fn record(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let Some(mut draft) = c::record(ctx)? else {
        return Ok(None);
    };
    let outer = enclosing_record(node);
    if let Some(outer) = outer {
        draft = draft.visibility(member_access(ctx, outer));
    }
    let namespace = common::enclosing_name(ctx, &["namespace_definition"], &["function_definition"]);
    let templated = node.parent().is_some_and(|p| p.kind() == "template_declaration");
    let bases = common::child_of_kind(node, &["base_class_clause"])
        .map(|b| common::child_texts(ctx, Some(b), &["access_specifier"]))
        .unwrap_or_default();
    let draft = draft
        .parameters(bases)
        .tag_if(templated, "template")
        .tag_if(has_pure_member(node, ctx.unit().bytes()), tags::ABSTRACT)
        .tag_if(node.kind() == "enum_specifier" && common::has_child_kind(node, "class"), "scoped");
    Ok(Some(if outer.is_none() {
        draft.parent(namespace)
    } else {
        draft
    }))
}

/// A record with at least one `= 0` member is abstract.
fn has_pure_member(record: Node<'_>, source: &[u8]) -> bool {
    let Some(body) = record.child_by_field_name("body") else {
        return false;
    };
    let mut cursor = body.walk();
    let found = body.named_children(&mut cursor).any(|member| {
        member.kind() == "field_declaration"
            && member
                .child_by_field_name("declarator")
                .and_then(c::function_declarator)
                .is_some()
            && member
                .utf8_text(source)
                .is_ok_and(|t| t.split_whitespace().collect::<String>().ends_with("=0;"))
    });
    found
}

fn namespace(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let name = ctx.field_text("name").unwrap_or("<anonymous>");
    let parent = common::enclosing_name(ctx, &["namespace_definition"], &[]);
    Ok(Some(
        ElementDraft::new(name, "namespace")
            .signature(header(ctx, ctx.field("body")))
            .visibility(Visibility::Public)
            .parent(parent),
    ))
}

fn field(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    if ctx
        .field("declarator")
        .and_then(c::function_declarator)
        .is_some()
    {
        return Ok(None);
    }
    let Some(mut draft) = c::field(ctx)? else {
        return Ok(None);
    };
    let words = specifier_words(ctx, None);
    if let Some(record) = enclosing_record(node) {
        draft = draft.visibility(member_access(ctx, record));
    }
    Ok(Some(
        draft
            .tag_if(words.contains(&"static"), tags::STATIC)
            .tag_if(words.contains(&"const") || words.contains(&"constexpr"), tags::CONST)
            .tag_if(words.contains(&"mutable"), "mutable"),
    ))
}

fn using(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let text = common::collapse_ws(ctx.node_text());
    let (name, kind) = if node.kind() == "alias_declaration" {
        let name = ctx
            .field_text("name")
            .ok_or_else(|| anyhow::anyhow!("alias without a name"))?;
        (name.to_string(), "alias")
    } else {
        let target = text
            .trim_start_matches("using")
            .trim_end_matches(';')
            .trim();
        match target.strip_prefix("namespace ") {
            Some(ns) => (ns.trim().to_string(), "using_namespace"),
            None => (target.to_string(), "using"),
        }
    };
    let signature = text.trim_end_matches(';').to_string();
    Ok(Some(
        ElementDraft::new(name, kind)
            .signature(signature)
            .visibility(Visibility::Public)
            .tag_if(kind == "using_namespace", tags::WILDCARD),
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
        let plugin = LanguagePlugin::build(&Cpp).unwrap();
        let unit = Arc::new(SourceUnit::new("shapes.cpp", source, "cpp"));
        let parsed = plugin.parse(unit).unwrap();
        let out = extract(&parsed, &plugin, category, DEFAULT_MAX_DOC_LINES);
        assert!(out.errors.is_empty(), "Unexpected errors: {:?}", out.errors);
        out.elements
    }

    const SOURCE: &str = r#"#include <vector>
#include "shape.hpp"

using namespace std;

namespace geo {

class Shape {
public:
    Shape(int sides);
    virtual ~Shape() {}
    virtual double area() const = 0;
protected:
    int sides;
private:
    static int count;
};

struct Point {
    double x;
    double y;
};

}

int total(const std::vector<int>& items) {
    int sum = 0;
    for (const auto& item : items) {
        if (item > 0 || sum < 0) {
            sum += item;
        }
    }
    return sum;
}

geo::Shape::Shape(int sides) : sides(sides) {}
"#;

    #[test]
    fn test_cpp_functions() {
        let functions = run(SOURCE, ElementCategory::Function);
        let names: Vec<(&str, &str)> = functions.iter().map(|f| (f.name.as_str(), f.kind.as_str())).collect();
        assert_eq!(
            names,
            vec![
                ("Shape", "constructor"),
                ("~Shape", "destructor"),
                ("area", "method"),
                ("total", "function"),
                ("Shape", "constructor"),
            ]
        );

        let area = &functions[2];
        assert_eq!(area.parent.as_deref(), Some("Shape"));
        assert_eq!(area.visibility, Visibility::Public);
        assert!(area.has_tag(tags::VIRTUAL));
        assert!(area.has_tag(tags::ABSTRACT));
        assert!(area.has_tag(tags::CONST));

        let total = &functions[3];
        assert_eq!(total.complexity, Some(4));
        assert_eq!(total.parameters, vec!["const std::vector<int>& items"]);

        assert_eq!(functions[4].parent.as_deref(), Some("geo::Shape"));
    }

    #[test]
    fn test_cpp_records_and_fields() {
        let records = run(SOURCE, ElementCategory::Class);
        let names: Vec<(&str, &str)> = records.iter().map(|r| (r.name.as_str(), r.kind.as_str())).collect();
        assert_eq!(names, vec![("geo", "namespace"), ("Shape", "class"), ("Point", "struct")]);
        assert!(records[1].has_tag(tags::ABSTRACT));
        assert_eq!(records[1].parent.as_deref(), Some("geo"));

        let fields = run(SOURCE, ElementCategory::Field);
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["sides", "count", "x", "y"]);
        assert_eq!(fields[0].visibility, Visibility::Protected);
        assert_eq!(fields[1].visibility, Visibility::Private);
        assert!(fields[1].is_static());
        assert_eq!(fields[2].visibility, Visibility::Public);
    }

    #[test]
    fn test_cpp_imports() {
        let imports = run(SOURCE, ElementCategory::Import);
        let names: Vec<(&str, &str)> = imports.iter().map(|i| (i.name.as_str(), i.kind.as_str())).collect();
        assert_eq!(
            names,
            vec![("vector", "include"), ("shape.hpp", "include"), ("std", "using_namespace")]
        );
    }
}
