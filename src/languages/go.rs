//! Go plugin.

use tree_sitter::{Language, Node};

use super::common::{self, child_texts, header};
use crate::elements::{tags, ElementCategory, Visibility};
use crate::plugin::{
    DecisionSet, ElementDraft, HandlerContext, HandlerRegistry, LanguageProvider, NamedQuery,
};

const QUERIES: &[NamedQuery] = &[
    NamedQuery {
        key: "functions",
        description: "Top-level functions",
        source: "(function_declaration name: (identifier) @name) @function",
    },
    NamedQuery {
        key: "methods",
        description: "Methods with a receiver",
        source: "(method_declaration name: (field_identifier) @name) @method",
    },
    NamedQuery {
        key: "classes",
        description: "Struct and interface types",
        source: "(type_spec name: (type_identifier) @name type: [(struct_type) (interface_type)]) @class",
    },
    NamedQuery {
        key: "structs",
        description: "Struct types",
        source: "(type_spec name: (type_identifier) @name type: (struct_type)) @struct",
    },
    NamedQuery {
        key: "interfaces",
        description: "Interface types",
        source: "(type_spec name: (type_identifier) @name type: (interface_type)) @interface",
    },
    NamedQuery {
        key: "imports",
        description: "Imported packages",
        source: "(import_spec path: (_) @path) @import",
    },
    NamedQuery {
        key: "goroutines",
        description: "go statements",
        source: "(go_statement) @goroutine",
    },
    NamedQuery {
        key: "defers",
        description: "defer statements",
        source: "(defer_statement) @defer",
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
        "expression_case",
        "type_case",
        "communication_case",
    ],
    operators: &[("binary_expression", "&&"), ("binary_expression", "||")],
    scopes: &["func_literal"],
};

const FUNCTION_SCOPES: &[&str] = &["function_declaration", "method_declaration", "func_literal"];

pub struct Go;

impl LanguageProvider for Go {
    fn id(&self) -> &'static str {
        "go"
    }

    fn grammar(&self) -> Language {
        tree_sitter_go::LANGUAGE.into()
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["go"]
    }

    fn sniff_keywords(&self) -> &'static [&'static str] {
        &["package", "func", "chan", "defer", "go", "select", "struct", "interface", "fmt", "nil", "err"]
    }

    fn handlers(&self) -> HandlerRegistry {
        HandlerRegistry::new()
            .on(
                ElementCategory::Function,
                &["function_declaration", "method_declaration"],
                function,
            )
            .on(ElementCategory::Function, &["method_elem"], interface_method)
            .on(ElementCategory::Class, &["type_spec"], type_spec)
            .on_leaf(ElementCategory::Field, &["field_declaration"], field)
            .on_leaf(ElementCategory::Variable, &["var_spec", "const_spec"], variable)
            .on_leaf(ElementCategory::Import, &["import_spec"], import)
    }

    fn decisions(&self) -> DecisionSet {
        DECISIONS
    }

    fn queries(&self) -> &'static [NamedQuery] {
        QUERIES
    }

    fn comment_markers(&self) -> &'static [&'static str] {
        &["//", "/*", "*/", "*"]
    }
}

/// Exported identifiers start with an upper-case letter.
fn visibility_of(name: &str) -> Visibility {
    if name.chars().next().is_some_and(char::is_uppercase) {
        Visibility::Public
    } else {
        Visibility::Package
    }
}

/// Base type name of a receiver: `(s *Server[T])` → `Server`.
fn receiver_type(ctx: &HandlerContext<'_, '_>, receiver: Node<'_>) -> Option<String> {
    let param = receiver.named_child(0)?;
    let ty = param.child_by_field_name("type")?;
    let text = ctx.text(ty).trim_start_matches('*');
    let base = text.split('[').next().unwrap_or(text).trim();
    Some(base.to_string())
}

fn function(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("function without a name"))?;
    let receiver = ctx.field("receiver");
    let parent = receiver.and_then(|r| receiver_type(ctx, r));
    let pointer = receiver.is_some_and(|r| ctx.text(r).contains('*'));
    let kind = if parent.is_some() { "method" } else { "function" };

    Ok(Some(
        ElementDraft::new(name, kind)
            .signature(header(ctx, ctx.field("body")))
            .parameters(child_texts(ctx, ctx.field("parameters"), &[]))
            .returns(ctx.field_text("result"))
            .visibility(visibility_of(name))
            .tag_if(parent.is_some(), tags::METHOD)
            .tag_if(pointer, "pointer_receiver")
            .tag_if(name == "init" && parent.is_none(), "init")
            .parent(parent),
    ))
}

fn interface_method(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("interface method without a name"))?;
    let parent = common::enclosing(ctx.node(), &["type_spec"], FUNCTION_SCOPES)
        .and_then(|t| t.child_by_field_name("name"))
        .map(|n| ctx.text(n));
    Ok(Some(
        ElementDraft::new(name, "method")
            .signature(common::collapse_ws(ctx.node_text()))
            .parameters(child_texts(ctx, ctx.field("parameters"), &[]))
            .returns(ctx.field_text("result"))
            .visibility(visibility_of(name))
            .tag(tags::METHOD)
            .tag(tags::ABSTRACT)
            .parent(parent),
    ))
}

fn type_spec(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("type without a name"))?;
    let ty = ctx.field("type");
    let kind = match ty.map(|t| t.kind()) {
        Some("struct_type") => "struct",
        Some("interface_type") => "interface",
        _ => "type",
    };
    let body_start = ty.filter(|_| kind != "type");
    Ok(Some(
        ElementDraft::new(name, kind)
            .signature(format!("type {}", header(ctx, body_start)))
            .parameters(child_texts(ctx, ctx.field("type_parameters"), &[]))
            .visibility(visibility_of(name))
            .tag_if(kind == "interface", tags::ABSTRACT),
    ))
}

fn field(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let parent = common::enclosing(node, &["type_spec"], FUNCTION_SCOPES)
        .and_then(|t| t.child_by_field_name("name"))
        .map(|n| ctx.text(n));
    let ty = ctx.field_text("type");

    let draft = match ctx.field_text("name") {
        Some(name) => ElementDraft::new(name, "field").visibility(visibility_of(name)),
        None => {
            // Embedded field: the type doubles as the name
            let ty = ty.ok_or_else(|| anyhow::anyhow!("embedded field without a type"))?;
            let name = ty.trim_start_matches('*');
            ElementDraft::new(name, "embedded")
                .visibility(visibility_of(name))
                .tag(tags::EMBEDDED)
        }
    };

    Ok(Some(
        draft
            .signature(common::collapse_ws(ctx.node_text()))
            .returns(ty)
            .tag_if(common::has_child_kind(node, "raw_string_literal")
                || common::has_child_kind(node, "interpreted_string_literal"), "struct_tag")
            .parent(parent),
    ))
}

fn variable(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    if common::enclosing(ctx.node(), FUNCTION_SCOPES, &[]).is_some() {
        return Ok(None);
    }
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("declaration without a name"))?;
    let is_const = ctx.node().kind() == "const_spec";
    Ok(Some(
        ElementDraft::new(name, if is_const { "constant" } else { "variable" })
            .signature(common::collapse_ws(ctx.node_text()))
            .returns(ctx.field_text("type"))
            .visibility(visibility_of(name))
            .tag_if(is_const, tags::CONST),
    ))
}

fn import(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let path = ctx
        .field_text("path")
        .ok_or_else(|| anyhow::anyhow!("import without a path"))?;
    let alias = ctx.field_text("name");
    Ok(Some(
        ElementDraft::new(common::unquote(path), "import")
            .signature(common::collapse_ws(ctx.node_text()))
            .visibility(Visibility::Package)
            .tag_if(alias == Some("."), tags::WILDCARD)
            .tag_if(alias == Some("_"), "side_effect")
            .tag_if(alias.is_some_and(|a| a != "." && a != "_"), "aliased")
            .parameters(alias.map(|a| vec![a.to_string()]).unwrap_or_default()),
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
        let plugin = LanguagePlugin::build(&Go).unwrap();
        let unit = Arc::new(SourceUnit::new("main.go", source, "go"));
        let parsed = plugin.parse(unit).unwrap();
        let out = extract(&parsed, &plugin, category, DEFAULT_MAX_DOC_LINES);
        assert!(out.errors.is_empty(), "Unexpected errors: {:?}", out.errors);
        out.elements
    }

    const SOURCE: &str = r#"package main

import (
	"fmt"
	str "strings"
)

const MaxItems = 10

var counter int

// Server handles requests.
type Server struct {
	Name string
	port int
	*Logger
}

type Handler interface {
	Serve(path string) error
}

// Start runs the server.
func (s *Server) Start(port int) error {
	if port == 0 || port > 65535 {
		return fmt.Errorf("bad port")
	}
	for i := 0; i < 3; i++ {
		fmt.Println(str.ToUpper(s.Name))
	}
	return nil
}

func helper() {}
"#;

    #[test]
    fn test_go_functions() {
        let functions = run(SOURCE, ElementCategory::Function);
        let names: Vec<&str> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Serve", "Start", "helper"]);

        let start = &functions[1];
        assert_eq!(start.parent.as_deref(), Some("Server"));
        assert!(start.has_tag("pointer_receiver"));
        assert_eq!(start.parameters, vec!["port int"]);
        assert_eq!(start.return_type.as_deref(), Some("error"));
        assert_eq!(start.complexity, Some(4));
        assert_eq!(start.doc.as_deref(), Some("Start runs the server."));
        assert_eq!(functions[2].visibility, Visibility::Package);
        assert!(functions[0].has_tag(tags::ABSTRACT));
    }

    #[test]
    fn test_go_types_and_fields() {
        let types = run(SOURCE, ElementCategory::Class);
        assert_eq!(types.len(), 2);
        assert_eq!(types[0].name, "Server");
        assert_eq!(types[0].kind, "struct");
        assert_eq!(types[1].kind, "interface");

        let fields = run(SOURCE, ElementCategory::Field);
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Name", "port", "Logger"]);
        assert!(fields[2].has_tag(tags::EMBEDDED));
        assert_eq!(fields[1].parent.as_deref(), Some("Server"));
    }

    #[test]
    fn test_go_variables_and_imports() {
        let variables = run(SOURCE, ElementCategory::Variable);
        let names: Vec<&str> = variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["MaxItems", "counter"]);

        let imports = run(SOURCE, ElementCategory::Import);
        let names: Vec<&str> = imports.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["fmt", "strings"]);
        assert!(imports[1].has_tag("aliased"));
    }
}
