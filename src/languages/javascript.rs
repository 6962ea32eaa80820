//! JavaScript plugin. The handlers here also serve TypeScript, whose grammar
//! extends this one.

use tree_sitter::{Language, Node};

use super::common::{self, child_texts, header};
use crate::elements::{tags, ElementCategory, Visibility};
use crate::plugin::{
    DecisionSet, ElementDraft, HandlerContext, HandlerRegistry, LanguageProvider, NamedQuery,
};

const QUERIES: &[NamedQuery] = &[
    NamedQuery {
        key: "functions",
        description: "Function declarations",
        source: r#"
[(function_declaration name: (identifier) @name)
 (generator_function_declaration name: (identifier) @name)] @function
"#,
    },
    NamedQuery {
        key: "classes",
        description: "Class declarations",
        source: "(class_declaration name: (identifier) @name) @class",
    },
    NamedQuery {
        key: "methods",
        description: "Class methods",
        source: "(method_definition name: (_) @name) @method",
    },
    NamedQuery {
        key: "arrow_functions",
        description: "Arrow functions bound to a variable",
        source: "(variable_declarator name: (identifier) @name value: (arrow_function)) @function",
    },
    NamedQuery {
        key: "imports",
        description: "ES module imports",
        source: "(import_statement source: (string) @source) @import",
    },
    NamedQuery {
        key: "requires",
        description: "CommonJS require calls",
        source: r#"
((call_expression function: (identifier) @fn arguments: (arguments (string) @source)) @require
 (#eq? @fn "require"))
"#,
    },
    NamedQuery {
        key: "exports",
        description: "Export statements",
        source: "(export_statement) @export",
    },
    NamedQuery {
        key: "comments",
        description: "Comments",
        source: "(comment) @comment",
    },
];

pub(super) const DECISIONS: DecisionSet = DecisionSet {
    kinds: &[
        "if_statement",
        "for_statement",
        "for_in_statement",
        "while_statement",
        "do_statement",
        "switch_case",
        "catch_clause",
        "ternary_expression",
    ],
    operators: &[
        ("binary_expression", "&&"),
        ("binary_expression", "||"),
        ("binary_expression", "??"),
    ],
    scopes: &["arrow_function", "function_expression", "generator_function"],
};

pub(super) const CLASS_SCOPES: &[&str] = &["class_declaration", "class", "abstract_class_declaration"];
pub(super) const FUNCTION_SCOPES: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
    "function_expression",
    "arrow_function",
    "method_definition",
];

pub(super) const MARKERS: &[&str] = &["//", "/**", "/*", "*/", "*"];

pub struct JavaScript;

impl LanguageProvider for JavaScript {
    fn id(&self) -> &'static str {
        "javascript"
    }

    fn grammar(&self) -> Language {
        tree_sitter_javascript::LANGUAGE.into()
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["js", "jsx", "mjs", "cjs"]
    }

    fn interpreters(&self) -> &'static [&'static str] {
        &["node", "nodejs", "deno", "bun"]
    }

    fn sniff_keywords(&self) -> &'static [&'static str] {
        &["function", "const", "let", "var", "require", "module", "exports", "undefined", "console", "async", "await"]
    }

    fn handlers(&self) -> HandlerRegistry {
        handlers()
    }

    fn decisions(&self) -> DecisionSet {
        DECISIONS
    }

    fn queries(&self) -> &'static [NamedQuery] {
        QUERIES
    }

    fn comment_markers(&self) -> &'static [&'static str] {
        MARKERS
    }

    fn annotation_prefixes(&self) -> &'static [&'static str] {
        &["@"]
    }
}

/// Handlers shared with TypeScript.
pub(super) fn handlers() -> HandlerRegistry {
    HandlerRegistry::new()
        .on(
            ElementCategory::Function,
            &["function_declaration", "generator_function_declaration"],
            function,
        )
        .on(ElementCategory::Function, &["method_definition"], method)
        .on(
            ElementCategory::Function,
            &["arrow_function", "function_expression"],
            function_value,
        )
        .on(ElementCategory::Class, &["class_declaration", "class"], class)
        .on_leaf(ElementCategory::Field, &["field_definition"], field)
        .on_leaf(ElementCategory::Variable, &["variable_declarator"], variable)
        .on_leaf(ElementCategory::Import, &["import_statement"], import)
}

pub(super) fn is_exported(node: Node<'_>) -> bool {
    let mut current = node.parent();
    while let Some(n) = current {
        match n.kind() {
            "export_statement" => return true,
            "program" | "statement_block" | "class_body" => return false,
            _ => current = n.parent(),
        }
    }
    false
}

/// Name of the enclosing class, if the node is not inside another function.
pub(super) fn owner_class(ctx: &HandlerContext<'_, '_>) -> Option<String> {
    let class = common::enclosing(ctx.node(), CLASS_SCOPES, FUNCTION_SCOPES)?;
    match class.child_by_field_name("name") {
        Some(name) => Some(ctx.text(name).to_string()),
        None => class
            .parent()
            .filter(|p| p.kind() == "variable_declarator")
            .and_then(|p| p.child_by_field_name("name"))
            .map(|n| ctx.text(n).to_string()),
    }
}

/// TypeScript `public`/`private`/`protected`, or `#private` names.
pub(super) fn member_visibility(ctx: &HandlerContext<'_, '_>, name_node: Option<Node<'_>>) -> Visibility {
    if name_node.is_some_and(|n| n.kind() == "private_property_identifier") {
        return Visibility::Private;
    }
    let words = common::modifier_words(ctx, &["accessibility_modifier"]);
    common::visibility_from(&words, Visibility::Public)
}

fn parameters(ctx: &HandlerContext<'_, '_>) -> Vec<String> {
    match ctx.field("parameters") {
        Some(params) => child_texts(ctx, Some(params), &[]),
        // Single bare arrow parameter: `x => x + 1`
        None => ctx
            .field_text("parameter")
            .map(|p| vec![p.to_string()])
            .unwrap_or_default(),
    }
}

pub(super) fn function(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("function declaration without a name"))?;
    Ok(Some(
        ElementDraft::new(name, "function")
            .signature(header(ctx, ctx.field("body")))
            .parameters(parameters(ctx))
            .returns(ctx.field("return_type").map(|t| type_annotation(ctx, t)))
            .visibility(Visibility::Public)
            .tag_if(common::has_child_kind(node, "async"), tags::ASYNC)
            .tag_if(
                node.kind() == "generator_function_declaration" || common::has_child_kind(node, "*"),
                tags::GENERATOR,
            )
            .tag_if(is_exported(node), tags::EXPORTED),
    ))
}

pub(super) fn method(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let name_node = ctx
        .field("name")
        .ok_or_else(|| anyhow::anyhow!("method without a name"))?;
    let name = ctx.text(name_node);
    let getter = common::has_child_kind(node, "get");
    let setter = common::has_child_kind(node, "set");
    let kind = if name == "constructor" {
        "constructor"
    } else if getter {
        "getter"
    } else if setter {
        "setter"
    } else {
        "method"
    };
    Ok(Some(
        ElementDraft::new(name, kind)
            .signature(header(ctx, ctx.field("body")))
            .parameters(parameters(ctx))
            .returns(ctx.field("return_type").map(|t| type_annotation(ctx, t)))
            .visibility(member_visibility(ctx, Some(name_node)))
            .tag(tags::METHOD)
            .tag_if(common::has_child_kind(node, "static"), tags::STATIC)
            .tag_if(common::has_child_kind(node, "async"), tags::ASYNC)
            .tag_if(common::has_child_kind(node, "*"), tags::GENERATOR)
            .tag_if(common::has_child_kind(node, "abstract"), tags::ABSTRACT)
            .tag_if(kind == "constructor", tags::CONSTRUCTOR)
            .tag_if(getter || setter, tags::PROPERTY)
            .parent(owner_class(ctx)),
    ))
}

/// Arrow functions and function expressions, named after what they are
/// bound to.
pub(super) fn function_value(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let own_name = ctx.field_text("name");
    let bound = node.parent().and_then(|p| {
        let target = match p.kind() {
            "variable_declarator" => p.child_by_field_name("name"),
            "pair" => p.child_by_field_name("key"),
            "assignment_expression" => p.child_by_field_name("left"),
            "field_definition" => p.child_by_field_name("property"),
            "public_field_definition" => p.child_by_field_name("name"),
            _ => None,
        }?;
        // Only name the function after the value slot, not e.g. `x = y = () => {}`
        (p.child_by_field_name("value").or_else(|| p.child_by_field_name("right")) == Some(node))
            .then(|| ctx.text(target))
    });
    let (name, anonymous) = match own_name.or(bound) {
        Some(name) => (name, false),
        None => ("<anonymous>", true),
    };
    let kind = if node.kind() == "arrow_function" {
        "arrow_function"
    } else {
        "function"
    };
    let declaration = node.parent().and_then(|p| p.parent()).unwrap_or(node);

    Ok(Some(
        ElementDraft::new(name, kind)
            .signature(header(ctx, ctx.field("body")))
            .parameters(parameters(ctx))
            .returns(ctx.field("return_type").map(|t| type_annotation(ctx, t)))
            .visibility(Visibility::Public)
            .tag_if(anonymous, "anonymous")
            .tag_if(common::has_child_kind(node, "async"), tags::ASYNC)
            .tag_if(is_exported(declaration), tags::EXPORTED)
            .parent(owner_class(ctx)),
    ))
}

/// `: Promise<void>` → `Promise<void>`.
pub(super) fn type_annotation(ctx: &HandlerContext<'_, '_>, node: Node<'_>) -> String {
    ctx.text(node).trim_start_matches(':').trim().to_string()
}

pub(super) fn class(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let name = ctx.field_text("name").or_else(|| {
        node.parent()
            .filter(|p| p.kind() == "variable_declarator")
            .and_then(|p| p.child_by_field_name("name"))
            .map(|n| ctx.text(n))
    });
    let (name, anonymous) = match name {
        Some(name) => (name, false),
        None => ("<anonymous>", true),
    };
    let kind = match node.kind() {
        "abstract_class_declaration" => "abstract_class",
        _ => "class",
    };
    Ok(Some(
        ElementDraft::new(name, kind)
            .signature(header(ctx, ctx.field("body")))
            .visibility(Visibility::Public)
            .tag_if(anonymous, "anonymous")
            .tag_if(kind == "abstract_class", tags::ABSTRACT)
            .tag_if(is_exported(node), tags::EXPORTED)
            .parent(owner_class(ctx)),
    ))
}

pub(super) fn field(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let name_node = ctx
        .field("property")
        .or_else(|| ctx.field("name"))
        .ok_or_else(|| anyhow::anyhow!("field without a name"))?;
    let name = ctx.text(name_node);
    let readonly = common::has_child_kind(node, "readonly");
    Ok(Some(
        ElementDraft::new(name, "field")
            .signature(common::collapse_ws(ctx.node_text()).trim_end_matches(';').to_string())
            .returns(ctx.field("type").map(|t| type_annotation(ctx, t)))
            .visibility(member_visibility(ctx, Some(name_node)))
            .tag_if(common::has_child_kind(node, "static"), tags::STATIC)
            .tag_if(readonly, "readonly")
            .tag_if(common::has_child_kind(node, "abstract"), tags::ABSTRACT)
            .parent(owner_class(ctx)),
    ))
}

/// Top-level `const`/`let`/`var` bindings.
pub(super) fn variable(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let Some(declaration) = node.parent() else {
        return Ok(None);
    };
    let top_level = declaration
        .parent()
        .is_some_and(|p| p.kind() == "program" || p.kind() == "export_statement");
    if !top_level {
        return Ok(None);
    }
    let name_node = ctx
        .field("name")
        .ok_or_else(|| anyhow::anyhow!("declarator without a name"))?;
    if name_node.kind() != "identifier" {
        // Destructuring patterns bind several names
        return Ok(None);
    }
    let name = ctx.text(name_node);
    let keyword = declaration
        .child(0)
        .map(|k| ctx.text(k))
        .unwrap_or("var");
    let is_const = keyword == "const";
    let kind = if is_const && common::is_constant_name(name) {
        "constant"
    } else {
        keyword
    };
    Ok(Some(
        ElementDraft::new(name, kind)
            .signature(common::collapse_ws(ctx.node_text()))
            .returns(ctx.field("type").map(|t| type_annotation(ctx, t)))
            .visibility(Visibility::Public)
            .tag_if(is_const, tags::CONST)
            .tag_if(is_exported(declaration), tags::EXPORTED),
    ))
}

pub(super) fn import(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let source = ctx
        .field_text("source")
        .ok_or_else(|| anyhow::anyhow!("import without a source"))?;
    let source = common::unquote(source);
    let clause = common::child_of_kind(node, &["import_clause"]);
    let names = clause.map(|c| imported_names(ctx, c)).unwrap_or_default();
    let namespace = clause.is_some_and(|c| common::has_child_kind(c, "namespace_import"));
    Ok(Some(
        ElementDraft::new(source, "import")
            .signature(common::collapse_ws(ctx.node_text()).trim_end_matches(';').to_string())
            .parameters(names)
            .visibility(Visibility::Public)
            .tag_if(namespace, tags::WILDCARD)
            .tag_if(source.starts_with('.'), tags::RELATIVE)
            .tag_if(common::has_child_kind(node, "type"), "type_only"),
    ))
}

/// Local names bound by an import clause.
fn imported_names(ctx: &HandlerContext<'_, '_>, clause: Node<'_>) -> Vec<String> {
    let mut names = Vec::new();
    let mut cursor = clause.walk();
    let mut stack = vec![clause];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "import_specifier" => {
                let local = node
                    .child_by_field_name("alias")
                    .or_else(|| node.child_by_field_name("name"));
                if let Some(local) = local {
                    names.push(ctx.text(local).to_string());
                }
            }
            "identifier" => names.push(ctx.text(node).to_string()),
            _ => {
                let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
                stack.extend(children.into_iter().rev());
            }
        }
    }
    names
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
        let plugin = LanguagePlugin::build(&JavaScript).unwrap();
        let unit = Arc::new(SourceUnit::new("app.js", source, "javascript"));
        let parsed = plugin.parse(unit).unwrap();
        let out = extract(&parsed, &plugin, category, DEFAULT_MAX_DOC_LINES);
        assert!(out.errors.is_empty(), "Unexpected errors: {:?}", out.errors);
        out.elements
    }

    const SOURCE: &str = r#"import fs from "fs";
import { join, resolve as res } from "./paths";

const MAX_RETRIES = 3;
let cache = null;

/**
 * Loads a file.
 */
export function load(path, retries = 1) {
  if (!path || retries > MAX_RETRIES) {
    return null;
  }
  return fs.readFileSync(path);
}

class Store {
  #items = [];
  static count = 0;

  constructor(name) {
    this.name = name;
  }

  get size() {
    return this.#items.length;
  }

  async save() {
    const done = this.#items.map((item) => item.id);
    return done;
  }
}

const double = (x) => x * 2;
"#;

    #[test]
    fn test_js_functions() {
        let functions = run(SOURCE, ElementCategory::Function);
        let names: Vec<&str> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["load", "constructor", "size", "save", "<anonymous>", "double"]
        );

        let load = &functions[0];
        assert!(load.has_tag(tags::EXPORTED));
        assert_eq!(load.parameters, vec!["path", "retries = 1"]);
        assert_eq!(load.complexity, Some(3));
        assert_eq!(load.doc.as_deref(), Some("Loads a file."));

        assert_eq!(functions[1].kind, "constructor");
        assert_eq!(functions[1].parent.as_deref(), Some("Store"));
        assert_eq!(functions[2].kind, "getter");
        assert!(functions[3].has_tag(tags::ASYNC));
        assert!(functions[4].has_tag("anonymous"));
        assert_eq!(functions[5].kind, "arrow_function");
        assert_eq!(functions[5].parent, None);
    }

    #[test]
    fn test_js_classes_and_fields() {
        let classes = run(SOURCE, ElementCategory::Class);
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].name, "Store");

        let fields = run(SOURCE, ElementCategory::Field);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "#items");
        assert_eq!(fields[0].visibility, Visibility::Private);
        assert!(fields[1].is_static());
    }

    #[test]
    fn test_js_variables_and_imports() {
        let variables = run(SOURCE, ElementCategory::Variable);
        let names: Vec<&str> = variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["MAX_RETRIES", "cache", "double"]);
        assert_eq!(variables[0].kind, "constant");
        assert_eq!(variables[1].kind, "let");

        let imports = run(SOURCE, ElementCategory::Import);
        assert_eq!(imports.len(), 2);
        assert_eq!(imports[0].name, "fs");
        assert_eq!(imports[0].parameters, vec!["fs"]);
        assert_eq!(imports[1].parameters, vec!["join", "res"]);
        assert!(imports[1].has_tag(tags::RELATIVE));
    }
}
