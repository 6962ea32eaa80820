//! Scala plugin.

use tree_sitter::{Language, Node};

use super::common::{self, header};
use crate::elements::{tags, ElementCategory, Visibility};
use crate::plugin::{
    DecisionSet, ElementDraft, HandlerContext, HandlerRegistry, LanguageProvider, NamedQuery,
};

const QUERIES: &[NamedQuery] = &[
    NamedQuery {
        key: "functions",
        description: "Method definitions and declarations",
        source: r#"
[(function_definition name: (identifier) @name)
 (function_declaration name: (identifier) @name)] @function
"#,
    },
    NamedQuery {
        key: "classes",
        description: "Class definitions",
        source: "(class_definition name: (identifier) @name) @class",
    },
    NamedQuery {
        key: "objects",
        description: "Object definitions",
        source: "(object_definition name: (identifier) @name) @object",
    },
    NamedQuery {
        key: "traits",
        description: "Trait definitions",
        source: "(trait_definition name: (identifier) @name) @trait",
    },
    NamedQuery {
        key: "vals",
        description: "Value definitions",
        source: "(val_definition pattern: (_) @name) @val",
    },
    NamedQuery {
        key: "imports",
        description: "Import declarations",
        source: "(import_declaration) @import",
    },
    NamedQuery {
        key: "matches",
        description: "Match expressions",
        source: "(match_expression) @match",
    },
    NamedQuery {
        key: "comments",
        description: "Comments",
        source: "[(comment) (block_comment)] @comment",
    },
];

// Boolean operators are named `operator_identifier` nodes in this grammar
// and do not count.
const DECISIONS: DecisionSet = DecisionSet {
    kinds: &[
        "if_expression",
        "while_expression",
        "do_while_expression",
        "for_expression",
        "case_clause",
        "catch_clause",
    ],
    operators: &[],
    scopes: &["lambda_expression"],
};

const TYPE_KINDS: &[&str] = &[
    "class_definition",
    "object_definition",
    "trait_definition",
    "enum_definition",
];
const FUNCTION_KINDS: &[&str] = &["function_definition", "function_declaration"];

pub struct Scala;

impl LanguageProvider for Scala {
    fn id(&self) -> &'static str {
        "scala"
    }

    fn grammar(&self) -> Language {
        tree_sitter_scala::LANGUAGE.into()
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["scala", "sc"]
    }

    fn interpreters(&self) -> &'static [&'static str] {
        &["scala"]
    }

    fn sniff_keywords(&self) -> &'static [&'static str] {
        &["def", "val", "var", "object", "trait", "case", "extends", "implicit", "match", "override"]
    }

    fn handlers(&self) -> HandlerRegistry {
        HandlerRegistry::new()
            .on(ElementCategory::Function, FUNCTION_KINDS, function)
            .on(ElementCategory::Class, TYPE_KINDS, type_definition)
            .on_leaf(ElementCategory::Field, &["val_definition", "var_definition"], field)
            .on_leaf(ElementCategory::Field, &["val_declaration", "var_declaration"], field)
            .on_leaf(ElementCategory::Variable, &["val_definition", "var_definition"], variable)
            .on_leaf(ElementCategory::Import, &["import_declaration"], import)
    }

    fn decisions(&self) -> DecisionSet {
        DECISIONS
    }

    fn queries(&self) -> &'static [NamedQuery] {
        QUERIES
    }

    fn comment_markers(&self) -> &'static [&'static str] {
        &["//", "/**", "/*", "*/", "*"]
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

fn function(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("def without a name"))?;
    let words = common::modifier_words(ctx, &["modifiers", "annotation"]);
    let parent = owner_name(ctx);

    // Curried definitions carry one parameter list per clause
    let mut params = Vec::new();
    let mut cursor = node.walk();
    let lists: Vec<Node<'_>> = node.children_by_field_name("parameters", &mut cursor).collect();
    for list in lists {
        params.extend(common::child_texts(ctx, Some(list), &[]));
    }

    Ok(Some(
        ElementDraft::new(name, if parent.is_some() { "method" } else { "function" })
            .signature(header(ctx, ctx.field("body")))
            .parameters(params)
            .returns(ctx.field_text("return_type"))
            .visibility(common::visibility_from(&words, Visibility::Public))
            .tag_if(parent.is_some(), tags::METHOD)
            .tag_if(node.kind() == "function_declaration", tags::ABSTRACT)
            .tag_if(words.contains(&"override"), "override")
            .tag_if(words.contains(&"final"), tags::FINAL)
            .tag_if(words.contains(&"implicit"), "implicit")
            .tag_if(owner(node).is_some_and(|o| o.kind() == "object_definition"), tags::STATIC)
            .parent(parent),
    ))
}

fn type_definition(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("definition without a name"))?;
    let words = common::modifier_words(ctx, &["modifiers"]);
    let kind = match node.kind() {
        "class_definition" => "class",
        "object_definition" => "object",
        "trait_definition" => "trait",
        _ => "enum",
    };
    let case = common::has_child_kind(node, "case");
    let params = common::child_of_kind(node, &["class_parameters"])
        .map(|p| common::child_texts(ctx, Some(p), &[]))
        .unwrap_or_default();

    Ok(Some(
        ElementDraft::new(name, kind)
            .signature(header(ctx, ctx.field("body")))
            .parameters(params)
            .visibility(common::visibility_from(&words, Visibility::Public))
            .tag_if(case, "case")
            .tag_if(kind == "trait" || words.contains(&"abstract"), tags::ABSTRACT)
            .tag_if(words.contains(&"sealed"), "sealed")
            .tag_if(words.contains(&"final"), tags::FINAL)
            .tag_if(kind == "object", tags::STATIC)
            .parent(owner_name(ctx)),
    ))
}

/// Name bound by a val/var pattern; tuple patterns keep their text.
fn binding(ctx: &HandlerContext<'_, '_>) -> anyhow::Result<String> {
    ctx.field("pattern")
        .or_else(|| ctx.field("name"))
        .map(|p| common::collapse_ws(ctx.text(p)))
        .ok_or_else(|| anyhow::anyhow!("binding without a pattern"))
}

fn binding_draft(ctx: &HandlerContext<'_, '_>, kind_if_val: &str) -> anyhow::Result<ElementDraft> {
    let node = ctx.node();
    let name = binding(ctx)?;
    let words = common::modifier_words(ctx, &["modifiers"]);
    let mutable = node.kind().starts_with("var");
    let declared = node.kind().ends_with("_declaration");
    let signature = match ctx.field("value") {
        Some(value) => {
            let head = ctx.unit().slice(node.start_byte()..value.start_byte());
            common::collapse_ws(head).trim_end_matches('=').trim_end().to_string()
        }
        None => common::collapse_ws(ctx.node_text()),
    };
    Ok(ElementDraft::new(name, if mutable { "var" } else { kind_if_val })
        .signature(signature)
        .returns(ctx.field_text("type"))
        .visibility(common::visibility_from(&words, Visibility::Public))
        .tag_if(!mutable, tags::FINAL)
        .tag_if(declared, tags::ABSTRACT)
        .tag_if(words.contains(&"lazy"), "lazy")
        .tag_if(words.contains(&"override"), "override")
        .tag_if(words.contains(&"implicit"), "implicit"))
}

fn field(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    if owner(ctx.node()).is_none() {
        return Ok(None);
    }
    let parent = owner_name(ctx);
    let static_ = owner(ctx.node()).is_some_and(|o| o.kind() == "object_definition");
    Ok(Some(
        binding_draft(ctx, "val")?
            .tag_if(static_, tags::STATIC)
            .parent(parent),
    ))
}

/// Top-level bindings (Scala 3 and scripts).
fn variable(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let top_level = node
        .parent()
        .is_some_and(|p| matches!(p.kind(), "compilation_unit" | "package_clause" | "template_body"))
        && common::enclosing(node, TYPE_KINDS, FUNCTION_KINDS).is_none();
    if !top_level {
        return Ok(None);
    }
    binding_draft(ctx, "val").map(Some)
}

fn import(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let text = common::collapse_ws(ctx.node_text());
    let path = text.trim_start_matches("import").trim().to_string();
    let wildcard = path.ends_with("._") || path.ends_with(".*") || path.ends_with('}');
    Ok(Some(
        ElementDraft::new(path, "import")
            .signature(text)
            .visibility(Visibility::Public)
            .tag_if(wildcard, tags::WILDCARD),
    ))
}
