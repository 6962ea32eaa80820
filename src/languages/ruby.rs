//! Ruby plugin.

use tree_sitter::{Language, Node};

use super::common::{self, child_texts, header};
use crate::elements::{tags, ElementCategory, Visibility};
use crate::plugin::{
    DecisionSet, ElementDraft, HandlerContext, HandlerRegistry, LanguageProvider, NamedQuery,
};

const QUERIES: &[NamedQuery] = &[
    NamedQuery {
        key: "functions",
        description: "Instance and singleton methods",
        source: "[(method name: (_) @name) (singleton_method name: (_) @name)] @function",
    },
    NamedQuery {
        key: "classes",
        description: "Class definitions",
        source: "(class name: (_) @name) @class",
    },
    NamedQuery {
        key: "modules",
        description: "Module definitions",
        source: "(module name: (_) @name) @module",
    },
    NamedQuery {
        key: "requires",
        description: "require and require_relative calls",
        source: r#"
((call method: (identifier) @method arguments: (argument_list (string) @path)) @require
 (#match? @method "^(require|require_relative|load)$"))
"#,
    },
    NamedQuery {
        key: "blocks",
        description: "Blocks and lambdas",
        source: "[(block) (do_block) (lambda)] @block",
    },
    NamedQuery {
        key: "comments",
        description: "Comments",
        source: "(comment) @comment",
    },
];

const DECISIONS: DecisionSet = DecisionSet {
    kinds: &[
        "if",
        "elsif",
        "unless",
        "while",
        "until",
        "for",
        "when",
        "rescue",
        "conditional",
        "if_modifier",
        "unless_modifier",
        "while_modifier",
        "until_modifier",
        "rescue_modifier",
    ],
    operators: &[
        ("binary", "&&"),
        ("binary", "||"),
        ("binary", "and"),
        ("binary", "or"),
    ],
    scopes: &["lambda"],
};

const TYPE_KINDS: &[&str] = &["class", "module", "singleton_class"];
const FUNCTION_KINDS: &[&str] = &["method", "singleton_method"];

pub struct Ruby;

impl LanguageProvider for Ruby {
    fn id(&self) -> &'static str {
        "ruby"
    }

    fn grammar(&self) -> Language {
        tree_sitter_ruby::LANGUAGE.into()
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["rb", "rake", "gemspec"]
    }

    fn file_names(&self) -> &'static [&'static str] {
        &["Rakefile", "Gemfile", "Guardfile", "Vagrantfile"]
    }

    fn interpreters(&self) -> &'static [&'static str] {
        &["ruby"]
    }

    fn sniff_keywords(&self) -> &'static [&'static str] {
        &["def", "end", "require", "module", "attr_accessor", "attr_reader", "puts", "elsif", "unless", "do"]
    }

    fn handlers(&self) -> HandlerRegistry {
        HandlerRegistry::new()
            .on(ElementCategory::Function, FUNCTION_KINDS, method)
            .on(ElementCategory::Class, &["class", "module"], type_definition)
            .on_leaf(ElementCategory::Field, &["assignment"], constant)
            .on_leaf(ElementCategory::Field, &["call"], attribute)
            .on_leaf(ElementCategory::Variable, &["assignment"], variable)
            .on_leaf(ElementCategory::Import, &["call"], require)
    }

    fn decisions(&self) -> DecisionSet {
        DECISIONS
    }

    fn queries(&self) -> &'static [NamedQuery] {
        QUERIES
    }

    fn comment_markers(&self) -> &'static [&'static str] {
        &["#"]
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

/// Visibility set by a bare `private`/`protected`/`public` line earlier in
/// the same body.
fn section_visibility(ctx: &HandlerContext<'_, '_>) -> Visibility {
    let mut sibling = ctx.node().prev_named_sibling();
    while let Some(s) = sibling {
        if s.kind() == "identifier" {
            match ctx.text(s) {
                "private" => return Visibility::Private,
                "protected" => return Visibility::Protected,
                "public" => return Visibility::Public,
                _ => {}
            }
        }
        sibling = s.prev_named_sibling();
    }
    Visibility::Public
}

fn method(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("def without a name"))?;
    let singleton = node.kind() == "singleton_method";
    let parent = owner_name(ctx);
    let in_singleton_class = owner(node).is_some_and(|o| o.kind() == "singleton_class");
    let visibility = match name {
        "initialize" | "initialize_copy" | "respond_to_missing?" => Visibility::Private,
        _ => section_visibility(ctx),
    };
    let body = ctx.field("body").or_else(|| {
        ctx.field("parameters").and_then(|p| p.next_named_sibling())
    });

    Ok(Some(
        ElementDraft::new(name, if parent.is_some() { "method" } else { "function" })
            .signature(match body {
                Some(b) => header(ctx, Some(b)),
                None => common::collapse_ws(ctx.node_text().lines().next().unwrap_or_default()),
            })
            .parameters(child_texts(ctx, ctx.field("parameters"), &[]))
            .visibility(visibility)
            .tag_if(parent.is_some(), tags::METHOD)
            .tag_if(name == "initialize", tags::CONSTRUCTOR)
            .tag_if(singleton || in_singleton_class, tags::STATIC)
            .tag_if(name.ends_with('?'), "predicate")
            .tag_if(name.ends_with('!'), "bang")
            .parent(parent),
    ))
}

fn type_definition(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("definition without a name"))?;
    let superclass = ctx
        .field_text("superclass")
        .map(|s| s.trim_start_matches('<').trim().to_string());
    let head = ctx.node_text().lines().next().unwrap_or_default();
    Ok(Some(
        ElementDraft::new(name, node.kind())
            .signature(common::collapse_ws(head))
            .parameters(superclass.into_iter().collect())
            .visibility(Visibility::Public)
            .tag_if(node.kind() == "module", tags::ABSTRACT)
            .parent(owner_name(ctx)),
    ))
}

/// Whether the assignment sits directly in a class or module body.
fn in_type_body(node: Node<'_>) -> bool {
    node.parent().is_some_and(|p| {
        TYPE_KINDS.contains(&p.kind())
            || (p.kind() == "body_statement"
                && p.parent().is_some_and(|g| TYPE_KINDS.contains(&g.kind())))
    })
}

fn assignment_draft(ctx: &HandlerContext<'_, '_>) -> anyhow::Result<ElementDraft> {
    let left = ctx
        .field("left")
        .ok_or_else(|| anyhow::anyhow!("assignment without a target"))?;
    let name = ctx.text(left);
    let constant = left.kind() == "constant";
    let head = match ctx.field("right") {
        Some(right) => ctx.unit().slice(ctx.node().start_byte()..right.start_byte()),
        None => ctx.node_text(),
    };
    Ok(ElementDraft::new(name, if constant { "constant" } else { "variable" })
        .signature(common::collapse_ws(head).trim_end_matches('=').trim_end().to_string())
        .visibility(Visibility::Public)
        .tag_if(constant, tags::CONST)
        .tag_if(left.kind() == "global_variable", "global"))
}

fn constant(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let is_constant = ctx.field("left").is_some_and(|l| l.kind() == "constant");
    if !is_constant || !in_type_body(node) {
        return Ok(None);
    }
    let parent = owner_name(ctx);
    Ok(Some(assignment_draft(ctx)?.tag(tags::STATIC).parent(parent)))
}

/// `attr_reader :a, :b` declares one attribute element named after the first
/// symbol; all symbols are listed as parameters.
fn attribute(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let Some(method) = ctx.field_text("method") else {
        return Ok(None);
    };
    let access = match method {
        "attr_reader" => "reader",
        "attr_writer" => "writer",
        "attr_accessor" => "accessor",
        _ => return Ok(None),
    };
    if ctx.field("receiver").is_some() || owner(node).is_none() {
        return Ok(None);
    }
    let symbols: Vec<String> = child_texts(ctx, ctx.field("arguments"), &[])
        .into_iter()
        .map(|s| s.trim_start_matches(':').to_string())
        .collect();
    let Some(first) = symbols.first().cloned() else {
        return Ok(None);
    };
    Ok(Some(
        ElementDraft::new(first, "attribute")
            .signature(common::collapse_ws(ctx.node_text()))
            .parameters(symbols)
            .visibility(section_visibility(ctx))
            .tag(tags::PROPERTY)
            .tag(access)
            .parent(owner_name(ctx)),
    ))
}

fn variable(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let top_level = ctx.node().parent().is_some_and(|p| p.kind() == "program");
    if !top_level {
        return Ok(None);
    }
    assignment_draft(ctx).map(Some)
}

fn require(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let Some(method) = ctx.field_text("method") else {
        return Ok(None);
    };
    if !matches!(method, "require" | "require_relative" | "load") || ctx.field("receiver").is_some() {
        return Ok(None);
    }
    let Some(path) = ctx
        .field("arguments")
        .and_then(|a| a.named_child(0))
        .filter(|a| a.kind() == "string")
    else {
        return Ok(None);
    };
    let name = common::unquote(ctx.text(path));
    Ok(Some(
        ElementDraft::new(name, method)
            .signature(common::collapse_ws(ctx.node_text()))
            .visibility(Visibility::Public)
            .tag_if(method == "require_relative" || name.starts_with('.'), tags::RELATIVE),
    ))
}
