//! Rust plugin.

use tree_sitter::{Language, Node};

use super::common::{self, child_texts, header};
use crate::elements::{tags, ElementCategory, Visibility};
use crate::plugin::{
    DecisionSet, ElementDraft, HandlerContext, HandlerRegistry, LanguageProvider, NamedQuery,
};

const QUERIES: &[NamedQuery] = &[
    NamedQuery {
        key: "functions",
        description: "Functions and methods",
        source: "(function_item name: (identifier) @name) @function",
    },
    NamedQuery {
        key: "classes",
        description: "Structs, enums, unions and traits",
        source: r#"
[(struct_item name: (type_identifier) @name)
 (enum_item name: (type_identifier) @name)
 (union_item name: (type_identifier) @name)
 (trait_item name: (type_identifier) @name)] @class
"#,
    },
    NamedQuery {
        key: "structs",
        description: "Struct definitions",
        source: "(struct_item name: (type_identifier) @name) @struct",
    },
    NamedQuery {
        key: "enums",
        description: "Enum definitions",
        source: "(enum_item name: (type_identifier) @name) @enum",
    },
    NamedQuery {
        key: "traits",
        description: "Trait definitions",
        source: "(trait_item name: (type_identifier) @name) @trait",
    },
    NamedQuery {
        key: "impls",
        description: "impl blocks",
        source: "(impl_item type: (_) @name) @impl",
    },
    NamedQuery {
        key: "methods",
        description: "Functions inside impl blocks",
        source: "(impl_item body: (declaration_list (function_item name: (identifier) @name) @method))",
    },
    NamedQuery {
        key: "macros",
        description: "macro_rules! definitions",
        source: "(macro_definition name: (identifier) @name) @macro",
    },
    NamedQuery {
        key: "imports",
        description: "use declarations",
        source: "(use_declaration) @import",
    },
    NamedQuery {
        key: "unsafe",
        description: "unsafe blocks",
        source: "(unsafe_block) @unsafe",
    },
    NamedQuery {
        key: "comments",
        description: "Line and block comments",
        source: "[(line_comment) (block_comment)] @comment",
    },
];

const DECISIONS: DecisionSet = DecisionSet {
    kinds: &[
        "if_expression",
        "match_arm",
        "for_expression",
        "while_expression",
        "try_expression",
    ],
    operators: &[("binary_expression", "&&"), ("binary_expression", "||")],
    scopes: &["closure_expression"],
};

const TYPE_SCOPES: &[&str] = &["impl_item", "trait_item"];
const FUNCTION_SCOPES: &[&str] = &["function_item", "closure_expression"];

pub struct Rust;

impl LanguageProvider for Rust {
    fn id(&self) -> &'static str {
        "rust"
    }

    fn grammar(&self) -> Language {
        tree_sitter_rust::LANGUAGE.into()
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["rs"]
    }

    fn sniff_keywords(&self) -> &'static [&'static str] {
        &["fn", "let", "mut", "impl", "pub", "use", "crate", "struct", "enum", "match", "Self", "trait"]
    }

    fn handlers(&self) -> HandlerRegistry {
        HandlerRegistry::new()
            .on(
                ElementCategory::Function,
                &["function_item", "function_signature_item"],
                function,
            )
            .on(
                ElementCategory::Class,
                &["struct_item", "enum_item", "union_item", "trait_item"],
                type_item,
            )
            .on_leaf(ElementCategory::Field, &["field_declaration", "enum_variant"], field)
            .on_leaf(ElementCategory::Field, &["const_item"], associated_const)
            .on_leaf(ElementCategory::Variable, &["const_item", "static_item"], item_variable)
            .on_leaf(
                ElementCategory::Import,
                &["use_declaration", "extern_crate_declaration"],
                import,
            )
    }

    fn decisions(&self) -> DecisionSet {
        DECISIONS
    }

    fn queries(&self) -> &'static [NamedQuery] {
        QUERIES
    }

    fn comment_markers(&self) -> &'static [&'static str] {
        &["///", "//!", "//", "/**", "*/", "*"]
    }

    fn annotation_prefixes(&self) -> &'static [&'static str] {
        &["#["]
    }
}

/// `pub` is public, `pub(crate)`, `pub(super)` and `pub(in ..)` are crate
/// internal, no modifier is private.
fn visibility(ctx: &HandlerContext<'_, '_>, node: Node<'_>) -> Visibility {
    match common::child_of_kind(node, &["visibility_modifier"]) {
        Some(m) if ctx.text(m) == "pub" => Visibility::Public,
        Some(_) => Visibility::Internal,
        None => Visibility::Private,
    }
}

/// Type an item belongs to: the `impl` target or the enclosing trait.
fn owner_type(ctx: &HandlerContext<'_, '_>) -> Option<(String, &'static str)> {
    let owner = common::enclosing(ctx.node(), TYPE_SCOPES, FUNCTION_SCOPES)?;
    let name = match owner.kind() {
        "impl_item" => owner.child_by_field_name("type")?,
        _ => owner.child_by_field_name("name")?,
    };
    let kind = if owner.kind() == "impl_item" { "impl" } else { "trait" };
    Some((ctx.text(name).to_string(), kind))
}

fn function(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("function without a name"))?;
    let params = ctx.field("parameters");
    let has_self = params.is_some_and(|p| common::has_child_kind(p, "self_parameter"));
    let parameters = child_texts(ctx, params, &["self_parameter", "attribute_item"]);
    let owner = owner_type(ctx);

    let modifiers = common::child_of_kind(node, &["function_modifiers"])
        .map(|m| ctx.text(m))
        .unwrap_or("");
    let in_trait = owner.as_ref().is_some_and(|(_, k)| *k == "trait");
    let vis = if in_trait {
        Visibility::Public
    } else {
        visibility(ctx, node)
    };

    let kind = match &owner {
        Some(_) if has_self => "method",
        Some(_) => "associated_function",
        None => "function",
    };

    Ok(Some(
        ElementDraft::new(name, kind)
            .signature(header(ctx, ctx.field("body")).trim_end_matches(';').to_string())
            .parameters(parameters)
            .returns(ctx.field_text("return_type"))
            .visibility(vis)
            .tag_if(modifiers.contains("async"), tags::ASYNC)
            .tag_if(modifiers.contains("const"), tags::CONST)
            .tag_if(modifiers.contains("unsafe"), tags::UNSAFE)
            .tag_if(owner.is_some(), tags::METHOD)
            .tag_if(owner.is_some() && !has_self, tags::STATIC)
            .tag_if(owner.is_some() && name == "new" && !has_self, tags::CONSTRUCTOR)
            .tag_if(node.kind() == "function_signature_item", tags::ABSTRACT)
            .parent(owner.map(|(name, _)| name)),
    ))
}

fn type_item(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("type without a name"))?;
    let kind = match node.kind() {
        "struct_item" => "struct",
        "enum_item" => "enum",
        "union_item" => "union",
        _ => "trait",
    };
    let generics = ctx.field("type_parameters");
    Ok(Some(
        ElementDraft::new(name, kind)
            .signature(header(ctx, ctx.field("body")).trim_end_matches(';').to_string())
            .parameters(child_texts(ctx, generics, &[]))
            .visibility(visibility(ctx, node))
            .tag_if(kind == "trait", tags::ABSTRACT)
            .tag_if(
                common::has_child_kind(node, "unsafe"),
                tags::UNSAFE,
            ),
    ))
}

fn field(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("field without a name"))?;
    let owner = common::enclosing(
        node,
        &["struct_item", "union_item", "enum_item"],
        FUNCTION_SCOPES,
    );
    let parent = owner
        .and_then(|o| o.child_by_field_name("name"))
        .map(|n| ctx.text(n));

    if node.kind() == "enum_variant" {
        return Ok(Some(
            ElementDraft::new(name, "variant")
                .signature(common::collapse_ws(ctx.node_text()))
                .visibility(Visibility::Public)
                .parent(parent),
        ));
    }

    Ok(Some(
        ElementDraft::new(name, "field")
            .signature(common::collapse_ws(ctx.node_text()))
            .returns(ctx.field_text("type"))
            .visibility(visibility(ctx, node))
            .parent(parent),
    ))
}

fn associated_const(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let Some((owner, _)) = owner_type(ctx) else {
        return Ok(None);
    };
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("const without a name"))?;
    Ok(Some(
        ElementDraft::new(name, "associated_const")
            .signature(common::collapse_ws(ctx.node_text()))
            .returns(ctx.field_text("type"))
            .visibility(visibility(ctx, ctx.node()))
            .tag(tags::CONST)
            .tag(tags::STATIC)
            .parent(Some(owner)),
    ))
}

fn item_variable(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    if owner_type(ctx).is_some() {
        return Ok(None);
    }
    let node = ctx.node();
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("item without a name"))?;
    let is_const = node.kind() == "const_item";
    let mutable = common::has_child_kind(node, "mutable_specifier");
    Ok(Some(
        ElementDraft::new(name, if is_const { "constant" } else { "static" })
            .signature(common::collapse_ws(ctx.node_text()))
            .returns(ctx.field_text("type"))
            .visibility(visibility(ctx, node))
            .tag_if(is_const, tags::CONST)
            .tag(tags::STATIC)
            .tag_if(mutable, "mutable"),
    ))
}

fn import(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    if node.kind() == "extern_crate_declaration" {
        let name = ctx
            .field_text("name")
            .ok_or_else(|| anyhow::anyhow!("extern crate without a name"))?;
        return Ok(Some(
            ElementDraft::new(name, "extern_crate")
                .signature(common::collapse_ws(ctx.node_text()))
                .visibility(visibility(ctx, node)),
        ));
    }

    let argument = ctx
        .field("argument")
        .ok_or_else(|| anyhow::anyhow!("use declaration without a path"))?;
    let path = common::collapse_ws(ctx.text(argument));
    let wildcard = argument.kind() == "use_wildcard" || path.ends_with('*');
    let relative = path.starts_with("self::") || path.starts_with("super::") || path.starts_with("crate::");
    Ok(Some(
        ElementDraft::new(path, "use")
            .signature(common::collapse_ws(ctx.node_text()))
            .visibility(visibility(ctx, node))
            .tag_if(wildcard, tags::WILDCARD)
            .tag_if(relative, tags::RELATIVE),
    ))
}
