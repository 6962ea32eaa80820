//! Java plugin.

use tree_sitter::{Language, Node};

use super::common::{self, child_texts, header};
use crate::elements::{tags, ElementCategory, Visibility};
use crate::plugin::{
    DecisionSet, ElementDraft, HandlerContext, HandlerRegistry, LanguageProvider, NamedQuery,
};

const QUERIES: &[NamedQuery] = &[
    NamedQuery {
        key: "functions",
        description: "Methods and constructors",
        source: r#"
[(method_declaration name: (identifier) @name)
 (constructor_declaration name: (identifier) @name)] @function
"#,
    },
    NamedQuery {
        key: "methods",
        description: "Method declarations",
        source: "(method_declaration name: (identifier) @name) @method",
    },
    NamedQuery {
        key: "constructors",
        description: "Constructor declarations",
        source: "(constructor_declaration name: (identifier) @name) @constructor",
    },
    NamedQuery {
        key: "classes",
        description: "Class declarations",
        source: "(class_declaration name: (identifier) @name) @class",
    },
    NamedQuery {
        key: "interfaces",
        description: "Interface declarations",
        source: "(interface_declaration name: (identifier) @name) @interface",
    },
    NamedQuery {
        key: "enums",
        description: "Enum declarations",
        source: "(enum_declaration name: (identifier) @name) @enum",
    },
    NamedQuery {
        key: "records",
        description: "Record declarations",
        source: "(record_declaration name: (identifier) @name) @record",
    },
    NamedQuery {
        key: "imports",
        description: "Import declarations",
        source: "(import_declaration) @import",
    },
    NamedQuery {
        key: "annotations",
        description: "Annotations",
        source: "[(marker_annotation name: (_) @name) (annotation name: (_) @name)] @annotation",
    },
    NamedQuery {
        key: "lambdas",
        description: "Lambda expressions",
        source: "(lambda_expression) @lambda",
    },
    NamedQuery {
        key: "comments",
        description: "Comments",
        source: "[(line_comment) (block_comment)] @comment",
    },
];

const DECISIONS: DecisionSet = DecisionSet {
    kinds: &[
        "if_statement",
        "for_statement",
        "enhanced_for_statement",
        "while_statement",
        "do_statement",
        "catch_clause",
        "ternary_expression",
        "switch_label",
    ],
    operators: &[("binary_expression", "&&"), ("binary_expression", "||")],
    scopes: &["lambda_expression"],
};

const TYPE_KINDS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
    "annotation_type_declaration",
];
const STOPS: &[&str] = &["object_creation_expression", "lambda_expression"];

pub struct Java;

impl LanguageProvider for Java {
    fn id(&self) -> &'static str {
        "java"
    }

    fn grammar(&self) -> Language {
        tree_sitter_java::LANGUAGE.into()
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["java"]
    }

    fn sniff_keywords(&self) -> &'static [&'static str] {
        &["public", "private", "class", "extends", "implements", "static", "void", "final", "new", "throws", "package"]
    }

    fn handlers(&self) -> HandlerRegistry {
        HandlerRegistry::new()
            .on(
                ElementCategory::Function,
                &["method_declaration", "constructor_declaration", "compact_constructor_declaration"],
                method,
            )
            .on(ElementCategory::Class, TYPE_KINDS, type_declaration)
            .on_leaf(ElementCategory::Field, &["field_declaration", "constant_declaration"], field)
            .on_leaf(ElementCategory::Field, &["enum_constant"], enum_constant)
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

fn owner_type<'t>(node: Node<'t>) -> Option<Node<'t>> {
    common::enclosing(node, TYPE_KINDS, STOPS)
}

/// Interface members are implicitly public; everything else defaults to
/// package-private.
fn member_visibility(words: &[&str], owner: Option<Node<'_>>) -> Visibility {
    let default = if owner.is_some_and(|o| o.kind() == "interface_declaration") {
        Visibility::Public
    } else {
        Visibility::Package
    };
    common::visibility_from(words, default)
}

fn method(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("method without a name"))?;
    let words = common::modifier_words(ctx, &["modifiers"]);
    let owner = owner_type(node);
    let parent = owner
        .and_then(|o| o.child_by_field_name("name"))
        .map(|n| ctx.text(n));
    let constructor = node.kind() != "method_declaration";
    let in_interface = owner.is_some_and(|o| o.kind() == "interface_declaration");
    let abstract_ = words.contains(&"abstract")
        || (in_interface && ctx.field("body").is_none() && !words.contains(&"static"));

    Ok(Some(
        ElementDraft::new(name, if constructor { "constructor" } else { "method" })
            .signature(header(ctx, ctx.field("body")).trim_end_matches(';').to_string())
            .parameters(child_texts(ctx, ctx.field("parameters"), &[]))
            .returns(ctx.field_text("type"))
            .visibility(member_visibility(&words, owner))
            .tag(tags::METHOD)
            .tag_if(constructor, tags::CONSTRUCTOR)
            .tag_if(words.contains(&"static"), tags::STATIC)
            .tag_if(abstract_, tags::ABSTRACT)
            .tag_if(words.contains(&"final"), tags::FINAL)
            .tag_if(words.contains(&"synchronized"), "synchronized")
            .tag_if(words.contains(&"default"), "default")
            .tag_if(words.contains(&"Override"), "override")
            .parent(parent),
    ))
}

fn type_declaration(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("type without a name"))?;
    let words = common::modifier_words(ctx, &["modifiers"]);
    let kind = match node.kind() {
        "class_declaration" => "class",
        "interface_declaration" => "interface",
        "enum_declaration" => "enum",
        "record_declaration" => "record",
        _ => "annotation",
    };
    let owner = owner_type(node);
    let parent = owner
        .and_then(|o| o.child_by_field_name("name"))
        .map(|n| ctx.text(n));
    let parameters = match kind {
        "record" => child_texts(ctx, ctx.field("parameters"), &[]),
        _ => child_texts(ctx, ctx.field("type_parameters"), &[]),
    };

    Ok(Some(
        ElementDraft::new(name, kind)
            .signature(header(ctx, ctx.field("body")))
            .parameters(parameters)
            .visibility(member_visibility(&words, owner))
            .tag_if(words.contains(&"static"), tags::STATIC)
            .tag_if(words.contains(&"abstract") || kind == "interface", tags::ABSTRACT)
            .tag_if(words.contains(&"final"), tags::FINAL)
            .parent(parent),
    ))
}

fn field(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let declarator = ctx
        .field("declarator")
        .ok_or_else(|| anyhow::anyhow!("field without a declarator"))?;
    let name = declarator
        .child_by_field_name("name")
        .map(|n| ctx.text(n))
        .ok_or_else(|| anyhow::anyhow!("field declarator without a name"))?;
    let words = common::modifier_words(ctx, &["modifiers"]);
    let owner = owner_type(node);
    let parent = owner
        .and_then(|o| o.child_by_field_name("name"))
        .map(|n| ctx.text(n));
    let constant = node.kind() == "constant_declaration"
        || (words.contains(&"static") && words.contains(&"final"));
    // Interface fields are implicitly static final
    let implicit = owner.is_some_and(|o| o.kind() == "interface_declaration");

    Ok(Some(
        ElementDraft::new(name, if constant || implicit { "constant" } else { "field" })
            .signature(common::collapse_ws(ctx.node_text()).trim_end_matches(';').to_string())
            .returns(ctx.field_text("type"))
            .visibility(member_visibility(&words, owner))
            .tag_if(words.contains(&"static") || implicit, tags::STATIC)
            .tag_if(words.contains(&"final") || implicit, tags::FINAL)
            .tag_if(constant || implicit, tags::CONST)
            .parent(parent),
    ))
}

fn enum_constant(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("enum constant without a name"))?;
    let parent = owner_type(ctx.node())
        .and_then(|o| o.child_by_field_name("name"))
        .map(|n| ctx.text(n));
    Ok(Some(
        ElementDraft::new(name, "enum_constant")
            .signature(common::collapse_ws(ctx.node_text()))
            .visibility(Visibility::Public)
            .tag(tags::STATIC)
            .tag(tags::CONST)
            .parent(parent),
    ))
}

fn import(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let path = common::child_of_kind(node, &["scoped_identifier", "identifier"])
        .map(|p| ctx.text(p))
        .ok_or_else(|| anyhow::anyhow!("import without a path"))?;
    let wildcard = common::has_child_kind(node, "asterisk");
    let name = if wildcard {
        format!("{}.*", path)
    } else {
        path.to_string()
    };
    Ok(Some(
        ElementDraft::new(name, "import")
            .signature(common::collapse_ws(ctx.node_text()).trim_end_matches(';').to_string())
            .visibility(Visibility::Public)
            .tag_if(wildcard, tags::WILDCARD)
            .tag_if(common::has_child_kind(node, "static"), tags::STATIC),
    ))
}
