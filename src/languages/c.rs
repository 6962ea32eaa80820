//! C plugin. The declarator helpers are shared with the C++ plugin.

use tree_sitter::{Language, Node};

use super::common::{self, header};
use crate::elements::{tags, ElementCategory, Visibility};
use crate::plugin::{
    DecisionSet, ElementDraft, HandlerContext, HandlerRegistry, LanguageProvider, NamedQuery,
};

const QUERIES: &[NamedQuery] = &[
    NamedQuery {
        key: "functions",
        description: "Function definitions",
        source: r#"
(function_definition
  declarator: [(function_declarator declarator: (_) @name)
               (pointer_declarator declarator: (function_declarator declarator: (_) @name))]) @function
"#,
    },
    NamedQuery {
        key: "prototypes",
        description: "Function prototypes",
        source: "(declaration declarator: (function_declarator declarator: (identifier) @name)) @prototype",
    },
    NamedQuery {
        key: "structs",
        description: "Struct definitions",
        source: "(struct_specifier name: (type_identifier) @name body: (field_declaration_list)) @struct",
    },
    NamedQuery {
        key: "enums",
        description: "Enum definitions",
        source: "(enum_specifier name: (type_identifier) @name body: (enumerator_list)) @enum",
    },
    NamedQuery {
        key: "typedefs",
        description: "Type definitions",
        source: "(type_definition declarator: (type_identifier) @name) @typedef",
    },
    NamedQuery {
        key: "includes",
        description: "Include directives",
        source: "(preproc_include path: (_) @path) @include",
    },
    NamedQuery {
        key: "macros",
        description: "Macro definitions",
        source: "[(preproc_def name: (identifier) @name) (preproc_function_def name: (identifier) @name)] @macro",
    },
    NamedQuery {
        key: "calls",
        description: "Function calls",
        source: "(call_expression function: (identifier) @name) @call",
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
        "while_statement",
        "do_statement",
        "case_statement",
        "conditional_expression",
    ],
    operators: &[("binary_expression", "&&"), ("binary_expression", "||")],
    scopes: &[],
};

pub(super) const MARKERS: &[&str] = &["//", "/**", "/*", "*/", "*"];

const NAME_KINDS: &[&str] = &[
    "identifier",
    "field_identifier",
    "type_identifier",
    "qualified_identifier",
    "destructor_name",
    "operator_name",
];

pub struct C;

impl LanguageProvider for C {
    fn id(&self) -> &'static str {
        "c"
    }

    fn grammar(&self) -> Language {
        tree_sitter_c::LANGUAGE.into()
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["c", "h"]
    }

    fn sniff_keywords(&self) -> &'static [&'static str] {
        &["#include", "#define", "struct", "typedef", "malloc", "free", "printf", "sizeof", "void", "NULL"]
    }

    fn handlers(&self) -> HandlerRegistry {
        HandlerRegistry::new()
            .on(ElementCategory::Function, &["function_definition"], function)
            .on_leaf(ElementCategory::Function, &["declaration"], prototype)
            .on(
                ElementCategory::Class,
                &["struct_specifier", "union_specifier", "enum_specifier"],
                record,
            )
            .on_leaf(ElementCategory::Field, &["field_declaration"], field)
            .on_leaf(ElementCategory::Field, &["enumerator"], enumerator)
            .on_leaf(ElementCategory::Variable, &["declaration"], variable)
            .on_leaf(ElementCategory::Import, &["preproc_include"], include)
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
}

/// Follow `declarator` fields down to the declared name.
pub(super) fn declared_name(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = node;
    loop {
        if NAME_KINDS.contains(&current.kind()) {
            return Some(current);
        }
        current = current.child_by_field_name("declarator")?;
    }
}

/// The function declarator inside a (possibly pointer/reference) declarator chain.
pub(super) fn function_declarator(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = node;
    loop {
        if current.kind() == "function_declarator" {
            return Some(current);
        }
        current = current.child_by_field_name("declarator")?;
    }
}

/// Return type text: the `type` field plus any pointer or reference marks
/// between it and the function declarator.
pub(super) fn return_type(ctx: &HandlerContext<'_, '_>, declarator: Node<'_>) -> Option<String> {
    let base = ctx.field_text("type")?;
    let mut marks = String::new();
    let mut current = declarator;
    while current.kind() != "function_declarator" {
        match current.kind() {
            "pointer_declarator" => marks.push('*'),
            "reference_declarator" => marks.push('&'),
            _ => {}
        }
        match current.child_by_field_name("declarator") {
            Some(next) => current = next,
            None => break,
        }
    }
    Some(format!("{}{}", common::collapse_ws(base), marks))
}

/// Parameter texts with the lone `void` of `f(void)` dropped.
pub(super) fn parameters(ctx: &HandlerContext<'_, '_>, declarator: Node<'_>) -> Vec<String> {
    let params = common::child_texts(ctx, declarator.child_by_field_name("parameters"), &[]);
    if params.len() == 1 && params[0] == "void" {
        return Vec::new();
    }
    params
}

/// Storage class words (`static`, `extern`, `inline`) on a declaration.
pub(super) fn storage(ctx: &HandlerContext<'_, '_>) -> Vec<&'static str> {
    let words = common::modifier_words(ctx, &["storage_class_specifier", "type_qualifier"]);
    ["static", "extern", "inline", "const", "volatile"]
        .into_iter()
        .filter(|w| words.contains(w))
        .collect()
}

pub(super) fn linkage(words: &[&str]) -> Visibility {
    if words.contains(&"static") {
        Visibility::Private
    } else {
        Visibility::Public
    }
}

fn function(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let declarator = ctx
        .field("declarator")
        .ok_or_else(|| anyhow::anyhow!("function without a declarator"))?;
    let fd = function_declarator(declarator)
        .ok_or_else(|| anyhow::anyhow!("function without a parameter list"))?;
    let name = declared_name(fd)
        .map(|n| ctx.text(n))
        .ok_or_else(|| anyhow::anyhow!("function without a name"))?;
    let words = storage(ctx);

    Ok(Some(
        ElementDraft::new(name, "function")
            .signature(header(ctx, ctx.field("body")))
            .parameters(parameters(ctx, fd))
            .returns(return_type(ctx, declarator))
            .visibility(linkage(&words))
            .tag_if(words.contains(&"static"), tags::STATIC)
            .tag_if(words.contains(&"inline"), "inline"),
    ))
}

fn prototype(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let Some(declarator) = ctx.field("declarator") else {
        return Ok(None);
    };
    let Some(fd) = function_declarator(declarator) else {
        return Ok(None);
    };
    let Some(name) = declared_name(fd).map(|n| ctx.text(n)) else {
        return Ok(None);
    };
    let words = storage(ctx);

    Ok(Some(
        ElementDraft::new(name, "prototype")
            .signature(common::collapse_ws(ctx.node_text()).trim_end_matches(';').to_string())
            .parameters(parameters(ctx, fd))
            .returns(return_type(ctx, declarator))
            .visibility(linkage(&words))
            .tag_if(words.contains(&"static"), tags::STATIC)
            .tag_if(words.contains(&"extern"), "extern")
            .tag(tags::ABSTRACT),
    ))
}

/// Struct, union or enum with a body. Anonymous records take their name from
/// an enclosing typedef.
pub(super) fn record(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    if ctx.field("body").is_none() {
        return Ok(None);
    }
    let typedef = node.parent().filter(|p| p.kind() == "type_definition");
    let name = record_name(node).map_or("<anonymous>", |n| ctx.text(n));
    let kind = node.kind().trim_end_matches("_specifier");

    Ok(Some(
        ElementDraft::new(name, kind)
            .signature(header(ctx, ctx.field("body")))
            .visibility(Visibility::Public)
            .tag_if(typedef.is_some(), "typedef")
            .parent(enclosing_record(ctx)),
    ))
}

pub(super) fn enclosing_record(ctx: &HandlerContext<'_, '_>) -> Option<String> {
    let record = common::enclosing(
        ctx.node(),
        &["struct_specifier", "union_specifier", "class_specifier", "enum_specifier"],
        &["function_definition"],
    )?;
    record_name(record).map(|n| ctx.text(n).to_string())
}

/// A record's own name, or the typedef name of an anonymous one.
pub(super) fn record_name(record: Node<'_>) -> Option<Node<'_>> {
    record.child_by_field_name("name").or_else(|| {
        record
            .parent()
            .filter(|p| p.kind() == "type_definition")
            .and_then(|t| t.child_by_field_name("declarator"))
            .and_then(declared_name)
    })
}

pub(super) fn field(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let Some(declarator) = ctx.field("declarator") else {
        // Anonymous nested struct or union member
        return Ok(None);
    };
    let name = declared_name(declarator)
        .map(|n| ctx.text(n))
        .ok_or_else(|| anyhow::anyhow!("field without a name"))?;
    let ty = ctx.field_text("type").map(common::collapse_ws);
    let bitfield = common::has_child_kind(node, "bitfield_clause");

    Ok(Some(
        ElementDraft::new(name, "field")
            .signature(common::collapse_ws(ctx.node_text()).trim_end_matches(';').to_string())
            .returns(ty)
            .visibility(Visibility::Public)
            .tag_if(bitfield, "bitfield")
            .tag_if(declarator.kind() == "pointer_declarator", "pointer")
            .tag_if(declarator.kind() == "array_declarator", "array")
            .parent(enclosing_record(ctx)),
    ))
}

pub(super) fn enumerator(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("enumerator without a name"))?;
    let parent = enclosing_record(ctx);
    Ok(Some(
        ElementDraft::new(name, "enum_constant")
            .signature(common::collapse_ws(ctx.node_text()))
            .visibility(Visibility::Public)
            .tag(tags::CONST)
            .parent(parent),
    ))
}

/// File-scope object declarations. Prototypes are functions, not variables.
pub(super) fn variable(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let top_level = node
        .parent()
        .is_some_and(|p| matches!(p.kind(), "translation_unit" | "linkage_specification" | "declaration_list"));
    if !top_level {
        return Ok(None);
    }
    let Some(declarator) = ctx.field("declarator") else {
        return Ok(None);
    };
    if function_declarator(declarator).is_some() {
        return Ok(None);
    }
    let name = declared_name(declarator)
        .map(|n| ctx.text(n))
        .ok_or_else(|| anyhow::anyhow!("declaration without a name"))?;
    let words = storage(ctx);
    let constant = words.contains(&"const");

    Ok(Some(
        ElementDraft::new(name, if constant { "constant" } else { "variable" })
            .signature(common::collapse_ws(ctx.node_text()).trim_end_matches(';').to_string())
            .returns(ctx.field_text("type").map(common::collapse_ws))
            .visibility(linkage(&words))
            .tag_if(words.contains(&"static"), tags::STATIC)
            .tag_if(words.contains(&"extern"), "extern")
            .tag_if(constant, tags::CONST),
    ))
}

pub(super) fn include(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let path = ctx
        .field("path")
        .ok_or_else(|| anyhow::anyhow!("include without a path"))?;
    let system = path.kind() == "system_lib_string";
    let text = ctx.text(path);
    let name = text.trim_matches(|c| c == '"' || c == '<' || c == '>');
    Ok(Some(
        ElementDraft::new(name, "include")
            .signature(common::collapse_ws(ctx.node_text()))
            .visibility(Visibility::Public)
            .tag_if(system, "system")
            .tag_if(!system, tags::RELATIVE),
    ))
}
