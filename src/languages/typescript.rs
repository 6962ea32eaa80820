//! TypeScript and TSX plugins.

use tree_sitter::Language;

use super::common::{self, child_texts, header};
use super::javascript::{self, member_visibility, owner_class, type_annotation};
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
        description: "Class declarations, abstract included",
        source: r#"
[(class_declaration name: (type_identifier) @name)
 (abstract_class_declaration name: (type_identifier) @name)] @class
"#,
    },
    NamedQuery {
        key: "interfaces",
        description: "Interface declarations",
        source: "(interface_declaration name: (type_identifier) @name) @interface",
    },
    NamedQuery {
        key: "enums",
        description: "Enum declarations",
        source: "(enum_declaration name: (identifier) @name) @enum",
    },
    NamedQuery {
        key: "types",
        description: "Type aliases",
        source: "(type_alias_declaration name: (type_identifier) @name) @type",
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
        key: "decorators",
        description: "Decorators",
        source: "(decorator) @decorator",
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

const TSX_QUERIES: &[NamedQuery] = &[
    NamedQuery {
        key: "jsx_elements",
        description: "JSX elements",
        source: "[(jsx_element) (jsx_self_closing_element)] @jsx",
    },
    NamedQuery {
        key: "components",
        description: "Function components returning JSX",
        source: r#"
(function_declaration
  name: (identifier) @name
  body: (statement_block (return_statement [(jsx_element) (jsx_self_closing_element) (parenthesized_expression)]))) @component
"#,
    },
];

/// TypeScript, or TSX when `tsx` is set.
pub struct TypeScript {
    pub tsx: bool,
}

/// Both query libraries, built once.
static TSX_LIBRARY: once_cell::sync::Lazy<Vec<NamedQuery>> =
    once_cell::sync::Lazy::new(|| QUERIES.iter().chain(TSX_QUERIES).copied().collect());

impl LanguageProvider for TypeScript {
    fn id(&self) -> &'static str {
        if self.tsx {
            "tsx"
        } else {
            "typescript"
        }
    }

    fn grammar(&self) -> Language {
        if self.tsx {
            tree_sitter_typescript::LANGUAGE_TSX.into()
        } else {
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
        }
    }

    fn extensions(&self) -> &'static [&'static str] {
        if self.tsx {
            &["tsx"]
        } else {
            &["ts", "mts", "cts"]
        }
    }

    fn interpreters(&self) -> &'static [&'static str] {
        if self.tsx {
            &[]
        } else {
            &["ts-node", "tsx"]
        }
    }

    fn sniff_keywords(&self) -> &'static [&'static str] {
        &["interface", "type", "readonly", "implements", "enum", "namespace", "unknown", "never", "keyof", "as"]
    }

    fn handlers(&self) -> HandlerRegistry {
        javascript::handlers()
            .on(ElementCategory::Function, &["function_signature"], signature)
            .on_leaf(
                ElementCategory::Function,
                &["method_signature", "abstract_method_signature"],
                signature,
            )
            .on(
                ElementCategory::Class,
                &["abstract_class_declaration"],
                javascript::class,
            )
            .on(
                ElementCategory::Class,
                &["interface_declaration", "enum_declaration", "type_alias_declaration"],
                declared_type,
            )
            .on_leaf(ElementCategory::Field, &["public_field_definition"], javascript::field)
            .on_leaf(ElementCategory::Field, &["property_signature"], property_signature)
    }

    fn decisions(&self) -> DecisionSet {
        javascript::DECISIONS
    }

    fn queries(&self) -> &'static [NamedQuery] {
        if self.tsx {
            TSX_LIBRARY.as_slice()
        } else {
            QUERIES
        }
    }

    fn comment_markers(&self) -> &'static [&'static str] {
        javascript::MARKERS
    }

    fn annotation_prefixes(&self) -> &'static [&'static str] {
        &["@"]
    }
}

/// Bodiless declarations: overloads, interface and abstract methods.
fn signature(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let name_node = ctx
        .field("name")
        .ok_or_else(|| anyhow::anyhow!("signature without a name"))?;
    let name = ctx.text(name_node);
    let (kind, parent) = match node.kind() {
        "function_signature" => ("function", None),
        _ => {
            let owner = common::enclosing(node, &["interface_declaration"], &[])
                .and_then(|i| i.child_by_field_name("name"))
                .map(|n| ctx.text(n).to_string())
                .or_else(|| owner_class(ctx));
            ("method", owner)
        }
    };
    Ok(Some(
        ElementDraft::new(name, kind)
            .signature(common::collapse_ws(ctx.node_text()).trim_end_matches([';', ',']).to_string())
            .parameters(child_texts(ctx, ctx.field("parameters"), &[]))
            .returns(ctx.field("return_type").map(|t| type_annotation(ctx, t)))
            .visibility(member_visibility(ctx, Some(name_node)))
            .tag(tags::ABSTRACT)
            .tag_if(kind == "method", tags::METHOD)
            .tag_if(node.kind() == "function_signature", "overload")
            .parent(parent),
    ))
}

fn declared_type(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("type declaration without a name"))?;
    let kind = match node.kind() {
        "interface_declaration" => "interface",
        "enum_declaration" => "enum",
        _ => "type_alias",
    };
    let signature = match kind {
        "type_alias" => common::collapse_ws(ctx.node_text()).trim_end_matches(';').to_string(),
        _ => header(ctx, ctx.field("body")),
    };
    Ok(Some(
        ElementDraft::new(name, kind)
            .signature(signature)
            .parameters(child_texts(ctx, ctx.field("type_parameters"), &[]))
            .visibility(Visibility::Public)
            .tag_if(kind == "interface", tags::ABSTRACT)
            .tag_if(common::has_child_kind(node, "const"), tags::CONST)
            .tag_if(javascript::is_exported(node), tags::EXPORTED),
    ))
}

fn property_signature(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("property without a name"))?;
    let parent = common::enclosing(node, &["interface_declaration", "type_alias_declaration"], &[])
        .and_then(|i| i.child_by_field_name("name"))
        .map(|n| ctx.text(n));
    Ok(Some(
        ElementDraft::new(name, "property")
            .signature(common::collapse_ws(ctx.node_text()).trim_end_matches([';', ',']).to_string())
            .returns(ctx.field("type").map(|t| type_annotation(ctx, t)))
            .visibility(Visibility::Public)
            .tag_if(common::has_child_kind(node, "?"), "optional")
            .tag_if(common::has_child_kind(node, "readonly"), "readonly")
            .parent(parent),
    ))
}
