//! C# plugin.

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
        key: "properties",
        description: "Property declarations",
        source: "(property_declaration name: (identifier) @name) @property",
    },
    NamedQuery {
        key: "namespaces",
        description: "Namespace declarations",
        source: "[(namespace_declaration name: (_) @name) (file_scoped_namespace_declaration name: (_) @name)] @namespace",
    },
    NamedQuery {
        key: "imports",
        description: "Using directives",
        source: "(using_directive) @import",
    },
    NamedQuery {
        key: "attributes",
        description: "Attributes",
        source: "(attribute name: (_) @name) @attribute",
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
        "foreach_statement",
        "while_statement",
        "do_statement",
        "switch_section",
        "catch_clause",
        "conditional_expression",
    ],
    operators: &[
        ("binary_expression", "&&"),
        ("binary_expression", "||"),
        ("binary_expression", "??"),
    ],
    scopes: &["lambda_expression", "anonymous_method_expression"],
};

const TYPE_KINDS: &[&str] = &[
    "class_declaration",
    "struct_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
];
const NAMESPACE_KINDS: &[&str] = &["namespace_declaration", "file_scoped_namespace_declaration"];
const MODIFIERS: &[&str] = &["modifier", "modifiers"];

pub struct CSharp;

impl LanguageProvider for CSharp {
    fn id(&self) -> &'static str {
        "csharp"
    }

    fn grammar(&self) -> Language {
        tree_sitter_c_sharp::LANGUAGE.into()
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["cs"]
    }

    fn sniff_keywords(&self) -> &'static [&'static str] {
        &["using", "namespace", "public", "class", "void", "var", "get", "set", "async", "await"]
    }

    fn handlers(&self) -> HandlerRegistry {
        HandlerRegistry::new()
            .on(
                ElementCategory::Function,
                &[
                    "method_declaration",
                    "constructor_declaration",
                    "destructor_declaration",
                    "local_function_statement",
                ],
                method,
            )
            .on(ElementCategory::Class, TYPE_KINDS, type_declaration)
            .on(ElementCategory::Class, NAMESPACE_KINDS, namespace)
            .on_leaf(ElementCategory::Field, &["field_declaration"], field)
            .on_leaf(ElementCategory::Field, &["property_declaration"], property)
            .on_leaf(ElementCategory::Field, &["enum_member_declaration"], enum_member)
            .on_leaf(ElementCategory::Import, &["using_directive"], using)
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
        &["["]
    }
}

fn owner(node: Node<'_>) -> Option<Node<'_>> {
    common::enclosing(node, TYPE_KINDS, &["local_function_statement", "lambda_expression"])
}

fn owner_name(ctx: &HandlerContext<'_, '_>, owner: Option<Node<'_>>) -> Option<String> {
    owner
        .and_then(|o| o.child_by_field_name("name"))
        .map(|n| ctx.text(n).to_string())
}

/// Members default to private, interface members to public and top-level
/// types to internal.
fn member_visibility(words: &[&str], owner: Option<Node<'_>>) -> Visibility {
    let default = match owner.map(|o| o.kind()) {
        Some("interface_declaration") => Visibility::Public,
        Some(_) => Visibility::Private,
        None => Visibility::Internal,
    };
    // `protected internal` and `private protected` read as their first word
    common::visibility_from(words, default)
}

fn method(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("method without a name"))?;
    let words = common::modifier_words(ctx, MODIFIERS);
    let local = node.kind() == "local_function_statement";
    let owner = if local { None } else { owner(node) };
    let kind = match node.kind() {
        "constructor_declaration" => "constructor",
        "destructor_declaration" => "destructor",
        "local_function_statement" => "local_function",
        _ => "method",
    };
    let in_interface = owner.is_some_and(|o| o.kind() == "interface_declaration");
    let bodyless = ctx.field("body").is_none()
        && !common::has_child_kind(node, "arrow_expression_clause");

    Ok(Some(
        ElementDraft::new(name, kind)
            .signature(header(ctx, ctx.field("body")).trim_end_matches(';').to_string())
            .parameters(child_texts(ctx, ctx.field("parameters"), &[]))
            .returns(ctx.field_text("returns").or_else(|| ctx.field_text("type")))
            .visibility(if local {
                Visibility::Private
            } else {
                member_visibility(&words, owner)
            })
            .tag_if(owner.is_some(), tags::METHOD)
            .tag_if(kind == "constructor", tags::CONSTRUCTOR)
            .tag_if(kind == "destructor", tags::DESTRUCTOR)
            .tag_if(words.contains(&"static"), tags::STATIC)
            .tag_if(words.contains(&"async"), tags::ASYNC)
            .tag_if(words.contains(&"virtual"), tags::VIRTUAL)
            .tag_if(words.contains(&"override"), "override")
            .tag_if(words.contains(&"abstract") || (in_interface && bodyless), tags::ABSTRACT)
            .tag_if(words.contains(&"sealed"), tags::FINAL)
            .parent(owner_name(ctx, owner)),
    ))
}

fn type_declaration(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("type without a name"))?;
    let words = common::modifier_words(ctx, MODIFIERS);
    let kind = node.kind().trim_end_matches("_declaration");
    let owner = owner(node);
    let parent = owner_name(ctx, owner)
        .or_else(|| common::enclosing_name(ctx, NAMESPACE_KINDS, &[]));
    let bases = common::child_of_kind(node, &["base_list"])
        .map(|b| child_texts(ctx, Some(b), &[]))
        .unwrap_or_default();

    Ok(Some(
        ElementDraft::new(name, kind)
            .signature(header(ctx, ctx.field("body")))
            .parameters(bases)
            .visibility(member_visibility(&words, owner))
            .tag_if(words.contains(&"static"), tags::STATIC)
            .tag_if(words.contains(&"abstract") || kind == "interface", tags::ABSTRACT)
            .tag_if(words.contains(&"sealed"), tags::FINAL)
            .tag_if(words.contains(&"partial"), "partial")
            .parent(parent),
    ))
}

fn namespace(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("namespace without a name"))?;
    let signature = match ctx.field("body") {
        Some(body) => header(ctx, Some(body)),
        None => common::collapse_ws(ctx.node_text().lines().next().unwrap_or_default())
            .trim_end_matches(';')
            .to_string(),
    };
    Ok(Some(
        ElementDraft::new(name, "namespace")
            .signature(signature)
            .visibility(Visibility::Public)
            .parent(common::enclosing_name(ctx, NAMESPACE_KINDS, &[])),
    ))
}

fn field(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let declaration = common::child_of_kind(node, &["variable_declaration"])
        .ok_or_else(|| anyhow::anyhow!("field without a declaration"))?;
    let declarator = common::child_of_kind(declaration, &["variable_declarator"])
        .ok_or_else(|| anyhow::anyhow!("field without a declarator"))?;
    let name = declarator
        .child_by_field_name("name")
        .or_else(|| common::child_of_kind(declarator, &["identifier"]))
        .map(|n| ctx.text(n))
        .ok_or_else(|| anyhow::anyhow!("field without a name"))?;
    let words = common::modifier_words(ctx, MODIFIERS);
    let owner = owner(node);
    let constant = words.contains(&"const");

    Ok(Some(
        ElementDraft::new(name, if constant { "constant" } else { "field" })
            .signature(common::collapse_ws(ctx.node_text()).trim_end_matches(';').to_string())
            .returns(declaration.child_by_field_name("type").map(|t| ctx.text(t)))
            .visibility(member_visibility(&words, owner))
            .tag_if(words.contains(&"static") || constant, tags::STATIC)
            .tag_if(constant, tags::CONST)
            .tag_if(words.contains(&"readonly"), "readonly")
            .parent(owner_name(ctx, owner)),
    ))
}

fn property(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("property without a name"))?;
    let words = common::modifier_words(ctx, MODIFIERS);
    let owner = owner(node);
    let accessors = ctx.field("accessors");
    Ok(Some(
        ElementDraft::new(name, "property")
            .signature(header(ctx, accessors))
            .returns(ctx.field_text("type"))
            .visibility(member_visibility(&words, owner))
            .tag(tags::PROPERTY)
            .tag_if(words.contains(&"static"), tags::STATIC)
            .tag_if(words.contains(&"virtual"), tags::VIRTUAL)
            .tag_if(words.contains(&"override"), "override")
            .tag_if(words.contains(&"abstract"), tags::ABSTRACT)
            .parent(owner_name(ctx, owner)),
    ))
}

fn enum_member(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("enum member without a name"))?;
    let owner = owner(ctx.node());
    Ok(Some(
        ElementDraft::new(name, "enum_member")
            .signature(common::collapse_ws(ctx.node_text()))
            .visibility(Visibility::Public)
            .tag(tags::STATIC)
            .tag(tags::CONST)
            .parent(owner_name(ctx, owner)),
    ))
}

fn using(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let text = common::collapse_ws(ctx.node_text());
    let body = text
        .trim_start_matches("global ")
        .trim_start_matches("using")
        .trim_end_matches(';')
        .trim();
    let static_ = body.starts_with("static ");
    let body = body.trim_start_matches("static ").trim();
    let (name, alias) = match body.split_once('=') {
        Some((alias, target)) => (target.trim().to_string(), Some(alias.trim())),
        None => (body.to_string(), None),
    };
    Ok(Some(
        ElementDraft::new(name, "using")
            .signature(text.trim_end_matches(';').to_string())
            .visibility(Visibility::Public)
            .tag_if(static_, tags::STATIC)
            .tag_if(alias.is_some(), "alias")
            .tag_if(common::has_child_kind(node, "global"), "global"),
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
        let plugin = LanguagePlugin::build(&CSharp).unwrap();
        let unit = Arc::new(SourceUnit::new("Store.cs", source, "csharp"));
        let parsed = plugin.parse(unit).unwrap();
        let out = extract(&parsed, &plugin, category, DEFAULT_MAX_DOC_LINES);
        assert!(out.errors.is_empty(), "Unexpected errors: {:?}", out.errors);
        out.elements
    }

    const SOURCE: &str = r#"using System;
using System.Collections.Generic;

namespace Demo
{
    /// <summary>Stores items.</summary>
    public class Store
    {
        private readonly List<string> items = new List<string>();
        public int Count { get; set; }

        public Store() { }

        public static bool Add(string item, int limit)
        {
            if (item == null || limit <= 0)
            {
                return false;
            }
            foreach (var c in item) { }
            return true;
        }
    }

    interface IStore
    {
        bool Add(string item, int limit);
    }
}
"#;

    #[test]
    fn test_csharp_methods() {
        let methods = run(SOURCE, ElementCategory::Function);
        let names: Vec<(&str, &str)> = methods.iter().map(|m| (m.name.as_str(), m.kind.as_str())).collect();
        assert_eq!(
            names,
            vec![("Store", "constructor"), ("Add", "method"), ("Add", "method")]
        );

        let add = &methods[1];
        assert!(add.is_static());
        assert_eq!(add.visibility, Visibility::Public);
        assert_eq!(add.parameters, vec!["string item", "int limit"]);
        assert_eq!(add.return_type.as_deref(), Some("bool"));
        assert_eq!(add.complexity, Some(4));

        assert_eq!(methods[2].parent.as_deref(), Some("IStore"));
        assert_eq!(methods[2].visibility, Visibility::Public);
        assert!(methods[2].has_tag(tags::ABSTRACT));
    }

    #[test]
    fn test_csharp_types_and_members() {
        let types = run(SOURCE, ElementCategory::Class);
        let names: Vec<(&str, &str)> = types.iter().map(|t| (t.name.as_str(), t.kind.as_str())).collect();
        assert_eq!(
            names,
            vec![("Demo", "namespace"), ("Store", "class"), ("IStore", "interface")]
        );
        assert_eq!(types[1].parent.as_deref(), Some("Demo"));
        assert_eq!(types[1].doc.as_deref(), Some("<summary>Stores items.</summary>"));
        assert_eq!(types[2].visibility, Visibility::Internal);

        let fields = run(SOURCE, ElementCategory::Field);
        let names: Vec<(&str, &str)> = fields.iter().map(|f| (f.name.as_str(), f.kind.as_str())).collect();
        assert_eq!(names, vec![("items", "field"), ("Count", "property")]);
        assert_eq!(fields[0].visibility, Visibility::Private);
        assert!(fields[0].has_tag("readonly"));
        assert_eq!(fields[1].return_type.as_deref(), Some("int"));
    }

    #[test]
    fn test_csharp_usings() {
        let imports = run(SOURCE, ElementCategory::Import);
        let names: Vec<&str> = imports.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["System", "System.Collections.Generic"]);
    }
}
