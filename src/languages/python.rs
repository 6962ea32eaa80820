//! Python plugin.

use tree_sitter::{Language, Node};

use super::common::{self, child_texts};
use crate::elements::{tags, ElementCategory, Visibility};
use crate::plugin::{
    DecisionSet, DocExtractor, ElementDraft, HandlerContext, HandlerRegistry, LanguageProvider,
    NamedQuery,
};
use crate::source::SourceUnit;

const QUERIES: &[NamedQuery] = &[
    NamedQuery {
        key: "functions",
        description: "Function and method definitions",
        source: "(function_definition name: (identifier) @name) @function",
    },
    NamedQuery {
        key: "classes",
        description: "Class definitions",
        source: "(class_definition name: (identifier) @name) @class",
    },
    NamedQuery {
        key: "methods",
        description: "Functions defined directly in a class body",
        source: r#"
(class_definition
  body: (block
    [(function_definition name: (identifier) @name) @method
     (decorated_definition definition: (function_definition name: (identifier) @name)) @method]))
"#,
    },
    NamedQuery {
        key: "imports",
        description: "import and from-import statements",
        source: "[(import_statement) (import_from_statement) (future_import_statement)] @import",
    },
    NamedQuery {
        key: "decorators",
        description: "Decorators",
        source: "(decorator) @decorator",
    },
    NamedQuery {
        key: "calls",
        description: "Call expressions",
        source: r#"
(call function: [(identifier) @name (attribute attribute: (identifier) @name)]) @call
"#,
    },
    NamedQuery {
        key: "lambdas",
        description: "Lambda expressions",
        source: "(lambda) @lambda",
    },
    NamedQuery {
        key: "docstrings",
        description: "Docstrings of functions and classes",
        source: r#"
([(function_definition body: (block . (expression_statement (string) @docstring)))
  (class_definition body: (block . (expression_statement (string) @docstring)))])
"#,
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
        "elif_clause",
        "for_statement",
        "while_statement",
        "except_clause",
        "conditional_expression",
        "case_clause",
        "list_comprehension",
        "dictionary_comprehension",
        "set_comprehension",
        "generator_expression",
    ],
    operators: &[("boolean_operator", "and"), ("boolean_operator", "or")],
    scopes: &["lambda"],
};

const CLASS_SCOPES: &[&str] = &["class_definition"];
const FUNCTION_SCOPES: &[&str] = &["function_definition", "lambda"];

pub struct Python;

impl LanguageProvider for Python {
    fn id(&self) -> &'static str {
        "python"
    }

    fn grammar(&self) -> Language {
        tree_sitter_python::LANGUAGE.into()
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["py", "pyw", "pyi"]
    }

    fn interpreters(&self) -> &'static [&'static str] {
        &["python", "pypy"]
    }

    fn sniff_keywords(&self) -> &'static [&'static str] {
        &["def", "elif", "self", "import", "lambda", "None", "True", "False", "__init__", "pass"]
    }

    fn handlers(&self) -> HandlerRegistry {
        HandlerRegistry::new()
            .on(ElementCategory::Function, &["function_definition"], function)
            .on(ElementCategory::Function, &["decorated_definition"], decorated_function)
            .on(ElementCategory::Class, &["class_definition"], class)
            .on(ElementCategory::Class, &["decorated_definition"], decorated_class)
            .on(ElementCategory::Field, &["assignment"], field)
            .on(ElementCategory::Variable, &["assignment"], variable)
            .on_leaf(
                ElementCategory::Import,
                &["import_statement", "import_from_statement", "future_import_statement"],
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
        &["#"]
    }

    fn annotation_prefixes(&self) -> &'static [&'static str] {
        &["@"]
    }

    fn doc_extractor(&self) -> Option<DocExtractor> {
        Some(docstring)
    }
}

/// `_name` is protected by convention, `__name` private, dunders public.
fn visibility_of(name: &str) -> Visibility {
    if name.starts_with("__") && !name.ends_with("__") {
        Visibility::Private
    } else if name.starts_with('_') && !name.starts_with("__") {
        Visibility::Protected
    } else {
        Visibility::Public
    }
}

fn decorator_names<'a>(ctx: &HandlerContext<'a, '_>, decorated: Node<'_>) -> Vec<&'a str> {
    let mut cursor = decorated.walk();
    let decorators: Vec<Node<'_>> = decorated
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "decorator")
        .collect();
    decorators
        .into_iter()
        .map(|d| ctx.text(d).trim_start_matches('@').trim())
        .collect()
}

/// Name of the class a definition is nested in, unless a function intervenes.
fn owner_class(ctx: &HandlerContext<'_, '_>, def: Node<'_>) -> Option<String> {
    common::enclosing(def, CLASS_SCOPES, FUNCTION_SCOPES)
        .and_then(|class| class.child_by_field_name("name"))
        .map(|n| ctx.text(n).to_string())
}

/// Build a function element from a `function_definition` node.
fn function_draft(
    ctx: &HandlerContext<'_, '_>,
    def: Node<'_>,
    decorators: &[&str],
) -> anyhow::Result<ElementDraft> {
    let name = def
        .child_by_field_name("name")
        .map(|n| ctx.text(n))
        .ok_or_else(|| anyhow::anyhow!("function definition without a name"))?;
    let parent = owner_class(ctx, def);

    let mut parameters = child_texts(ctx, def.child_by_field_name("parameters"), &[]);
    if parent.is_some() && parameters.first().is_some_and(|p| p == "self" || p == "cls") {
        parameters.remove(0);
    }

    let body = def.child_by_field_name("body");
    let end = body.map_or(def.end_byte(), |b| b.start_byte());
    let signature = common::collapse_ws(ctx.unit().slice(def.start_byte()..end))
        .trim_end_matches(|c: char| c == ':' || c.is_whitespace())
        .to_string();

    let is_static = decorators.contains(&"staticmethod");
    let kind = match (&parent, name) {
        (Some(_), "__init__") => "constructor",
        (Some(_), _) if decorators.contains(&"property") => "property",
        (Some(_), _) => "method",
        (None, _) => "function",
    };

    let generator = body.is_some_and(contains_yield);

    Ok(ElementDraft::new(name, kind)
        .signature(signature)
        .parameters(parameters)
        .returns(def.child_by_field_name("return_type").map(|n| ctx.text(n)))
        .visibility(visibility_of(name))
        .tag_if(common::has_child_kind(def, "async"), tags::ASYNC)
        .tag_if(is_static, tags::STATIC)
        .tag_if(decorators.contains(&"classmethod"), "classmethod")
        .tag_if(kind == "constructor", tags::CONSTRUCTOR)
        .tag_if(kind == "property", tags::PROPERTY)
        .tag_if(parent.is_some(), tags::METHOD)
        .tag_if(decorators.contains(&"abstractmethod"), tags::ABSTRACT)
        .tag_if(!decorators.is_empty(), tags::DECORATED)
        .tag_if(generator, tags::GENERATOR)
        .parent(parent))
}

/// Whether a function body yields, without looking into nested functions.
fn contains_yield(body: Node<'_>) -> bool {
    let mut cursor = body.walk();
    let mut stack = vec![body];
    while let Some(node) = stack.pop() {
        if node.kind() == "yield" {
            return true;
        }
        if FUNCTION_SCOPES.contains(&node.kind()) || node.kind() == "class_definition" {
            continue;
        }
        stack.extend(node.named_children(&mut cursor).collect::<Vec<_>>());
    }
    false
}

fn function(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    function_draft(ctx, node, &[]).map(Some)
}

fn decorated_function(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let Some(def) = node
        .child_by_field_name("definition")
        .filter(|d| d.kind() == "function_definition")
    else {
        return Ok(None);
    };
    let decorators: Vec<String> = decorator_names(ctx, node)
        .into_iter()
        .map(decorator_base)
        .collect();
    let decorators: Vec<&str> = decorators.iter().map(String::as_str).collect();
    let draft = function_draft(ctx, def, &decorators)?;
    ctx.claim(def);
    Ok(Some(draft))
}

/// `functools.wraps(f)` → `wraps`, `abc.abstractmethod` → `abstractmethod`.
fn decorator_base(decorator: &str) -> String {
    let head = decorator.split('(').next().unwrap_or(decorator);
    head.rsplit('.').next().unwrap_or(head).trim().to_string()
}

fn class_draft(ctx: &HandlerContext<'_, '_>, def: Node<'_>) -> anyhow::Result<ElementDraft> {
    let name = def
        .child_by_field_name("name")
        .map(|n| ctx.text(n))
        .ok_or_else(|| anyhow::anyhow!("class definition without a name"))?;
    let bases = child_texts(ctx, def.child_by_field_name("superclasses"), &[]);
    let body = def.child_by_field_name("body");
    let end = body.map_or(def.end_byte(), |b| b.start_byte());
    let signature = common::collapse_ws(ctx.unit().slice(def.start_byte()..end))
        .trim_end_matches(|c: char| c == ':' || c.is_whitespace())
        .to_string();
    let parent = owner_class(ctx, def);

    Ok(ElementDraft::new(name, "class")
        .signature(signature)
        .visibility(visibility_of(name))
        .tag_if(
            bases.iter().any(|b| b == "ABC" || b.starts_with("metaclass=ABCMeta")),
            tags::ABSTRACT,
        )
        .parent(parent))
}

fn class(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    class_draft(ctx, node).map(Some)
}

fn decorated_class(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let Some(def) = node
        .child_by_field_name("definition")
        .filter(|d| d.kind() == "class_definition")
    else {
        return Ok(None);
    };
    let draft = class_draft(ctx, def)?.tag(tags::DECORATED);
    ctx.claim(def);
    Ok(Some(draft))
}

/// Target name of a simple `name = value` or `name: T = value` statement.
fn assignment_target<'a>(ctx: &HandlerContext<'a, '_>) -> Option<&'a str> {
    let left = ctx.field("left")?;
    (left.kind() == "identifier").then(|| ctx.text(left))
}

/// The node owning the statement containing the matched assignment.
fn statement_owner<'t>(node: Node<'t>) -> Option<Node<'t>> {
    let statement = node.parent().filter(|p| p.kind() == "expression_statement")?;
    let owner = statement.parent()?;
    if owner.kind() == "block" {
        owner.parent()
    } else {
        Some(owner)
    }
}

fn field(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let Some(class) = statement_owner(ctx.node()).filter(|o| o.kind() == "class_definition") else {
        return Ok(None);
    };
    let Some(name) = assignment_target(ctx) else {
        return Ok(None);
    };
    let class_name = class.child_by_field_name("name").map(|n| ctx.text(n));
    let kind = if common::is_constant_name(name) {
        "constant"
    } else {
        "attribute"
    };
    Ok(Some(
        ElementDraft::new(name, kind)
            .signature(common::collapse_ws(ctx.node_text()))
            .returns(ctx.field_text("type"))
            .visibility(visibility_of(name))
            .tag(tags::STATIC)
            .tag_if(kind == "constant", tags::CONST)
            .parent(class_name),
    ))
}

fn variable(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    if statement_owner(ctx.node()).map_or(true, |o| o.kind() != "module") {
        return Ok(None);
    }
    let Some(name) = assignment_target(ctx) else {
        return Ok(None);
    };
    let kind = if common::is_constant_name(name) {
        "constant"
    } else {
        "variable"
    };
    Ok(Some(
        ElementDraft::new(name, kind)
            .signature(common::collapse_ws(ctx.node_text()))
            .returns(ctx.field_text("type"))
            .visibility(visibility_of(name))
            .tag_if(kind == "constant", tags::CONST),
    ))
}

fn import(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let node = ctx.node();
    let (name, kind) = match node.kind() {
        "import_from_statement" => {
            let module = ctx
                .field_text("module_name")
                .ok_or_else(|| anyhow::anyhow!("from-import without module"))?;
            (module, "from_import")
        }
        "future_import_statement" => ("__future__", "from_import"),
        _ => {
            let first = ctx
                .field("name")
                .ok_or_else(|| anyhow::anyhow!("import without a name"))?;
            let target = match first.kind() {
                "aliased_import" => first.child_by_field_name("name").unwrap_or(first),
                _ => first,
            };
            (ctx.text(target), "import")
        }
    };

    let mut cursor = node.walk();
    let names: Vec<Node<'_>> = node.children_by_field_name("name", &mut cursor).collect();
    let imported: Vec<String> = names.into_iter().map(|n| ctx.text(n).to_string()).collect();

    Ok(Some(
        ElementDraft::new(name, kind)
            .signature(common::collapse_ws(ctx.node_text()))
            .parameters(imported)
            .visibility(Visibility::Public)
            .tag_if(common::has_child_kind(node, "wildcard_import"), tags::WILDCARD)
            .tag_if(name.starts_with('.'), tags::RELATIVE),
    ))
}

/// First string statement of a function or class body.
fn docstring(node: Node<'_>, unit: &SourceUnit) -> Option<String> {
    let def = match node.kind() {
        "decorated_definition" => node.child_by_field_name("definition")?,
        "function_definition" | "class_definition" => node,
        _ => return None,
    };
    let body = def.child_by_field_name("body")?;
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = first.named_child(0).filter(|s| s.kind() == "string")?;
    let raw = unit.slice(string.byte_range());
    let raw = raw.trim_start_matches(|c: char| "rRbBuUfF".contains(c));
    common::clean_doc(common::unquote(raw))
}
