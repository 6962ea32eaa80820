//! Bash plugin. Shell has no types or fields; those categories stay empty.

use tree_sitter::Language;

use super::common::{self, header};
use crate::elements::{tags, ElementCategory, Visibility};
use crate::plugin::{
    DecisionSet, ElementDraft, HandlerContext, HandlerRegistry, LanguageProvider, NamedQuery,
};

const QUERIES: &[NamedQuery] = &[
    NamedQuery {
        key: "functions",
        description: "Function definitions",
        source: "(function_definition name: (word) @name) @function",
    },
    NamedQuery {
        key: "variables",
        description: "Variable assignments",
        source: "(variable_assignment name: (variable_name) @name) @assignment",
    },
    NamedQuery {
        key: "commands",
        description: "Command invocations",
        source: "(command name: (command_name) @name) @command",
    },
    NamedQuery {
        key: "sources",
        description: "source and dot includes",
        source: r#"
((command name: (command_name) @name argument: (_) @path) @source
 (#any-of? @name "source" "."))
"#,
    },
    NamedQuery {
        key: "pipelines",
        description: "Pipelines",
        source: "(pipeline) @pipeline",
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
        "c_style_for_statement",
        "while_statement",
        "case_item",
        "ternary_expression",
    ],
    operators: &[("list", "&&"), ("list", "||")],
    scopes: &[],
};

pub struct Bash;

impl LanguageProvider for Bash {
    fn id(&self) -> &'static str {
        "bash"
    }

    fn grammar(&self) -> Language {
        tree_sitter_bash::LANGUAGE.into()
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["sh", "bash", "zsh"]
    }

    fn file_names(&self) -> &'static [&'static str] {
        &[".bashrc", ".bash_profile", ".profile", ".zshrc"]
    }

    fn interpreters(&self) -> &'static [&'static str] {
        &["bash", "sh", "zsh", "dash"]
    }

    fn sniff_keywords(&self) -> &'static [&'static str] {
        &["fi", "then", "esac", "done", "echo", "export", "local", "elif", "$1", "#!/bin/bash"]
    }

    fn handlers(&self) -> HandlerRegistry {
        HandlerRegistry::new()
            .on(ElementCategory::Function, &["function_definition"], function)
            .on_leaf(ElementCategory::Variable, &["variable_assignment"], assignment)
            .on_leaf(ElementCategory::Variable, &["declaration_command"], declaration)
            .on_leaf(ElementCategory::Import, &["command"], source)
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

fn function(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("function without a name"))?;
    Ok(Some(
        ElementDraft::new(name, "function")
            .signature(header(ctx, ctx.field("body")))
            .visibility(Visibility::Public)
            .tag_if(ctx.node_text().starts_with("function"), "keyword"),
    ))
}

fn top_level(ctx: &HandlerContext<'_, '_>) -> bool {
    ctx.node().parent().is_some_and(|p| p.kind() == "program")
}

fn assignment(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    if !top_level(ctx) {
        return Ok(None);
    }
    let name = ctx
        .field_text("name")
        .ok_or_else(|| anyhow::anyhow!("assignment without a name"))?;
    Ok(Some(
        ElementDraft::new(name, "variable")
            .signature(common::collapse_ws(ctx.node_text()))
            .visibility(Visibility::Public)
            .tag_if(ctx.field("value").is_some_and(|v| v.kind() == "array"), "array"),
    ))
}

/// `export`, `readonly`, `declare` and friends at file scope.
fn declaration(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    if !top_level(ctx) {
        return Ok(None);
    }
    let node = ctx.node();
    let Some(keyword) = node.child(0).map(|k| ctx.text(k)) else {
        return Ok(None);
    };
    let Some(target) =
        common::child_of_kind(node, &["variable_assignment", "variable_name", "word"])
    else {
        return Ok(None);
    };
    let name = match target.kind() {
        "variable_assignment" => target
            .child_by_field_name("name")
            .map_or_else(|| ctx.text(target), |n| ctx.text(n)),
        _ => ctx.text(target),
    };
    let words = ctx.node_text().split_whitespace().collect::<Vec<_>>();
    let readonly = keyword == "readonly" || words.contains(&"-r");
    Ok(Some(
        ElementDraft::new(name, if readonly { "constant" } else { "variable" })
            .signature(common::collapse_ws(ctx.node_text()))
            .visibility(if keyword == "local" {
                Visibility::Private
            } else {
                Visibility::Public
            })
            .tag_if(readonly, tags::CONST)
            .tag_if(keyword == "export" || words.contains(&"-x"), tags::EXPORTED),
    ))
}

fn source(ctx: &mut HandlerContext<'_, '_>) -> anyhow::Result<Option<ElementDraft>> {
    let Some(command) = ctx.field_text("name") else {
        return Ok(None);
    };
    if !matches!(command, "source" | ".") {
        return Ok(None);
    }
    let Some(path) = ctx.field("argument") else {
        return Ok(None);
    };
    let name = common::unquote(ctx.text(path));
    Ok(Some(
        ElementDraft::new(name, "source")
            .signature(common::collapse_ws(ctx.node_text()))
            .visibility(Visibility::Public)
            .tag_if(name.starts_with('.'), tags::RELATIVE),
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
        let plugin = LanguagePlugin::build(&Bash).unwrap();
        let unit = Arc::new(SourceUnit::new("deploy.sh", source, "bash"));
        let parsed = plugin.parse(unit).unwrap();
        let out = extract(&parsed, &plugin, category, DEFAULT_MAX_DOC_LINES);
        assert!(out.errors.is_empty(), "Unexpected errors: {:?}", out.errors);
        out.elements
    }

    const SOURCE: &str = r#"#!/usr/bin/env bash
source ./lib.sh
. "$HOME/.env"

readonly VERSION=1.2
COUNT=0

# Prints a greeting.
greet() {
  local name="$1"
  if [ -n "$name" ] && [ "$name" != "x" ]; then
    echo "hi $name"
  fi
}

function cleanup {
  for f in *.tmp; do
    rm "$f"
  done
}
"#;

    #[test]
    fn test_bash_functions() {
        let functions = run(SOURCE, ElementCategory::Function);
        let names: Vec<&str> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["greet", "cleanup"]);
        assert_eq!(functions[0].complexity, Some(3));
        assert_eq!(functions[0].doc.as_deref(), Some("Prints a greeting."));
        assert_eq!(functions[1].complexity, Some(2));
        assert!(functions[1].has_tag("keyword"));
    }

    #[test]
    fn test_bash_variables() {
        let vars = run(SOURCE, ElementCategory::Variable);
        let names: Vec<(&str, &str)> = vars.iter().map(|v| (v.name.as_str(), v.kind.as_str())).collect();
        assert_eq!(names, vec![("VERSION", "constant"), ("COUNT", "variable")]);
    }

    #[test]
    fn test_bash_sources() {
        let imports = run(SOURCE, ElementCategory::Import);
        let names: Vec<&str> = imports.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["./lib.sh", "$HOME/.env"]);
        assert!(imports[0].has_tag(tags::RELATIVE));
    }

    #[test]
    fn test_bash_has_no_types() {
        assert!(run(SOURCE, ElementCategory::Class).is_empty());
        assert!(run(SOURCE, ElementCategory::Field).is_empty());
    }
}
