//! Helpers shared by the language handlers.

use tree_sitter::Node;

use crate::elements::Visibility;
use crate::plugin::HandlerContext;

/// Collapse runs of whitespace into single spaces.
pub fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Declaration header: the node's text up to where `body` starts, on one line.
/// Without a body the whole node text is used.
pub fn header(ctx: &HandlerContext<'_, '_>, body: Option<Node<'_>>) -> String {
    let node = ctx.node();
    let end = body.map_or(node.end_byte(), |b| b.start_byte());
    let text = ctx.unit().slice(node.start_byte()..end);
    collapse_ws(text)
        .trim_end_matches(|c: char| c == '{' || c == ':' || c == '=' || c.is_whitespace())
        .to_string()
}

/// Texts of the named children of `node`, skipping comments and `skip` kinds.
pub fn child_texts(ctx: &HandlerContext<'_, '_>, node: Option<Node<'_>>, skip: &[&str]) -> Vec<String> {
    let Some(node) = node else {
        return Vec::new();
    };
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|c| c.kind() != "comment" && !skip.contains(&c.kind()))
        .map(|c| collapse_ws(ctx.text(c)))
        .collect()
}

/// Nearest ancestor whose kind is in `containers`, unless an ancestor in
/// `stops` comes first.
pub fn enclosing<'t>(node: Node<'t>, containers: &[&str], stops: &[&str]) -> Option<Node<'t>> {
    let mut current = node.parent();
    while let Some(n) = current {
        if containers.contains(&n.kind()) {
            return Some(n);
        }
        if stops.contains(&n.kind()) {
            return None;
        }
        current = n.parent();
    }
    None
}

/// Name of the enclosing container, read from its `name` field.
pub fn enclosing_name(
    ctx: &HandlerContext<'_, '_>,
    containers: &[&str],
    stops: &[&str],
) -> Option<String> {
    let container = enclosing(ctx.node(), containers, stops)?;
    container
        .child_by_field_name("name")
        .map(|n| ctx.text(n).to_string())
}

/// Whether `node` has a direct child (named or anonymous) of this kind.
pub fn has_child_kind(node: Node<'_>, kind: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == kind);
    found
}

/// First direct child of one of these kinds.
pub fn child_of_kind<'t>(node: Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|c| kinds.contains(&c.kind()));
    found
}

/// Words of the modifier list attached to the matched node, e.g.
/// `["public", "static"]`. Modifier children are looked up by kind.
pub fn modifier_words<'a>(ctx: &HandlerContext<'a, '_>, kinds: &[&str]) -> Vec<&'a str> {
    let node = ctx.node();
    let mut cursor = node.walk();
    let mods: Vec<Node<'_>> = node
        .children(&mut cursor)
        .filter(|c| kinds.contains(&c.kind()))
        .collect();
    mods.into_iter()
        .flat_map(|m| ctx.text(m).split(|c: char| !c.is_alphanumeric() && c != '_'))
        .filter(|w| !w.is_empty())
        .collect()
}

/// Visibility from modifier words; `default` when none is present.
pub fn visibility_from(words: &[&str], default: Visibility) -> Visibility {
    for word in words {
        match *word {
            "public" | "open" => return Visibility::Public,
            "protected" => return Visibility::Protected,
            "private" | "fileprivate" => return Visibility::Private,
            "internal" => return Visibility::Internal,
            _ => {}
        }
    }
    default
}

/// `MAX_SIZE`-style names.
pub fn is_constant_name(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_uppercase())
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Strip one layer of matching quotes (including triple quotes).
pub fn unquote(text: &str) -> &str {
    for quote in ["\"\"\"", "'''", "\"", "'", "`"] {
        if text.len() >= 2 * quote.len() && text.starts_with(quote) && text.ends_with(quote) {
            return &text[quote.len()..text.len() - quote.len()];
        }
    }
    text
}

/// Trim each line and drop leading and trailing blank lines.
pub fn clean_doc(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let start = lines.iter().position(|l| !l.is_empty())?;
    let end = lines.iter().rposition(|l| !l.is_empty())?;
    Some(lines[start..=end].join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_ws() {
        assert_eq!(collapse_ws("fn  a(\n    x: i32,\n)"), "fn a( x: i32, )");
    }

    #[test]
    fn test_constant_names() {
        assert!(is_constant_name("MAX_SIZE"));
        assert!(is_constant_name("V2"));
        assert!(!is_constant_name("max_size"));
        assert!(!is_constant_name("_"));
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"\"\"Doc.\"\"\""), "Doc.");
        assert_eq!(unquote("'x'"), "x");
        assert_eq!(unquote("os"), "os");
    }

    #[test]
    fn test_clean_doc() {
        assert_eq!(clean_doc("\n   Adds.\n   More.\n  ").as_deref(), Some("Adds.\nMore."));
        assert_eq!(clean_doc("   \n"), None);
    }

    #[test]
    fn test_visibility_from_words() {
        assert_eq!(visibility_from(&["static", "private"], Visibility::Package), Visibility::Private);
        assert_eq!(visibility_from(&["static"], Visibility::Package), Visibility::Package);
    }
}
