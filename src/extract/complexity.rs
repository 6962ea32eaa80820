//! Cyclomatic complexity over a function's own subtree.

use tree_sitter::Node;

use crate::plugin::LanguagePlugin;

/// Cyclomatic complexity of `node`: 1 plus one per decision point.
///
/// Decision points are nodes whose kind is in the plugin's decision set and
/// anonymous operator tokens matching a `(parent kind, operator)` pair. Nested
/// function nodes and the plugin's other scope kinds are not entered unless
/// their id is in `own`, which holds the nodes the element's handler claimed
/// as part of the same element.
pub fn cyclomatic(node: Node<'_>, plugin: &LanguagePlugin, own: &[usize]) -> u32 {
    let decisions = plugin.decisions();
    let mut complexity = 1;

    let mut cursor = node.walk();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        let kind = current.kind();
        if current.id() != node.id()
            && (plugin.is_function_kind(kind) || decisions.scopes.contains(&kind))
            && !own.contains(&current.id())
        {
            continue;
        }

        if current.is_named() {
            if decisions.kinds.contains(&kind) {
                complexity += 1;
            }
        } else if let Some(parent) = current.parent() {
            // Anonymous tokens have their text as kind
            let parent_kind = parent.kind();
            if decisions
                .operators
                .iter()
                .any(|(p, op)| *p == parent_kind && *op == kind)
            {
                complexity += 1;
            }
        }

        let children: Vec<Node<'_>> = current.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }

    complexity
}
