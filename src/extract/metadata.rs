//! Metadata every element carries regardless of language.

use tree_sitter::Node;

use crate::elements::Span;
use crate::plugin::LanguagePlugin;
use crate::source::SourceUnit;

/// Span, raw text, doc comment and (for functions) complexity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonMetadata {
    pub span: Span,
    pub raw_text: String,
    pub doc: Option<String>,
    pub complexity: Option<u32>,
}

/// Compute span, raw text and doc comment for a node. Complexity is left unset.
pub fn compute(
    node: Node<'_>,
    unit: &SourceUnit,
    plugin: &LanguagePlugin,
    max_doc_lines: usize,
) -> CommonMetadata {
    let span = Span::from_node(node);
    let raw_text = raw_text(node, unit);
    let doc = plugin
        .doc_extractor()
        .and_then(|extract| extract(node, unit))
        .or_else(|| {
            preceding_comment(
                unit,
                span.start_line,
                plugin.comment_markers(),
                plugin.annotation_prefixes(),
                max_doc_lines,
            )
        });
    CommonMetadata {
        span,
        raw_text,
        doc,
        complexity: None,
    }
}

/// Node text by byte range.
///
/// When the node swallowed its trailing line terminator the span already ends
/// on the previous line, so that terminator is dropped here as well.
pub fn raw_text(node: Node<'_>, unit: &SourceUnit) -> String {
    let text = unit.slice(node.byte_range());
    let start = node.start_position();
    let end = node.end_position();
    if end.column == 0 && end.row > start.row {
        let text = text.strip_suffix('\n').unwrap_or(text);
        let text = text.strip_suffix('\r').unwrap_or(text);
        return text.to_string();
    }
    text.to_string()
}

/// Scan upward from the line before `start_line` collecting comment lines.
///
/// Annotation lines are skipped without ending the scan. A blank line, a
/// shebang, or any other code ends it.
pub fn preceding_comment(
    unit: &SourceUnit,
    start_line: usize,
    markers: &[&str],
    annotations: &[&str],
    max_lines: usize,
) -> Option<String> {
    if markers.is_empty() || max_lines == 0 {
        return None;
    }

    let mut collected: Vec<&str> = Vec::new();
    let mut line_no = start_line;
    while line_no > 1 && collected.len() < max_lines {
        line_no -= 1;
        let Some(line) = unit.line(line_no) else {
            break;
        };
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("#!") {
            break;
        }
        if annotations.iter().any(|p| trimmed.starts_with(p)) {
            continue;
        }
        match strip_marker(trimmed, markers) {
            Some(content) => collected.push(content),
            None => break,
        }
    }

    collected.reverse();
    // Leading and trailing blank lines come from "/**" and "*/" delimiters
    while collected.first().is_some_and(|l| l.is_empty()) {
        collected.remove(0);
    }
    while collected.last().is_some_and(|l| l.is_empty()) {
        collected.pop();
    }
    if collected.is_empty() {
        None
    } else {
        Some(collected.join("\n"))
    }
}

/// Remove the longest matching comment marker and any block terminator.
fn strip_marker<'s>(line: &'s str, markers: &[&str]) -> Option<&'s str> {
    let marker = markers
        .iter()
        .filter(|m| line.starts_with(**m))
        .max_by_key(|m| m.len())?;
    let rest = &line[marker.len()..];
    let rest = rest.strip_suffix("*/").unwrap_or(rest);
    Some(rest.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLASH: &[&str] = &["///", "//"];
    const BLOCK: &[&str] = &["/**", "/*", "*/", "*"];

    #[test]
    fn test_line_comments_collected_in_order() {
        let unit = SourceUnit::new(
            "a.rs",
            "use x;\n\n/// Adds numbers.\n/// Returns the sum.\n#[inline]\nfn add() {}\n",
            "rust",
        );
        let doc = preceding_comment(&unit, 6, SLASH, &["#["], 20);
        assert_eq!(doc.as_deref(), Some("Adds numbers.\nReturns the sum."));
    }

    #[test]
    fn test_blank_line_stops_scan() {
        let unit = SourceUnit::new("a.rs", "// unrelated\n\nfn f() {}\n", "rust");
        assert_eq!(preceding_comment(&unit, 3, SLASH, &[], 20), None);
    }

    #[test]
    fn test_block_comment_delimiters_trimmed() {
        let unit = SourceUnit::new(
            "A.java",
            "/**\n * Greets the caller.\n */\nvoid greet() {}\n",
            "java",
        );
        let doc = preceding_comment(&unit, 4, BLOCK, &["@"], 20);
        assert_eq!(doc.as_deref(), Some("Greets the caller."));
    }

    #[test]
    fn test_shebang_not_a_doc_comment() {
        let unit = SourceUnit::new("run.sh", "#!/bin/bash\nmain() {\n  :\n}\n", "bash");
        assert_eq!(preceding_comment(&unit, 2, &["#"], &[], 20), None);
    }

    #[test]
    fn test_doc_capped() {
        let unit = SourceUnit::new("a.py", "# one\n# two\n# three\nx = 1\n", "python");
        let doc = preceding_comment(&unit, 4, &["#"], &[], 2);
        assert_eq!(doc.as_deref(), Some("two\nthree"));
    }
}
