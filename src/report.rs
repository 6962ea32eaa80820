//! Output formatting for treescope results.
//!
//! Supports two output formats:
//! - Text: colored terminal listing for human readability
//! - JSON: structured output for programmatic consumption

use std::io::Write;

use colored::*;
use serde::{Deserialize, Serialize};

use crate::elements::CodeElement;
use crate::engine::AnalyzeResult;
use crate::error::{AnalysisError, ErrorKind};
use crate::plugin::registry::LanguageInfo;
use crate::plugin::NamedQuery;
use crate::query::QueryResult;

// =============================================================================
// JSON Format
// =============================================================================

/// Top-level JSON document for an analyze run.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonReport {
    pub version: String,
    pub files_analyzed: usize,
    pub files_failed: usize,
    pub results: Vec<AnalyzeResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<JsonFailure>,
}

/// A file that could not be analyzed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonFailure {
    pub file: String,
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub message: String,
}

impl JsonFailure {
    pub fn new(file: &str, error: &AnalysisError) -> Self {
        Self {
            file: file.to_string(),
            kind: error.kind(),
            identifier: error.identifier().map(str::to_string),
            message: error.to_string(),
        }
    }
}

impl JsonReport {
    pub fn new(results: Vec<AnalyzeResult>, failures: Vec<JsonFailure>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            files_analyzed: results.len(),
            files_failed: failures.len(),
            results,
            failures,
        }
    }
}

/// Write an analyze run as pretty-printed JSON.
pub fn write_json<W: Write>(out: &mut W, report: &JsonReport) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)?;
    Ok(())
}

// =============================================================================
// Text Format
// =============================================================================

/// Write an analyze run as a human-readable listing.
pub fn write_text<W: Write>(
    out: &mut W,
    results: &[AnalyzeResult],
    failures: &[JsonFailure],
) -> anyhow::Result<()> {
    for result in results {
        write_result(out, result)?;
        writeln!(out)?;
    }

    for failure in failures {
        writeln!(out, "{} {}: {}", "error:".red().bold(), failure.file, failure.message)?;
    }

    let elements: usize = results.iter().map(|r| r.elements.len()).sum();
    let matches: usize = results.iter().map(|r| r.query_results.len()).sum();
    write!(
        out,
        "{} {} file(s), {} element(s)",
        "Analyzed".bold(),
        results.len(),
        elements
    )?;
    if matches > 0 {
        write!(out, ", {} match(es)", matches)?;
    }
    if !failures.is_empty() {
        write!(out, ", {}", format!("{} failed", failures.len()).red())?;
    }
    writeln!(out)?;
    Ok(())
}

fn write_result<W: Write>(out: &mut W, result: &AnalyzeResult) -> anyhow::Result<()> {
    writeln!(
        out,
        "{} {}",
        result.file_path.cyan().bold(),
        format!("({}, {} lines)", result.language, result.summary.lines).dimmed()
    )?;

    for element in &result.elements {
        write_element(out, element)?;
    }
    for m in &result.query_results {
        write_match(out, m)?;
    }
    for error in &result.errors {
        writeln!(out, "  {} {}", "warning:".yellow(), error.message)?;
    }
    Ok(())
}

fn write_element<W: Write>(out: &mut W, element: &CodeElement) -> anyhow::Result<()> {
    let lines = format!("{:>5}-{:<5}", element.span.start_line, element.span.end_line);
    write!(
        out,
        "  {} {:<9} {:<12} {}",
        lines.dimmed(),
        element.category.as_str(),
        element.kind,
        element.qualified_name().bold()
    )?;
    if let Some(c) = element.complexity {
        let text = format!("cc={}", c);
        let colored = match c {
            c if c <= 5 => text.green(),
            c if c <= 10 => text.yellow(),
            _ => text.red(),
        };
        write!(out, " {}", colored)?;
    }
    if !element.tags.is_empty() {
        let tags: Vec<&str> = element.tags.iter().map(String::as_str).collect();
        write!(out, " {}", format!("[{}]", tags.join(", ")).dimmed())?;
    }
    writeln!(out)?;
    Ok(())
}

fn write_match<W: Write>(out: &mut W, m: &QueryResult) -> anyhow::Result<()> {
    let lines = format!("{:>5}-{:<5}", m.span.start_line, m.span.end_line);
    let first_line = m.text.lines().next().unwrap_or("");
    write!(out, "  {} @{:<12} {}", lines.dimmed(), m.capture, first_line)?;
    if let Some(owner) = &m.element {
        write!(out, " {}", format!("in {}", owner.name).dimmed())?;
    }
    writeln!(out)?;
    Ok(())
}

/// List registered languages.
pub fn write_languages<W: Write>(out: &mut W, languages: &[LanguageInfo]) -> anyhow::Result<()> {
    writeln!(out, "{}", "Supported languages:".bold())?;
    writeln!(out)?;
    for info in languages {
        let mut names: Vec<String> = info.extensions.iter().map(|e| format!(".{}", e)).collect();
        names.extend(info.file_names.iter().map(|n| n.to_string()));
        writeln!(
            out,
            "  {:<12} {:<40} {} queries",
            info.id,
            names.join(" "),
            info.queries
        )?;
    }
    Ok(())
}

/// List a language's named queries.
pub fn write_queries<W: Write>(
    out: &mut W,
    language: &str,
    queries: &[NamedQuery],
) -> anyhow::Result<()> {
    writeln!(out, "{} {}:", "Named queries for".bold(), language)?;
    writeln!(out)?;
    for query in queries {
        writeln!(out, "  {:<16} {}", query.key, query.description)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Summary;
    use crate::source::Fingerprint;

    fn result() -> AnalyzeResult {
        AnalyzeResult {
            file_path: "a.py".to_string(),
            language: "python".to_string(),
            fingerprint: Fingerprint::of(b""),
            elements: vec![],
            query_results: vec![],
            errors: vec![],
            summary: Summary::default(),
        }
    }

    #[test]
    fn test_json_report_counts() {
        let failure = JsonFailure::new(
            "b.xyz",
            &AnalysisError::UnsupportedLanguage {
                identifier: "b.xyz".to_string(),
            },
        );
        let report = JsonReport::new(vec![result()], vec![failure]);
        let mut buf = Vec::new();
        write_json(&mut buf, &report).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["files_analyzed"], 1);
        assert_eq!(value["files_failed"], 1);
        assert_eq!(value["failures"][0]["kind"], "unsupported_language");
        assert_eq!(value["results"][0]["language"], "python");
    }

    #[test]
    fn test_text_summary_line() {
        colored::control::set_override(false);
        let mut buf = Vec::new();
        write_text(&mut buf, &[result()], &[]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("a.py (python, 0 lines)"));
        assert!(text.contains("Analyzed 1 file(s), 0 element(s)"));
    }
}
