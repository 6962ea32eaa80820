//! Bounded content sniffing for files whose extension does not decide the
//! language.

use serde::{Deserialize, Serialize};

use super::LanguageProvider;

/// Limits for content sniffing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SniffConfig {
    /// Bytes of content inspected at most.
    pub max_bytes: usize,
    /// Keyword hits required before keyword density decides.
    pub min_hits: usize,
}

impl Default for SniffConfig {
    fn default() -> Self {
        Self {
            max_bytes: 4096,
            min_hits: 3,
        }
    }
}

/// Interpreter named on a shebang line, without path or version suffix.
///
/// `#!/usr/bin/env python3` gives "python", `#!/bin/bash -e` gives "bash".
pub fn shebang_interpreter(sample: &str) -> Option<&str> {
    let first = sample.lines().next()?.strip_prefix("#!")?;
    let mut words = first.split_whitespace();
    let mut program = words.next()?.rsplit('/').next()?;
    if program == "env" {
        program = words.find(|w| !w.starts_with('-') && !w.contains('='))?;
    }
    let name = program.trim_end_matches(|c: char| c.is_ascii_digit() || c == '.');
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Identifier-like tokens of a sample. `#` is kept so preprocessor
/// directives such as `#include` count as one token.
fn tokens(sample: &str) -> impl Iterator<Item = &str> {
    sample
        .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '#'))
        .filter(|t| !t.is_empty())
}

/// Pick one of `candidates` by content, returning its index.
///
/// A shebang decides immediately. Otherwise the candidate with the highest
/// keyword density wins, provided it has at least `min_hits` hits; ties go
/// to the earlier candidate.
pub fn sniff(sample: &[u8], candidates: &[&dyn LanguageProvider], config: &SniffConfig) -> Option<usize> {
    let bounded = &sample[..sample.len().min(config.max_bytes)];
    let text = String::from_utf8_lossy(bounded);

    if let Some(interpreter) = shebang_interpreter(&text) {
        if let Some(idx) = candidates
            .iter()
            .position(|c| c.interpreters().contains(&interpreter))
        {
            tracing::debug!(interpreter, language = candidates[idx].id(), "resolved by shebang");
            return Some(idx);
        }
    }

    let all: Vec<&str> = tokens(&text).collect();
    if all.is_empty() {
        return None;
    }

    let mut best: Option<(usize, f64)> = None;
    for (idx, candidate) in candidates.iter().enumerate() {
        let keywords = candidate.sniff_keywords();
        if keywords.is_empty() {
            continue;
        }
        let hits = all.iter().filter(|t| keywords.contains(t)).count();
        if hits < config.min_hits {
            continue;
        }
        let density = hits as f64 / all.len() as f64;
        if best.map_or(true, |(_, d)| density > d) {
            best = Some((idx, density));
        }
    }

    if let Some((idx, density)) = best {
        tracing::debug!(language = candidates[idx].id(), density, "resolved by keyword density");
    }
    best.map(|(idx, _)| idx)
}
