//! Plugin registry: file → language resolution and lazy, per-language plugin
//! construction.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use phf::phf_map;
use serde::Serialize;

use super::sniff::{self, SniffConfig};
use super::{LanguagePlugin, LanguageProvider, NamedQuery};
use crate::error::AnalysisError;

/// Caller-facing language names → canonical ids. Keys are lowercase.
static LANGUAGE_ALIASES: phf::Map<&'static str, &'static str> = phf_map! {
    "python" => "python",
    "py" => "python",
    "python3" => "python",
    "javascript" => "javascript",
    "js" => "javascript",
    "node" => "javascript",
    "typescript" => "typescript",
    "ts" => "typescript",
    "tsx" => "tsx",
    "java" => "java",
    "go" => "go",
    "golang" => "go",
    "c" => "c",
    "cpp" => "cpp",
    "c++" => "cpp",
    "cxx" => "cpp",
    "rust" => "rust",
    "rs" => "rust",
    "scala" => "scala",
    "swift" => "swift",
    "csharp" => "csharp",
    "cs" => "csharp",
    "c#" => "csharp",
    "ruby" => "ruby",
    "rb" => "ruby",
    "bash" => "bash",
    "sh" => "bash",
    "shell" => "bash",
    "zsh" => "bash",
};

/// Normalize a caller-supplied language name to a built-in canonical id.
pub fn normalize_language(name: &str) -> Option<&'static str> {
    LANGUAGE_ALIASES
        .get(name.trim().to_ascii_lowercase().as_str())
        .copied()
}

/// Summary of a registered language.
#[derive(Debug, Clone, Serialize)]
pub struct LanguageInfo {
    pub id: &'static str,
    pub extensions: &'static [&'static str],
    pub file_names: &'static [&'static str],
    pub queries: usize,
}

struct Slot {
    provider: Box<dyn LanguageProvider>,
    plugin: OnceCell<Result<Arc<LanguagePlugin>, AnalysisError>>,
}

/// Resolves files to language plugins and owns the plugin instances.
pub struct PluginRegistry {
    slots: Vec<Slot>,
    sniff: SniffConfig,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.slots.iter().map(|s| s.provider.id()).collect();
        f.debug_struct("PluginRegistry")
            .field("languages", &ids)
            .field("sniff", &self.sniff)
            .finish_non_exhaustive()
    }
}

static GLOBAL: OnceCell<Arc<PluginRegistry>> = OnceCell::new();

impl PluginRegistry {
    /// An empty registry.
    pub fn new(sniff: SniffConfig) -> Self {
        Self {
            slots: Vec::new(),
            sniff,
        }
    }

    /// A registry holding every built-in language.
    pub fn builtin(sniff: SniffConfig) -> Self {
        crate::languages::builtin()
            .into_iter()
            .fold(Self::new(sniff), |registry, provider| registry.register_boxed(provider))
    }

    /// Process-wide registry of the built-in languages with default settings.
    pub fn global() -> Arc<PluginRegistry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::builtin(SniffConfig::default()))))
    }

    /// Add a provider. Registration order breaks resolution ties.
    pub fn register(self, provider: impl LanguageProvider + 'static) -> Self {
        self.register_boxed(Box::new(provider))
    }

    pub fn register_boxed(mut self, provider: Box<dyn LanguageProvider>) -> Self {
        self.slots.push(Slot {
            provider,
            plugin: OnceCell::new(),
        });
        self
    }

    pub fn sniff_config(&self) -> &SniffConfig {
        &self.sniff
    }

    /// Canonical id for a language name, if it is registered.
    pub fn normalize(&self, name: &str) -> Option<&'static str> {
        let lowered = name.trim().to_ascii_lowercase();
        let canonical = normalize_language(&lowered);
        self.slots
            .iter()
            .map(|s| s.provider.id())
            .find(|id| Some(*id) == canonical || *id == lowered)
    }

    fn slot_index(&self, name: &str) -> Option<usize> {
        let id = self.normalize(name)?;
        self.slots.iter().position(|s| s.provider.id() == id)
    }

    /// Construct (once) and return the plugin in a slot.
    fn plugin_at(&self, idx: usize) -> Result<Arc<LanguagePlugin>, AnalysisError> {
        let slot = &self.slots[idx];
        slot.plugin
            .get_or_init(|| {
                let id = slot.provider.id();
                match LanguagePlugin::build(slot.provider.as_ref()) {
                    Ok(plugin) => {
                        tracing::info!(language = id, "constructed language plugin");
                        Ok(Arc::new(plugin))
                    }
                    Err(e) => {
                        tracing::error!(language = id, error = %e, "language plugin construction failed");
                        Err(e)
                    }
                }
            })
            .clone()
    }

    /// Plugin for a language name or alias.
    pub fn by_language(&self, name: &str) -> Result<Arc<LanguagePlugin>, AnalysisError> {
        let idx = self
            .slot_index(name)
            .ok_or_else(|| AnalysisError::UnsupportedLanguage {
                identifier: name.to_string(),
            })?;
        self.plugin_at(idx)
    }

    /// Resolve a file to its plugin by name, then extension, then content.
    pub fn resolve(
        &self,
        file_name: &str,
        sample: Option<&[u8]>,
    ) -> Result<Arc<LanguagePlugin>, AnalysisError> {
        let idx = self
            .resolve_index(file_name, sample)
            .ok_or_else(|| AnalysisError::UnsupportedLanguage {
                identifier: file_name.to_string(),
            })?;
        tracing::debug!(file = file_name, language = self.slots[idx].provider.id(), "resolved language");
        self.plugin_at(idx)
    }

    fn resolve_index(&self, file_name: &str, sample: Option<&[u8]>) -> Option<usize> {
        let path = Path::new(file_name);
        let base = path.file_name().and_then(|n| n.to_str()).unwrap_or(file_name);

        if let Some(idx) = self
            .slots
            .iter()
            .position(|s| s.provider.file_names().contains(&base))
        {
            return Some(idx);
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let candidates: Vec<usize> = match &ext {
            Some(ext) => self
                .slots
                .iter()
                .enumerate()
                .filter(|(_, s)| s.provider.extensions().contains(&ext.as_str()))
                .map(|(i, _)| i)
                .collect(),
            None => Vec::new(),
        };

        match candidates.len() {
            1 => Some(candidates[0]),
            0 => {
                let all: Vec<usize> = (0..self.slots.len()).collect();
                self.sniff_among(&all, sample?)
            }
            _ => sample
                .and_then(|s| self.sniff_among(&candidates, s))
                .or(Some(candidates[0])),
        }
    }

    fn sniff_among(&self, indices: &[usize], sample: &[u8]) -> Option<usize> {
        let providers: Vec<&dyn LanguageProvider> =
            indices.iter().map(|i| self.slots[*i].provider.as_ref()).collect();
        sniff::sniff(sample, &providers, &self.sniff).map(|pos| indices[pos])
    }

    /// Registered languages in registration order.
    pub fn languages(&self) -> Vec<LanguageInfo> {
        self.slots
            .iter()
            .map(|s| LanguageInfo {
                id: s.provider.id(),
                extensions: s.provider.extensions(),
                file_names: s.provider.file_names(),
                queries: s.provider.queries().len(),
            })
            .collect()
    }

    /// Named query library of a language. Does not construct the plugin.
    pub fn named_queries(&self, name: &str) -> Result<&'static [NamedQuery], AnalysisError> {
        let idx = self
            .slot_index(name)
            .ok_or_else(|| AnalysisError::UnsupportedLanguage {
                identifier: name.to_string(),
            })?;
        Ok(self.slots[idx].provider.queries())
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::builtin(SniffConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_aliases() {
        assert_eq!(normalize_language("PY"), Some("python"));
        assert_eq!(normalize_language("c++"), Some("cpp"));
        assert_eq!(normalize_language("Golang"), Some("go"));
        assert_eq!(normalize_language("c#"), Some("csharp"));
        assert_eq!(normalize_language("cobol"), None);
    }

    #[test]
    fn test_resolve_by_extension() {
        let registry = PluginRegistry::global();
        assert_eq!(registry.resolve("src/app.py", None).unwrap().id(), "python");
        assert_eq!(registry.resolve("lib.RS", None).unwrap().id(), "rust");
        assert_eq!(registry.resolve("view.tsx", None).unwrap().id(), "tsx");
        assert_eq!(registry.resolve("Main.java", None).unwrap().id(), "java");
    }

    #[test]
    fn test_resolve_special_file_name() {
        let registry = PluginRegistry::global();
        assert_eq!(registry.resolve("project/Rakefile", None).unwrap().id(), "ruby");
        assert_eq!(registry.resolve(".bashrc", None).unwrap().id(), "bash");
    }

    #[test]
    fn test_ambiguous_header_sniffed() {
        let registry = PluginRegistry::global();
        let cpp = b"namespace util {\ntemplate <typename T>\nclass Box { public: virtual ~Box(); };\n}\n";
        assert_eq!(registry.resolve("box.h", Some(cpp)).unwrap().id(), "cpp");

        // Inconclusive sniff falls back to the first candidate
        assert_eq!(registry.resolve("empty.h", Some(b"")).unwrap().id(), "c");
        assert_eq!(registry.resolve("empty.h", None).unwrap().id(), "c");
    }

    #[test]
    fn test_shebang_without_extension() {
        let registry = PluginRegistry::global();
        let script = b"#!/usr/bin/env python3\nprint('hi')\n";
        assert_eq!(registry.resolve("bin/tool", Some(script)).unwrap().id(), "python");
        let script = b"#!/bin/bash\necho hi\n";
        assert_eq!(registry.resolve("bin/run", Some(script)).unwrap().id(), "bash");
    }

    #[test]
    fn test_unknown_extension_fails() {
        let registry = PluginRegistry::global();
        let err = registry
            .resolve("notes.xyz", Some(b"just some words here"))
            .unwrap_err();
        match err {
            AnalysisError::UnsupportedLanguage { identifier } => assert_eq!(identifier, "notes.xyz"),
            other => panic!("Expected UnsupportedLanguage, got {:?}", other),
        }
    }

    #[test]
    fn test_plugins_are_shared() {
        let registry = PluginRegistry::global();
        let a = registry.by_language("python").unwrap();
        let b = registry.by_language("py").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_builtin_languages_construct() {
        let registry = PluginRegistry::global();
        for info in registry.languages() {
            let plugin = registry.by_language(info.id);
            assert!(plugin.is_ok(), "Expected {} to construct, got {:?}", info.id, plugin.err());
        }
        assert_eq!(registry.languages().len(), 14);
    }

    #[test]
    fn test_debug_lists_languages() {
        let registry = PluginRegistry::new(SniffConfig::default())
            .register(crate::languages::python::Python);
        let rendered = format!("{:?}", registry);
        assert!(rendered.starts_with("PluginRegistry"), "{}", rendered);
        assert!(rendered.contains("\"python\""), "{}", rendered);
    }

    #[test]
    fn test_custom_provider_registered() {
        let registry = PluginRegistry::new(SniffConfig::default())
            .register(crate::languages::python::Python);
        assert_eq!(registry.normalize("python3"), Some("python"));
        assert_eq!(registry.normalize("ruby"), None);
        assert_eq!(registry.resolve("x.py", None).unwrap().id(), "python");
        assert!(registry.by_language("ruby").is_err());
    }
}
