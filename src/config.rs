//! Configuration file schema for treescope.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_MAX_ENTRIES;
use crate::extract::DEFAULT_MAX_DOC_LINES;
use crate::plugin::sniff::SniffConfig;
use crate::query::DEFAULT_MATCH_LIMIT;

/// File names searched in the working directory, in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["treescope.yaml", ".treescope.yaml"];

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub sniff: SniffConfig,
    pub extraction: ExtractionConfig,
    pub query: QueryConfig,
    pub logging: LoggingConfig,
    /// Glob patterns for paths skipped when walking directories
    /// (e.g., "**/generated/**").
    pub excluded_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// In-memory LRU capacity (default: 512)
    pub max_entries: usize,
    /// Persist extractions to disk (default: false)
    pub disk: bool,
    /// Directory for the disk cache; the platform cache dir when unset
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            disk: false,
            dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Doc comment lines collected above an element at most (default: 50)
    pub max_doc_lines: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_doc_lines: DEFAULT_MAX_DOC_LINES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Query cursor match limit (default: 10000)
    pub match_limit: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            match_limit: DEFAULT_MATCH_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when RUST_LOG is unset (default: "warn")
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Parse a configuration from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read config {}: {}", path.display(), e))?;
        Self::parse_str(&content)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))
    }

    /// Parse YAML text. Blank text gives the defaults.
    pub fn parse_str(content: &str) -> anyhow::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Find a config file in `dir`.
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Load the explicit file if given, else a discovered one, else defaults.
    pub fn load(explicit: Option<&Path>, dir: &Path) -> anyhow::Result<Self> {
        let config = match explicit.map(Path::to_path_buf).or_else(|| Self::discover(dir)) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::parse_file(path)?
            }
            None => Self::default(),
        };
        validate(&config)?;
        Ok(config)
    }

    /// Check if a path should be excluded based on excluded_paths patterns.
    pub fn is_path_excluded(&self, path: &Path) -> bool {
        if self.excluded_paths.is_empty() {
            return false;
        }
        let path_str = path.to_string_lossy();
        self.excluded_paths.iter().any(|pattern| {
            globset::Glob::new(pattern)
                .map(|glob| glob.compile_matcher().is_match(&*path_str))
                .unwrap_or(false)
        })
    }
}

/// Validate a configuration for correctness.
pub fn validate(config: &Config) -> anyhow::Result<()> {
    if config.cache.max_entries == 0 {
        anyhow::bail!("cache.max_entries must be at least 1");
    }
    if config.sniff.max_bytes == 0 {
        anyhow::bail!("sniff.max_bytes must be at least 1");
    }
    if config.query.match_limit == 0 {
        anyhow::bail!("query.match_limit must be at least 1");
    }

    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        anyhow::bail!(
            "invalid logging.level {:?}, must be one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        );
    }

    for pattern in &config.excluded_paths {
        globset::Glob::new(pattern)
            .map_err(|e| anyhow::anyhow!("invalid excluded_paths pattern {:?}: {}", pattern, e))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
cache:
  max_entries: 64
  disk: true
sniff:
  min_hits: 5
logging:
  level: debug
excluded_paths:
  - "**/generated/**"
"#;
        let config = Config::parse_str(yaml).unwrap();
        assert_eq!(config.cache.max_entries, 64);
        assert!(config.cache.disk);
        assert_eq!(config.sniff.min_hits, 5);
        assert_eq!(config.sniff.max_bytes, SniffConfig::default().max_bytes);
        assert_eq!(config.extraction.max_doc_lines, DEFAULT_MAX_DOC_LINES);
        assert_eq!(config.logging.level, "debug");
        assert!(validate(&config).is_ok());
        assert!(config.is_path_excluded(Path::new("src/generated/api.rs")));
        assert!(!config.is_path_excluded(Path::new("src/api.rs")));
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(Config::parse_str("  \n").unwrap(), Config::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.cache.max_entries = 0;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.excluded_paths = vec!["[".to_string()];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_discover_and_load() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::discover(dir.path()).is_none());
        assert_eq!(Config::load(None, dir.path()).unwrap(), Config::default());

        fs::write(dir.path().join(".treescope.yaml"), "query:\n  match_limit: 50\n").unwrap();
        let found = Config::discover(dir.path()).unwrap();
        assert!(found.ends_with(".treescope.yaml"));
        assert_eq!(Config::load(None, dir.path()).unwrap().query.match_limit, 50);

        let explicit = dir.path().join("other.yaml");
        fs::write(&explicit, "cache:\n  max_entries: 0\n").unwrap();
        assert!(Config::load(Some(&explicit), dir.path()).is_err());
    }
}
