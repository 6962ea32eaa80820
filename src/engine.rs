//! Analysis engine: request validation, cache lookup, and the
//! resolve → parse → extract/query pipeline behind it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheKey, CacheService, CacheStats, DiskCache};
use crate::config::Config;
use crate::elements::{CodeElement, ElementCategory};
use crate::error::{AnalysisError, ErrorRecord};
use crate::extract::{self, Extraction};
use crate::plugin::{LanguagePlugin, ParsedSource, PluginRegistry};
use crate::query::{FilterChain, QueryEngine, QueryOptions, QueryRef, QueryRequest, QueryResult};
use crate::source::{Fingerprint, SourceUnit};

/// Output shaping applied after cache retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    pub include_raw_text: bool,
    pub include_doc: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            include_raw_text: true,
            include_doc: true,
        }
    }
}

/// One file to analyze.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeRequest {
    pub file_path: String,
    /// Decoded file content.
    pub content: String,
    /// Language name or alias; overrides file-name resolution.
    pub language_hint: Option<String>,
    /// Categories to extract. Empty with no query means all.
    pub categories: Vec<ElementCategory>,
    pub query: Option<QueryRef>,
    pub query_options: QueryOptions,
    /// Filter text, applied to query results when a query is present and to
    /// elements otherwise.
    pub filter: Option<String>,
    pub format: FormatOptions,
}

impl AnalyzeRequest {
    pub fn new(file_path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language_hint = Some(language.into());
        self
    }

    pub fn categories(mut self, categories: impl IntoIterator<Item = ElementCategory>) -> Self {
        self.categories = categories.into_iter().collect();
        self
    }

    pub fn query(mut self, query: QueryRef) -> Self {
        self.query = Some(query);
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Per-file totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub counts: BTreeMap<ElementCategory, usize>,
    pub total_complexity: u32,
    pub max_complexity: u32,
    pub lines: usize,
}

impl Summary {
    fn of(elements: &[CodeElement], lines: usize) -> Self {
        let mut summary = Summary {
            lines,
            ..Summary::default()
        };
        for element in elements {
            *summary.counts.entry(element.category).or_insert(0) += 1;
            if let Some(c) = element.complexity {
                summary.total_complexity += c;
                summary.max_complexity = summary.max_complexity.max(c);
            }
        }
        summary
    }
}

/// Everything known about one analyzed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeResult {
    pub file_path: String,
    pub language: String,
    pub fingerprint: Fingerprint,
    pub elements: Vec<CodeElement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query_results: Vec<QueryResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorRecord>,
    pub summary: Summary,
}

/// Engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Trees actually built by a parser (cache misses).
    pub parses: u64,
    pub cache: CacheStats,
}

#[derive(Clone)]
enum Cached {
    Tree(Arc<ParsedSource>),
    Extraction(Arc<Extraction>),
    Query(Arc<Vec<QueryResult>>),
}

#[derive(Serialize)]
struct ExtractParams<'a> {
    language: &'a str,
    category: ElementCategory,
    max_doc_lines: usize,
}

#[derive(Serialize)]
struct QueryParams<'a> {
    language: &'a str,
    query: &'a QueryRef,
    filter: &'a str,
    options: &'a QueryOptions,
    match_limit: u32,
}

/// Drives analysis requests. Cheap to share behind an `Arc`.
pub struct AnalysisEngine {
    registry: Arc<PluginRegistry>,
    queries: QueryEngine,
    cache: CacheService<Cached>,
    disk: Option<DiskCache>,
    max_doc_lines: usize,
    parses: AtomicU64,
}

impl AnalysisEngine {
    pub fn new(registry: Arc<PluginRegistry>, config: &Config) -> Self {
        let disk = if config.cache.disk {
            DiskCache::open(config.cache.dir.as_deref())
        } else {
            None
        };
        Self {
            queries: QueryEngine::new(Arc::clone(&registry), config.query.match_limit),
            registry,
            cache: CacheService::new(config.cache.max_entries),
            disk,
            max_doc_lines: config.extraction.max_doc_lines,
            parses: AtomicU64::new(0),
        }
    }

    /// Engine over `registry` with default settings.
    pub fn with_registry(registry: Arc<PluginRegistry>) -> Self {
        Self::new(registry, &Config::default())
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            parses: self.parses.load(Ordering::Relaxed),
            cache: self.cache.stats(),
        }
    }

    /// Analyze one file.
    pub fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResult, AnalysisError> {
        if request.file_path.trim().is_empty() {
            return Err(AnalysisError::InvalidRequest("file_path is empty".to_string()));
        }
        let filter = match &request.filter {
            Some(text) => FilterChain::parse(text)
                .map_err(|e| AnalysisError::InvalidRequest(format!("invalid filter: {}", e)))?,
            None => FilterChain::all(),
        };

        let plugin = match &request.language_hint {
            Some(hint) => self.registry.by_language(hint)?,
            None => self
                .registry
                .resolve(&request.file_path, Some(request.content.as_bytes()))?,
        };

        let unit = Arc::new(SourceUnit::new(
            request.file_path.as_str(),
            request.content.as_str(),
            plugin.id(),
        ));
        let fingerprint = unit.fingerprint();
        if let Some(old) = self.cache.observe(unit.path(), fingerprint) {
            if let Some(disk) = &self.disk {
                disk.purge(old);
            }
        }

        let mut session = Session {
            engine: self,
            plugin: &plugin,
            unit,
            parsed: None,
            errors: Vec::new(),
        };

        let categories = effective_categories(request);
        let mut extraction = Extraction::default();
        for category in &categories {
            extraction.merge((*session.extraction(*category)?).clone());
        }

        let query_results = match &request.query {
            Some(query) => {
                let owners = session.owner_elements()?;
                session.query(query, &filter, &request.query_options, &owners)?
            }
            None => Vec::new(),
        };

        let mut elements = extraction.elements;
        if request.query.is_none() && !filter.is_empty() {
            elements.retain(|e| filter.matches_element(e));
        }
        for element in &mut elements {
            if !request.format.include_raw_text {
                element.raw_text.clear();
            }
            if !request.format.include_doc {
                element.doc = None;
            }
        }

        let mut errors: Vec<ErrorRecord> = extraction.errors.iter().map(ErrorRecord::from).collect();
        errors.extend(session.errors);

        let summary = Summary::of(&elements, session.unit.line_count());
        tracing::debug!(
            path = %request.file_path,
            language = plugin.id(),
            elements = elements.len(),
            query_results = query_results.len(),
            errors = errors.len(),
            "analyzed file"
        );

        Ok(AnalyzeResult {
            file_path: request.file_path.clone(),
            language: plugin.id().to_string(),
            fingerprint,
            elements,
            query_results,
            errors,
            summary,
        })
    }

    /// Analyze on the blocking pool so async callers are not stalled by
    /// parsing.
    pub async fn analyze_async(
        self: &Arc<Self>,
        request: AnalyzeRequest,
    ) -> Result<AnalyzeResult, AnalysisError> {
        let engine = Arc::clone(self);
        tokio::task::spawn_blocking(move || engine.analyze(&request))
            .await
            .map_err(|e| AnalysisError::Join(e.to_string()))?
    }

    /// Analyze many files in parallel. Results keep the request order.
    pub fn analyze_batch(
        &self,
        requests: &[AnalyzeRequest],
    ) -> Vec<Result<AnalyzeResult, AnalysisError>> {
        requests.par_iter().map(|r| self.analyze(r)).collect()
    }
}

fn effective_categories(request: &AnalyzeRequest) -> Vec<ElementCategory> {
    if request.categories.is_empty() {
        return if request.query.is_some() {
            Vec::new()
        } else {
            ElementCategory::ALL.to_vec()
        };
    }
    let mut seen = Vec::new();
    for category in &request.categories {
        if !seen.contains(category) {
            seen.push(*category);
        }
    }
    seen
}

/// State for one request: the resolved plugin, the unit, and the tree once
/// something needed it.
struct Session<'e> {
    engine: &'e AnalysisEngine,
    plugin: &'e Arc<LanguagePlugin>,
    unit: Arc<SourceUnit>,
    parsed: Option<Arc<ParsedSource>>,
    errors: Vec<ErrorRecord>,
}

impl Session<'_> {
    /// Serve `operation` from the cache, computing it on a miss. When no key
    /// can be built the error is recorded and the value computed directly.
    fn cached<T, P>(
        &mut self,
        operation: &str,
        params: &P,
        wrap: fn(T) -> Cached,
        unwrap: fn(Cached) -> Option<T>,
        compute: impl Fn(&mut Self) -> Result<T, AnalysisError>,
    ) -> Result<T, AnalysisError>
    where
        P: Serialize,
    {
        let engine = self.engine;
        let key = match CacheKey::new(self.unit.fingerprint(), operation, params) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(error = %e, "computing without cache");
                self.errors.push(ErrorRecord::from(&e));
                return compute(self);
            }
        };
        let value = engine
            .cache
            .get_or_compute(&key, || compute(self).map(wrap))?;
        match unwrap(value) {
            Some(value) => Ok(value),
            None => {
                tracing::warn!(operation, "cached value has the wrong shape, recomputing");
                compute(self)
            }
        }
    }

    fn parsed(&mut self) -> Result<Arc<ParsedSource>, AnalysisError> {
        if let Some(parsed) = &self.parsed {
            return Ok(Arc::clone(parsed));
        }
        let language = self.plugin.id();
        let parsed = self.cached(
            "parse",
            &language,
            Cached::Tree,
            |c| match c {
                Cached::Tree(t) => Some(t),
                _ => None,
            },
            |s| {
                s.engine.parses.fetch_add(1, Ordering::Relaxed);
                let parsed = s.plugin.parse(Arc::clone(&s.unit))?;
                Ok(Arc::new(parsed))
            },
        )?;
        self.parsed = Some(Arc::clone(&parsed));
        Ok(parsed)
    }

    fn extraction(&mut self, category: ElementCategory) -> Result<Arc<Extraction>, AnalysisError> {
        let params = ExtractParams {
            language: self.plugin.id(),
            category,
            max_doc_lines: self.engine.max_doc_lines,
        };
        let disk_key = CacheKey::new(self.unit.fingerprint(), "extract", &params).ok();
        self.cached(
            "extract",
            &params,
            Cached::Extraction,
            |c| match c {
                Cached::Extraction(e) => Some(e),
                _ => None,
            },
            |s| {
                let disk = s.engine.disk.as_ref().zip(disk_key.as_ref());
                if let Some((disk, key)) = disk {
                    if let Some(stored) = disk.load(key, s.unit.fingerprint()) {
                        return Ok(Arc::new(stored));
                    }
                }
                let parsed = s.parsed()?;
                let extraction =
                    extract::extract(&parsed, s.plugin, category, s.engine.max_doc_lines);
                if let Some((disk, key)) = disk {
                    disk.store(key, &extraction);
                }
                Ok(Arc::new(extraction))
            },
        )
    }

    /// Every element of the file, for mapping query results to owners.
    fn owner_elements(&mut self) -> Result<Vec<CodeElement>, AnalysisError> {
        let mut elements = Vec::new();
        for category in ElementCategory::ALL {
            elements.extend(self.extraction(category)?.elements.iter().cloned());
        }
        Ok(elements)
    }

    fn query(
        &mut self,
        query: &QueryRef,
        filter: &FilterChain,
        options: &QueryOptions,
        owners: &[CodeElement],
    ) -> Result<Vec<QueryResult>, AnalysisError> {
        let params = QueryParams {
            language: self.plugin.id(),
            query,
            filter: filter.source(),
            options,
            match_limit: self.engine.queries.match_limit(),
        };
        let results = self.cached(
            "query",
            &params,
            Cached::Query,
            |c| match c {
                Cached::Query(r) => Some(r),
                _ => None,
            },
            |s| {
                let parsed = s.parsed()?;
                let results = s.engine.queries.execute(&QueryRequest {
                    parsed: &parsed,
                    language: s.plugin.id(),
                    query,
                    filter,
                    options,
                    elements: Some(owners),
                })?;
                Ok(Arc::new(results))
            },
        )?;
        Ok((*results).clone())
    }
}
