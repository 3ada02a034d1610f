use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use rag_core::config::{Config, Settings};
use rag_core::error::{Error, Result};
use rag_core::importer::DocumentImporter;
use rag_core::traits::{Generator, Retriever};
use rag_core::types::{Category, CollectionStats, DocId, Meta, QueryResult, DEFAULT_SOURCE};

use crate::engine::{NoopRetriever, ScanEngine, VectorEngine};

/// Queries run by [`KnowledgeBase::test_retrieval`] when none are given.
pub const DEFAULT_PROBE_QUERIES: [&str; 5] = [
    "index lent performance",
    "sécurité mot de passe Oracle",
    "backup RMAN stratégie",
    "requête SELECT performance",
    "audit Oracle configuration",
];

const PROBE_RESULTS: usize = 3;
const ANALYSIS_RESULTS: usize = 3;
const ANALYSIS_SNIPPET: usize = 200;

/// Which engine answered initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Vector,
    Lexical,
    Disabled,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self { Tier::Vector => "vector", Tier::Lexical => "lexical", Tier::Disabled => "disabled" })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub query: String,
    pub found: usize,
    pub top_topics: Vec<String>,
    pub scores: Vec<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub files: usize,
    pub added: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnhancedAnswer {
    Generated { text: String, context_documents: usize },
    Unavailable { reason: String },
}

/// Stable retrieval API for the rest of the application.
///
/// The backing engine is chosen once, at construction: embeddings if the model and the
/// LanceDB store come up, the in-memory lexical engine otherwise, and a no-op engine if
/// even that fails. Retrieval calls never fail; they log and return nothing instead.
pub struct KnowledgeBase {
    backend: Box<dyn Retriever>,
    tier: Tier,
    generator: Option<Arc<dyn Generator>>,
    settings: Settings,
}

static SHARED: OnceLock<KnowledgeBase> = OnceLock::new();

impl KnowledgeBase {
    pub fn initialize(settings: Settings) -> Self {
        Self::build(
            settings,
            |s| Ok(Box::new(VectorEngine::open(s)?) as Box<dyn Retriever>),
            |s| Ok(Box::new(ScanEngine::lexical(s)?) as Box<dyn Retriever>),
        )
    }

    /// Walk the degradation ladder with the given constructors.
    pub fn build<P, F>(settings: Settings, primary: P, fallback: F) -> Self
    where
        P: FnOnce(&Settings) -> Result<Box<dyn Retriever>>,
        F: FnOnce(&Settings) -> Result<Box<dyn Retriever>>,
    {
        let (backend, tier) = match primary(&settings) {
            Ok(engine) => (engine, Tier::Vector),
            Err(e) => {
                tracing::warn!("Embedding retrieval unavailable ({}), falling back to lexical retrieval", e);
                match fallback(&settings) {
                    Ok(engine) => (engine, Tier::Lexical),
                    Err(e) => {
                        tracing::warn!("Lexical retrieval unavailable ({}), retrieval disabled", e);
                        (Box::new(NoopRetriever) as Box<dyn Retriever>, Tier::Disabled)
                    }
                }
            }
        };
        tracing::info!("Knowledge base ready (tier: {})", tier);
        Self { backend, tier, generator: None, settings }
    }

    /// Process-wide instance, built on first use from `Config::load()`.
    pub fn shared() -> &'static KnowledgeBase {
        SHARED.get_or_init(|| {
            let settings = match Config::load().and_then(|c| Ok(c.settings()?)) {
                Ok(s) => s,
                Err(e) => { tracing::warn!("Configuration unusable ({}), using defaults", e); Settings::default() }
            };
            Self::initialize(settings)
        })
    }

    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn tier(&self) -> Tier { self.tier }

    pub fn settings(&self) -> &Settings { &self.settings }

    pub fn retrieve_context(&self, query: &str, n: usize) -> Vec<QueryResult> { self.run_query(query, n, None) }

    /// Retrieval restricted to `category`. A blank query searches for the category name and,
    /// when that scores nothing, lists the category's first `n` documents unscored.
    pub fn search_by_category(&self, category: Category, query: &str, n: usize) -> Vec<QueryResult> {
        if !query.trim().is_empty() { return self.run_query(query, n, Some(category)); }
        let results = self.run_query(category.as_str(), n, Some(category));
        if !results.is_empty() { return results; }
        self.backend.browse(category, n).unwrap_or_else(|e| {
            self.log_failure(category.as_str(), &e);
            vec![]
        })
    }

    /// Documents close to a topic slug (e.g. `password_policy`).
    pub fn related_documents(&self, topic: &str, n: usize) -> Vec<QueryResult> { self.run_query(topic, n, None) }

    fn run_query(&self, query: &str, n: usize, category: Option<Category>) -> Vec<QueryResult> {
        match self.backend.query(query, n, category) {
            Ok(results) => results,
            Err(e) => {
                self.log_failure(query, &e);
                vec![]
            }
        }
    }

    fn log_failure(&self, query: &str, e: &Error) {
        if e.is_transient() { tracing::warn!("Retrieval failed for {:?}: {}", query, e); }
        else { tracing::error!("Retrieval failed for {:?}: {}", query, e); }
    }

    pub fn add_document(&self, content: &str, metadata: &Meta) -> Result<DocId> { self.backend.add(content, metadata) }

    /// Add a user document: `source` is forced to `custom` and today's date is recorded as
    /// `added_date`. `extra` may carry `severity` and any other keys.
    pub fn add_custom_document(&self, content: &str, category: Category, topic: &str, extra: &Meta) -> Result<DocId> {
        let mut meta = extra.clone();
        meta.insert("category".into(), category.to_string());
        meta.insert("topic".into(), topic.to_string());
        meta.insert("source".into(), DEFAULT_SOURCE.to_string());
        meta.entry("added_date".into()).or_insert_with(|| chrono::Local::now().format("%Y-%m-%d").to_string());
        self.add_document(content, &meta)
    }

    pub fn stats(&self) -> CollectionStats {
        self.backend.stats().unwrap_or_else(|e| {
            if e.is_transient() { tracing::warn!("Stats unavailable: {}", e); }
            else { tracing::error!("Stats unavailable: {}", e); }
            CollectionStats::default()
        })
    }

    /// Run each query with `n = 3` and report what came back. Empty `queries` runs the defaults.
    pub fn test_retrieval(&self, queries: &[&str]) -> Vec<ProbeResult> {
        let queries: Vec<&str> = if queries.is_empty() { DEFAULT_PROBE_QUERIES.to_vec() } else { queries.to_vec() };
        queries
            .into_iter()
            .map(|q| {
                let results = self.retrieve_context(q, PROBE_RESULTS);
                ProbeResult {
                    query: q.to_string(),
                    found: results.len(),
                    top_topics: results.iter().take(2).map(|r| r.topic().to_string()).collect(),
                    scores: results.iter().take(2).map(|r| r.score).collect(),
                }
            })
            .collect()
    }

    /// Context block for a prompt: category, topic and a snippet of each document.
    pub fn format_context(&self, results: &[QueryResult]) -> String {
        let limit = self.settings.context.snippet_chars;
        let mut out = String::from("=== ORACLE KNOWLEDGE BASE ===\n");
        for (i, r) in results.iter().enumerate() {
            out.push_str(&format!("\n--- Document {} ({} / {}) ---\n", i + 1, r.category(), r.topic()));
            out.push_str(&snippet(&r.document.content, limit));
            out.push('\n');
        }
        out
    }

    /// The prompt `enhanced_query` would send, with the documents used to build it.
    pub fn augmented_prompt(&self, prompt: &str) -> (String, Vec<QueryResult>) {
        let docs = self.retrieve_context(prompt, self.settings.context.max_documents);
        if docs.is_empty() { return (prompt.to_string(), docs); }
        let text = format!("{}\n=== QUESTION ===\n{}\n", self.format_context(&docs), prompt);
        (text, docs)
    }

    /// Context for analysing a `kind` of output (`"awr"`, `"rman"`, ...): the documents
    /// retrieved for "`kind` analysis best practices" and a one-line summary of each.
    pub fn analysis_context(&self, kind: &str) -> (String, Vec<QueryResult>) {
        let docs = self.retrieve_context(&format!("{} analysis best practices", kind), ANALYSIS_RESULTS);
        let summary = docs
            .iter()
            .map(|r| format!("- {}: {}", r.topic(), snippet(&r.document.content, ANALYSIS_SNIPPET)))
            .collect::<Vec<_>>()
            .join("\n");
        (summary, docs)
    }

    pub fn enhanced_query(&self, prompt: &str) -> EnhancedAnswer {
        let Some(generator) = self.generator.as_ref() else {
            return EnhancedAnswer::Unavailable { reason: Error::GenerationUnavailable("no generator configured".into()).to_string() };
        };
        let (text, docs) = self.augmented_prompt(prompt);
        match generator.generate(&text) {
            Ok(text) => EnhancedAnswer::Generated { text, context_documents: docs.len() },
            Err(e) => {
                tracing::warn!("Generation failed: {}", e);
                EnhancedAnswer::Unavailable { reason: e.to_string() }
            }
        }
    }

    /// Add every `.txt` chunk under `dir`. Chunks the store rejects are counted, not fatal.
    pub fn import_directory(&self, dir: &Path) -> Result<ImportReport> {
        if !dir.is_dir() { return Err(Error::Validation(format!("{} is not a directory", dir.display()))); }
        let batch = DocumentImporter::new().collect(dir).map_err(|e| Error::Validation(e.to_string()))?;
        let mut report = ImportReport { files: batch.files, ..Default::default() };
        for doc in batch.documents {
            let mut meta: Meta = doc.metadata.extra.into_iter().collect();
            meta.insert("category".into(), doc.metadata.category.to_string());
            meta.insert("topic".into(), doc.metadata.topic);
            meta.insert("severity".into(), doc.metadata.severity.to_string());
            meta.insert("source".into(), doc.metadata.source);
            match self.add_document(&doc.content, &meta) {
                Ok(_) => report.added += 1,
                Err(e @ Error::StoreUnavailable(_)) => return Err(e),
                Err(e) => { tracing::warn!("Skipping chunk from import: {}", e); report.rejected += 1; }
            }
        }
        tracing::info!("Imported {} chunks from {} files", report.added, report.files);
        Ok(report)
    }
}

/// First `limit` characters of `text`, never splitting a UTF-8 sequence.
pub fn snippet(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
