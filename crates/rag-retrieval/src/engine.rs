use std::sync::Arc;
use std::time::{Duration, Instant};

use rag_core::config::Settings;
use rag_core::error::{Error, Result};
use rag_core::traits::{DocumentStore, Retriever, Scorer};
use rag_core::types::{Category, CollectionStats, DocId, Meta, NewDocument, QueryResult};
use rag_embed::load_embedder;
use rag_lexical::{JaccardScorer, MemoryStore};
use rag_vector::LanceStore;

/// Stable sort by score descending (ties keep input order), then keep the first `k`.
pub fn rank(mut hits: Vec<QueryResult>, k: usize) -> Vec<QueryResult> {
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(k);
    hits
}

/// Unscored listing of one category, in store order.
fn browse_documents<S: DocumentStore + ?Sized>(store: &S, category: Category, k: usize) -> Result<Vec<QueryResult>> {
    Ok(store
        .all()?
        .into_iter()
        .filter(|d| d.metadata.category == category)
        .take(k)
        .map(|document| QueryResult { document, score: 0.0 })
        .collect())
}

/// Brute-force engine: score every (filtered) document with `scorer`, drop hits at or below
/// `threshold`, rank. Documents not reached within `budget` are left out.
pub struct ScanEngine<S, Sc> {
    store: S,
    scorer: Sc,
    threshold: f32,
    budget: Duration,
}

impl<S: DocumentStore, Sc: Scorer> ScanEngine<S, Sc> {
    pub fn new(store: S, scorer: Sc, threshold: f32, budget: Duration) -> Result<Self> {
        if !(0.0..1.0).contains(&threshold) {
            return Err(Error::InvalidConfig(format!("lexical threshold must lie in [0, 1), got {}", threshold)));
        }
        Ok(Self { store, scorer, threshold, budget })
    }

    pub fn store(&self) -> &S { &self.store }
}

impl ScanEngine<MemoryStore, JaccardScorer> {
    /// In-memory Jaccard engine over the seed corpus.
    pub fn lexical(settings: &Settings) -> Result<Self> {
        let engine = Self::new(MemoryStore::new(), JaccardScorer, settings.retrieval.lexical_threshold, settings.retrieval.timeout())?;
        engine.store.initialize()?;
        Ok(engine)
    }
}

impl<S: DocumentStore, Sc: Scorer> Retriever for ScanEngine<S, Sc> {
    fn query(&self, query: &str, k: usize, category: Option<Category>) -> Result<Vec<QueryResult>> {
        if k == 0 { return Ok(vec![]); }
        let start = Instant::now();
        let docs = self.store.all().map_err(|e| match e { Error::RetrievalUnavailable(_) => e, other => Error::retrieval(other) })?;
        let mut hits = Vec::new();
        let mut scanned = 0usize;
        for doc in docs.iter().filter(|d| category.map_or(true, |c| d.metadata.category == c)) {
            if start.elapsed() > self.budget {
                tracing::warn!("Lexical scan exceeded {:?} after {} documents; remaining documents excluded", self.budget, scanned);
                break;
            }
            scanned += 1;
            let score = self.scorer.score(query, &doc.content);
            if score > self.threshold { hits.push(QueryResult { document: Arc::clone(doc), score }); }
        }
        tracing::debug!("Scanned {} documents for {:?}: {} above threshold", scanned, query, hits.len());
        Ok(rank(hits, k))
    }

    fn browse(&self, category: Category, k: usize) -> Result<Vec<QueryResult>> { browse_documents(&self.store, category, k) }

    fn add(&self, content: &str, meta: &Meta) -> Result<DocId> { self.store.add(NewDocument::from_meta(content, meta)?) }

    fn stats(&self) -> Result<CollectionStats> { self.store.stats() }
}

/// Embedding engine: delegates scoring to the LanceDB cosine search.
pub struct VectorEngine {
    store: LanceStore,
}

impl VectorEngine {
    pub fn new(store: LanceStore) -> Self { Self { store } }

    /// Load the embedder, open the persisted store and seed it if empty.
    pub fn open(settings: &Settings) -> Result<Self> {
        let embedder = load_embedder(&settings.embedding).map_err(Error::store)?;
        let store = LanceStore::open(settings, embedder)?;
        store.initialize()?;
        Ok(Self { store })
    }

    pub fn store(&self) -> &LanceStore { &self.store }
}

impl Retriever for VectorEngine {
    fn query(&self, query: &str, k: usize, category: Option<Category>) -> Result<Vec<QueryResult>> {
        Ok(rank(self.store.search(query, k, category)?, k))
    }

    fn browse(&self, category: Category, k: usize) -> Result<Vec<QueryResult>> { browse_documents(&self.store, category, k) }

    fn add(&self, content: &str, meta: &Meta) -> Result<DocId> { self.store.add(NewDocument::from_meta(content, meta)?) }

    fn stats(&self) -> Result<CollectionStats> { self.store.stats() }
}

/// Last tier: nothing to retrieve from.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRetriever;

impl Retriever for NoopRetriever {
    fn query(&self, _query: &str, _k: usize, _category: Option<Category>) -> Result<Vec<QueryResult>> { Ok(vec![]) }

    fn browse(&self, _category: Category, _k: usize) -> Result<Vec<QueryResult>> { Ok(vec![]) }

    fn add(&self, _content: &str, _meta: &Meta) -> Result<DocId> { Err(Error::StoreUnavailable("retrieval is disabled".into())) }

    fn stats(&self) -> Result<CollectionStats> { Ok(CollectionStats::default()) }
}
