use std::sync::Arc;

use crate::error::Result;
use crate::types::{Category, CollectionStats, DocId, KnowledgeDocument, Meta, NewDocument, QueryResult};

pub trait Embedder: Send + Sync {
    /// Stable identifier of the model (e.g. `bert:all-MiniLM-L6-v2:d384`).
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Relevance of `document` for `query`, in `[0, 1]`. Must be side-effect free.
pub trait Scorer: Send + Sync {
    fn score(&self, query: &str, document: &str) -> f32;
}

pub trait DocumentStore: Send + Sync {
    /// Load the seed corpus if and only if the store is empty.
    fn initialize(&self) -> Result<()>;
    fn add(&self, doc: NewDocument) -> Result<DocId>;
    /// Every stored document, in insertion order.
    fn all(&self) -> Result<Vec<Arc<KnowledgeDocument>>>;

    fn stats(&self) -> Result<CollectionStats> {
        let docs = self.all()?;
        Ok(CollectionStats::from_documents(docs.iter().map(|d| d.as_ref())))
    }
}

/// What the façade talks to: one engine, whichever strategy backs it.
pub trait Retriever: Send + Sync {
    fn query(&self, query: &str, k: usize, category: Option<Category>) -> Result<Vec<QueryResult>>;
    /// First `k` documents of `category` in store order, unscored (score 0).
    fn browse(&self, category: Category, k: usize) -> Result<Vec<QueryResult>>;
    fn add(&self, content: &str, meta: &Meta) -> Result<DocId>;
    fn stats(&self) -> Result<CollectionStats>;
}

/// Text generation collaborator (an LLM behind some transport).
///
/// An `Err` is the unavailability signal; callers never inspect the adapter.
pub trait Generator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String>;
}
