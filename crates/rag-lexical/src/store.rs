use std::sync::{Arc, RwLock};

use rag_core::corpus::seed_documents;
use rag_core::error::{Error, Result};
use rag_core::traits::DocumentStore;
use rag_core::types::{DocId, KnowledgeDocument, NewDocument};

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
	docs: RwLock<Vec<Arc<KnowledgeDocument>>>,
}

impl MemoryStore {
	pub fn new() -> Self { Self::default() }

	/// A store already holding the seed corpus.
	pub fn seeded() -> Result<Self> {
		let store = Self::new();
		store.initialize()?;
		Ok(store)
	}

	pub fn len(&self) -> usize { self.docs.read().map(|d| d.len()).unwrap_or(0) }

	pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl DocumentStore for MemoryStore {
	fn initialize(&self) -> Result<()> {
		let mut docs = self.docs.write().map_err(Error::store)?;
		if !docs.is_empty() { tracing::debug!("Memory store already holds {} documents, skipping seed", docs.len()); return Ok(()); }
		let seed = seed_documents()?;
		tracing::info!("Seeding memory store with {} documents", seed.len());
		docs.extend(seed.into_iter().map(Arc::new));
		Ok(())
	}

	fn add(&self, doc: NewDocument) -> Result<DocId> {
		let mut docs = self.docs.write().map_err(Error::store)?;
		let id = DocId::custom(docs.len() + 1, &doc.content);
		tracing::info!("Adding document {} ({}/{})", id, doc.metadata.category, doc.metadata.topic);
		docs.push(Arc::new(doc.with_id(id.clone())));
		Ok(id)
	}

	fn all(&self) -> Result<Vec<Arc<KnowledgeDocument>>> {
		Ok(self.docs.read().map_err(Error::retrieval)?.clone())
	}
}
