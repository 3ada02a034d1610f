//! rag-lexical
//!
//! Model-free retrieval pieces: a Jaccard word-overlap scorer and an in-memory
//! document store seeded from the built-in corpus.

pub mod jaccard;
pub mod store;

pub use jaccard::{tokenize, JaccardScorer};
pub use store::MemoryStore;
