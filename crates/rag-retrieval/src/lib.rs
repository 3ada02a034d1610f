//! rag-retrieval
//!
//! Retrieval engines over the knowledge stores and the `KnowledgeBase` façade that picks
//! one of them at startup.

pub mod engine;
pub mod facade;

pub use engine::{rank, NoopRetriever, ScanEngine, VectorEngine};
pub use facade::{snippet, EnhancedAnswer, ImportReport, KnowledgeBase, ProbeResult, Tier, DEFAULT_PROBE_QUERIES};
