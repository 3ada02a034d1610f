#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod corpus;
pub mod error;
pub mod importer;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::{DocumentStore, Embedder, Generator, Retriever, Scorer};
pub use types::{Category, CollectionStats, DocId, DocMetadata, KnowledgeDocument, Meta, NewDocument, QueryResult, Severity};
