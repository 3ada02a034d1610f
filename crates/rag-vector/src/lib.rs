//! rag-vector
//!
//! Persistent embedding-backed knowledge store on LanceDB.

pub mod schema;
pub mod store;
pub mod table;

pub use store::LanceStore;
