//! The fixed seed corpus, embedded at build time from `corpus/oracle_seed.toml`.

use figment::providers::{Format, Toml};
use figment::Figment;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::{Category, DocId, DocMetadata, KnowledgeDocument, NewDocument, Severity, SEED_SOURCE};

const SEED_TOML: &str = include_str!("../corpus/oracle_seed.toml");

#[derive(Debug, Deserialize)]
struct SeedFile {
    documents: Vec<SeedEntry>,
}

#[derive(Debug, Deserialize)]
struct SeedEntry {
    category: Category,
    topic: String,
    #[serde(default)]
    severity: Severity,
    #[serde(default = "seed_source")]
    source: String,
    content: String,
}

fn seed_source() -> String { SEED_SOURCE.to_string() }

/// Parse the seed corpus and assign `oracle_doc_{i}` ids in file order.
pub fn seed_documents() -> Result<Vec<KnowledgeDocument>> {
    let file: SeedFile = Figment::from(Toml::string(SEED_TOML))
        .extract()
        .map_err(|e| Error::Validation(format!("seed corpus: {}", e)))?;
    file.documents
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let metadata = DocMetadata { category: entry.category, topic: entry.topic, severity: entry.severity, source: entry.source, extra: Default::default() };
            Ok(NewDocument::new(entry.content, metadata)?.with_id(DocId::seed(i)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CollectionStats;

    #[test]
    fn seed_corpus_has_fifteen_documents_across_six_categories() {
        let docs = seed_documents().unwrap();
        assert_eq!(docs.len(), 15);
        let stats = CollectionStats::from_documents(docs.iter());
        assert_eq!(stats.category_count(Category::Security), 3);
        assert_eq!(stats.category_count(Category::Performance), 4);
        assert_eq!(stats.category_count(Category::Backup), 2);
        assert_eq!(stats.category_count(Category::Anomaly), 3);
        assert_eq!(stats.category_count(Category::Monitoring), 2);
        assert_eq!(stats.category_count(Category::Troubleshooting), 1);
        assert_eq!(stats.categories.len(), 6);
        assert_eq!(stats.topics.values().sum::<usize>(), 15);
    }

    #[test]
    fn seed_ids_and_sources_are_stable() {
        let docs = seed_documents().unwrap();
        assert_eq!(docs[0].id.as_str(), "oracle_doc_0");
        assert_eq!(docs[0].metadata.topic, "password_policy");
        assert_eq!(docs[0].metadata.severity, Severity::Critical);
        assert_eq!(docs[14].metadata.topic, "blocking_sessions");
        assert!(docs.iter().all(|d| d.metadata.source == "oracle_internal"));
        assert!(docs[0].content.starts_with("ORACLE BEST PRACTICE"));
    }
}
