//! Domain types shared by the stores, engines and the façade.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Loose key/value metadata as supplied by callers of `add`.
pub type Meta = HashMap<String, String>;

pub const DEFAULT_SOURCE: &str = "custom";
pub const SEED_SOURCE: &str = "oracle_internal";

/// Closed set of knowledge categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Security,
    Performance,
    Backup,
    Anomaly,
    Monitoring,
    Troubleshooting,
    Custom,
    Test,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Security,
        Category::Performance,
        Category::Backup,
        Category::Anomaly,
        Category::Monitoring,
        Category::Troubleshooting,
        Category::Custom,
        Category::Test,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Security => "security",
            Category::Performance => "performance",
            Category::Backup => "backup",
            Category::Anomaly => "anomaly",
            Category::Monitoring => "monitoring",
            Category::Troubleshooting => "troubleshooting",
            Category::Custom => "custom",
            Category::Test => "test",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| Error::Validation(format!("unknown category '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    #[default]
    Info,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Info => "INFO",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => Ok(Severity::Critical),
            "HIGH" => Ok(Severity::High),
            "MEDIUM" => Ok(Severity::Medium),
            "LOW" => Ok(Severity::Low),
            "INFO" => Ok(Severity::Info),
            _ => Err(Error::Validation(format!("unknown severity '{}'", s))),
        }
    }
}

/// Stable document identifier, assigned once at insertion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    /// Identifier of the `index`-th seed corpus entry.
    pub fn seed(index: usize) -> Self { Self(format!("oracle_doc_{}", index)) }

    /// Identifier of a user-added document. `seq` is the store size after insertion;
    /// the content hash suffix keeps ids distinct even if two stores race on `seq`.
    pub fn custom(seq: usize, content: &str) -> Self {
        let hash = blake3::hash(content.as_bytes()).to_hex();
        Self(format!("custom_doc_{}_{}", seq, &hash.as_str()[..8]))
    }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<String> for DocId {
    fn from(s: String) -> Self { Self(s) }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Structured metadata every stored document carries.
///
/// `extra` holds any additional caller-supplied keys (e.g. `added_date`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocMetadata {
    pub category: Category,
    pub topic: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

fn default_source() -> String { DEFAULT_SOURCE.to_string() }

impl DocMetadata {
    pub fn new(category: Category, topic: impl Into<String>) -> Self {
        Self { category, topic: topic.into(), severity: Severity::Info, source: default_source(), extra: BTreeMap::new() }
    }

    /// Validate loose metadata: `category` and `topic` are required, `severity`
    /// defaults to INFO and `source` to "custom". Other keys land in `extra`.
    pub fn from_meta(meta: &Meta) -> Result<Self> {
        let category = meta
            .get("category")
            .ok_or_else(|| Error::Validation("metadata is missing 'category'".into()))?
            .parse::<Category>()?;
        let topic = meta
            .get("topic")
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Validation("metadata is missing 'topic'".into()))?
            .to_string();
        let severity = match meta.get("severity") { Some(s) => s.parse()?, None => Severity::Info };
        let source = meta.get("source").cloned().filter(|s| !s.trim().is_empty()).unwrap_or_else(default_source);
        let extra = meta
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "category" | "topic" | "severity" | "source"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Self { category, topic, severity, source, extra })
    }
}

/// A validated document that has not been assigned an id yet.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub content: String,
    pub metadata: DocMetadata,
}

impl NewDocument {
    pub fn new(content: impl Into<String>, metadata: DocMetadata) -> Result<Self> {
        let content = content.into();
        if content.trim().is_empty() { return Err(Error::Validation("content must not be empty".into())); }
        if metadata.topic.trim().is_empty() { return Err(Error::Validation("topic must not be empty".into())); }
        Ok(Self { content, metadata })
    }

    pub fn from_meta(content: impl Into<String>, meta: &Meta) -> Result<Self> {
        let content = content.into();
        if content.trim().is_empty() { return Err(Error::Validation("content must not be empty".into())); }
        Self::new(content, DocMetadata::from_meta(meta)?)
    }

    pub fn with_id(self, id: DocId) -> KnowledgeDocument {
        KnowledgeDocument { id, content: self.content, metadata: self.metadata }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub id: DocId,
    pub content: String,
    pub metadata: DocMetadata,
}

/// One ranked hit. `document` is shared with the store, never copied out of it.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    #[serde(flatten)]
    pub document: Arc<KnowledgeDocument>,
    pub score: f32,
}

impl QueryResult {
    pub fn topic(&self) -> &str { &self.document.metadata.topic }
    pub fn category(&self) -> Category { self.document.metadata.category }
}

/// Aggregate counts, always derived from the current store contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    pub total_documents: usize,
    pub categories: BTreeMap<String, usize>,
    pub topics: BTreeMap<String, usize>,
}

impl CollectionStats {
    pub fn from_documents<'a, I>(docs: I) -> Self
    where
        I: IntoIterator<Item = &'a KnowledgeDocument>,
    {
        let mut stats = Self::default();
        for doc in docs {
            stats.total_documents += 1;
            *stats.categories.entry(doc.metadata.category.to_string()).or_default() += 1;
            *stats.topics.entry(doc.metadata.topic.clone()).or_default() += 1;
        }
        stats
    }

    pub fn category_count(&self, category: Category) -> usize {
        self.categories.get(category.as_str()).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, &str)]) -> Meta {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn metadata_defaults_severity_and_source() {
        let m = DocMetadata::from_meta(&meta(&[("category", "custom"), ("topic", "t1")])).unwrap();
        assert_eq!(m.severity, Severity::Info);
        assert_eq!(m.source, "custom");
        assert!(m.extra.is_empty());
    }

    #[test]
    fn metadata_requires_category_and_topic() {
        assert!(matches!(DocMetadata::from_meta(&meta(&[("topic", "t1")])), Err(Error::Validation(_))));
        assert!(matches!(DocMetadata::from_meta(&meta(&[("category", "backup")])), Err(Error::Validation(_))));
        assert!(matches!(DocMetadata::from_meta(&meta(&[("category", "weather"), ("topic", "x")])), Err(Error::Validation(_))));
    }

    #[test]
    fn metadata_keeps_extra_keys() {
        let m = DocMetadata::from_meta(&meta(&[("category", "Test"), ("topic", "t"), ("severity", "high"), ("added_date", "2026-10-16")])).unwrap();
        assert_eq!(m.category, Category::Test);
        assert_eq!(m.severity, Severity::High);
        assert_eq!(m.extra.get("added_date").map(String::as_str), Some("2026-10-16"));
    }

    #[test]
    fn empty_content_is_rejected() {
        let err = NewDocument::from_meta("   ", &meta(&[("category", "custom"), ("topic", "t")])).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn custom_ids_differ_by_sequence_and_content() {
        assert_ne!(DocId::custom(16, "a"), DocId::custom(17, "a"));
        assert_ne!(DocId::custom(16, "a"), DocId::custom(16, "b"));
        assert!(DocId::custom(16, "a").as_str().starts_with("custom_doc_16_"));
        assert_eq!(DocId::seed(3).as_str(), "oracle_doc_3");
    }

    #[test]
    fn query_result_serializes_flat() {
        let doc = NewDocument::new("body", DocMetadata::new(Category::Backup, "rman")).unwrap().with_id(DocId::seed(0));
        let v = serde_json::to_value(QueryResult { document: Arc::new(doc), score: 0.5 }).unwrap();
        assert_eq!(v["content"], "body");
        assert_eq!(v["metadata"]["category"], "backup");
        assert_eq!(v["metadata"]["severity"], "INFO");
        assert_eq!(v["score"], 0.5);
    }
}
