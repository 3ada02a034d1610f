use std::time::Duration;

use rag_core::config::Settings;
use rag_core::{Category, DocumentStore, Meta, Retriever, Scorer};
use rag_lexical::{JaccardScorer, MemoryStore};
use rag_retrieval::ScanEngine;

fn meta(pairs: &[(&str, &str)]) -> Meta {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn engine() -> ScanEngine<MemoryStore, JaccardScorer> { ScanEngine::lexical(&Settings::default()).unwrap() }

#[test]
fn results_are_ordered_bounded_and_above_threshold() {
    let engine = engine();
    let seed_text = engine.store().all().unwrap()[3].content.clone();
    let half: String = seed_text.chars().take(seed_text.chars().count() / 2).collect();
    let overlap = format!("{} RMAN backup", half);
    for q in ["index lent performance", "backup RMAN stratégie", seed_text.as_str(), overlap.as_str(), ""] {
        for k in [0usize, 1, 3, 50] {
            let results = engine.query(q, k, None).unwrap();
            assert!(results.len() <= k);
            for w in results.windows(2) { assert!(w[0].score >= w[1].score); }
            assert!(results.iter().all(|r| r.score > 0.1 && r.score <= 1.0));
        }
    }
}

#[test]
fn empty_query_yields_nothing() {
    assert!(engine().query("", 5, None).unwrap().is_empty());
}

#[test]
fn category_filter_is_respected() {
    let engine = engine();
    let backup = engine.store().all().unwrap().into_iter().find(|d| d.metadata.category == Category::Backup).unwrap();
    let q = backup.content.as_str();
    let results = engine.query(q, 10, Some(Category::Backup)).unwrap();
    assert_eq!(results[0].document.id, backup.id);
    assert!(results.iter().all(|r| r.category() == Category::Backup));
    assert!(engine.query(q, 10, Some(Category::Custom)).unwrap().is_empty());
    let unfiltered = engine.query(q, 10, None).unwrap();
    assert!(unfiltered.len() >= results.len());
}

#[test]
fn added_document_is_found_by_its_own_text() {
    let engine = engine();
    let text = "rotation des journaux listener chaque semaine";
    let id = engine.add(text, &meta(&[("category", "test"), ("topic", "listener_logs")])).unwrap();
    let results = engine.query(text, 5, None).unwrap();
    assert_eq!(results[0].document.id, id);
    assert!((results[0].score - 1.0).abs() < 1e-6);
    let filtered = engine.query(text, 5, Some(Category::Test)).unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(engine.stats().unwrap().total_documents, 16);
}

#[test]
fn ties_keep_store_order() {
    let engine = engine();
    let a = engine.add("alpha beta", &meta(&[("category", "test"), ("topic", "first")])).unwrap();
    let b = engine.add("alpha beta", &meta(&[("category", "test"), ("topic", "second")])).unwrap();
    let results = engine.query("alpha beta", 2, Some(Category::Test)).unwrap();
    assert_eq!(results[0].document.id, a);
    assert_eq!(results[1].document.id, b);
}

struct SlowScorer;

impl Scorer for SlowScorer {
    fn score(&self, _query: &str, _document: &str) -> f32 {
        std::thread::sleep(Duration::from_millis(20));
        0.9
    }
}

#[test]
fn scan_stops_at_the_time_budget() {
    let store = MemoryStore::seeded().unwrap();
    let engine = ScanEngine::new(store, SlowScorer, 0.1, Duration::from_millis(50)).unwrap();
    let results = engine.query("anything", 15, None).unwrap();
    assert!(!results.is_empty());
    assert!(results.len() < 15, "late documents are excluded, got {}", results.len());
}

#[test]
fn lower_threshold_admits_more_documents() {
    let strict = engine();
    let loose = ScanEngine::new(MemoryStore::seeded().unwrap(), JaccardScorer, 0.0, Duration::from_secs(5)).unwrap();
    let q = "configuration audit Oracle";
    assert!(loose.query(q, 15, None).unwrap().len() >= strict.query(q, 15, None).unwrap().len());
}
