use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rag_core::config::Settings;
use rag_core::{Category, DocumentStore, Embedder, Error, Meta, NewDocument};
use rag_embed::HashEmbedder;
use rag_vector::LanceStore;
use tempfile::TempDir;

fn settings_in(tmp: &TempDir) -> Settings {
    let mut s = Settings::default();
    s.store.persist_dir = tmp.path().join("lancedb").to_string_lossy().to_string();
    s.store.table = "kb_test".into();
    s
}

fn open(settings: &Settings) -> LanceStore {
    let store = LanceStore::open(settings, Arc::new(HashEmbedder::default())).expect("open store");
    store.initialize().expect("initialize");
    store
}

fn meta(pairs: &[(&str, &str)]) -> Meta {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[test]
fn seeding_is_idempotent_across_restarts() {
    let tmp = TempDir::new().unwrap();
    let settings = settings_in(&tmp);
    {
        let store = open(&settings);
        assert_eq!(store.count().unwrap(), 15);
        store.initialize().unwrap();
        assert_eq!(store.count().unwrap(), 15);
        assert_eq!(store.recorded_embedder().unwrap().as_deref(), Some("hash:xxh64:d384"));
    }
    let reopened = open(&settings);
    assert_eq!(reopened.count().unwrap(), 15);
    let all = reopened.all().unwrap();
    assert_eq!(all[0].id.as_str(), "oracle_doc_0");
    assert_eq!(all[14].id.as_str(), "oracle_doc_14");
    let stats = reopened.stats().unwrap();
    assert_eq!(stats.total_documents, 15);
    assert_eq!(stats.category_count(Category::Performance), 4);
    assert_eq!(stats.categories.values().sum::<usize>(), stats.topics.values().sum::<usize>());
}

#[test]
fn search_is_bounded_ordered_and_filtered() {
    let tmp = TempDir::new().unwrap();
    let store = open(&settings_in(&tmp));

    let results = store.search("index lent performance", 3, None).unwrap();
    assert!(results.len() <= 3);
    for w in results.windows(2) { assert!(w[0].score >= w[1].score); }
    assert!(results.iter().all(|r| (0.0..=1.0).contains(&r.score)));

    let backup = store.search("stratégie de sauvegarde", 5, Some(Category::Backup)).unwrap();
    assert_eq!(backup.len(), 2, "only two backup documents exist");
    assert!(backup.iter().all(|r| r.category() == Category::Backup));

    assert!(store.search("anything", 0, None).unwrap().is_empty());
    assert!(store.search("anything", 5, Some(Category::Test)).unwrap().is_empty());
}

#[test]
fn empty_query_returns_zero_scored_documents() {
    let tmp = TempDir::new().unwrap();
    let store = open(&settings_in(&tmp));
    let results = store.search("", 3, None).unwrap();
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.score == 0.0));
}

#[test]
fn added_document_is_found_and_persisted() {
    let tmp = TempDir::new().unwrap();
    let settings = settings_in(&tmp);
    let marker = "kestrel zephyr quokka marker document";
    let id = {
        let store = open(&settings);
        let mut m = meta(&[("category", "test"), ("topic", "marker"), ("added_date", "2026-10-16")]);
        m.insert("severity".into(), "LOW".into());
        let id = store.add(NewDocument::from_meta(marker, &m).unwrap()).unwrap();
        let hits = store.search(marker, 5, None).unwrap();
        assert_eq!(hits[0].document.id, id);
        assert!(hits[0].score > 0.99);
        id
    };
    let store = open(&settings);
    assert_eq!(store.count().unwrap(), 16);
    let doc = store.all().unwrap().into_iter().find(|d| d.id == id).expect("persisted");
    assert_eq!(doc.metadata.topic, "marker");
    assert_eq!(doc.metadata.extra.get("added_date").map(String::as_str), Some("2026-10-16"));

    let second = store.add(NewDocument::from_meta("another note", &meta(&[("category", "custom"), ("topic", "n")])).unwrap()).unwrap();
    let ids: HashSet<_> = store.all().unwrap().iter().map(|d| d.id.clone()).collect();
    assert_eq!(ids.len(), 17);
    assert!(ids.contains(&second));
}

#[test]
fn store_built_with_other_embedder_is_refused() {
    let tmp = TempDir::new().unwrap();
    let settings = settings_in(&tmp);
    drop(open(&settings));
    let err = LanceStore::open(&settings, Arc::new(HashEmbedder::new(64))).err().expect("must refuse");
    assert!(matches!(err, Error::StoreUnavailable(_)));
}

/// Hash embedder that stalls once `slow` is set, so seeding stays fast.
struct SlowEmbedder {
    inner: HashEmbedder,
    slow: AtomicBool,
}

impl Embedder for SlowEmbedder {
    fn id(&self) -> &str { self.inner.id() }
    fn dim(&self) -> usize { self.inner.dim() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if self.slow.load(Ordering::SeqCst) { std::thread::sleep(Duration::from_millis(200)); }
        self.inner.embed_batch(texts)
    }
}

#[test]
fn slow_query_embedding_times_out() {
    let tmp = TempDir::new().unwrap();
    let mut settings = settings_in(&tmp);
    settings.retrieval.timeout_ms = 10;
    let embedder = Arc::new(SlowEmbedder { inner: HashEmbedder::default(), slow: AtomicBool::new(false) });
    let store = LanceStore::open(&settings, embedder.clone()).unwrap();
    store.initialize().unwrap();
    embedder.slow.store(true, Ordering::SeqCst);
    let err = store.search("index lent performance", 3, None).unwrap_err();
    assert!(matches!(err, Error::ScorerTimeout(_)), "got {:?}", err);
    assert!(err.is_transient());
}

#[test]
fn equal_scores_keep_insertion_order() {
    let tmp = TempDir::new().unwrap();
    let store = open(&settings_in(&tmp));
    let text = "duplicated note about listener restarts";
    let ids: Vec<_> = (0..3)
        .map(|i| {
            let topic = format!("dup{}", i);
            store.add(NewDocument::from_meta(text, &meta(&[("category", "test"), ("topic", topic.as_str())])).unwrap()).unwrap()
        })
        .collect();
    let top = store.search(text, 1, Some(Category::Test)).unwrap();
    assert_eq!(top[0].document.id, ids[0]);
    let two: Vec<_> = store.search(text, 2, Some(Category::Test)).unwrap().into_iter().map(|r| r.document.id.clone()).collect();
    assert_eq!(two, ids[..2].to_vec());
}
