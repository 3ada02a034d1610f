use rag_core::config::EmbeddingSettings;
use rag_embed::{load_embedder, HashEmbedder, MINILM_DIM};
use rag_core::traits::Embedder;

#[test]
fn fake_embedder_shapes_and_determinism() {
    // Force fake embedder to avoid loading a real model
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");

    let embedder = load_embedder(&EmbeddingSettings::default()).expect("embedder");
    assert!(embedder.id().starts_with("hash:"));
    let texts = vec!["hello world".to_string(), "Hello WORLD".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), MINILM_DIM, "embedding dim is 384");

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Case-insensitive and deterministic
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn hash_embedder_empty_text_is_zero_vector() {
    let e = HashEmbedder::new(16);
    let v = e.embed_batch(&["".to_string()]).unwrap().remove(0);
    assert_eq!(v.len(), 16);
    assert!(v.iter().all(|x| *x == 0.0));
}

#[test]
fn hash_embedder_overlap_ranks_higher() {
    let e = HashEmbedder::default();
    let vs = e.embed_batch(&["rman backup strategy".to_string(), "rman backup weekly".to_string(), "password policy audit".to_string()]).unwrap();
    let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
    assert!(dot(&vs[0], &vs[1]) > dot(&vs[0], &vs[2]));
}
