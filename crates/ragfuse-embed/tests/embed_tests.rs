use ragfuse_core::config::VectorSettings;
use ragfuse_core::traits::Embedder;
use ragfuse_embed::{get_default_embedder, HashingEmbedder};

#[test]
fn hashing_embedder_shapes_and_determinism() {
    let embedder = get_default_embedder(&VectorSettings { dim: 1024, min_similarity: None }).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 1024, "embedding dim is 1024");

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn case_and_punctuation_do_not_change_the_embedding() {
    let e = HashingEmbedder::new(64).unwrap();
    assert_eq!(e.embed("Cat, sat!").unwrap(), e.embed("cat sat").unwrap());
}

#[test]
fn text_without_tokens_is_the_zero_vector() {
    let e = HashingEmbedder::new(16).unwrap();
    assert!(e.embed(" ... ").unwrap().iter().all(|&x| x == 0.0));
}

#[test]
fn zero_dimension_is_rejected() {
    assert!(HashingEmbedder::new(0).is_err());
}

#[test]
fn seed_changes_bucket_assignment_but_not_norm() {
    let a = HashingEmbedder::new(32).unwrap();
    let b = HashingEmbedder::new(32).unwrap().with_seed(7);
    let va = a.embed("one two three four five").unwrap();
    let vb = b.embed("one two three four five").unwrap();
    let na: f32 = va.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = vb.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((na - nb).abs() < 1e-5);
}
