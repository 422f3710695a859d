//! Deterministic corpora and engine fixtures.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use latticedb::{Chunk, EngineConfig, IngestRequest, Sha256Hash, SourceMeta};

/// The reference configuration used by the seed scenarios: d=4, k=2, and
/// the default weights (1.0, 0.5, 4.0) with tol=1e-6.
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::new(4, latticedb::model_fingerprint("testkit-embedder@1"))
        .expect("reference config is valid");
    config.k_neighbors = 2;
    config
}

/// The reference 6-chunk, d=4 corpus.
pub fn tiny_corpus() -> IngestRequest {
    ingest_request(
        "tiny-corpus",
        vec![
            vec![1.0, 0.1, 0.0, 0.0],
            vec![0.9, 0.2, 0.1, 0.0],
            vec![0.1, 1.0, 0.1, 0.0],
            vec![0.0, 0.9, 0.2, 0.1],
            vec![0.1, 0.0, 1.0, 0.2],
            vec![0.0, 0.1, 0.9, 0.3],
        ],
    )
}

/// Build an ingest request for a named corpus with the given vectors.
pub fn ingest_request(name: &str, vectors: Vec<Vec<f32>>) -> IngestRequest {
    let chunks = (0..vectors.len())
        .map(|i| Chunk {
            text: format!("{name} chunk {i}"),
            byte_start: (i * 100) as u64,
            byte_end: (i * 100 + 80) as u64,
        })
        .collect();
    IngestRequest {
        group_id: None,
        chunks,
        vectors,
        source: SourceMeta {
            source_file: format!("{name}.txt"),
            file_bytes: 4096,
            file_sha256: Sha256Hash::hash(name.as_bytes()),
        },
        acl: None,
        display_name: None,
    }
}

/// Seeded random vectors: the same seed always yields the same corpus.
pub fn seeded_vectors(seed: u64, n: usize, dim: usize) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect())
        .collect()
}
