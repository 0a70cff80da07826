use std::collections::HashMap;
use std::fs;

use context_assembly::assembly::{AssemblyError, ContextAssembler};
use context_assembly::embedding::{Embedding, EmbeddingError, EmbeddingProvider};
use context_assembly::retrieval::{FlushPolicy, InMemoryStore, NeighborStore, RetrievalCache, RetrievalError};
use context_assembly::types::{CacheKey, Dataset, FieldNames, InMemoryDataset, RetrievalData};
use tempfile::tempdir;

struct TableEmbedder {
    table: HashMap<&'static str, Embedding>,
}

impl EmbeddingProvider for TableEmbedder {
    fn model_name(&self) -> &str {
        "table"
    }

    fn embed(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        texts
            .iter()
            .map(|t| {
                self.table
                    .get(t)
                    .cloned()
                    .ok_or_else(|| EmbeddingError::Backend(format!("no vector for {t:?}")))
            })
            .collect()
    }
}

/// Fails every call; proves a code path never re-encodes.
struct UnreachableEmbedder;

impl EmbeddingProvider for UnreachableEmbedder {
    fn model_name(&self) -> &str {
        "table"
    }

    fn embed(&self, _texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        Err(EmbeddingError::Backend("embedder must not be called".into()))
    }
}

fn embedder() -> TableEmbedder {
    let table = vec![
        ("a", vec![1.0, 0.0, 0.0]),
        ("b", vec![0.0, 1.0, 0.0]),
        ("c", vec![0.0, 0.0, 1.0]),
        ("bc", vec![0.0, 0.8, 0.6]),
        ("ca", vec![0.6, 0.0, 0.8]),
    ];
    TableEmbedder {
        table: table.into_iter().collect(),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn dataset(fields: FieldNames) -> InMemoryDataset {
    let data = RetrievalData {
        queries: strings(&["a", "bc", "ca"]),
        texts: vec![
            strings(&["a", "b", "c"]),
            strings(&["a", "b", "c"]),
            strings(&["a", "b", "c"]),
        ],
        ground_truths: vec![
            strings(&["a", "gt b", "gt c"]),
            strings(&["gt a", "gt b", "gt c"]),
            strings(&["gt a", "gt b", "gt c"]),
        ],
    };
    InMemoryDataset::new("toy", fields, data)
}

#[test]
fn k_zero_returns_one_empty_entry_per_query_without_ranking() {
    let ds = dataset(FieldNames::with_ground_truth("text", "output"));
    let data = ds.retrieval_data().clone();
    let mut assembler = ContextAssembler::new(UnreachableEmbedder, ds, InMemoryStore::new());

    let out = assembler
        .get_context(&data.queries, &data.texts, &data.ground_truths, 0)
        .unwrap();

    assert_eq!(out.len(), 3);
    assert!(out.iter().all(|examples| examples.is_empty()));
    assert!(out.iter().all(|examples| examples.join("\n").is_empty()));
    assert!(assembler.store().is_empty());
}

#[test]
fn exact_match_first_and_ground_truth_line_suppressed() {
    let ds = dataset(FieldNames::with_ground_truth("text", "output"));
    let mut assembler = ContextAssembler::new(embedder(), ds, InMemoryStore::new());

    let queries = strings(&["a"]);
    let texts = vec![strings(&["a", "b", "c"])];
    let gts = vec![strings(&["a", "gt b", "gt c"])];
    let out = assembler.get_context(&queries, &texts, &gts, 2).unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].len(), 2);
    assert_eq!(out[0][0], "Text:\na");
    assert_eq!(out[0][1], "Text:\nb\nOutput:\ngt b");
}

#[test]
fn k_larger_than_pool_returns_whole_pool() {
    let ds = dataset(FieldNames::with_ground_truth("text", "output"));
    let mut assembler = ContextAssembler::new(embedder(), ds, InMemoryStore::new());

    let out = assembler.get_dataset_context(10).unwrap();

    assert!(out.iter().all(|examples| examples.len() == 3));
    // "bc" is closest to b, then c, then a.
    assert_eq!(
        out[1],
        vec![
            "Text:\nb\nOutput:\ngt b".to_string(),
            "Text:\nc\nOutput:\ngt c".to_string(),
            "Text:\na\nOutput:\ngt a".to_string(),
        ]
    );
}

#[test]
fn prompt_only_dataset_shows_text_only() {
    let ds = dataset(FieldNames::prompt_only("review"));
    let mut assembler = ContextAssembler::new(embedder(), ds, InMemoryStore::new());

    let out = assembler.get_dataset_context(1).unwrap();

    assert_eq!(out[2], vec!["Review:\nc".to_string()]);
}

#[test]
fn rated_dataset_appends_rating_line() {
    let ds = dataset(FieldNames::with_rating("text", "summary", "score")).with_ratings(vec![
        strings(&["1", "2", "3"]),
        strings(&["4", "5", "1"]),
        strings(&["2", "2", "2"]),
    ]);
    let mut assembler = ContextAssembler::new(embedder(), ds, InMemoryStore::new());

    let out = assembler.get_dataset_context(1).unwrap();

    assert_eq!(out[1], vec!["Text:\nb\nSummary:\ngt b\nScore:\n5".to_string()]);
    assert_eq!(out[2], vec!["Text:\nc\nSummary:\ngt c\nScore:\n2".to_string()]);
}

#[test]
fn rated_dataset_without_ratings_is_an_error() {
    let ds = dataset(FieldNames::with_rating("text", "summary", "score"));
    let mut assembler = ContextAssembler::new(embedder(), ds, InMemoryStore::new());

    let result = assembler.get_dataset_context(1);

    assert!(matches!(result, Err(AssemblyError::MissingRating { subject: 1, .. })));
}

#[test]
fn repeated_calls_on_populated_cache_are_byte_identical() {
    let dir = tempdir().unwrap();
    let ds = dataset(FieldNames::with_ground_truth("text", "output"));
    let mut assembler =
        ContextAssembler::with_cache(embedder(), ds, dir.path(), FlushPolicy::default()).unwrap();

    let first = assembler.get_dataset_context(2).unwrap();
    let second = assembler.get_dataset_context(2).unwrap();

    assert_eq!(first, second);
    assert_eq!(assembler.store().len(), 3);
}

#[test]
fn cold_and_warm_rankings_agree() {
    let dir = tempdir().unwrap();
    let key = CacheKey::new("toy", "table");

    let cold = {
        let ds = dataset(FieldNames::with_ground_truth("text", "output"));
        let mut assembler =
            ContextAssembler::with_cache(embedder(), ds, dir.path(), FlushPolicy::default()).unwrap();
        assembler.get_dataset_context(3).unwrap()
    };

    let cache = RetrievalCache::open(dir.path(), &key, FlushPolicy::default()).unwrap();
    assert_eq!(cache.len(), 3, "final flush should persist every computed ranking");

    let ds = dataset(FieldNames::with_ground_truth("text", "output"));
    let mut warm_assembler = ContextAssembler::new(UnreachableEmbedder, ds, cache);
    let warm = warm_assembler.get_dataset_context(3).unwrap();

    assert_eq!(cold, warm);
}

#[test]
fn cache_and_memory_store_agree() {
    let dir = tempdir().unwrap();

    let ds = dataset(FieldNames::with_ground_truth("text", "output"));
    let mut in_memory = ContextAssembler::new(embedder(), ds, InMemoryStore::new());
    let ds = dataset(FieldNames::with_ground_truth("text", "output"));
    let mut on_disk =
        ContextAssembler::with_cache(embedder(), ds, dir.path(), FlushPolicy::default()).unwrap();

    assert_eq!(
        in_memory.get_dataset_context(2).unwrap(),
        on_disk.get_dataset_context(2).unwrap()
    );
    assert_eq!(in_memory.store().entries(), on_disk.store().entries());
}

#[test]
fn artifact_holds_sorted_indices_per_query() {
    let dir = tempdir().unwrap();
    let ds = dataset(FieldNames::with_ground_truth("text", "output"));
    let mut assembler =
        ContextAssembler::with_cache(embedder(), ds, dir.path(), FlushPolicy::default()).unwrap();

    assembler.get_dataset_context(1).unwrap();

    let path = dir.path().join("retrieval_res").join("toy_table.json");
    let raw = fs::read_to_string(path).unwrap();
    assert_eq!(raw, "[[0,1,2],[1,2,0],[2,0,1]]");
}

#[test]
fn cached_rankings_are_reused_by_position() {
    let ds = dataset(FieldNames::with_ground_truth("text", "output"));
    let mut store = InMemoryStore::new();
    store.append(vec![2, 1, 0]).unwrap();

    let mut assembler = ContextAssembler::new(embedder(), ds, store);
    let out = assembler.get_dataset_context(1).unwrap();

    // Position 0 comes from the store even though "a" would rank itself first.
    assert_eq!(out[0], vec!["Text:\nc\nOutput:\ngt c".to_string()]);
    assert_eq!(assembler.store().len(), 3);
}

#[test]
fn out_of_range_cached_index_is_reported() {
    let ds = dataset(FieldNames::with_ground_truth("text", "output"));
    let mut store = InMemoryStore::new();
    store.append(vec![7, 0]).unwrap();

    let mut assembler = ContextAssembler::new(embedder(), ds, store);
    let result = assembler.get_dataset_context(1);

    assert!(matches!(
        result,
        Err(AssemblyError::StaleCache {
            position: 0,
            index: 7,
            available: 3
        })
    ));
}

#[test]
fn mismatched_inputs_are_rejected() {
    let ds = dataset(FieldNames::with_ground_truth("text", "output"));
    let mut assembler = ContextAssembler::new(embedder(), ds, InMemoryStore::new());

    let queries = strings(&["a", "b"]);
    let texts = vec![strings(&["a"])];
    let gts = vec![strings(&["a"])];
    let result = assembler.get_context(&queries, &texts, &gts, 1);

    assert!(matches!(result, Err(AssemblyError::LengthMismatch { left: 2, right: 1, .. })));
}

#[test]
fn subject_without_documents_fails_explicitly() {
    let ds = dataset(FieldNames::with_ground_truth("text", "output"));
    let mut assembler = ContextAssembler::new(embedder(), ds, InMemoryStore::new());

    let queries = strings(&["a"]);
    let texts: Vec<Vec<String>> = vec![Vec::new()];
    let gts: Vec<Vec<String>> = vec![Vec::new()];
    let result = assembler.get_context(&queries, &texts, &gts, 1);

    assert!(matches!(
        result,
        Err(AssemblyError::Retrieval(RetrievalError::EmptyCandidates))
    ));
}
