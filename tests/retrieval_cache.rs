use std::fs;

use context_assembly::retrieval::{CacheError, FlushPolicy, NeighborStore, RetrievalCache, WriteMode};
use context_assembly::types::CacheKey;
use tempfile::tempdir;

fn read_entries(path: &std::path::Path) -> Vec<Vec<usize>> {
    let raw = fs::read_to_string(path).unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[test]
fn missing_artifact_is_a_cold_start() {
    let dir = tempdir().unwrap();
    let key = CacheKey::new("lamp_4_dev", "contriever");

    let cache = RetrievalCache::open(dir.path(), &key, FlushPolicy::default()).unwrap();

    assert!(cache.is_empty());
    assert!(!cache.is_dirty());
    assert!(!cache.path().exists());
    assert_eq!(cache.path(), dir.path().join("retrieval_res").join("lamp_4_dev_contriever.json"));
}

#[test]
fn flush_writes_a_json_array_of_index_arrays() {
    let dir = tempdir().unwrap();
    let key = CacheKey::new("amazon", "dpr");
    let mut cache = RetrievalCache::open(dir.path(), &key, FlushPolicy::default()).unwrap();

    cache.append(vec![2, 0, 1]).unwrap();
    cache.append(vec![0]).unwrap();
    assert!(cache.is_dirty());
    cache.flush().unwrap();
    assert!(!cache.is_dirty());

    let raw = fs::read_to_string(cache.path()).unwrap();
    assert_eq!(raw, "[[2,0,1],[0]]");
}

#[test]
fn reopened_cache_serves_stored_lists_by_position() {
    let dir = tempdir().unwrap();
    let key = CacheKey::new("amazon", "dpr");
    {
        let mut cache = RetrievalCache::open(dir.path(), &key, FlushPolicy::default()).unwrap();
        cache.append(vec![1, 0]).unwrap();
        cache.append(vec![0, 2, 1]).unwrap();
        cache.flush().unwrap();
    }

    let cache = RetrievalCache::open(dir.path(), &key, FlushPolicy::default()).unwrap();
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get(0), Some(&[1, 0][..]));
    assert_eq!(cache.get(1), Some(&[0, 2, 1][..]));
    assert_eq!(cache.get(2), None);
}

#[test]
fn periodic_flush_loses_only_the_unflushed_tail() {
    let dir = tempdir().unwrap();
    let key = CacheKey::new("periodic", "m");
    let policy = FlushPolicy {
        flush_every: 2,
        write_mode: WriteMode::Overwrite,
    };

    let mut cache = RetrievalCache::open(dir.path(), &key, policy).unwrap();
    cache.append(vec![0]).unwrap();
    assert!(!cache.path().exists());

    cache.append(vec![1]).unwrap();
    assert_eq!(read_entries(cache.path()), vec![vec![0], vec![1]]);

    cache.append(vec![2]).unwrap();
    assert!(cache.is_dirty());
    drop(cache);

    // Simulated crash: the third list never reached disk.
    let reopened = RetrievalCache::open(dir.path(), &key, policy).unwrap();
    assert_eq!(reopened.entries(), &[vec![0], vec![1]]);
}

#[test]
fn zero_flush_interval_disables_periodic_flush() {
    let dir = tempdir().unwrap();
    let key = CacheKey::new("manual", "m");
    let policy = FlushPolicy {
        flush_every: 0,
        write_mode: WriteMode::Overwrite,
    };

    let mut cache = RetrievalCache::open(dir.path(), &key, policy).unwrap();
    for i in 0..5 {
        cache.append(vec![i]).unwrap();
    }
    assert!(!cache.path().exists());
}

#[test]
fn atomic_mode_leaves_no_temp_file() {
    let dir = tempdir().unwrap();
    let key = CacheKey::new("atomic", "m");
    let policy = FlushPolicy {
        flush_every: 500,
        write_mode: WriteMode::AtomicRename,
    };

    let mut cache = RetrievalCache::open(dir.path(), &key, policy).unwrap();
    cache.append(vec![3, 1, 2, 0]).unwrap();
    cache.flush().unwrap();

    assert_eq!(read_entries(cache.path()), vec![vec![3, 1, 2, 0]]);
    let names: Vec<String> = fs::read_dir(dir.path().join("retrieval_res"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["atomic_m.json".to_string()]);
}

#[test]
fn truncated_artifact_is_fatal_on_read() {
    let dir = tempdir().unwrap();
    let key = CacheKey::new("broken", "m");
    let path = key.artifact_path(dir.path());
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "[[0,1],[2").unwrap();

    let result = RetrievalCache::open(dir.path(), &key, FlushPolicy::default());
    assert!(matches!(result, Err(CacheError::Corrupt { .. })));
}

#[test]
fn invalidate_deletes_artifact_and_memory() {
    let dir = tempdir().unwrap();
    let key = CacheKey::new("stale", "m");
    let mut cache = RetrievalCache::open(dir.path(), &key, FlushPolicy::default()).unwrap();
    cache.append(vec![0, 1]).unwrap();
    cache.flush().unwrap();
    assert!(cache.path().exists());

    cache.invalidate().unwrap();

    assert!(cache.is_empty());
    assert!(!cache.path().exists());
    let reopened = RetrievalCache::open(dir.path(), &key, FlushPolicy::default()).unwrap();
    assert!(reopened.is_empty());
}

#[test]
fn caches_are_separate_per_model() {
    let dir = tempdir().unwrap();
    let a = CacheKey::new("ds", "model-a");
    let b = CacheKey::new("ds", "model-b");

    let mut cache_a = RetrievalCache::open(dir.path(), &a, FlushPolicy::default()).unwrap();
    cache_a.append(vec![1, 0]).unwrap();
    cache_a.flush().unwrap();

    let cache_b = RetrievalCache::open(dir.path(), &b, FlushPolicy::default()).unwrap();
    assert!(cache_b.is_empty());
}
