//! Tests for OverlayStore
//!
//! These tests verify:
//! - Read-your-writes and delete visibility over a snapshot
//! - Delete of a missing key is NotFound and changes nothing
//! - Merged seek ordering and tombstone filtering
//! - Reserved empty value handling
//! - Snapshot error propagation
//! - Condition tracking for the commit layer
//! - Lifecycle: close, use-after-close, drop, pool reuse
//! - Scenarios hold for every buffer implementation
//! - A store over a boxed snapshot can move between threads

use std::io;
use std::sync::Arc;
use std::thread;

use overlaykv::snapshot::sstable::SSTableBuilder;
use overlaykv::snapshot::SnapshotIter;
use overlaykv::{
    BufferEntry, BufferPool, Condition, Config, MemBuffer, MemDbBuffer, MemSnapshot,
    OverlayError, OverlayStore, PendingWrite, SSTableSnapshot, Snapshot, SortedVecBuffer, Value,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup() -> (Arc<BufferPool>, Config) {
    let config = Config::default();
    let pool: Arc<BufferPool> = Arc::new(BufferPool::new(&config).unwrap());
    (pool, config)
}

fn store_over(entries: &[(&'static str, &'static str)]) -> OverlayStore<MemSnapshot> {
    store_over_with::<MemDbBuffer>(entries)
}

fn store_over_with<B: MemBuffer + Default>(
    entries: &[(&'static str, &'static str)],
) -> OverlayStore<MemSnapshot, B> {
    let config = Config::default();
    let pool: Arc<BufferPool<B>> = Arc::new(BufferPool::new(&config).unwrap());
    let snapshot: MemSnapshot = entries.iter().copied().collect();
    OverlayStore::new(snapshot, pool, &config)
}

fn scan<S: Snapshot, B: MemBuffer + Default>(
    store: &OverlayStore<S, B>,
    start: &str,
) -> Vec<(String, String)> {
    store
        .seek(start.as_bytes())
        .unwrap()
        .map(|r| {
            let (k, v) = r.unwrap();
            (
                String::from_utf8(k).unwrap(),
                String::from_utf8(v.to_vec()).unwrap(),
            )
        })
        .collect()
}

fn pairs(entries: &[(&str, &str)]) -> Vec<(String, String)> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn bytes(v: &'static str) -> Value {
    Value::from_static(v.as_bytes())
}

/// Snapshot whose backend always fails
struct FailingSnapshot;

impl Snapshot for FailingSnapshot {
    fn get(&self, _key: &[u8]) -> overlaykv::Result<Option<Value>> {
        Err(io::Error::new(io::ErrorKind::TimedOut, "backend timed out").into())
    }

    fn iter_from(&self, _start: &[u8]) -> overlaykv::Result<SnapshotIter<'_>> {
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "backend reset").into())
    }

    fn release(&mut self) {}
}

// =============================================================================
// Concrete Scenarios
// =============================================================================

fn scenario_a<B: MemBuffer + Default>() {
    let store = store_over_with::<B>(&[("a", "0"), ("b", "2")]);

    assert_eq!(scan(&store, ""), pairs(&[("a", "0"), ("b", "2")]));
}

fn scenario_b<B: MemBuffer + Default>() {
    let mut store = store_over_with::<B>(&[("a", "0"), ("b", "2")]);

    store.set(b"a", b"1").unwrap();

    assert_eq!(store.get(b"a").unwrap(), bytes("1"));
    assert_eq!(scan(&store, ""), pairs(&[("a", "1"), ("b", "2")]));
}

fn scenario_c<B: MemBuffer + Default>() {
    let mut store = store_over_with::<B>(&[("a", "0"), ("b", "2")]);
    store.set(b"a", b"1").unwrap();

    store.delete(b"b").unwrap();

    assert!(store.get(b"b").unwrap_err().is_not_found());
    assert_eq!(scan(&store, ""), pairs(&[("a", "1")]));
}

fn scenario_d<B: MemBuffer + Default>() {
    let mut store = store_over_with::<B>(&[]);

    let err = store.delete(b"x").unwrap_err();

    assert!(err.is_not_found());
    assert!(store.is_empty());
    assert_eq!(store.condition(b"x"), None);
}

fn scenario_e<B: MemBuffer + Default>() {
    let mut store = store_over_with::<B>(&[]);

    store.set(b"a", b"1").unwrap();
    store.delete(b"a").unwrap();
    store.set(b"a", b"2").unwrap();

    assert_eq!(store.get(b"a").unwrap(), bytes("2"));
    assert_eq!(scan(&store, ""), pairs(&[("a", "2")]));
}

#[test]
fn test_scenario_a_snapshot_only_seek() {
    scenario_a::<MemDbBuffer>();
    scenario_a::<SortedVecBuffer>();
}

#[test]
fn test_scenario_b_set_overrides_snapshot() {
    scenario_b::<MemDbBuffer>();
    scenario_b::<SortedVecBuffer>();
}

#[test]
fn test_scenario_c_delete_hides_snapshot_value() {
    scenario_c::<MemDbBuffer>();
    scenario_c::<SortedVecBuffer>();
}

#[test]
fn test_scenario_d_delete_missing_key() {
    scenario_d::<MemDbBuffer>();
    scenario_d::<SortedVecBuffer>();
}

#[test]
fn test_scenario_e_reinsert_after_delete() {
    scenario_e::<MemDbBuffer>();
    scenario_e::<SortedVecBuffer>();
}

// =============================================================================
// Get / Set / Delete Tests
// =============================================================================

#[test]
fn test_get_missing_key_is_not_found() {
    let store = store_over(&[("a", "0")]);

    let err = store.get(b"zzz").unwrap_err();
    assert!(matches!(err, OverlayError::NotFound));
    assert!(!store.contains_key(b"zzz").unwrap());
    assert!(store.contains_key(b"a").unwrap());
}

#[test]
fn test_set_then_get_many_keys() {
    let mut store = store_over(&[("k3", "old")]);

    for i in 0..50 {
        let key = format!("k{}", i);
        let value = format!("v{}", i);
        store.set(key.as_bytes(), value.as_bytes()).unwrap();
    }
    for i in 0..50 {
        let key = format!("k{}", i);
        assert_eq!(store.get(key.as_bytes()).unwrap(), format!("v{}", i).as_bytes());
    }
}

#[test]
fn test_delete_twice_is_not_found() {
    let mut store = store_over(&[("a", "0")]);

    store.delete(b"a").unwrap();
    let before = store.len();

    assert!(store.delete(b"a").unwrap_err().is_not_found());
    assert_eq!(store.len(), before);
}

#[test]
fn test_delete_buffer_only_key() {
    let mut store = store_over(&[]);

    store.set(b"new", b"v").unwrap();
    store.delete(b"new").unwrap();

    assert!(store.get(b"new").unwrap_err().is_not_found());
    assert!(scan(&store, "").is_empty());
}

#[test]
fn test_delete_every_snapshot_key() {
    let entries = [("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")];
    let mut store = store_over(&entries);

    for (k, _) in &entries {
        store.delete(k.as_bytes()).unwrap();
        assert!(store.get(k.as_bytes()).unwrap_err().is_not_found());
    }
    assert!(scan(&store, "").is_empty());
}

#[test]
fn test_empty_value_is_rejected() {
    let mut store = store_over(&[("a", "0")]);

    let err = store.set(b"a", b"").unwrap_err();

    assert!(matches!(err, OverlayError::InvalidArgument(_)));
    assert!(store.is_empty());
    // The committed value is still visible: nothing was deleted
    assert_eq!(store.get(b"a").unwrap(), bytes("0"));
}

#[test]
fn test_single_byte_value_is_not_a_tombstone() {
    let mut store = store_over(&[]);

    store.set(b"a", b"\0").unwrap();

    assert_eq!(store.get(b"a").unwrap(), Value::from_static(b"\0"));
    assert_eq!(scan(&store, "").len(), 1);
}

// =============================================================================
// Seek Tests
// =============================================================================

#[test]
fn test_seek_from_middle() {
    let mut store = store_over(&[("a", "0"), ("c", "2"), ("e", "4")]);
    store.set(b"b", b"1").unwrap();
    store.set(b"d", b"3").unwrap();
    store.delete(b"e").unwrap();

    assert_eq!(scan(&store, "b"), pairs(&[("b", "1"), ("c", "2"), ("d", "3")]));
    assert_eq!(scan(&store, "c"), pairs(&[("c", "2"), ("d", "3")]));
    assert!(scan(&store, "f").is_empty());
}

#[test]
fn test_seek_is_restartable_by_calling_again() {
    let mut store = store_over(&[("a", "0")]);

    let first = scan(&store, "");
    store.set(b"b", b"1").unwrap();
    let second = scan(&store, "");

    assert_eq!(first, pairs(&[("a", "0")]));
    assert_eq!(second, pairs(&[("a", "0"), ("b", "1")]));
}

// =============================================================================
// Error Propagation Tests
// =============================================================================

#[test]
fn test_snapshot_error_on_get_is_annotated() {
    let (pool, config) = setup();
    let store = OverlayStore::new(FailingSnapshot, pool, &config);

    match store.get(b"k") {
        Err(OverlayError::Backend { op, key, source }) => {
            assert_eq!(op, "get");
            assert_eq!(key, b"k".to_vec());
            assert!(matches!(*source, OverlayError::Io(ref e) if e.kind() == io::ErrorKind::TimedOut));
        }
        other => panic!("expected backend error, got {:?}", other),
    }
}

#[test]
fn test_buffered_reads_do_not_touch_failing_snapshot() {
    let (pool, config) = setup();
    let mut store = OverlayStore::new(FailingSnapshot, pool, &config);

    store.set(b"k", b"v").unwrap();

    assert_eq!(store.get(b"k").unwrap(), bytes("v"));
    store.delete(b"k").unwrap();
    assert!(store.get(b"k").unwrap_err().is_not_found());
}

#[test]
fn test_snapshot_error_on_delete_and_seek() {
    let (pool, config) = setup();
    let mut store = OverlayStore::new(FailingSnapshot, pool, &config);

    let err = store.delete(b"k").unwrap_err();
    assert!(matches!(err, OverlayError::Backend { op: "delete", .. }));
    assert!(!err.is_not_found());
    assert!(store.is_empty());

    match store.seek(b"s") {
        Err(OverlayError::Backend { op, key, .. }) => {
            assert_eq!(op, "seek");
            assert_eq!(key, b"s".to_vec());
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("seek should fail"),
    };
}

// =============================================================================
// Condition Tests
// =============================================================================

#[test]
fn test_conditions_are_recorded() {
    let mut store = store_over(&[("a", "0"), ("b", "2")]);

    store.set(b"x", b"1").unwrap();
    store
        .set_with_condition(b"y", b"1", Condition::NotExists)
        .unwrap();
    store
        .set_with_condition(b"a", b"9", Condition::Equals(bytes("0")))
        .unwrap();
    store.delete(b"b").unwrap();

    assert_eq!(store.condition(b"x"), Some(&Condition::Force));
    assert_eq!(store.condition(b"y"), Some(&Condition::NotExists));
    assert_eq!(store.condition(b"a"), Some(&Condition::Equals(bytes("0"))));
    // Delete of a committed key records the value it observed
    assert_eq!(store.condition(b"b"), Some(&Condition::Equals(bytes("2"))));
    assert_eq!(store.condition(b"untouched"), None);
}

#[test]
fn test_first_condition_wins() {
    let mut store = store_over(&[]);

    store
        .set_with_condition(b"k", b"1", Condition::NotExists)
        .unwrap();
    store.set(b"k", b"2").unwrap();
    store.delete(b"k").unwrap();

    assert_eq!(store.condition(b"k"), Some(&Condition::NotExists));
}

#[test]
fn test_pending_lists_writes_in_key_order() {
    let mut store = store_over(&[("b", "2")]);

    store.set(b"c", b"3").unwrap();
    store.delete(b"b").unwrap();
    store
        .set_with_condition(b"a", b"1", Condition::NotExists)
        .unwrap();

    let pending: Vec<PendingWrite> = store.pending().collect();
    assert_eq!(
        pending,
        vec![
            PendingWrite {
                key: b"a".to_vec(),
                entry: BufferEntry::Value(bytes("1")),
                condition: Condition::NotExists,
            },
            PendingWrite {
                key: b"b".to_vec(),
                entry: BufferEntry::Tombstone,
                condition: Condition::Equals(bytes("2")),
            },
            PendingWrite {
                key: b"c".to_vec(),
                entry: BufferEntry::Value(bytes("3")),
                condition: Condition::Force,
            },
        ]
    );
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_close_releases_snapshot_and_returns_buffer() {
    let (pool, config) = setup();
    let snapshot: MemSnapshot = [("a", "0")].into_iter().collect();
    let mut store = OverlayStore::new(snapshot, Arc::clone(&pool), &config);
    store.set(b"a", b"1").unwrap();

    store.close();

    assert!(store.is_closed());
    assert!(store.snapshot().is_released());
    assert_eq!(pool.stats().idle, 1);
}

#[test]
fn test_pool_reuse_does_not_leak_writes() {
    let (pool, config) = setup();

    let mut first = OverlayStore::new(MemSnapshot::default(), Arc::clone(&pool), &config);
    first.set(b"secret", b"1").unwrap();
    first.set(b"other", b"2").unwrap();
    first.delete(b"other").unwrap();
    first.close();

    let second = OverlayStore::new(MemSnapshot::default(), Arc::clone(&pool), &config);
    assert_eq!(pool.stats().reused, 1);
    assert!(second.is_empty());
    assert_eq!(second.buffer_size(), 0);
    assert!(second.get(b"secret").unwrap_err().is_not_found());
    assert!(scan(&second, "").is_empty());
    assert_eq!(second.pending().count(), 0);
}

#[test]
fn test_drop_without_close_returns_buffer() {
    let (pool, config) = setup();

    {
        let mut store = OverlayStore::new(MemSnapshot::default(), Arc::clone(&pool), &config);
        store.set(b"k", b"v").unwrap();
    }

    assert_eq!(pool.stats().idle, 1);
    let buffer = pool.acquire();
    assert!(overlaykv::MemBuffer::is_empty(&buffer));
}

#[test]
#[should_panic(expected = "used after close")]
fn test_get_after_close_panics() {
    let mut store = store_over(&[("a", "0")]);
    store.close();
    let _ = store.get(b"a");
}

#[test]
#[should_panic(expected = "used after close")]
fn test_set_after_close_panics() {
    let mut store = store_over(&[]);
    store.close();
    let _ = store.set(b"a", b"1");
}

#[test]
#[should_panic(expected = "used after close")]
fn test_seek_after_close_panics() {
    let mut store = store_over(&[]);
    store.close();
    let _ = store.seek(b"");
}

#[test]
#[should_panic(expected = "used after close")]
fn test_delete_after_close_panics() {
    let mut store = store_over(&[("a", "0")]);
    store.close();
    let _ = store.delete(b"a");
}

#[test]
#[should_panic(expected = "used after close")]
fn test_pending_after_close_panics() {
    let mut store = store_over(&[]);
    store.set(b"a", b"1").unwrap();
    store.close();
    let _ = store.pending().count();
}

#[test]
#[should_panic(expected = "closed twice")]
fn test_double_close_panics() {
    let mut store = store_over(&[]);
    store.close();
    store.close();
}

// =============================================================================
// SSTable-backed Overlay Tests
// =============================================================================

#[test]
fn test_overlay_over_sstable_snapshot() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("committed.sst");

    let mut builder = SSTableBuilder::new(&path).unwrap();
    for (k, v) in [("a", "0"), ("b", "2"), ("d", "4")] {
        builder.add(k.as_bytes(), v.as_bytes()).unwrap();
    }
    builder.finish().unwrap();

    let (pool, config) = setup();
    let mut store = OverlayStore::new(SSTableSnapshot::open(&path).unwrap(), pool, &config);

    store.set(b"a", b"1").unwrap();
    store.set(b"c", b"3").unwrap();
    store.delete(b"d").unwrap();

    assert_eq!(store.get(b"b").unwrap(), bytes("2"));
    assert!(store.get(b"d").unwrap_err().is_not_found());
    assert!(store.delete(b"zz").unwrap_err().is_not_found());
    assert_eq!(scan(&store, ""), pairs(&[("a", "1"), ("b", "2"), ("c", "3")]));
    assert_eq!(store.condition(b"d"), Some(&Condition::Equals(bytes("4"))));

    store.close();
    assert!(store.snapshot().is_released());
}

#[test]
fn test_boxed_snapshot_backends() {
    let (pool, config) = setup();
    let snapshot: Box<dyn Snapshot> =
        Box::new([("a", "0")].into_iter().collect::<MemSnapshot>());
    let mut store = OverlayStore::new(snapshot, pool, &config);

    store.set(b"b", b"1").unwrap();
    assert_eq!(scan(&store, ""), pairs(&[("a", "0"), ("b", "1")]));
    store.close();
}

#[test]
fn test_boxed_snapshot_store_moves_to_another_thread() {
    let (pool, config) = setup();
    let snapshot: Box<dyn Snapshot> =
        Box::new([("a", "0")].into_iter().collect::<MemSnapshot>());
    let mut store = OverlayStore::new(snapshot, Arc::clone(&pool), &config);
    store.set(b"b", b"1").unwrap();

    let worker = thread::spawn(move || {
        store.set(b"c", b"2").unwrap();
        let visible = scan(&store, "");
        store.close();
        visible
    });

    assert_eq!(
        worker.join().unwrap(),
        pairs(&[("a", "0"), ("b", "1"), ("c", "2")])
    );
    assert_eq!(pool.stats().idle, 1);
}
