//! Chaos testing for concurrent access.
//!
//! Tests concurrent callers against one cache slot:
//! - Callers arriving during a refresh share its result
//! - Readers never observe a half-written entry
//! - A failing endpoint under load still yields the stale copy

// Chaos tests use expect/unwrap/panic for simplicity - panics are acceptable in tests
// Excessive nesting is acceptable in concurrent test code with thread spawns
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::excessive_nesting
)]

use schema_cache::{
    CacheMetadata, CacheSlot, CacheSource, FetchError, LocalStore, SchemaDocument, SchemaFetcher,
    SchemaManager, SchemaState,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

/// Slow fetcher that counts how often it is called.
struct SlowFetcher {
    calls: AtomicUsize,
    delay: Duration,
    fail: bool,
}

impl SlowFetcher {
    fn new(delay: Duration, fail: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            fail,
        })
    }
}

impl SchemaFetcher for SlowFetcher {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn fetch(&self) -> Result<SchemaDocument, FetchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        if self.fail {
            return Err(FetchError::timeout("upstream stalled"));
        }
        Ok(SchemaDocument::detect(format!(
            "type Query {{ version: Int }}\n# fetch {n}\n"
        )))
    }
}

/// Test: concurrent callers on an empty cache trigger a single fetch.
#[test]
fn test_concurrent_ensure_single_fetch() {
    let dir = TempDir::new().unwrap();
    let fetcher = SlowFetcher::new(Duration::from_millis(200), false);
    let slot = Arc::new(CacheSlot::open(dir.path()).unwrap());
    let manager = Arc::new(SchemaManager::new(slot, Arc::clone(&fetcher), 24));

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                manager.get_schema_content().unwrap()
            })
        })
        .collect();

    let documents: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    for document in &documents {
        assert_eq!(document.text(), documents[0].text());
    }
    assert_eq!(manager.state(), SchemaState::Fresh);
}

/// Test: concurrent callers with a failing endpoint all get the stale copy.
#[test]
fn test_concurrent_failures_fall_back_to_stale() {
    let dir = TempDir::new().unwrap();
    let store = LocalStore::open(dir.path()).unwrap();
    let old = SchemaDocument::detect("type Query { legacy: Int }");
    let metadata = CacheMetadata::for_document(
        &old,
        CacheSource::Remote,
        1,
        chrono::Utc::now() - chrono::Duration::hours(5),
    )
    .validated();
    store.write(&old, &metadata).unwrap();

    let fetcher = SlowFetcher::new(Duration::from_millis(100), true);
    let slot = Arc::new(CacheSlot::new(store));
    let manager = Arc::new(SchemaManager::new(slot, Arc::clone(&fetcher), 1));

    let threads = 6;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                manager.ensure_schema().unwrap()
            })
        })
        .collect();

    for handle in handles {
        let status = handle.join().unwrap();
        assert_eq!(status.state(), SchemaState::Stale);
        assert_eq!(status.document().unwrap().text(), old.text());
    }
    // Callers that missed the first flight may start another; never one each.
    assert!(fetcher.calls.load(Ordering::SeqCst) < threads);
}

/// Test: readers racing a writer only ever see complete entries.
#[test]
fn test_readers_never_see_partial_writes() {
    let dir = TempDir::new().unwrap();
    let writer_store = LocalStore::open(dir.path()).unwrap();
    let versions: Vec<SchemaDocument> = (0..20)
        .map(|i| {
            SchemaDocument::detect(format!(
                "type Query {{ v{i}: Int }}\n# {}\n",
                "x".repeat(i * 512)
            ))
        })
        .collect();
    let expected: Arc<Vec<String>> =
        Arc::new(versions.iter().map(|d| d.text().to_string()).collect());

    let first = &versions[0];
    writer_store
        .write(
            first,
            &CacheMetadata::for_document(first, CacheSource::Remote, 24, chrono::Utc::now())
                .validated(),
        )
        .unwrap();

    let done = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let path = dir.path().to_path_buf();
            let expected = Arc::clone(&expected);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let store = LocalStore::open(path).unwrap();
                let mut seen = 0;
                while !done.load(Ordering::SeqCst) {
                    if let Some((doc, meta)) = store.read().unwrap() {
                        assert!(expected.contains(&doc.text().to_string()));
                        assert!(meta.matches(&doc));
                        seen += 1;
                    }
                }
                seen
            })
        })
        .collect();

    for doc in &versions[1..] {
        let meta =
            CacheMetadata::for_document(doc, CacheSource::Remote, 24, chrono::Utc::now()).validated();
        writer_store.write(doc, &meta).unwrap();
    }
    done.store(true, Ordering::SeqCst);

    for reader in readers {
        reader.join().unwrap();
    }
    let (last, _) = writer_store.read().unwrap().unwrap();
    assert_eq!(last.text(), expected[expected.len() - 1]);
}
