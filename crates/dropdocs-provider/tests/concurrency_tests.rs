//! Remote calls from concurrent host threads never overlap.

mod common;

use std::io::Write;
use std::thread;
use std::time::Duration;

use common::TestProvider;
use dropdocs_provider::{OpenMode, ROOT_ID};

fn populated() -> TestProvider {
    let t = TestProvider::new();
    t.remote.add_folder("/docs");
    for i in 0..4 {
        t.remote.add_file(&format!("/docs/note{i}.txt"), b"note");
        t.remote.add_file(&format!("/file{i}.bin"), b"0123456789");
    }
    t.remote.set_call_delay(Duration::from_millis(5));
    t
}

#[test]
fn test_mixed_operations_are_single_flight() {
    let t = populated();

    thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..3 {
                t.provider.query_child_documents("/docs", None).unwrap();
            }
        });
        s.spawn(|| {
            for i in 0..4 {
                t.provider.query_document(&format!("/file{i}.bin"), None).unwrap();
            }
        });
        s.spawn(|| {
            t.provider.query_recent_documents(ROOT_ID, None).unwrap();
            t.provider.query_search_documents(ROOT_ID, "note", None).unwrap();
        });
        s.spawn(|| {
            let mut handle = t.provider.open_for_write("/upload.txt", OpenMode::Write).unwrap();
            handle.write_all(b"payload").unwrap();
            handle.close().unwrap();
            t.provider.open_for_read("/docs/note0.txt").unwrap();
        });
        s.spawn(|| {
            t.provider.query_roots(None).unwrap();
            t.provider.open_document_thumbnail("/file0.bin", (64, 64)).unwrap();
        });
    });

    assert!(t.remote.total_calls() > 10);
    assert_eq!(t.remote.max_in_flight(), 1);
}

#[test]
fn test_concurrent_lookups_of_uncached_documents() {
    let t = populated();

    thread::scope(|s| {
        for i in 0..4 {
            let provider = &t.provider;
            s.spawn(move || {
                provider.query_document(&format!("/docs/note{i}.txt"), None).unwrap();
            });
        }
    });

    assert_eq!(t.remote.calls("get_metadata"), 4);
    assert_eq!(t.remote.max_in_flight(), 1);
    assert_eq!(t.provider.cache_stats().entries, 4);
}

#[test]
fn test_concurrent_retrying_uploads_stay_serialized() {
    let t = populated();
    t.remote.report_stale_size(2);

    thread::scope(|s| {
        for i in 0..3 {
            let provider = &t.provider;
            s.spawn(move || {
                let mut handle = provider
                    .open_for_write(&format!("/out{i}.txt"), OpenMode::WriteTruncate)
                    .unwrap();
                handle.write_all(b"data").unwrap();
                handle.close().unwrap();
            });
        }
    });

    assert_eq!(t.remote.calls("upload"), 5);
    assert_eq!(t.remote.max_in_flight(), 1);
}
