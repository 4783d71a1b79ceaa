//! Concurrent access tests for write_atomic
//!
//! Readers racing with writers must only ever observe complete documents.

use depot_fs::{NormalizedPath, io};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::tempdir;

#[test]
fn test_concurrent_writes_no_corruption() {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("registry.toml");
    let path = Arc::new(NormalizedPath::new(&file_path));

    let num_threads = 8;
    let writes_per_thread = 20;
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|thread_id| {
            let path = Arc::clone(&path);
            let barrier = Arc::clone(&barrier);

            thread::spawn(move || {
                barrier.wait();

                for i in 0..writes_per_thread {
                    let content = format!("thread{}:write{}\n", thread_id, i);
                    io::write_text(&path, &content).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread should not panic");
    }

    let content = std::fs::read_to_string(&file_path).unwrap();
    assert!(
        content.starts_with("thread") && content.contains(":write"),
        "unexpected content: {content:?}"
    );
    assert_eq!(content.matches("thread").count(), 1, "interleaved writes: {content:?}");
}

#[test]
fn test_readers_never_see_partial_documents() {
    let dir = tempdir().unwrap();
    let path = Arc::new(NormalizedPath::new(dir.path().join("doc.txt")));
    let full = "x".repeat(64 * 1024);
    io::write_text(&path, &full).unwrap();

    let barrier = Arc::new(Barrier::new(2));

    let writer = {
        let path = Arc::clone(&path);
        let barrier = Arc::clone(&barrier);
        let full = full.clone();
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..50 {
                io::write_text(&path, &full).unwrap();
            }
        })
    };

    let reader = {
        let path = Arc::clone(&path);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..200 {
                let content = io::read_text(&path).unwrap();
                assert_eq!(content.len(), 64 * 1024, "observed a torn document");
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
}
