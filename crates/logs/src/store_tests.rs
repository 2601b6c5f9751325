// SPDX-License-Identifier: MIT

use super::*;
use clier_core::LogStream;

fn entry(name: &str, ts: u64, data: &str) -> LogEntry {
    LogEntry::new(ts, LogStream::Stdout, data, name)
}

fn small_config() -> LogStoreConfig {
    LogStoreConfig { max_memory_entries: 4, max_file_size: 1024, max_files: 2 }
}

#[tokio::test]
async fn memory_bound_holds_per_process() {
    let dir = tempfile::tempdir().unwrap();
    let store = LogStore::new(dir.path().to_path_buf(), small_config());

    for i in 0..10u64 {
        store.add(entry("web", i, "x"));
        store.add(entry("db", i, "y"));
    }
    assert_eq!(store.all("web").len(), 4);
    assert_eq!(store.all("db").len(), 4);
    assert_eq!(store.all("web")[0].timestamp, 6);
}

#[tokio::test]
async fn flush_makes_entries_durable() {
    let dir = tempfile::tempdir().unwrap();
    let store = LogStore::new(dir.path().to_path_buf(), small_config());

    store.add(entry("api server", 0, "started"));
    store.flush().await.unwrap();

    let content = std::fs::read_to_string(dir.path().join("api_server.log")).unwrap();
    assert!(content.contains("[OUT] started"));
}

#[tokio::test]
async fn delete_logs_removes_ring_and_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = LogStore::new(dir.path().to_path_buf(), small_config());

    store.add(entry("web", 0, "one"));
    store.flush().await.unwrap();
    assert!(dir.path().join("web.log").exists());

    store.delete_logs("web").await.unwrap();
    assert!(store.all("web").is_empty());
    assert!(!dir.path().join("web.log").exists());
}

#[tokio::test]
async fn merged_interleaves_by_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    let store = LogStore::new(dir.path().to_path_buf(), small_config());

    store.add(entry("a", 30, "a30"));
    store.add(entry("b", 10, "b10"));
    store.add(entry("a", 20, "a20"));

    let merged = store.merged(None, 100);
    let data: Vec<_> = merged.iter().map(|e| e.data.as_str()).collect();
    assert_eq!(data, vec!["b10", "a20", "a30"]);

    let limited = store.merged(None, 2);
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].data, "a20");

    let since = store.merged(Some(20), 100);
    assert_eq!(since.len(), 2);
}

#[tokio::test]
async fn clear_scopes_to_one_process_or_all() {
    let dir = tempfile::tempdir().unwrap();
    let store = LogStore::new(dir.path().to_path_buf(), small_config());

    store.add(entry("a", 1, "x"));
    store.add(entry("b", 1, "y"));

    store.clear(Some("a"));
    assert!(store.all("a").is_empty());
    assert_eq!(store.all("b").len(), 1);

    store.clear(None);
    assert!(store.all("b").is_empty());
}
