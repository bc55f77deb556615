//! Start-up and ordered shutdown with remote destinations.

use std::sync::Arc;
use std::time::Duration;

use logsift::lifecycle::startup::{CLOUD_APPLICATION, CLOUD_JOB, LOCAL_APPLICATION};
use logsift::lifecycle::LifecycleManager;
use logsift::routing::DispatchError;
use logsift::storage::{DocumentType, InMemoryStore, LocalDirectoryStore};
use tempfile::tempdir;

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_drains_every_remote_buffer() {
    let store = Arc::new(InMemoryStore::new());
    let mut config = common::quiet_config();
    config.remote.enabled = true;

    let manager = Arc::new(LifecycleManager::start(config, Some(store.clone())).unwrap());

    // Synchronous producers on their own threads, two keys each.
    let producers: Vec<_> = (0..4)
        .map(|p| {
            let manager = manager.clone();
            std::thread::spawn(move || {
                for i in 0..25 {
                    let event = common::keyed("cloud_workspace_app_root", &format!("ws-{}", p % 2), &format!("p{p}-{i:02}"))
                        .with_context("cloud_job_log_path", format!("jobs/{p}"));
                    assert!(manager.dispatch(&event).is_empty());
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    let dispatcher = manager.dispatcher();
    assert_eq!(dispatcher.router(CLOUD_APPLICATION).unwrap().live_sinks(), 2);
    assert_eq!(dispatcher.router(CLOUD_JOB).unwrap().live_sinks(), 4);

    let report = manager.shutdown().await;
    assert_eq!(report.sinks_stopped, 6);
    assert!(report.drain.unwrap().completed);

    let app = String::from_utf8(store.contents(DocumentType::ApplicationLogs)).unwrap();
    let jobs = String::from_utf8(store.contents(DocumentType::Logs)).unwrap();
    assert_eq!(app.lines().count(), 100);
    assert_eq!(jobs.lines().count(), 100);

    // Per producer, events reach the store in the order they were written.
    for p in 0..4 {
        let prefix = format!("jobs/{p}/");
        let lines: Vec<String> = store
            .documents()
            .into_iter()
            .filter(|d| d.storage_id.starts_with(&prefix))
            .flat_map(|d| String::from_utf8(d.bytes).unwrap().lines().map(str::to_string).collect::<Vec<_>>())
            .collect();
        let expected: Vec<String> = (0..25).map(|i| format!("0 INFO  p{p}-{i:02}")).collect();
        assert_eq!(lines, expected);
    }

    assert!(matches!(
        manager.dispatch(&common::keyed("cloud_job_log_path", "jobs/9", "late")).as_slice(),
        [DispatchError::Closed]
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_is_bounded_by_grace_period() {
    let mut config = common::quiet_config();
    config.remote.enabled = true;
    config.lifecycle.shutdown_grace_secs = 1;

    let manager = LifecycleManager::start(config, Some(common::stalled(Duration::from_secs(60)))).unwrap();
    assert!(manager
        .dispatch(&common::keyed("cloud_job_log_path", "jobs/1", "stuck"))
        .is_empty());

    let report = tokio::time::timeout(Duration::from_secs(10), manager.shutdown())
        .await
        .expect("shutdown must not wait for a stalled store");
    let drain = report.drain.unwrap();
    assert!(!drain.completed);
    assert_eq!(drain.abandoned, 1);
    assert!(report.elapsed < Duration::from_secs(5));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_local_and_directory_store_end_to_end() {
    let dir = tempdir().unwrap();
    let storage_root = dir.path().join("storage");
    let mut config = common::quiet_config();
    config.remote.enabled = true;
    config.storage.root_dir = storage_root.to_string_lossy().into_owned();

    let store = Arc::new(LocalDirectoryStore::new(&storage_root));
    let manager = LifecycleManager::start(config, Some(store)).unwrap();

    let ws = common::key_for(dir.path(), "ws-1");
    let event = common::keyed("workspace_app_root", &ws, "hello")
        .with_context("cloud_workspace_app_root", "/workspaces/ws-1");
    assert!(manager.dispatch(&event).is_empty());
    assert_eq!(manager.dispatcher().router(LOCAL_APPLICATION).unwrap().live_sinks(), 1);

    manager.shutdown().await;

    assert_eq!(
        std::fs::read_to_string(dir.path().join("ws-1/app.log")).unwrap(),
        "0 INFO  hello\n"
    );
    let batches: Vec<_> = std::fs::read_dir(storage_root.join("app-logging/workspaces/ws-1"))
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(batches.len(), 1);
    assert_eq!(std::fs::read_to_string(&batches[0]).unwrap(), "0 INFO  hello\n");
}
