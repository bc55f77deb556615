//! End-to-end routing through the local destinations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::{Duration, Instant};

use logsift::encoder::LineEncoder;
use logsift::lifecycle::startup::{local_application_router, local_job_router};
use logsift::routing::{RouteOutcome, SiftingRouter};
use logsift::sink::rolling::archive_path;
use logsift::sink::{RollingPolicy, RotatingFileSink, RouterContext, Sink, SinkError};
use tempfile::tempdir;

mod common;

const KEY: &str = "workspace_app_root";

#[test]
fn test_rotation_scenario_keeps_two_archives() {
    let dir = tempdir().unwrap();
    let ws = common::key_for(dir.path(), "ws-1");
    let policy = RollingPolicy {
        max_file_size: 1000,
        max_archives: 3,
    };
    let router = local_application_router(KEY, "app.log", policy, Arc::new(LineEncoder))
        .with_idle_timeout(Duration::from_secs(15 * 60));
    let base = dir.path().join("ws-1").join("app.log");

    // 5% of the threshold per event: below the limit, nothing archived.
    for _ in 0..5 {
        router.route(&common::sized_event(KEY, &ws, 100)).unwrap();
    }
    assert_eq!(std::fs::metadata(&base).unwrap().len(), 500);
    assert!(!archive_path(&base, 1).exists());

    // 2.6x the threshold in total.
    for _ in 0..21 {
        router.route(&common::sized_event(KEY, &ws, 100)).unwrap();
        assert!(std::fs::metadata(&base).unwrap().len() <= 1000);
    }

    assert_eq!(std::fs::metadata(&base).unwrap().len(), 600);
    assert!(archive_path(&base, 1).ends_with("app.1.log.gz"));
    assert!(archive_path(&base, 1).exists());
    assert!(archive_path(&base, 2).exists());
    assert!(!archive_path(&base, 3).exists());
    assert_eq!(router.live_sinks(), 1);
}

#[test]
fn test_blank_key_touches_nothing() {
    let dir = tempdir().unwrap();
    let app = local_application_router(KEY, "app.log", RollingPolicy::default(), Arc::new(LineEncoder));
    let job = local_job_router("job_log_path", "app.log", Arc::new(LineEncoder));

    for event in [
        common::keyed(KEY, "", "empty"),
        common::keyed(KEY, " \t", "blank"),
        common::keyed("unrelated", "value", "absent"),
    ] {
        assert_eq!(app.route(&event).unwrap(), RouteOutcome::Suppressed);
        assert_eq!(job.route(&event).unwrap(), RouteOutcome::Suppressed);
    }

    assert_eq!(app.live_sinks() + job.live_sinks(), 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_simultaneous_first_events_build_one_sink() {
    let dir = tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let invocations = Arc::new(AtomicUsize::new(0));
    let counter = invocations.clone();

    let router = Arc::new(SiftingRouter::new(
        "local-application",
        KEY,
        move |key: &str, _: &RouterContext| -> Result<Arc<dyn Sink>, SinkError> {
            counter.fetch_add(1, Ordering::SeqCst);
            // Widen the race window.
            std::thread::sleep(Duration::from_millis(20));
            let sink = RotatingFileSink::open(
                format!("{key}-local"),
                root.join(key).join("app.log"),
                RollingPolicy::default(),
                Arc::new(LineEncoder),
            )?;
            Ok(Arc::new(sink))
        },
    ));

    let threads = 2;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let router = router.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                router.route(&common::keyed(KEY, "ws-2", &format!("thread {i}")))
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), RouteOutcome::Delivered);
    }

    assert_eq!(invocations.load(Ordering::SeqCst), 1);
    assert_eq!(router.live_sinks(), 1);
    let content = std::fs::read_to_string(dir.path().join("ws-2/app.log")).unwrap();
    assert_eq!(content.lines().count(), threads);
}

#[test]
fn test_idle_sink_is_reaped_and_busy_sink_kept() {
    let dir = tempdir().unwrap();
    let idle = Duration::from_millis(300);
    let router = local_application_router(KEY, "app.log", RollingPolicy::default(), Arc::new(LineEncoder))
        .with_idle_timeout(idle);

    let quiet = common::key_for(dir.path(), "quiet");
    let busy = common::key_for(dir.path(), "busy");
    router.route(&common::keyed(KEY, &quiet, "once")).unwrap();
    router.route(&common::keyed(KEY, &busy, "first")).unwrap();
    assert!(router.reap().is_empty());

    std::thread::sleep(Duration::from_millis(200));
    router.route(&common::keyed(KEY, &busy, "again")).unwrap();
    std::thread::sleep(Duration::from_millis(200));

    assert_eq!(router.reap(), vec![quiet.clone()]);
    assert!(router.has_sink(&busy));
    assert!(!router.has_sink(&quiet));

    // A reaped key comes back on its next event, appending to the same file.
    router.route(&common::keyed(KEY, &quiet, "back")).unwrap();
    let content = std::fs::read_to_string(dir.path().join("quiet/app.log")).unwrap();
    assert_eq!(content, "0 INFO  once\n0 INFO  back\n");

    let later = Instant::now() + idle;
    assert_eq!(router.reap_at(later).len(), 2);
}

#[test]
fn test_job_key_as_directory_or_file() {
    let dir = tempdir().unwrap();
    let job_dir = dir.path().join("job-1");
    std::fs::create_dir(&job_dir).unwrap();
    let router = local_job_router("job_log_path", "logs.log", Arc::new(LineEncoder));

    router
        .route(&common::keyed("job_log_path", &common::key_for(dir.path(), "job-1"), "in dir"))
        .unwrap();
    router
        .route(&common::keyed("job_log_path", &common::key_for(dir.path(), "job-2.txt"), "as file"))
        .unwrap();

    assert_eq!(std::fs::read_to_string(job_dir.join("logs.log")).unwrap(), "0 INFO  in dir\n");
    assert_eq!(std::fs::read_to_string(dir.path().join("job-2.txt")).unwrap(), "0 INFO  as file\n");
}
