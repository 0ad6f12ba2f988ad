//! Queue consumer and service behavior.

use std::sync::Arc;
use std::time::Duration;

use scrub_models::JobId;
use scrub_queue::NoopPublisher;
use scrub_storage::{DeletionStatus, ImageStore, MemoryImageStore};
use scrub_worker::{Runtime, WorkerConfig, WorkerError};
use tokio_util::sync::CancellationToken;

use super::support::{wait_until, FakeTranscoder, Fixture};

const WAIT: Duration = Duration::from_secs(10);

fn runtime(fixture: &Fixture, image_store: Option<Arc<dyn ImageStore>>) -> Runtime {
    runtime_with_permits(fixture, image_store, 1)
}

fn runtime_with_permits(
    fixture: &Fixture,
    image_store: Option<Arc<dyn ImageStore>>,
    max_concurrent_jobs: usize,
) -> Runtime {
    let config = WorkerConfig {
        max_concurrent_jobs,
        ..fixture.config()
    };
    Runtime::with_parts(
        &config,
        fixture.transcoder(),
        image_store,
        Arc::new(NoopPublisher),
    )
}

fn spawn_worker(runtime: Runtime, cancel: &CancellationToken) -> tokio::task::JoinHandle<()> {
    let cancel = cancel.clone();
    tokio::spawn(async move { runtime.worker.run(cancel).await })
}

#[tokio::test]
async fn test_jobs_run_in_enqueue_order() {
    let fixture =
        Fixture::with_transcoder(FakeTranscoder::with_lookup_delay(Duration::from_millis(20))).await;
    for name in ["a.mp4", "b.mp4", "c.mp4"] {
        fixture.add_video(name, 60.0).await;
    }
    let runtime = runtime(&fixture, None);
    let service = Arc::clone(&runtime.service);
    for name in ["a.mp4", "b.mp4", "c.mp4"] {
        service
            .enqueue_video(fixture.layout.video_path(name))
            .unwrap();
    }
    assert_eq!(service.queue_depth(), 3);

    let cancel = CancellationToken::new();
    let handle = spawn_worker(runtime, &cancel);

    let c = JobId::from("c");
    assert!(wait_until(WAIT, || service.get_progress(&c) == 100).await);
    assert_eq!(fixture.transcoder.started(), vec!["a.mp4", "b.mp4", "c.mp4"]);
    for id in ["a", "b", "c"] {
        assert!(!service.is_processing(&JobId::from(id)));
    }

    cancel.cancel();
    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_single_flight_runs_one_job_at_a_time() {
    let fixture =
        Fixture::with_transcoder(FakeTranscoder::with_lookup_delay(Duration::from_millis(200))).await;
    fixture.add_video("a.mp4", 60.0).await;
    fixture.add_video("b.mp4", 60.0).await;
    let runtime = runtime(&fixture, None);
    let service = Arc::clone(&runtime.service);
    service.enqueue_video(fixture.layout.video_path("a.mp4")).unwrap();
    service.enqueue_video(fixture.layout.video_path("b.mp4")).unwrap();

    let cancel = CancellationToken::new();
    let handle = spawn_worker(runtime, &cancel);

    let a = JobId::from("a");
    assert!(wait_until(WAIT, || service.is_processing(&a)).await);
    // While a is still probing, b has not been dequeued.
    assert_eq!(service.queue_depth(), 1);
    assert!(!fixture.transcoder.started().contains(&"b.mp4".to_string()));

    assert!(wait_until(WAIT, || service.get_progress(&JobId::from("b")) == 100).await);
    cancel.cancel();
    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_bounded_concurrency_overlaps_in_order() {
    let fixture =
        Fixture::with_transcoder(FakeTranscoder::with_lookup_delay(Duration::from_millis(300))).await;
    for name in ["a.mp4", "b.mp4", "c.mp4"] {
        fixture.add_video(name, 60.0).await;
    }
    let runtime = runtime_with_permits(&fixture, None, 2);
    let service = Arc::clone(&runtime.service);
    for name in ["a.mp4", "b.mp4", "c.mp4"] {
        service
            .enqueue_video(fixture.layout.video_path(name))
            .unwrap();
    }

    let cancel = CancellationToken::new();
    let handle = spawn_worker(runtime, &cancel);

    let (a, b, c) = (JobId::from("a"), JobId::from("b"), JobId::from("c"));
    assert!(wait_until(WAIT, || service.is_processing(&a) && service.is_processing(&b)).await);
    // Two permits: c waits until one of them finishes.
    assert_eq!(service.queue_depth(), 1);
    assert!(!service.is_processing(&c));

    assert!(wait_until(WAIT, || service.get_progress(&c) == 100).await);
    assert_eq!(fixture.transcoder.started(), vec!["a.mp4", "b.mp4", "c.mp4"]);

    cancel.cancel();
    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_failed_job_does_not_stop_worker() {
    let fixture = Fixture::new().await;
    fixture.add_video("good.mp4", 60.0).await;
    let runtime = runtime(&fixture, None);
    let service = Arc::clone(&runtime.service);

    // No duration registered, so the duration lookup fails.
    service
        .enqueue_video(fixture.layout.video_path("broken.mp4"))
        .unwrap();
    service
        .enqueue_video(fixture.layout.video_path("good.mp4"))
        .unwrap();

    let cancel = CancellationToken::new();
    let handle = spawn_worker(runtime, &cancel);

    assert!(wait_until(WAIT, || service.get_progress(&JobId::from("good")) == 100).await);
    assert_ne!(service.get_progress(&JobId::from("broken")), 100);

    cancel.cancel();
    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_cancel_stops_idle_worker() {
    let fixture = Fixture::new().await;
    let runtime = runtime(&fixture, None);

    let cancel = CancellationToken::new();
    let handle = spawn_worker(runtime, &cancel);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!handle.is_finished());

    cancel.cancel();
    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_cancel_interrupts_running_job() {
    let fixture =
        Fixture::with_transcoder(FakeTranscoder::with_lookup_delay(Duration::from_secs(60))).await;
    fixture.add_video("slow.mp4", 60.0).await;
    let runtime = runtime(&fixture, None);
    let service = Arc::clone(&runtime.service);
    service.enqueue_video(fixture.layout.video_path("slow.mp4")).unwrap();

    let cancel = CancellationToken::new();
    let handle = spawn_worker(runtime, &cancel);
    let slow = JobId::from("slow");
    assert!(wait_until(WAIT, || service.is_processing(&slow)).await);

    cancel.cancel();
    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
    assert_ne!(service.get_progress(&slow), 100);
}

#[tokio::test]
async fn test_catalog_lists_status_and_durations() {
    let fixture = Fixture::new().await;
    fixture.add_video("done.mp4", 60.0).await;
    fixture.add_video("waiting.mov", 60.0).await;
    tokio::fs::write(fixture.layout.video_dir.join("notes.txt"), b"x")
        .await
        .unwrap();
    let runtime = runtime(&fixture, None);
    let service = Arc::clone(&runtime.service);
    service.enqueue_video(fixture.layout.video_path("done.mp4")).unwrap();

    let cancel = CancellationToken::new();
    let handle = spawn_worker(runtime, &cancel);
    assert!(wait_until(WAIT, || service.get_progress(&JobId::from("done")) == 100).await);
    cancel.cancel();
    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();

    let videos = service.list_videos().await.unwrap();
    let names: Vec<&str> = videos.iter().map(|v| v.file_name.as_str()).collect();
    assert_eq!(names, vec!["done.mp4", "waiting.mov"]);

    let done = &videos[0];
    assert_eq!(done.progress, 100);
    assert!(!done.is_processing);
    assert!(done.task_duration_secs.is_some());

    let waiting = &videos[1];
    assert_eq!(waiting.progress, 0);
    assert!(waiting.task_duration_secs.is_none());
}

#[tokio::test]
async fn test_backfill_queues_videos_without_manifest() {
    let fixture = Fixture::new().await;
    fixture.add_video("done.mp4", 60.0).await;
    fixture.add_video("missing.mp4", 60.0).await;
    let runtime = runtime(&fixture, None);
    let service = Arc::clone(&runtime.service);
    service.enqueue_video(fixture.layout.video_path("done.mp4")).unwrap();

    let cancel = CancellationToken::new();
    let handle = spawn_worker(runtime, &cancel);
    assert!(wait_until(WAIT, || service.get_progress(&JobId::from("done")) == 100).await);

    let queued = service.backfill_missing().await.unwrap();
    assert_eq!(queued, vec![JobId::from("missing")]);
    assert!(wait_until(WAIT, || service.get_progress(&JobId::from("missing")) == 100).await);

    cancel.cancel();
    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let fixture = Fixture::new().await;
    fixture.add_video("talk.mp4", 60.0).await;
    let store = Arc::new(MemoryImageStore::new());
    let runtime = runtime(&fixture, Some(Arc::clone(&store) as Arc<dyn ImageStore>));
    let service = Arc::clone(&runtime.service);
    service.enqueue_video(fixture.layout.video_path("talk.mp4")).unwrap();

    let cancel = CancellationToken::new();
    let handle = spawn_worker(runtime, &cancel);
    assert!(wait_until(WAIT, || service.get_progress(&JobId::from("talk")) == 100).await);
    cancel.cancel();
    tokio::time::timeout(WAIT, handle).await.unwrap().unwrap();
    assert_eq!(store.len(), 1);

    let first = service.delete_video("talk.mp4").await.unwrap();
    assert!(first.is_clean());
    assert!(first.video_deleted());
    assert_eq!(first.remote_ids(&DeletionStatus::Deleted).len(), 1);
    assert!(store.is_empty());

    let second = service.delete_video("talk.mp4").await.unwrap();
    assert!(second.video_not_found());
    assert!(second.is_clean());
    assert!(second
        .outcomes
        .iter()
        .all(|o| o.status == DeletionStatus::NotFound));
}

#[tokio::test]
async fn test_rejects_unsupported_upload() {
    let fixture = Fixture::new().await;
    let runtime = runtime(&fixture, None);

    let err = runtime
        .service
        .reserve_upload_path("notes.txt")
        .await
        .unwrap_err();
    assert!(matches!(err, WorkerError::UnsupportedVideo(_)));

    let first = runtime.service.reserve_upload_path("talk.mp4").await.unwrap();
    assert!(first.starts_with(&fixture.layout.video_dir));
    assert_eq!(first.extension().and_then(|e| e.to_str()), Some("mp4"));
}
