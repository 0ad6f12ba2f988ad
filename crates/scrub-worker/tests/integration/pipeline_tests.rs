//! End-to-end runs of a single job.

use std::sync::Arc;
use std::time::Duration;

use scrub_media::{SpriteConfig, UploadFailurePolicy};
use scrub_models::{ManifestCue, ProgressEvent, ThumbnailJob, TileGrid};
use scrub_queue::{BroadcastPublisher, ProgressPublisher, ProgressStore};
use scrub_storage::{read_manifest_archive, DeletionStatus, ImageStore, MemoryImageStore};
use tokio_util::sync::CancellationToken;

use super::support::{FakeTranscoder, Fixture, PipelineHarness, FRAME};

fn job_for(fixture: &Fixture, file_name: &str, interval_secs: f64) -> ThumbnailJob {
    ThumbnailJob::for_video(
        fixture.layout.video_path(file_name),
        &fixture.layout.previews_dir,
        interval_secs,
    )
}

fn small_grid() -> SpriteConfig {
    SpriteConfig {
        grid: TileGrid::new(2, 2),
        ..SpriteConfig::default()
    }
}

fn assert_contiguous(cues: &[ManifestCue]) {
    for pair in cues.windows(2) {
        assert!(
            (pair[0].end_time - pair[1].start_time).abs() < 1e-9,
            "gap between {:?} and {:?}",
            pair[0],
            pair[1]
        );
    }
}

#[tokio::test]
async fn test_short_video_single_sheet() {
    let fixture = Fixture::new().await;
    fixture.add_video("talk.mp4", 125.0).await;
    let harness = PipelineHarness::new(&fixture, SpriteConfig::default(), None, None);

    let job = job_for(&fixture, "talk.mp4", 12.0);
    let outcome = harness
        .pipeline
        .run(&job, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.sheets, 1);
    assert!(outcome.skipped.is_empty());
    assert_eq!(outcome.cues, 11);
    assert_eq!(fixture.transcoder.full_passes(), 1);
    assert!(fixture.transcoder.tile_requests().is_empty());

    let cues = read_manifest_archive(&outcome.manifest_path).await.unwrap();
    assert_eq!(cues.len(), 11);
    assert_eq!(cues[0].start_time, 0.0);
    assert_eq!(cues[0].region.sheet, "/previews/talk/talk_1.png");
    assert_eq!((cues[0].region.x, cues[0].region.y), (0, 0));
    assert_eq!(cues[0].region.width, FRAME.width);
    assert_eq!(cues[0].region.height, FRAME.height);

    // Frame 10 wraps onto the second row of the 10-column grid.
    let last = &cues[10];
    assert_eq!(last.start_time, 120.0);
    assert_eq!(last.end_time, 125.0);
    assert_eq!((last.region.x, last.region.y), (0, FRAME.height));
    assert_contiguous(&cues);

    assert!(job.sheet_dir().join("talk_1.png").exists());
    assert!(!job.output_dir.join("talk.vtt").exists());
}

#[tokio::test]
async fn test_completion_clears_processing_and_logs_duration() {
    let fixture = Fixture::new().await;
    fixture.add_video("talk.mp4", 60.0).await;
    let harness = PipelineHarness::new(&fixture, SpriteConfig::default(), None, None);

    let job = job_for(&fixture, "talk.mp4", 12.0);
    harness
        .pipeline
        .run(&job, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(harness.progress.get_progress(&job.job_id), 100);
    assert!(!harness.progress.is_processing(&job.job_id));
    assert!(harness.progress.get_elapsed(&job.job_id) >= 0.0);

    let durations = harness.repository.load_task_durations().await.unwrap();
    assert!(durations.contains_key("talk"));
    assert!(harness.repository.manifest_exists("talk").await);
}

#[tokio::test]
async fn test_long_video_uses_windows() {
    let fixture = Fixture::new().await;
    fixture.add_video("lecture.mp4", 4000.0).await;
    let harness = PipelineHarness::new(&fixture, SpriteConfig::default(), None, None);

    let job = job_for(&fixture, "lecture.mp4", 12.0);
    let outcome = harness
        .pipeline
        .run(&job, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(fixture.transcoder.full_passes(), 0);
    let requests = fixture.transcoder.tile_requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(requests[3].start_time, 3600.0);
    assert_eq!(requests[3].duration, 400.0);

    assert_eq!(outcome.sheets, 4);
    assert_eq!(outcome.cues, 334);

    let cues = read_manifest_archive(&outcome.manifest_path).await.unwrap();
    assert_eq!(cues.first().map(|c| c.start_time), Some(0.0));
    assert_eq!(cues.last().map(|c| c.end_time), Some(4000.0));
    assert_contiguous(&cues);

    let on_last_sheet = cues
        .iter()
        .filter(|c| c.region.sheet.ends_with("lecture_4.png"))
        .count();
    assert_eq!(on_last_sheet, 34);
}

#[tokio::test]
async fn test_failed_sheet_leaves_gap() {
    let fixture = Fixture::new().await;
    fixture.add_video("lecture.mp4", 4000.0).await;
    fixture.transcoder.fail_tile(2);
    let harness = PipelineHarness::new(&fixture, SpriteConfig::default(), None, None);

    let job = job_for(&fixture, "lecture.mp4", 12.0);
    let outcome = harness
        .pipeline
        .run(&job, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.skipped, vec![2]);
    assert_eq!(outcome.sheets, 3);
    assert_eq!(outcome.cues, 234);

    let cues = read_manifest_archive(&outcome.manifest_path).await.unwrap();
    assert!(cues
        .iter()
        .all(|c| c.start_time < 1200.0 || c.start_time >= 2400.0));
    assert_eq!(harness.progress.get_progress(&job.job_id), 100);
}

#[tokio::test]
async fn test_full_pass_failure_falls_back_to_windows() {
    let fixture = Fixture::new().await;
    fixture.add_video("clip.mp4", 300.0).await;
    fixture.transcoder.fail_full_pass();
    let harness = PipelineHarness::new(&fixture, SpriteConfig::default(), None, None);

    let job = job_for(&fixture, "clip.mp4", 12.0);
    let outcome = harness
        .pipeline
        .run(&job, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(fixture.transcoder.full_passes(), 1);
    assert_eq!(fixture.transcoder.tile_requests().len(), 1);
    assert_eq!(outcome.sheets, 1);
    assert_eq!(outcome.cues, 25);
}

#[tokio::test]
async fn test_stale_sheet_is_not_reused() {
    let fixture = Fixture::new().await;
    fixture.add_video("talk.mp4", 120.0).await;
    fixture.transcoder.fail_tile(2);
    let harness = PipelineHarness::new(&fixture, small_grid(), None, None);

    let job = job_for(&fixture, "talk.mp4", 12.0);
    tokio::fs::create_dir_all(job.sheet_dir()).await.unwrap();
    let stale = job.sheet_dir().join("talk_2.png");
    image::RgbImage::new(2 * FRAME.width, 2 * FRAME.height)
        .save(&stale)
        .unwrap();

    let outcome = harness
        .pipeline
        .run(&job, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(fixture.transcoder.full_passes(), 1);
    assert_eq!(outcome.skipped, vec![2]);
    assert_eq!(outcome.sheets, 2);
    assert!(!stale.exists());

    let cues = read_manifest_archive(&outcome.manifest_path).await.unwrap();
    assert!(cues.iter().all(|c| !c.region.sheet.ends_with("talk_2.png")));
}

#[tokio::test]
async fn test_duration_failure_fails_job() {
    let fixture = Fixture::new().await;
    let harness = PipelineHarness::new(&fixture, SpriteConfig::default(), None, None);

    let job = job_for(&fixture, "unknown.mp4", 12.0);
    let result = harness.pipeline.run(&job, &CancellationToken::new()).await;

    assert!(result.is_err());
    assert!(!harness.repository.manifest_exists("unknown").await);
    // Failures are not surfaced through the progress store.
    assert!(harness.progress.is_processing(&job.job_id));
    assert_eq!(harness.progress.get_progress(&job.job_id), 0);
}

#[tokio::test]
async fn test_cancelled_job_stops_before_sheets() {
    let fixture = Fixture::with_transcoder(FakeTranscoder::with_lookup_delay(Duration::from_secs(30))).await;
    fixture.add_video("talk.mp4", 125.0).await;
    let harness = PipelineHarness::new(&fixture, SpriteConfig::default(), None, None);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let job = job_for(&fixture, "talk.mp4", 12.0);
    let err = harness.pipeline.run(&job, &cancel).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(fixture.transcoder.full_passes(), 0);
}

#[tokio::test]
async fn test_remote_sheets_and_partial_deletion() {
    let fixture = Fixture::new().await;
    fixture.add_video("talk.mp4", 120.0).await;
    let store = Arc::new(MemoryImageStore::new());
    let harness = PipelineHarness::new(
        &fixture,
        small_grid(),
        Some(Arc::clone(&store) as Arc<dyn ImageStore>),
        None,
    );

    let job = job_for(&fixture, "talk.mp4", 12.0);
    let outcome = harness
        .pipeline
        .run(&job, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.sheets, 3);
    assert_eq!(store.len(), 3);
    assert!(!job.sheet_dir().join("talk_1.png").exists());

    let cues = read_manifest_archive(&outcome.manifest_path).await.unwrap();
    assert_eq!(cues.len(), 10);
    assert!(cues.iter().all(|c| c.region.sheet.starts_with("memory://")));

    let ids = store.ids();
    store.fail_delete_of(ids[1].clone());

    let report = harness.repository.delete_video("talk.mp4").await.unwrap();
    assert!(report.video_deleted());
    assert_eq!(report.failures().count(), 1);
    assert_eq!(report.remote_ids(&DeletionStatus::Deleted).len(), 2);
    assert_eq!(store.ids(), vec![ids[1].clone()]);

    assert!(!fixture.layout.video_path("talk.mp4").exists());
    assert!(!job.sheet_dir().exists());
    assert!(!job.manifest_path().exists());
}

#[tokio::test]
async fn test_upload_failure_keeps_local_sheet() {
    let fixture = Fixture::new().await;
    fixture.add_video("talk.mp4", 60.0).await;
    let store = Arc::new(MemoryImageStore::new());
    store.fail_uploads(true);
    let harness = PipelineHarness::new(
        &fixture,
        SpriteConfig::default(),
        Some(Arc::clone(&store) as Arc<dyn ImageStore>),
        None,
    );

    let job = job_for(&fixture, "talk.mp4", 12.0);
    let outcome = harness
        .pipeline
        .run(&job, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.sheets, 1);
    assert!(store.is_empty());
    assert!(job.sheet_dir().join("talk_1.png").exists());

    let cues = read_manifest_archive(&outcome.manifest_path).await.unwrap();
    assert!(cues.iter().all(|c| c.region.sheet == "/previews/talk/talk_1.png"));
}

#[tokio::test]
async fn test_upload_failure_drops_sheet_when_configured() {
    let fixture = Fixture::new().await;
    fixture.add_video("talk.mp4", 60.0).await;
    let store = Arc::new(MemoryImageStore::new());
    store.fail_uploads(true);
    let sprite = SpriteConfig {
        upload_failure: UploadFailurePolicy::DropSheet,
        ..SpriteConfig::default()
    };
    let harness = PipelineHarness::new(
        &fixture,
        sprite,
        Some(Arc::clone(&store) as Arc<dyn ImageStore>),
        None,
    );

    let job = job_for(&fixture, "talk.mp4", 12.0);
    let result = harness.pipeline.run(&job, &CancellationToken::new()).await;

    // Every sheet was dropped, so there is nothing to index.
    assert!(result.is_err());
    assert!(!job.manifest_path().exists());
    assert_ne!(harness.progress.get_progress(&job.job_id), 100);
}

#[tokio::test]
async fn test_progress_events_end_at_100() {
    let fixture = Fixture::new().await;
    fixture.add_video("lecture.mp4", 4000.0).await;
    let publisher = Arc::new(BroadcastPublisher::new(1024));
    let mut events = publisher.subscribe();
    let harness = PipelineHarness::new(
        &fixture,
        SpriteConfig::default(),
        None,
        Some(Arc::clone(&publisher) as Arc<dyn ProgressPublisher>),
    );

    let job = job_for(&fixture, "lecture.mp4", 12.0);
    harness
        .pipeline
        .run(&job, &CancellationToken::new())
        .await
        .unwrap();

    let mut percents = Vec::new();
    let mut saw_elapsed = false;
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.job_id(), &job.job_id);
        match event {
            ProgressEvent::ProgressChanged { percent, .. } => percents.push(percent),
            ProgressEvent::ElapsedChanged { .. } => saw_elapsed = true,
        }
    }

    assert!(saw_elapsed);
    assert_eq!(percents.first(), Some(&0));
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert!(percents[..percents.len() - 1].iter().all(|p| *p < 100));
    assert!(percents.contains(&25));
}
