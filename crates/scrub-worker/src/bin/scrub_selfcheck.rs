use std::path::Path;

use scrub_media::{check_ffmpeg, check_ffprobe};
use scrub_storage::{R2Config, R2ImageStore};
use scrub_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();
    config.validate()?;

    println!(
        "scrub-selfcheck: starting with video_dir={} previews_dir={}",
        config.layout.video_dir.display(),
        config.layout.previews_dir.display()
    );
    ensure_dir(&config.layout.video_dir).await?;
    ensure_dir(&config.layout.previews_dir).await?;

    let ffmpeg = check_ffmpeg()?;
    let ffprobe = check_ffprobe()?;
    println!("scrub-selfcheck: ffmpeg={} ffprobe={}", ffmpeg.display(), ffprobe.display());

    if let Some(r2) = R2Config::from_env_optional()? {
        let bucket = r2.bucket_name.clone();
        R2ImageStore::new(r2)
            .check_connectivity()
            .await
            .map_err(|e| anyhow::anyhow!("R2 bucket {} unreachable: {}", bucket, e))?;
        println!("scrub-selfcheck: R2 bucket {} reachable", bucket);
    }

    println!("scrub-selfcheck: ok");
    Ok(())
}

async fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {}: {}", path.display(), e))
}
