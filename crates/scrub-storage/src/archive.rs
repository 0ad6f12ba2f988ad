//! Gzip archiving of manifests.
//!
//! Manifests are persisted only in compressed form (`<name>.vtt.gz`); the
//! plain-text file written during generation is removed once compressed.

use std::io::{Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use scrub_models::{parse_manifest, ManifestCue};
use tracing::debug;

use crate::error::{StorageError, StorageResult};

/// Gzip manifest text.
pub fn compress_manifest(text: &str) -> StorageResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(text.as_bytes())
        .map_err(|e| StorageError::archive(format!("Failed to gzip manifest: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| StorageError::archive(format!("Failed to finish gzip encoding: {}", e)))
}

/// Inflate gzip bytes back to manifest text.
pub fn decompress_manifest(data: &[u8]) -> StorageResult<String> {
    let mut decoder = GzDecoder::new(data);
    let mut text = String::new();
    decoder
        .read_to_string(&mut text)
        .map_err(|e| StorageError::archive(format!("Failed to decompress manifest: {}", e)))?;
    Ok(text)
}

/// Compress `input` into `output` and remove `input`.
///
/// The uncompressed file is only removed after the archive is fully written.
pub async fn compress_file(input: &Path, output: &Path) -> StorageResult<u64> {
    let text = tokio::fs::read_to_string(input).await?;
    let compressed = compress_manifest(&text)?;
    let size = compressed.len() as u64;

    let tmp = output.with_extension("gz.tmp");
    tokio::fs::write(&tmp, &compressed).await?;
    if let Err(e) = tokio::fs::rename(&tmp, output).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    tokio::fs::remove_file(input).await?;

    debug!(
        input = %input.display(),
        output = %output.display(),
        compressed_size = size,
        "Compressed manifest"
    );
    Ok(size)
}

/// Read and parse a compressed manifest.
pub async fn read_manifest_archive(path: &Path) -> StorageResult<Vec<ManifestCue>> {
    let data = tokio::fs::read(path).await?;
    let text = decompress_manifest(&data)?;
    Ok(parse_manifest(&text)?)
}
