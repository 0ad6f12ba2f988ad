//! Sprite sheet geometry and per-sheet metadata.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default number of frame columns per sheet.
pub const DEFAULT_TILE_COLUMNS: u32 = 10;
/// Default number of frame rows per sheet.
pub const DEFAULT_TILE_ROWS: u32 = 10;
/// Default height of one captured frame, in pixels.
pub const DEFAULT_THUMBNAIL_HEIGHT: u32 = 90;
/// Default seconds between sampled frames.
pub const DEFAULT_INTERVAL_SECS: f64 = 12.0;
/// Videos longer than this are sampled one time window per sheet.
pub const LONG_VIDEO_THRESHOLD_SECS: f64 = 30.0 * 60.0;

/// Grid of cells in one sprite sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TileGrid {
    pub columns: u32,
    pub rows: u32,
}

impl TileGrid {
    pub fn new(columns: u32, rows: u32) -> Self {
        Self { columns, rows }
    }

    /// Capacity of one sheet.
    pub fn frames_per_sheet(&self) -> u32 {
        self.columns * self.rows
    }

    /// Column and row of the `frame`-th cell, filled row-major.
    pub fn cell(&self, frame: u32) -> (u32, u32) {
        (frame % self.columns, frame / self.columns)
    }

    /// FFmpeg `tile` filter argument (`10x10`).
    pub fn filter_arg(&self) -> String {
        format!("{}x{}", self.columns, self.rows)
    }
}

impl Default for TileGrid {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_COLUMNS, DEFAULT_TILE_ROWS)
    }
}

/// Pixel size of one frame cell, measured from a generated sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    /// Derive the cell size from a sheet's pixel dimensions.
    ///
    /// Returns `None` when the sheet is smaller than the grid.
    pub fn from_sheet(sheet_width: u32, sheet_height: u32, grid: TileGrid) -> Option<Self> {
        if grid.columns == 0 || grid.rows == 0 {
            return None;
        }
        let width = sheet_width / grid.columns;
        let height = sheet_height / grid.rows;
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self { width, height })
    }
}

/// Location of a sheet uploaded to the remote image store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct RemoteImageRef {
    /// Public URL used in manifest cues
    pub url: String,
    /// Store-specific id used for deletion
    pub id: String,
}

/// Where a sheet can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SheetRef {
    /// Served from the local previews directory
    Local { path: String },
    /// Uploaded to the remote image store
    Remote(RemoteImageRef),
}

impl SheetRef {
    /// Reference written in manifest cues.
    pub fn as_manifest_ref(&self) -> &str {
        match self {
            SheetRef::Local { path } => path,
            SheetRef::Remote(remote) => &remote.url,
        }
    }

    pub fn remote(&self) -> Option<&RemoteImageRef> {
        match self {
            SheetRef::Remote(remote) => Some(remote),
            SheetRef::Local { .. } => None,
        }
    }
}

/// Metadata for one generated sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TileInfo {
    /// 1-based sheet index
    pub tile_index: u32,
    /// First covered second
    pub start_time: f64,
    /// End of covered range (clamped to the video duration)
    pub end_time: f64,
    /// Frames captured in this sheet
    pub frame_count: u32,
    /// Where the sheet lives
    pub sheet: SheetRef,
}

impl TileInfo {
    /// Remote upload, if the sheet was uploaded.
    pub fn remote_ref(&self) -> Option<&RemoteImageRef> {
        self.sheet.remote()
    }
}
