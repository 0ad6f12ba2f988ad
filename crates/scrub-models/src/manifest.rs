//! WebVTT thumbnail manifest cues.
//!
//! A manifest maps playback time ranges to rectangles inside sprite sheets:
//!
//! ```text
//! WEBVTT
//!
//! 00:00:00.000 --> 00:00:12.000
//! /previews/talk/talk_1.png#xywh=0,0,160,90
//! ```

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// First line of every manifest.
pub const MANIFEST_HEADER: &str = "WEBVTT";

const CUE_ARROW: &str = " --> ";
const XYWH_FRAGMENT: &str = "#xywh=";

/// Errors when reading a manifest.
#[derive(Debug, Error, PartialEq)]
pub enum ManifestError {
    #[error("Missing WEBVTT header")]
    MissingHeader,

    #[error("Invalid cue timing on line {line}: {text}")]
    InvalidTiming { line: usize, text: String },

    #[error("Invalid region reference on line {line}: {text}")]
    InvalidRegion { line: usize, text: String },

    #[error("Cue timing on line {0} has no reference line")]
    MissingRegion(usize),
}

/// Sheet reference plus pixel rectangle (`<ref>#xywh=x,y,w,h`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct RegionRef {
    pub sheet: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for RegionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{},{},{},{}",
            self.sheet, XYWH_FRAGMENT, self.x, self.y, self.width, self.height
        )
    }
}

impl FromStr for RegionRef {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (sheet, rect) = s.trim().rsplit_once(XYWH_FRAGMENT).ok_or(())?;
        let values = rect
            .split(',')
            .map(|v| v.trim().parse::<u32>().map_err(|_| ()))
            .collect::<Result<Vec<_>, _>>()?;
        match values.as_slice() {
            [x, y, width, height] if !sheet.is_empty() => Ok(Self {
                sheet: sheet.to_string(),
                x: *x,
                y: *y,
                width: *width,
                height: *height,
            }),
            _ => Err(()),
        }
    }
}

/// One manifest entry: `[start_time, end_time)` shows `region`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ManifestCue {
    pub start_time: f64,
    pub end_time: f64,
    pub region: RegionRef,
}

/// Format seconds as a cue timestamp (`HH:MM:SS.mmm`).
pub fn format_cue_time(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms / 60_000) % 60;
    let secs = (total_ms / 1000) % 60;
    let millis = total_ms % 1000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
}

/// Parse a cue timestamp (`HH:MM:SS.mmm` or `MM:SS.mmm`) to seconds.
pub fn parse_cue_time(ts: &str) -> Option<f64> {
    let parts: Vec<&str> = ts.trim().split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (h.parse::<u64>().ok()?, m.parse::<u64>().ok()?, *s),
        [m, s] => (0, m.parse::<u64>().ok()?, *s),
        _ => return None,
    };
    let seconds: f64 = seconds.parse().ok()?;
    if minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return None;
    }
    Some((hours * 3600 + minutes * 60) as f64 + seconds)
}

/// Render cues as WebVTT text.
pub fn render_manifest(cues: &[ManifestCue]) -> String {
    let mut out = String::with_capacity(16 + cues.len() * 80);
    out.push_str(MANIFEST_HEADER);
    out.push_str("\n\n");
    for cue in cues {
        out.push_str(&format_cue_time(cue.start_time));
        out.push_str(CUE_ARROW);
        out.push_str(&format_cue_time(cue.end_time));
        out.push('\n');
        out.push_str(&cue.region.to_string());
        out.push_str("\n\n");
    }
    out
}

/// Parse WebVTT text produced by [`render_manifest`].
///
/// Blank lines and `NOTE` blocks are skipped; cue identifiers are not used.
pub fn parse_manifest(text: &str) -> Result<Vec<ManifestCue>, ManifestError> {
    let mut lines = text.lines().enumerate().peekable();

    match lines.next() {
        Some((_, first)) if first.trim_start_matches('\u{feff}').starts_with(MANIFEST_HEADER) => {}
        _ => return Err(ManifestError::MissingHeader),
    }

    let mut cues = Vec::new();
    while let Some((idx, line)) = lines.next() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("NOTE") {
            while let Some((_, l)) = lines.peek() {
                if l.trim().is_empty() {
                    break;
                }
                lines.next();
            }
            continue;
        }

        let line_no = idx + 1;
        let Some((start, end)) = line.split_once(CUE_ARROW.trim()) else {
            // A cue identifier; the timing follows on the next line.
            continue;
        };
        let timing_err = || ManifestError::InvalidTiming {
            line: line_no,
            text: line.to_string(),
        };
        let start_time = parse_cue_time(start).ok_or_else(timing_err)?;
        // Cue settings may follow the end timestamp.
        let end = end.split_whitespace().next().unwrap_or_default();
        let end_time = parse_cue_time(end).ok_or_else(timing_err)?;

        let (region_idx, region_line) = lines
            .next()
            .filter(|(_, l)| !l.trim().is_empty())
            .ok_or(ManifestError::MissingRegion(line_no))?;
        let region = region_line
            .parse::<RegionRef>()
            .map_err(|_| ManifestError::InvalidRegion {
                line: region_idx + 1,
                text: region_line.to_string(),
            })?;

        cues.push(ManifestCue {
            start_time,
            end_time,
            region,
        });
    }

    Ok(cues)
}
