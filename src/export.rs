//! Writes the cycle history and the graph surface to files.
//!
//! Every writer puts its output in the given directory under a name stamped
//! with the current unix time in milliseconds, and returns the path written.

use super::error::{Result, VizError};
use super::model::{CycleRecord, HeapStats};

use chrono::{SecondsFormat, Utc};
use image::{ImageFormat, RgbaImage};
use log::{info, warn};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

const CSV_HEADER: [&str; 7] = [
    "Cycle ID",
    "Algorithm",
    "Timestamp",
    "Objects Scanned",
    "Objects Freed",
    "Bytes Reclaimed",
    "Pause Duration (ms)",
];

#[derive(Serialize)]
struct Report<'a> {
    timestamp: String,
    heap_stats: &'a HeapStats,
    cycles: &'a [CycleRecord],
}

/// The history as CSV: a header row and one row per record, in history order.
pub fn to_csv(records: &[CycleRecord]) -> Result<String> {
    if records.is_empty() {
        return Err(VizError::EmptyHistory);
    }

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(vec![]);

    writer.write_record(CSV_HEADER)?;
    for record in records {
        writer.write_record([
            record.cycle_id.to_string(),
            record.algorithm.to_string(),
            record.timestamp.clone(),
            record.objects_scanned.to_string(),
            record.objects_freed.to_string(),
            record.bytes_reclaimed.to_string(),
            record.pause_duration.to_string(),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| VizError::Io(err.into_error()))?;

    // every field came from a String
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// The history and current heap statistics as pretty printed JSON.
pub fn to_json(records: &[CycleRecord], stats: &HeapStats) -> Result<String> {
    if records.is_empty() {
        return Err(VizError::EmptyHistory);
    }

    let report = Report {
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        heap_stats: stats,
        cycles: records,
    };

    Ok(serde_json::to_string_pretty(&report)?)
}

pub fn write_csv(dir: &Path, records: &[CycleRecord]) -> Result<PathBuf> {
    let contents = to_csv(records).inspect_err(refused)?;
    let path = dir.join(format!("gc_metrics_{}.csv", stamp()));

    fs::write(&path, contents)?;
    info!("exported {} cycles to {}", records.len(), path.display());

    Ok(path)
}

pub fn write_json(dir: &Path, records: &[CycleRecord], stats: &HeapStats) -> Result<PathBuf> {
    let contents = to_json(records, stats).inspect_err(refused)?;
    let path = dir.join(format!("gc_report_{}.json", stamp()));

    fs::write(&path, contents)?;
    info!("exported report to {}", path.display());

    Ok(path)
}

/// Encodes the last rendered frame as PNG. `None` means nothing has been
/// drawn yet, and nothing is written.
pub fn write_png(dir: &Path, frame: Option<&RgbaImage>) -> Result<PathBuf> {
    let Some(frame) = frame else {
        let err = VizError::RenderTargetMissing;
        refused(&err);
        return Err(err);
    };

    let path = dir.join(format!("gc_dashboard_{}.png", stamp()));

    frame.save_with_format(&path, ImageFormat::Png)?;
    info!("exported graph to {}", path.display());

    Ok(path)
}

fn refused(err: &VizError) {
    warn!("export aborted: {}", err);
}

fn stamp() -> i64 {
    Utc::now().timestamp_millis()
}
