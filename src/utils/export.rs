//! CSV export of end-of-run results.
//!
//! One row per run, appended to a persistent file so repeated sessions can be compared.
//! The header is written only when the file is first created.

use std::{
    fs::{OpenOptions, create_dir_all},
    io::BufWriter,
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use csv::WriterBuilder;
use log::info;
use serde::Serialize;

use crate::receiver::tracker::ReceptionSummary;
use crate::sender::scheduler::SchedulerReport;
use crate::utils::error::Result;

#[derive(Debug, Serialize)]
struct SenderRow {
    ts_epoch_s: u64,
    ticks: u64,
    frames_published: u64,
    timeouts: u64,
    deadline_misses: u64,
    bytes_published: u64,
    dropped_bounces: u64,
}

// u128 indices go out as strings; csv/serde has no 128-bit path.
#[derive(Debug, Serialize)]
struct ReceptionRow {
    ts_epoch_s: u64,
    distinct: u64,
    repeats: u64,
    delay_min_ms: Option<f64>,
    delay_max_ms: Option<f64>,
    delay_avg_ms: Option<f64>,
    index_min: Option<String>,
    index_max: Option<String>,
    total: Option<String>,
    received_ratio: Option<f64>,
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn append_row<T: Serialize>(path: &Path, row: &T) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        create_dir_all(dir)?;
    }
    let file_exists = path.exists();
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut wtr = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(BufWriter::new(file));
    wtr.serialize(row)?;
    wtr.flush()?;
    Ok(())
}

/// Append one sender run. `dropped_bounces` comes from the buffer, not the scheduler.
pub fn export_sender_report(path: &Path, report: &SchedulerReport, dropped_bounces: u64) -> Result<()> {
    let row = SenderRow {
        ts_epoch_s: epoch_secs(),
        ticks: report.ticks,
        frames_published: report.frames_published,
        timeouts: report.timeouts,
        deadline_misses: report.deadline_misses,
        bytes_published: report.bytes_published,
        dropped_bounces,
    };
    append_row(path, &row)?;
    info!("[Export] sender report appended to {}", path.display());
    Ok(())
}

pub fn export_reception_summary(path: &Path, summary: &ReceptionSummary) -> Result<()> {
    let row = ReceptionRow {
        ts_epoch_s: epoch_secs(),
        distinct: summary.distinct,
        repeats: summary.repeats,
        delay_min_ms: summary.delay_ms.map(|s| s.min),
        delay_max_ms: summary.delay_ms.map(|s| s.max),
        delay_avg_ms: summary.delay_ms.map(|s| s.mean),
        index_min: summary.index_range.map(|(lo, _)| lo.to_string()),
        index_max: summary.index_range.map(|(_, hi)| hi.to_string()),
        total: summary.total.map(|t| t.to_string()),
        received_ratio: summary.loss_ratio,
    };
    append_row(path, &row)?;
    info!("[Export] reception summary appended to {}", path.display());
    Ok(())
}
