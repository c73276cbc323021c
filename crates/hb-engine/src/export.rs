//! Writes a finished run to disk for external plotting.

use hb_optimizer::{HistoryLog, RunReport};
use hb_types::{HbError, HbResult};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

/// One flattened history entry.
#[derive(Debug, Serialize)]
struct HistoryRow<'a> {
    config_id: String,
    step: usize,
    metric: f64,
    parameters: &'a str,
}

/// Write one CSV row per history entry, steps numbered from 1 within each
/// lineage. Parameters are embedded as a JSON object.
pub fn write_history_csv<P: AsRef<Path>>(history: &HistoryLog, path: P) -> HbResult<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path).map_err(export_error)?;

    for lineage in history.lineages() {
        let config_id = lineage.id.to_string();
        for (i, entry) in lineage.entries.iter().enumerate() {
            let parameters = serde_json::to_string(entry.configuration.parameters())?;
            writer
                .serialize(HistoryRow {
                    config_id: config_id.clone(),
                    step: i + 1,
                    metric: entry.metric,
                    parameters: &parameters,
                })
                .map_err(export_error)?;
        }
    }

    writer.flush()?;
    info!("Wrote {} history rows to {}", history.total_entries(), path.display());
    Ok(())
}

pub fn write_history_json<P: AsRef<Path>>(history: &HistoryLog, path: P) -> HbResult<()> {
    write_json(history, path.as_ref())
}

pub fn write_report_json<P: AsRef<Path>>(report: &RunReport, path: P) -> HbResult<()> {
    write_json(report, path.as_ref())
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> HbResult<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    info!("Wrote {}", path.display());
    Ok(())
}

fn export_error(e: csv::Error) -> HbError {
    HbError::Export(e.to_string())
}
