//! Screening report export.
//!
//! Writes `candidates_<YYYYMMDD>.csv` and/or `.json` for a run. The CSV
//! carries a UTF-8 byte-order mark so spreadsheet tools detect the encoding.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::compact_date;

use super::engine::ScreeningRun;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Hits only, one row per security
    Csv,
    /// The whole run including counts
    Json,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown report format: {}", s)),
        }
    }
}

/// Writes run results into a directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
    formats: Vec<ReportFormat>,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>, formats: Vec<ReportFormat>) -> Self {
        Self {
            dir: dir.into(),
            formats,
        }
    }

    /// File path for `format` on the run's date.
    pub fn path_for(&self, run: &ScreeningRun, format: ReportFormat) -> PathBuf {
        self.dir.join(format!(
            "candidates_{}.{}",
            run.trade_date.format(compact_date::FORMAT),
            format.extension()
        ))
    }

    /// Write every configured format. A run without hits writes nothing.
    pub fn write(&self, run: &ScreeningRun) -> Result<Vec<PathBuf>> {
        if run.is_empty() {
            info!(trade_date = %run.trade_date, "No hits, skipping report export");
            return Ok(Vec::new());
        }

        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create report directory {}", self.dir.display()))?;

        let mut written = Vec::with_capacity(self.formats.len());
        for format in &self.formats {
            let path = self.path_for(run, *format);
            match format {
                ReportFormat::Csv => write_csv(&path, run)?,
                ReportFormat::Json => write_json(&path, run)?,
            }
            info!(path = %path.display(), hits = run.hits.len(), "Report written");
            written.push(path);
        }

        Ok(written)
    }
}

fn write_csv(path: &Path, run: &ScreeningRun) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(UTF8_BOM)
        .context("Failed to write byte-order mark")?;

    let mut writer = csv::Writer::from_writer(file);
    for hit in &run.hits {
        writer
            .serialize(hit)
            .with_context(|| format!("Failed to write row for {}", hit.ts_code))?;
    }
    writer.flush().context("Failed to flush CSV")?;
    Ok(())
}

fn write_json(path: &Path, run: &ScreeningRun) -> Result<()> {
    let content = serde_json::to_string_pretty(run).context("Failed to serialize run")?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}
