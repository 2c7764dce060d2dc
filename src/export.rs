//! Interaction history export.
//!
//! Writes the audit trail of a unit to CSV or JSON files, oldest entry first,
//! under a timestamp-named directory so repeated exports never overwrite each
//! other.

use std::fmt;
use std::fs::{create_dir_all, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use csv::Writer;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{EngagementError, Result};
use crate::logging::OperationTimer;
use crate::metrics::MetricsCollector;
use crate::models::InteractionHistoryEntry;
use crate::store::{collections, RecordStore};
use crate::validation::InputValidator;

/// Timestamp format used for export directory names
pub const EXPORT_DIR_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// File format of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = EngagementError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(EngagementError::validation(format!(
                "unsupported export format: {other} (expected csv or json)"
            ))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One exported row
#[derive(Debug, Serialize)]
struct HistoryRow<'a> {
    id: &'a str,
    created_at: String,
    user_id: &'a str,
    phase_id: &'a str,
    success: bool,
    latency_ms: u64,
    confidence: f64,
    query: &'a str,
    response: &'a str,
    sources: String,
}

impl<'a> From<&'a InteractionHistoryEntry> for HistoryRow<'a> {
    fn from(entry: &'a InteractionHistoryEntry) -> Self {
        Self {
            id: &entry.id,
            created_at: entry.created_at.to_rfc3339(),
            user_id: &entry.user_id,
            phase_id: entry.phase_id.as_deref().unwrap_or(""),
            success: entry.success,
            latency_ms: entry.latency_ms,
            confidence: entry.confidence,
            query: &entry.query,
            response: &entry.response,
            sources: entry.sources.join("; "),
        }
    }
}

/// Write entries to a file in the given format
pub fn write_history_file(entries: &[InteractionHistoryEntry], format: ExportFormat, file_path: &Path) -> Result<()> {
    match format {
        ExportFormat::Csv => write_csv_file(entries, file_path),
        ExportFormat::Json => write_json_file(entries, file_path),
    }
}

/// CSV with a header row; sources are joined with `"; "`
fn write_csv_file(entries: &[InteractionHistoryEntry], file_path: &Path) -> Result<()> {
    let file = File::create(file_path)?;
    let mut writer = Writer::from_writer(BufWriter::new(file));

    for entry in entries {
        writer.serialize(HistoryRow::from(entry))?;
    }

    writer.flush()?;
    Ok(())
}

/// Pretty-printed JSON array of full entries
fn write_json_file(entries: &[InteractionHistoryEntry], file_path: &Path) -> Result<()> {
    let file = File::create(file_path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), entries)?;
    Ok(())
}

/// Exports the interaction history of units
pub struct HistoryExporter {
    store: Arc<dyn RecordStore>,
    metrics: MetricsCollector,
}

impl HistoryExporter {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            metrics: MetricsCollector::default(),
        }
    }

    /// Export up to `limit` most recent entries of a unit.
    ///
    /// Creates `output_dir/<timestamp>/history_<unit>.<ext>` and returns its
    /// path, or `None` when the unit has no history.
    pub async fn export_unit_history(
        &self,
        unit_id: &str,
        format: ExportFormat,
        output_dir: &Path,
        timestamp: &str,
        limit: usize,
    ) -> Result<Option<PathBuf>> {
        InputValidator::validate_unit_id(unit_id)?;
        InputValidator::validate_file_path(output_dir)?;
        InputValidator::validate_id("export timestamp", timestamp)?;
        if self.store.get_unit(unit_id).await?.is_none() {
            return Err(EngagementError::not_found(collections::UNITS, unit_id));
        }

        let timer = OperationTimer::new("export_unit_history");
        let started = std::time::Instant::now();

        let mut entries = self.store.recent_interactions(unit_id, limit).await?;
        if entries.is_empty() {
            warn!(unit_id, "No interaction history to export");
            return Ok(None);
        }
        entries.reverse();

        let date_dir = output_dir.join(timestamp);
        create_dir_all(&date_dir)?;
        let file_path = date_dir.join(format!("history_{unit_id}.{format}"));
        write_history_file(&entries, format, &file_path)?;

        self.metrics
            .record_export_operation(format.as_str(), entries.len(), started.elapsed());
        timer.finish();
        info!(unit_id, rows = entries.len(), path = %file_path.display(), "Interaction history exported");
        Ok(Some(file_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FallbackDataset, InMemoryStore};
    use crate::models::NewInteraction;
    use tempfile::tempdir;

    fn interaction(query: &str) -> NewInteraction {
        NewInteraction {
            unit_id: "mock-unit-1".into(),
            user_id: "system".into(),
            query: query.into(),
            response: "Resposta, com vírgula".into(),
            phase_id: Some("fase-interacao".into()),
            success: true,
            latency_ms: 120,
            confidence: 0.9,
            sources: vec!["Manual".into(), "FAQ".into()],
        }
    }

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("CSV".parse::<ExportFormat>().ok(), Some(ExportFormat::Csv));
        assert!("txt".parse::<ExportFormat>().is_err());
    }

    #[tokio::test]
    async fn csv_export_is_oldest_first_with_header() {
        let store = Arc::new(InMemoryStore::new());
        store.load(FallbackDataset::sample()).await;
        store.append_interaction(interaction("primeira")).await.expect("append");
        store.append_interaction(interaction("segunda")).await.expect("append");

        let dir = tempdir().expect("tempdir");
        let path = HistoryExporter::new(store)
            .export_unit_history("mock-unit-1", ExportFormat::Csv, dir.path(), "2026-10-01_12-00-00", 100)
            .await
            .expect("export")
            .expect("file written");

        let text = std::fs::read_to_string(path).expect("read");
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("id,created_at,user_id"));
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("primeira"));
        assert!(lines[2].contains("\"Resposta, com vírgula\""));
        assert!(lines[2].contains("Manual; FAQ"));
    }

    #[tokio::test]
    async fn empty_history_writes_nothing() {
        let store = Arc::new(InMemoryStore::new());
        store.load(FallbackDataset::sample()).await;
        let dir = tempdir().expect("tempdir");

        let path = HistoryExporter::new(store)
            .export_unit_history("mock-unit-1", ExportFormat::Json, dir.path(), "run", 10)
            .await
            .expect("export");
        assert!(path.is_none());
    }
}
