//! JSON file sink
//!
//! Writes `result_<n>.json` for successes and `faulty_<n>.json` for failures
//! into one output directory. An empty list produces no artifact.

use crate::output::traits::{PersistSummary, ResultSink, SinkResult};
use crate::state::{BatchResult, FailureRecord, SuccessRecord};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Sink persisting batches as pretty-printed JSON arrays
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    directory: PathBuf,
}

impl JsonFileSink {
    /// Creates a sink writing into `directory`, creating it if needed
    pub fn new(directory: impl Into<PathBuf>) -> SinkResult<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    /// Output directory
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the success artifact for a batch
    pub fn result_path(&self, batch_number: usize) -> PathBuf {
        self.directory.join(format!("result_{}.json", batch_number))
    }

    /// Path of the failure artifact for a batch
    pub fn faulty_path(&self, batch_number: usize) -> PathBuf {
        self.directory.join(format!("faulty_{}.json", batch_number))
    }

    fn write_records<T: Serialize>(path: &Path, records: &[T]) -> SinkResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, records)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

impl ResultSink for JsonFileSink {
    fn persist(&mut self, batch_number: usize, batch: &BatchResult) -> SinkResult<PersistSummary> {
        let harvested_at = chrono::Utc::now().to_rfc3339();
        let mut summary = PersistSummary::default();

        let successes: Vec<SuccessRecord> = batch
            .successes
            .iter()
            .filter_map(|g| g.to_success_record(&harvested_at))
            .collect();

        let failures: Vec<FailureRecord> = batch
            .failures
            .iter()
            .flat_map(|g| g.to_failure_records())
            .collect();

        if !successes.is_empty() {
            let path = self.result_path(batch_number);
            Self::write_records(&path, &successes)?;
            tracing::info!("Data harvested: {} records -> {}", successes.len(), path.display());
            summary.successes = successes.len();
            summary.result_path = Some(path);
        }

        if !failures.is_empty() {
            let path = self.faulty_path(batch_number);
            Self::write_records(&path, &failures)?;
            tracing::info!("Faulty URLs: {} records -> {}", failures.len(), path.display());
            summary.failures = failures.len();
            summary.faulty_path = Some(path);
        }

        Ok(summary)
    }
}
