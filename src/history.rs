use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::StrainError;
use crate::models::{AnswerSet, HistoryRecord, ScoreResult};

pub const HISTORY_FILE: &str = "history.jsonl";

/// Append-only run log, one JSON record per line.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(base: &Path) -> Self {
        Self::new(base.join(HISTORY_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &HistoryRecord) -> Result<(), StrainError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        // Keep a torn final line isolated from the new record.
        if ends_without_newline(&mut file)? {
            line.insert(0, b'\n');
        }

        file.write_all(&line)?;
        file.flush()?;
        tracing::info!(
            path = %self.path.display(),
            ratio = record.ratio,
            band = %record.band,
            "appended run"
        );
        Ok(())
    }

    /// Every parseable record in append order. Unparseable lines are skipped.
    pub fn read_all(&self) -> Result<Vec<HistoryRecord>, StrainError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let bytes = std::fs::read(&self.path)?;
        let mut records = Vec::new();

        for (index, line) in bytes.split(|b| *b == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<HistoryRecord>(line) {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = index + 1,
                        error = %err,
                        "skipping unreadable history line"
                    );
                }
            }
        }

        Ok(records)
    }

    /// The most recent `limit` records, oldest first.
    pub fn read(&self, limit: usize) -> Result<Vec<HistoryRecord>, StrainError> {
        let mut records = self.read_all()?;
        let start = records.len().saturating_sub(limit);
        Ok(records.split_off(start))
    }
}

fn ends_without_newline(file: &mut std::fs::File) -> Result<bool, StrainError> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(false);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

pub fn save_run(
    base: &Path,
    label: &str,
    context: &str,
    answers: &AnswerSet,
    results: &ScoreResult,
) -> Result<HistoryRecord, StrainError> {
    let record = HistoryRecord {
        ts: results.ts,
        label: label.trim().to_string(),
        context: context.trim().to_string(),
        ratio: results.ratio,
        band: results.band,
        total_points: results.total_points,
        max_points: results.max_points,
        domain_report: results.domain_report.clone(),
        answers: answers.clone(),
    };
    HistoryStore::in_dir(base).append(&record)?;
    Ok(record)
}

pub fn read_history(base: &Path, limit: usize) -> Result<Vec<HistoryRecord>, StrainError> {
    HistoryStore::in_dir(base).read(limit)
}
