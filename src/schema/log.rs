//! Per-learner source logs
//!
//! One source file holds one learner's rows for one academic year. The file
//! stem is the learner id and the parent directory name is the year.

use crate::error::FluxError;
use crate::schema::adapter::{LoadedRows, RawEventAdapter};
use crate::schema::raw_event::RawEventRow;
use std::path::Path;

/// Rows belonging to one learner and year
#[derive(Debug, Clone, PartialEq)]
pub struct LearnerLog {
    pub learner_id: String,
    /// Directory-derived year; `None` means derive it from event times
    pub year: Option<String>,
    pub rows: Vec<RawEventRow>,
    /// Source lines that could not be read as rows
    pub unreadable_rows: usize,
}

impl LearnerLog {
    pub fn new(learner_id: impl Into<String>, year: impl Into<String>, rows: Vec<RawEventRow>) -> Self {
        Self {
            learner_id: learner_id.into(),
            year: Some(year.into()),
            rows,
            unreadable_rows: 0,
        }
    }

    /// Build a log from its file path.
    ///
    /// The stem must parse as an integer learner id. A missing parent
    /// directory leaves the year unset.
    pub fn from_path(path: &Path, loaded: LoadedRows) -> Result<Self, FluxError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| FluxError::InvalidLearnerId(path.display().to_string()))?;
        let learner_id = parse_learner_id(stem)?;

        let year = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self {
            learner_id: learner_id.to_string(),
            year,
            rows: loaded.rows,
            unreadable_rows: loaded.unreadable,
        })
    }

    /// Read and parse a JSON array or NDJSON file
    pub fn read(path: &Path) -> Result<Self, FluxError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| FluxError::ParseError(format!("{}: {}", path.display(), e)))?;
        let loaded = RawEventAdapter::parse_rows(&text)?;
        Self::from_path(path, loaded)
    }
}

/// Learner ids are integers; leading zeros are not significant
pub fn parse_learner_id(raw: &str) -> Result<u64, FluxError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| FluxError::InvalidLearnerId(raw.to_string()))
}
