//! Word timing tables produced alongside each synthesized clip.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RunnerError;

/// One word and the span of audio in which it is heard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimedWord {
    pub word: String,
    /// Seconds from the start of the clip, inclusive.
    pub start: f64,
    /// Seconds from the start of the clip, exclusive.
    pub end: f64,
}

impl TimedWord {
    pub fn new(word: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            word: word.into(),
            start,
            end,
        }
    }

    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time < self.end
    }
}

/// Index of the first word whose span contains `time`.
///
/// Scans in table order, so for unsorted or overlapping tables the earliest
/// listed match wins. Times before the first word, in a gap, or after the
/// last word resolve to `None`.
pub fn index_for_time(time: f64, table: &[TimedWord]) -> Option<usize> {
    table.iter().position(|word| word.contains(time))
}

/// Whether starts are non-decreasing and no word overlaps the next.
pub fn is_well_formed(table: &[TimedWord]) -> bool {
    table.iter().all(|word| word.start <= word.end)
        && table
            .windows(2)
            .all(|pair| pair[0].start <= pair[1].start && pair[0].end <= pair[1].start)
}

/// Read a timing artifact: a JSON array of `{"word", "start", "end"}`.
pub fn load_timings(path: &Path) -> Result<Vec<TimedWord>, RunnerError> {
    if !path.exists() {
        return Err(RunnerError::MissingOutputArtifact(path.to_path_buf()));
    }
    let json = std::fs::read_to_string(path)?;
    parse_timings(&json)
}

pub fn parse_timings(json: &str) -> Result<Vec<TimedWord>, RunnerError> {
    serde_json::from_str(json).map_err(|e| RunnerError::TimingDecode(e.to_string()))
}
