//! Voice catalog as reported by the listing script.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::RunnerError;

/// Voices offered by the model repository and those already cached locally.
///
/// Always rebuilt from a complete listing; never patched in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceCatalog {
    #[serde(rename = "voices")]
    pub available: BTreeSet<String>,
    pub downloaded: BTreeSet<String>,
}

impl VoiceCatalog {
    /// Decode the listing script's stdout. Both fields are required.
    pub fn from_json(json: &str) -> Result<Self, RunnerError> {
        Ok(serde_json::from_str(json.trim())?)
    }

    pub fn is_downloaded(&self, voice: &str) -> bool {
        self.downloaded.contains(voice)
    }

    /// Available voices not yet cached, in name order.
    pub fn not_downloaded(&self) -> impl Iterator<Item = &str> {
        self.available
            .difference(&self.downloaded)
            .map(String::as_str)
    }
}

/// Validate a voice id before it reaches a command line or a file name.
pub fn validate_voice_id(voice: &str) -> Result<(), RunnerError> {
    if voice.trim().is_empty() {
        return Err(RunnerError::InvalidVoice(
            "Voice id cannot be empty".to_string(),
        ));
    }

    // Prevent path traversal
    if voice.contains('/') || voice.contains('\\') || voice.contains("..") {
        return Err(RunnerError::InvalidVoice(format!(
            "{voice} contains path separators"
        )));
    }

    if voice.starts_with('-') {
        return Err(RunnerError::InvalidVoice(format!(
            "{voice} looks like a command-line flag"
        )));
    }

    Ok(())
}
