//! Error taxonomy shared by provisioning, acquisition and synthesis.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced to callers of the runner.
///
/// Every variant renders to a non-empty message carrying the most specific
/// detail available, so the presentation layer can show it as-is.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Runtime provisioning failed: {0}")]
    ProvisioningFailed(String),

    #[error("Collaborator script not found: {}", .0.display())]
    MissingCollaboratorScript(PathBuf),

    #[error("Process exited with code {code}{}", detail_suffix(.stderr))]
    NonZeroExit { code: i32, stderr: String },

    #[error("Expected output file was not produced: {}", .0.display())]
    MissingOutputArtifact(PathBuf),

    #[error("Invalid voice catalog: {0}")]
    CatalogDecode(#[from] serde_json::Error),

    #[error("Invalid timing file: {0}")]
    TimingDecode(String),

    #[error("A download is already in progress: {0}")]
    DownloadInProgress(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid voice id: {0}")]
    InvalidVoice(String),

    #[error("Text to synthesize is empty")]
    EmptyText,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn detail_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

impl RunnerError {
    /// Build a [`RunnerError::NonZeroExit`] from captured output.
    ///
    /// PTY runs merge stderr into stdout, so when stderr is blank the last
    /// lines of stdout stand in for it.
    pub fn non_zero_exit(code: i32, stderr: &str, stdout: &str) -> Self {
        let detail = stderr.trim();
        let detail = if detail.is_empty() {
            tail_lines(stdout.trim(), 20)
        } else {
            detail.to_string()
        };
        RunnerError::NonZeroExit {
            code,
            stderr: detail,
        }
    }
}

/// Last `count` lines of `text`, joined back with newlines.
pub(crate) fn tail_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}
