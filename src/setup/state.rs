//! Provisioning state and best-effort activity labels.

use std::fmt;

/// Where provisioning currently stands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SetupState {
    #[default]
    Idle,
    CreatingRuntime,
    InstallingDependencies,
    LoadingCatalog,
    Ready,
    /// Terminal; a new provisioner is needed to try again.
    Failed(String),
}

impl SetupState {
    pub fn is_ready(&self) -> bool {
        matches!(self, SetupState::Ready)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SetupState::Failed(_))
    }

    /// Default status line shown while in this state.
    pub fn status_message(&self) -> String {
        match self {
            SetupState::Idle => "Waiting to start".to_string(),
            SetupState::CreatingRuntime => "Creating Python runtime...".to_string(),
            SetupState::InstallingDependencies => "Installing dependencies...".to_string(),
            SetupState::LoadingCatalog => "Loading model and voices...".to_string(),
            SetupState::Ready => "Ready".to_string(),
            SetupState::Failed(message) => format!("Setup failed: {message}"),
        }
    }
}

impl fmt::Display for SetupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupState::Idle => write!(f, "idle"),
            SetupState::CreatingRuntime => write!(f, "creating runtime"),
            SetupState::InstallingDependencies => write!(f, "installing dependencies"),
            SetupState::LoadingCatalog => write!(f, "loading catalog"),
            SetupState::Ready => write!(f, "ready"),
            SetupState::Failed(message) => write!(f, "failed: {message}"),
        }
    }
}

/// Guess a friendlier status line from one line of installer output.
///
/// Matches venv/pip phrasing only; anything else returns `None` and the
/// caller keeps its current label. Never used to decide success.
pub fn activity_label(line: &str) -> Option<&'static str> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let lower = line.to_ascii_lowercase();

    if lower.starts_with("successfully installed") {
        Some("Dependencies installed")
    } else if lower.starts_with("installing collected packages") || lower.contains("installing") {
        Some("Installing packages...")
    } else if lower.starts_with("collecting") || lower.starts_with("looking in indexes") {
        Some("Resolving packages...")
    } else if lower.starts_with("downloading") || lower.contains("download") {
        Some("Downloading packages...")
    } else if lower.starts_with("building wheel") || lower.contains("building") {
        Some("Building packages...")
    } else if lower.contains("virtual environment") || lower.contains("creat") {
        Some("Creating Python runtime...")
    } else {
        None
    }
}
