//! On-disk layout of the provisioned runtime and interpreter selection.

use std::path::{Path, PathBuf};

use crate::settings::Settings;

/// Bumped when the dependency set changes so old runtimes are not reused.
pub const RUNTIME_VERSION: &str = "1";

/// Packages installed into a fresh runtime.
pub const RUNTIME_PACKAGES: &[&str] = &["kokoro", "huggingface_hub", "soundfile", "numpy"];

/// Location of the isolated Python environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeLayout {
    root: PathBuf,
}

impl RuntimeLayout {
    pub fn new(runtime_dir: &Path) -> Self {
        Self {
            root: runtime_dir.join(format!("python-v{RUNTIME_VERSION}")),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn interpreter(&self) -> PathBuf {
        if cfg!(windows) {
            self.root.join("Scripts").join("python.exe")
        } else {
            self.root.join("bin").join("python3")
        }
    }

    /// The interpreter's presence is the only validity check; no version or
    /// checksum is verified.
    pub fn is_provisioned(&self) -> bool {
        self.interpreter().exists()
    }
}

/// Pick the interpreter for a collaborator script.
///
/// Explicit override first, then the provisioned runtime when it exists,
/// then the system interpreter. Evaluated on every call so a changed
/// override applies to the next invocation.
pub fn resolve_interpreter(settings: &Settings) -> PathBuf {
    if let Some(interpreter) = settings
        .interpreter
        .as_ref()
        .filter(|p| !p.as_os_str().is_empty())
    {
        return interpreter.clone();
    }

    let layout = RuntimeLayout::new(&settings.runtime_dir);
    if layout.is_provisioned() {
        return layout.interpreter();
    }

    settings.system_python.clone()
}
