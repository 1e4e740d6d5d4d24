//! Layered settings: built-in defaults, optional settings file, environment.

use std::path::{Path, PathBuf};

use ::config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::error::RunnerError;

/// Environment variable prefix, e.g. `KOKORO_SAY_INTERPRETER`.
pub const ENV_PREFIX: &str = "KOKORO_SAY";

const APP_DIR: &str = "kokoro-say";

/// Runtime configuration for every component.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    /// Explicit interpreter; wins over the provisioned runtime.
    #[serde(default)]
    pub interpreter: Option<PathBuf>,
    /// Model repository override passed as `--repo`.
    #[serde(default)]
    pub repo: Option<String>,
    /// Revision pin passed as `--revision`.
    #[serde(default)]
    pub revision: Option<String>,
    pub runtime_dir: PathBuf,
    pub scripts_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Interpreter used to create the runtime and as the last fallback.
    pub system_python: PathBuf,
    pub poll_interval_ms: u64,
    pub default_voice: String,
    pub default_language: String,
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interpreter: None,
            repo: None,
            revision: None,
            runtime_dir: data_dir().join("runtime"),
            scripts_dir: data_dir().join("scripts"),
            output_dir: std::env::temp_dir().join(APP_DIR),
            system_python: PathBuf::from("python3"),
            poll_interval_ms: 50,
            default_voice: "af_heart".to_string(),
            default_language: "a".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the user config directory and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let file = dirs::config_dir().map(|dir| dir.join(APP_DIR).join("settings"));
        Self::load_from(file.as_deref())
    }

    /// Load settings, reading `file` (extension optional) when it exists.
    pub fn load_from(file: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Settings::default();

        let mut builder = Config::builder()
            .set_default("runtime_dir", path_str(&defaults.runtime_dir))?
            .set_default("scripts_dir", path_str(&defaults.scripts_dir))?
            .set_default("output_dir", path_str(&defaults.output_dir))?
            .set_default("system_python", path_str(&defaults.system_python))?
            .set_default("poll_interval_ms", defaults.poll_interval_ms)?
            .set_default("default_voice", defaults.default_voice)?
            .set_default("default_language", defaults.default_language)?;

        if let Some(file) = file {
            builder = builder.add_source(File::from(file).required(false));
        }

        let settings: Settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.default_voice.trim().is_empty() {
            return Err(ConfigError::Message(
                "default_voice cannot be empty".to_string(),
            ));
        }
        if self.default_language.trim().is_empty() {
            return Err(ConfigError::Message(
                "default_language cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Path of a collaborator script inside `scripts_dir`.
    pub fn script(&self, name: &str) -> PathBuf {
        self.scripts_dir.join(name)
    }

    /// Like [`Settings::script`], but the file must exist.
    pub fn require_script(&self, name: &str) -> Result<PathBuf, RunnerError> {
        let path = self.script(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(RunnerError::MissingCollaboratorScript(path))
        }
    }

    /// `--repo` / `--revision` flags for every collaborator script, only
    /// when overridden; the scripts carry their own defaults.
    pub fn source_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(repo) = self.repo.as_deref().filter(|r| !r.trim().is_empty()) {
            args.push("--repo".to_string());
            args.push(repo.to_string());
        }
        if let Some(revision) = self.revision.as_deref().filter(|r| !r.trim().is_empty()) {
            args.push("--revision".to_string());
            args.push(revision.to_string());
        }
        args
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
