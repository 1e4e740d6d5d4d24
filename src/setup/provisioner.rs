//! Provisioning state machine.

use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::Mutex as AsyncMutex;

use super::runtime::{RUNTIME_PACKAGES, RuntimeLayout};
use super::state::{SetupState, activity_label};
use crate::context::AppContext;
use crate::error::{RunnerError, tail_lines};
use crate::process::{OutputMode, run_streaming};
use crate::voice::VoiceManager;

/// Brings the runtime from nothing to `Ready`.
///
/// A failure is terminal for the context: once `Failed` is published, every
/// provisioner over that context returns the same error from `start`
/// without touching the disk. Retrying takes a fresh context; whatever the
/// failed attempt left behind is not cleaned up.
pub struct Provisioner {
    ctx: Arc<AppContext>,
    voices: VoiceManager,
    starting: AsyncMutex<()>,
}

impl Provisioner {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self {
            voices: VoiceManager::new(ctx.clone()),
            ctx,
            starting: AsyncMutex::new(()),
        }
    }

    pub fn voices(&self) -> &VoiceManager {
        &self.voices
    }

    pub fn state(&self) -> SetupState {
        self.ctx.setup_state()
    }

    /// Run provisioning to completion.
    ///
    /// `progress` receives a status message and the cumulative log of every
    /// step so far. Concurrent callers are serialized; whoever comes second
    /// finds the runtime ready and returns immediately.
    pub async fn start<F>(&self, mut progress: F) -> Result<(), RunnerError>
    where
        F: FnMut(&str, &str) + Send,
    {
        let _starting = self.starting.lock().await;

        match self.ctx.setup_state() {
            SetupState::Failed(message) => return Err(RunnerError::ProvisioningFailed(message)),
            SetupState::Ready => {
                debug!("Runtime already provisioned");
                return Ok(());
            }
            _ => {}
        }

        let mut log = String::new();
        match self.provision(&mut progress, &mut log).await {
            Ok(()) => Ok(()),
            Err(err) => {
                let message = err.to_string();
                warn!("Setup failed: {message}");
                self.transition(SetupState::Failed(message), &mut progress, &log);
                Err(err)
            }
        }
    }

    async fn provision<F>(&self, progress: &mut F, log: &mut String) -> Result<(), RunnerError>
    where
        F: FnMut(&str, &str) + Send,
    {
        let settings = self.ctx.settings();
        let layout = RuntimeLayout::new(&settings.runtime_dir);

        if layout.is_provisioned() {
            info!("Using cached runtime at {}", layout.root().display());
        } else {
            self.transition(SetupState::CreatingRuntime, progress, log);
            if let Some(parent) = layout.root().parent() {
                std::fs::create_dir_all(parent)?;
            }
            let args = vec![
                "-m".to_string(),
                "venv".to_string(),
                layout.root().to_string_lossy().into_owned(),
            ];
            self.run_step(
                "Runtime creation",
                &settings.system_python,
                &args,
                SetupState::CreatingRuntime,
                progress,
                log,
            )
            .await?;

            self.transition(SetupState::InstallingDependencies, progress, log);
            let mut args = vec!["-m".to_string(), "pip".to_string(), "install".to_string()];
            args.extend(RUNTIME_PACKAGES.iter().map(|p| p.to_string()));
            self.run_step(
                "Dependency installation",
                &layout.interpreter(),
                &args,
                SetupState::InstallingDependencies,
                progress,
                log,
            )
            .await?;
        }

        self.transition(SetupState::LoadingCatalog, progress, log);
        let base = log.clone();
        let mut fetched = String::new();
        self.voices
            .prefetch_model(|message, model_log| {
                progress(message, &format!("{base}{model_log}"));
                fetched = model_log.to_string();
            })
            .await?;
        log.push_str(&fetched);

        self.voices.list_catalog().await?;

        self.transition(SetupState::Ready, progress, log);
        Ok(())
    }

    /// Report first, then publish.
    fn transition<F>(&self, state: SetupState, progress: &mut F, log: &str)
    where
        F: FnMut(&str, &str),
    {
        info!("Setup state: {state}");
        progress(&state.status_message(), log);
        self.ctx.publish_setup_state(state);
    }

    async fn run_step<F>(
        &self,
        step: &str,
        program: &Path,
        args: &[String],
        state: SetupState,
        progress: &mut F,
        log: &mut String,
    ) -> Result<(), RunnerError>
    where
        F: FnMut(&str, &str) + Send,
    {
        debug!("{step}: {} {}", program.display(), args.join(" "));

        let mut label = state.status_message();
        let result = run_streaming(
            self.ctx.runner(),
            program,
            args,
            OutputMode::Piped,
            |chunk| {
                log.push_str(&chunk.text);
                if let Some(found) = chunk.text.lines().filter_map(activity_label).last() {
                    label = found.to_string();
                }
                progress(&label, log);
            },
        )
        .await;

        if result.success() {
            return Ok(());
        }

        let detail = [result.stderr.trim(), result.stdout.trim()]
            .into_iter()
            .find(|text| !text.is_empty())
            .map(|text| tail_lines(text, 20))
            .unwrap_or_else(|| "no output".to_string());
        Err(RunnerError::ProvisioningFailed(format!(
            "{step} failed (exit code {}): {detail}",
            result.exit_code
        )))
    }
}
