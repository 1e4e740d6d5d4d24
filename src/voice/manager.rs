//! Model prefetch, catalog listing and single-voice downloads.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::catalog::{VoiceCatalog, validate_voice_id};
use crate::context::AppContext;
use crate::error::RunnerError;
use crate::process::{OutputMode, ProcessResult, run_streaming};
use crate::setup::resolve_interpreter;

pub const PREFETCH_SCRIPT: &str = "kokoro_prefetch.py";
pub const LIST_SCRIPT: &str = "kokoro_list_remote.py";
pub const DOWNLOAD_SCRIPT: &str = "kokoro_download_voice.py";

/// Runs the acquisition scripts.
///
/// The download slot lives in the [`AppContext`], so every manager built
/// over one context shares it.
pub struct VoiceManager {
    ctx: Arc<AppContext>,
}

impl VoiceManager {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Voice currently being downloaded, if any.
    pub fn downloading(&self) -> Option<String> {
        self.ctx.downloading()
    }

    pub fn subscribe_downloading(&self) -> watch::Receiver<Option<String>> {
        self.ctx.subscribe_downloading()
    }

    /// Interpreter and script path, plus the leading script argument.
    fn command_for(&self, script: &str) -> Result<(PathBuf, Vec<String>), RunnerError> {
        let settings = self.ctx.settings();
        let script = settings.require_script(script)?;
        let interpreter = resolve_interpreter(&settings);
        let mut args = vec![script.to_string_lossy().into_owned()];
        args.extend(settings.source_args());
        Ok((interpreter, args))
    }

    /// Download the full model repository into the local cache.
    pub async fn prefetch_model<F>(&self, mut progress: F) -> Result<(), RunnerError>
    where
        F: FnMut(&str, &str) + Send,
    {
        let (interpreter, args) = self.command_for(PREFETCH_SCRIPT)?;
        let message = "Fetching Kokoro model...";
        progress(message, "");

        let mut log = String::new();
        let result = run_logged(&self.ctx, &interpreter, &args, &mut log, |log| {
            progress(message, log)
        })
        .await;
        check_exit(&result)?;

        progress("Kokoro model cached", &log);
        info!("Kokoro model cached");
        Ok(())
    }

    /// List remote and downloaded voices and publish the new catalog.
    pub async fn list_catalog(&self) -> Result<VoiceCatalog, RunnerError> {
        let (interpreter, args) = self.command_for(LIST_SCRIPT)?;

        // Piped so stderr chatter cannot corrupt the JSON on stdout.
        let result = self
            .ctx
            .runner()
            .run(&interpreter, &args, OutputMode::Piped, None)
            .await;
        check_exit(&result)?;

        let catalog = VoiceCatalog::from_json(&result.stdout)?;
        info!(
            "Voice catalog: {} available, {} downloaded",
            catalog.available.len(),
            catalog.downloaded.len()
        );
        self.ctx.replace_catalog(catalog.clone());
        Ok(catalog)
    }

    /// Download one voice, then rebuild the catalog.
    ///
    /// Only one download may run at a time; a second request is rejected
    /// rather than queued. Cancelling `cancel` kills the script and leaves
    /// the voice marked as not downloaded.
    pub async fn download_voice<F>(
        &self,
        voice: &str,
        cancel: &CancellationToken,
        mut progress: F,
    ) -> Result<VoiceCatalog, RunnerError>
    where
        F: FnMut(&str, &str) + Send,
    {
        validate_voice_id(voice)?;
        let _slot = self.ctx.claim_download(voice)?;
        debug!("Download slot taken by {voice}");

        let (interpreter, mut args) = self.command_for(DOWNLOAD_SCRIPT)?;
        args.splice(1..1, ["--voice".to_string(), voice.to_string()]);

        let message = format!("Downloading voice {voice}...");
        progress(&message, "");

        let mut log = String::new();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Download of {voice} cancelled");
                return Err(RunnerError::Cancelled);
            }
            result = run_logged(&self.ctx, &interpreter, &args, &mut log, |log| {
                progress(&message, log)
            }) => result,
        };
        check_exit(&result)?;

        progress(&format!("Voice {voice} downloaded"), &log);
        self.list_catalog().await
    }
}

/// Run through the pseudo-terminal, appending every chunk to `log` and
/// reporting the cumulative text after each one.
async fn run_logged<F>(
    ctx: &AppContext,
    interpreter: &Path,
    args: &[String],
    log: &mut String,
    mut report: F,
) -> ProcessResult
where
    F: FnMut(&str) + Send,
{
    run_streaming(
        ctx.runner(),
        interpreter,
        args,
        OutputMode::PseudoTerminal,
        |chunk| {
            log.push_str(&chunk.text);
            report(log);
        },
    )
    .await
}

fn check_exit(result: &ProcessResult) -> Result<(), RunnerError> {
    if result.success() {
        Ok(())
    } else {
        Err(RunnerError::non_zero_exit(
            result.exit_code,
            &result.stderr,
            &result.stdout,
        ))
    }
}
