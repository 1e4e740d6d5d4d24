//! Synthesis invocation.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Local;
use log::{debug, info};

use crate::context::AppContext;
use crate::error::RunnerError;
use crate::process::{OutputMode, run_streaming};
use crate::setup::resolve_interpreter;
use crate::voice::validate_voice_id;

pub const SYNTH_SCRIPT: &str = "kokoro_say.py";

/// Files produced by one synthesis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisOutput {
    /// 24 kHz WAV.
    pub audio_path: PathBuf,
    /// JSON array of timed words.
    pub timings_path: PathBuf,
}

/// Runs the synthesis script through the pseudo-terminal.
pub struct Synthesizer {
    ctx: Arc<AppContext>,
    counter: AtomicU64,
}

impl Synthesizer {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self {
            ctx,
            counter: AtomicU64::new(0),
        }
    }

    /// Synthesize `text` and return the produced files.
    ///
    /// # Arguments
    /// * `text` - Text to speak; must not be blank
    /// * `voice` - Voice id such as `af_heart`
    /// * `language` - Single-letter language code such as `a`
    pub async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        language: &str,
    ) -> Result<SynthesisOutput, RunnerError> {
        self.synthesize_with_progress(text, voice, language, |_, _| {})
            .await
    }

    /// Like [`Synthesizer::synthesize`], reporting script output as it arrives.
    pub async fn synthesize_with_progress<F>(
        &self,
        text: &str,
        voice: &str,
        language: &str,
        mut progress: F,
    ) -> Result<SynthesisOutput, RunnerError>
    where
        F: FnMut(&str, &str) + Send,
    {
        if text.trim().is_empty() {
            return Err(RunnerError::EmptyText);
        }
        validate_voice_id(voice)?;

        // Fresh snapshot so interpreter overrides apply to this call.
        let settings = self.ctx.settings();
        let script = settings.require_script(SYNTH_SCRIPT)?;
        let interpreter = resolve_interpreter(&settings);

        std::fs::create_dir_all(&settings.output_dir)?;
        let stem = self.next_stem();
        let output = SynthesisOutput {
            audio_path: settings.output_dir.join(format!("{stem}.wav")),
            timings_path: settings.output_dir.join(format!("{stem}.json")),
        };

        // `--flag=value` keeps text such as "- item one" from being parsed
        // as an option by the script.
        let mut args = vec![
            script.to_string_lossy().into_owned(),
            format!("--text={text}"),
            format!("--voice={voice}"),
            format!("--lang={language}"),
            format!("--out={}", output.audio_path.display()),
            format!("--timings={}", output.timings_path.display()),
        ];
        args.extend(settings.source_args());

        debug!(
            "Synthesizing {} chars with {voice}/{language} via {}",
            text.chars().count(),
            interpreter.display()
        );

        let message = format!("Synthesizing with {voice}...");
        let mut log = String::new();
        progress(&message, &log);
        let result = run_streaming(
            self.ctx.runner(),
            &interpreter,
            &args,
            OutputMode::PseudoTerminal,
            |chunk| {
                log.push_str(&chunk.text);
                progress(&message, &log);
            },
        )
        .await;

        if !result.success() {
            return Err(RunnerError::non_zero_exit(
                result.exit_code,
                &result.stderr,
                &result.stdout,
            ));
        }

        if !output.audio_path.is_file() {
            return Err(RunnerError::MissingOutputArtifact(output.audio_path));
        }

        info!("Audio written to {}", output.audio_path.display());
        Ok(output)
    }

    /// Timestamped file stem, unique within this process.
    fn next_stem(&self) -> String {
        let sequence = self.counter.fetch_add(1, Ordering::Relaxed);
        format!(
            "speech-{}-{sequence}",
            Local::now().format("%Y%m%d-%H%M%S-%3f")
        )
    }
}
