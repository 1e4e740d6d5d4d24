//! kokoro-say CLI entry point.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use kokoro_say::cli::{Args, Command, Language};
use kokoro_say::context::AppContext;
use kokoro_say::engine::Synthesizer;
use kokoro_say::error::RunnerError;
use kokoro_say::playback::{CursorTracker, WallClock, load_timings};
use kokoro_say::process::SystemRunner;
use kokoro_say::settings::Settings;
use kokoro_say::setup::Provisioner;
use log::{debug, warn};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut settings = Settings::load().context("Failed to load settings")?;
    args.apply(&mut settings);
    debug!("Settings: {settings:?}");

    // Script output is only echoed in verbose mode; otherwise the status
    // lines below are the whole story.
    let runner = SystemRunner::new().with_echo(args.verbose);
    let ctx = AppContext::new(settings, Arc::new(runner));
    let provisioner = Provisioner::new(ctx.clone());

    match args.command {
        Command::Setup => run_setup(&provisioner).await,
        Command::Voices => list_voices(&ctx, &provisioner).await,
        Command::Download { voice } => download(&provisioner, &voice).await,
        Command::Say {
            text,
            voice,
            lang,
            follow,
        } => say(&ctx, &provisioner, &text, voice, lang, follow).await,
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .init();
}

/// Progress callback printing each distinct status line once.
fn status_printer() -> impl FnMut(&str, &str) + Send {
    let mut last = String::new();
    move |message: &str, _log: &str| {
        if message != last {
            eprintln!("{message}");
            last = message.to_string();
        }
    }
}

async fn run_setup(provisioner: &Provisioner) -> Result<()> {
    provisioner
        .start(status_printer())
        .await
        .context("Failed to prepare the Kokoro runtime")?;
    println!("Runtime ready.");
    Ok(())
}

async fn list_voices(ctx: &AppContext, provisioner: &Provisioner) -> Result<()> {
    run_setup(provisioner).await?;

    let catalog = ctx.catalog();
    if catalog.available.is_empty() {
        println!("No voices found.");
        return Ok(());
    }

    println!("Available voices:");
    for voice in &catalog.available {
        let marker = if catalog.is_downloaded(voice) { "*" } else { " " };
        let language = Language::for_voice(voice).map_or("unknown", |lang| lang.name());
        println!("  {marker} {voice} ({language})");
    }
    println!("  (* = downloaded)");
    Ok(())
}

async fn download(provisioner: &Provisioner, voice: &str) -> Result<()> {
    run_setup(provisioner).await?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match provisioner
        .voices()
        .download_voice(voice, &cancel, status_printer())
        .await
    {
        Ok(catalog) => {
            println!(
                "Voice '{voice}' downloaded ({} of {} voices available locally).",
                catalog.downloaded.len(),
                catalog.available.len()
            );
            Ok(())
        }
        Err(RunnerError::Cancelled) => {
            eprintln!("Download of '{voice}' cancelled.");
            Err(RunnerError::Cancelled.into())
        }
        Err(err) => Err(err).with_context(|| format!("Failed to download voice '{voice}'")),
    }
}

async fn say(
    ctx: &Arc<AppContext>,
    provisioner: &Provisioner,
    text: &str,
    voice: Option<String>,
    lang: Option<Language>,
    follow: bool,
) -> Result<()> {
    run_setup(provisioner).await?;

    let settings = ctx.settings();
    let voice = voice.unwrap_or(settings.default_voice);
    let language = lang
        .or_else(|| Language::for_voice(&voice))
        .map_or(settings.default_language, |lang| lang.as_str().to_string());

    println!("Generating speech...");
    println!("  Voice: {voice}");
    println!("  Language: {language}");

    let output = Synthesizer::new(ctx.clone())
        .synthesize_with_progress(text, &voice, &language, status_printer())
        .await
        .context("Failed to synthesize speech")?;

    println!("Audio saved to: {}", output.audio_path.display());
    println!("Timings saved to: {}", output.timings_path.display());

    let duration = match wav_duration(&output.audio_path) {
        Ok(duration) => {
            println!("  Duration: {:.2}s", duration.as_secs_f64());
            Some(duration)
        }
        Err(err) => {
            warn!("Could not read {}: {err:#}", output.audio_path.display());
            None
        }
    };

    if follow {
        let duration = duration.context("Cannot follow playback without a readable WAV file")?;
        follow_words(&output.timings_path, duration, settings.poll_interval_ms).await?;
    }

    Ok(())
}

fn wav_duration(path: &Path) -> Result<Duration> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;
    let spec = reader.spec();
    Ok(Duration::from_secs_f64(
        f64::from(reader.duration()) / f64::from(spec.sample_rate),
    ))
}

/// Print words in step with a simulated playback clock.
async fn follow_words(timings: &Path, duration: Duration, poll_interval_ms: u64) -> Result<()> {
    let table = load_timings(timings).context("Failed to load word timings")?;
    let tracker = CursorTracker::new(Duration::from_millis(poll_interval_ms));
    let mut cursor = tracker.subscribe();
    tracker.start(table, Arc::new(WallClock::start()));
    let words = tracker.table();

    let finished = tokio::time::sleep(duration);
    tokio::pin!(finished);

    let mut stdout = std::io::stdout();
    loop {
        tokio::select! {
            _ = &mut finished => break,
            changed = cursor.changed() => {
                if changed.is_err() {
                    break;
                }
                let index = *cursor.borrow_and_update();
                if let Some(word) = index.and_then(|i| words.get(i)) {
                    write!(stdout, "{} ", word.word)?;
                    stdout.flush()?;
                }
            }
        }
    }
    writeln!(stdout)?;

    tracker.stop();
    Ok(())
}
