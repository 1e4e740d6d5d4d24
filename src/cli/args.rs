//! CLI argument definitions and parsing.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::settings::Settings;

/// Local Kokoro text-to-speech with word-level playback tracking.
#[derive(Parser, Debug)]
#[command(name = "kokoro-say")]
#[command(about = "Provision and drive the Kokoro text-to-speech scripts")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Python interpreter to run the scripts with (skips the managed runtime)
    #[arg(long, global = true)]
    pub interpreter: Option<PathBuf>,

    /// Model repository, e.g. "hexgrad/Kokoro-82M"
    #[arg(long, global = true)]
    pub repo: Option<String>,

    /// Repository revision to pin
    #[arg(long, global = true)]
    pub revision: Option<String>,

    /// Directory holding the kokoro_*.py scripts
    #[arg(long, global = true)]
    pub scripts_dir: Option<PathBuf>,

    /// Directory for the managed Python runtime
    #[arg(long, global = true)]
    pub runtime_dir: Option<PathBuf>,

    /// Directory for synthesized audio and timing files
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Create the runtime, install dependencies and fetch the model
    Setup,

    /// List available and downloaded voices
    Voices,

    /// Download a single voice (Ctrl-C cancels)
    Download {
        /// Voice id, e.g. "bf_emma"
        voice: String,
    },

    /// Synthesize text to a WAV file
    Say {
        /// Text to speak
        text: String,

        /// Voice id (defaults to the configured voice)
        #[arg(long)]
        voice: Option<String>,

        /// Language of the text
        #[arg(short, long, value_enum)]
        lang: Option<Language>,

        /// Print each word as its time comes up
        #[arg(short, long)]
        follow: bool,
    },
}

/// Languages the Kokoro pipeline understands.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Language {
    /// American English
    #[value(name = "a", alias = "en-us")]
    AmericanEnglish,

    /// British English
    #[value(name = "b", alias = "en-gb")]
    BritishEnglish,

    #[value(name = "e", alias = "es")]
    Spanish,

    #[value(name = "f", alias = "fr")]
    French,

    #[value(name = "h", alias = "hi")]
    Hindi,

    #[value(name = "i", alias = "it")]
    Italian,

    #[value(name = "j", alias = "ja")]
    Japanese,

    /// Brazilian Portuguese
    #[value(name = "p", alias = "pt-br")]
    Portuguese,

    /// Mandarin Chinese
    #[value(name = "z", alias = "zh")]
    Mandarin,
}

impl Language {
    /// Returns the code passed to the synthesis script.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::AmericanEnglish => "a",
            Language::BritishEnglish => "b",
            Language::Spanish => "e",
            Language::French => "f",
            Language::Hindi => "h",
            Language::Italian => "i",
            Language::Japanese => "j",
            Language::Portuguese => "p",
            Language::Mandarin => "z",
        }
    }

    /// Returns the human-readable name of the language.
    pub fn name(&self) -> &'static str {
        match self {
            Language::AmericanEnglish => "American English",
            Language::BritishEnglish => "British English",
            Language::Spanish => "Spanish",
            Language::French => "French",
            Language::Hindi => "Hindi",
            Language::Italian => "Italian",
            Language::Japanese => "Japanese",
            Language::Portuguese => "Brazilian Portuguese",
            Language::Mandarin => "Mandarin Chinese",
        }
    }

    /// Kokoro voice ids start with the language code, e.g. `bf_emma`.
    pub fn for_voice(voice: &str) -> Option<Self> {
        let code = voice.chars().next()?;
        Language::value_variants()
            .iter()
            .copied()
            .find(|lang| lang.as_str().starts_with(code))
    }
}

impl Args {
    /// Apply command-line overrides on top of loaded settings.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(interpreter) = &self.interpreter {
            settings.interpreter = Some(interpreter.clone());
        }
        if let Some(repo) = &self.repo {
            settings.repo = Some(repo.clone());
        }
        if let Some(revision) = &self.revision {
            settings.revision = Some(revision.clone());
        }
        if let Some(dir) = &self.scripts_dir {
            settings.scripts_dir = dir.clone();
        }
        if let Some(dir) = &self.runtime_dir {
            settings.runtime_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            settings.output_dir = dir.clone();
        }
    }
}
