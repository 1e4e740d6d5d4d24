//! kokoro-say: local Kokoro text-to-speech orchestration.
//!
//! This crate provisions an isolated Python runtime for the Kokoro scripts,
//! runs model and voice downloads and synthesis as subprocesses with live
//! progress, and tracks which word is being spoken during playback.

pub mod cli;
pub mod context;
pub mod engine;
pub mod error;
pub mod playback;
pub mod process;
pub mod settings;
pub mod setup;
pub mod voice;
