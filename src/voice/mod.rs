//! Model and voice acquisition.
//!
//! Prefetches the model, lists the remote voice catalog and downloads
//! single voices, all through the collaborator scripts and the process
//! engine.

mod catalog;
mod manager;

pub use catalog::{VoiceCatalog, validate_voice_id};
pub use manager::{DOWNLOAD_SCRIPT, LIST_SCRIPT, PREFETCH_SCRIPT, VoiceManager};
