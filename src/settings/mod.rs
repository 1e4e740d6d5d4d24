//! Settings shared by every component.
//!
//! Defaults are overlaid by an optional settings file and then by
//! `KOKORO_SAY_*` environment variables; the CLI applies its flags last.

mod loader;

pub use loader::{ENV_PREFIX, Settings};
