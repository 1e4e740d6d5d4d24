//! Synthesis orchestration.
//!
//! Builds the synthesis script's command line, runs it and checks that the
//! promised audio file exists before handing paths back.

mod tts;

pub use tts::{SYNTH_SCRIPT, SynthesisOutput, Synthesizer};
