//! Runtime provisioning.
//!
//! Creates the isolated Python environment, installs the synthesis
//! dependencies, prefetches the model and loads the voice catalog. A runtime
//! left by an earlier launch is reused without reinstalling anything.

mod provisioner;
mod runtime;
mod state;

pub use provisioner::Provisioner;
pub use runtime::{RUNTIME_PACKAGES, RUNTIME_VERSION, RuntimeLayout, resolve_interpreter};
pub use state::{SetupState, activity_label};
