//! Application context shared by every component.
//!
//! Built once at startup and handed around as `Arc<AppContext>`; there is no
//! global state. Setup state and the voice catalog are published through
//! watch channels so observers see every change, but only the provisioning
//! and voice code in this crate can write them.

use std::sync::{Arc, RwLock};

use tokio::sync::watch;

use crate::error::RunnerError;
use crate::process::CommandRunner;
use crate::settings::Settings;
use crate::setup::SetupState;
use crate::voice::VoiceCatalog;

pub struct AppContext {
    settings: RwLock<Settings>,
    runner: Arc<dyn CommandRunner>,
    setup_state: watch::Sender<SetupState>,
    catalog: watch::Sender<VoiceCatalog>,
    downloading: watch::Sender<Option<String>>,
}

/// Claim on the process-wide download slot; dropping it frees the slot.
pub(crate) struct DownloadSlot<'a> {
    downloading: &'a watch::Sender<Option<String>>,
}

impl Drop for DownloadSlot<'_> {
    fn drop(&mut self) {
        self.downloading.send_replace(None);
    }
}

impl AppContext {
    pub fn new(settings: Settings, runner: Arc<dyn CommandRunner>) -> Arc<Self> {
        let (setup_state, _) = watch::channel(SetupState::Idle);
        let (catalog, _) = watch::channel(VoiceCatalog::default());
        let (downloading, _) = watch::channel(None);
        Arc::new(Self {
            settings: RwLock::new(settings),
            runner,
            setup_state,
            catalog,
            downloading,
        })
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Change settings in place; later operations read the new values.
    pub fn update_settings(&self, update: impl FnOnce(&mut Settings)) {
        let mut settings = self
            .settings
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        update(&mut settings);
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    pub fn setup_state(&self) -> SetupState {
        self.setup_state.borrow().clone()
    }

    pub fn subscribe_setup(&self) -> watch::Receiver<SetupState> {
        self.setup_state.subscribe()
    }

    pub fn catalog(&self) -> VoiceCatalog {
        self.catalog.borrow().clone()
    }

    pub fn subscribe_catalog(&self) -> watch::Receiver<VoiceCatalog> {
        self.catalog.subscribe()
    }

    /// Voice currently being downloaded, if any.
    pub fn downloading(&self) -> Option<String> {
        self.downloading.borrow().clone()
    }

    pub fn subscribe_downloading(&self) -> watch::Receiver<Option<String>> {
        self.downloading.subscribe()
    }

    pub(crate) fn publish_setup_state(&self, state: SetupState) {
        self.setup_state.send_replace(state);
    }

    /// Replace the catalog wholesale with a freshly listed one.
    pub(crate) fn replace_catalog(&self, catalog: VoiceCatalog) {
        self.catalog.send_replace(catalog);
    }

    /// Take the download slot atomically or report who holds it.
    pub(crate) fn claim_download(&self, voice: &str) -> Result<DownloadSlot<'_>, RunnerError> {
        let mut current = None;
        let claimed = self.downloading.send_if_modified(|slot| match slot {
            Some(other) => {
                current = Some(other.clone());
                false
            }
            None => {
                *slot = Some(voice.to_string());
                true
            }
        });

        if claimed {
            Ok(DownloadSlot {
                downloading: &self.downloading,
            })
        } else {
            Err(RunnerError::DownloadInProgress(
                current.unwrap_or_default(),
            ))
        }
    }
}
