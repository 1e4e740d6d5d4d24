//! Periodic mapping of an audio clock onto a word index.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::clock::AudioClock;
use super::timing::{TimedWord, index_for_time, is_well_formed};

/// Default sampling period of the audio clock.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

struct TrackerState {
    /// Bumped by every `start`/`stop`; a poll task from an older generation
    /// stops without publishing.
    generation: u64,
    table: Arc<[TimedWord]>,
    cancel: Option<CancellationToken>,
}

/// Keeps the highlighted word index in step with playback.
///
/// Index changes are published on a watch channel; the embedding application
/// subscribes and marshals updates to its own UI thread.
pub struct CursorTracker {
    interval: Duration,
    index_tx: Arc<watch::Sender<Option<usize>>>,
    state: Arc<Mutex<TrackerState>>,
}

impl CursorTracker {
    /// Create a tracker sampling every `interval`.
    ///
    /// A zero interval cannot drive a ticker and is replaced with
    /// [`DEFAULT_POLL_INTERVAL`].
    pub fn new(interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            warn!("Zero cursor poll interval, using {DEFAULT_POLL_INTERVAL:?}");
            DEFAULT_POLL_INTERVAL
        } else {
            interval
        };
        let (index_tx, _) = watch::channel(None);
        Self {
            interval,
            index_tx: Arc::new(index_tx),
            state: Arc::new(Mutex::new(TrackerState {
                generation: 0,
                table: Arc::from(Vec::new()),
                cancel: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        lock_state(&self.state)
    }

    /// Receiver for index changes; `None` means no word is being spoken.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<usize>> {
        self.index_tx.subscribe()
    }

    pub fn current_index(&self) -> Option<usize> {
        *self.index_tx.borrow()
    }

    /// The table currently being tracked (empty when stopped).
    pub fn table(&self) -> Arc<[TimedWord]> {
        self.lock().table.clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock().cancel.is_some()
    }

    /// Begin tracking `table` against `clock`, replacing any previous run.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, table: Vec<TimedWord>, clock: Arc<dyn AudioClock>) {
        if !is_well_formed(&table) {
            warn!(
                "Timing table of {} words is unsorted or overlapping; earliest listed match wins",
                table.len()
            );
        }

        let table: Arc<[TimedWord]> = Arc::from(table);
        let cancel = CancellationToken::new();
        let generation = {
            let mut state = self.lock();
            if let Some(previous) = state.cancel.take() {
                previous.cancel();
            }
            state.generation += 1;
            state.table = table.clone();
            state.cancel = Some(cancel.clone());
            publish(&self.index_tx, None);
            state.generation
        };

        debug!(
            "Tracking {} words every {:?} (generation {generation})",
            table.len(),
            self.interval
        );

        tokio::spawn(poll(
            self.interval,
            table,
            clock,
            cancel,
            generation,
            self.state.clone(),
            self.index_tx.clone(),
        ));
    }

    /// Stop polling, clear the table and publish `None`.
    pub fn stop(&self) {
        let mut state = self.lock();
        if let Some(cancel) = state.cancel.take() {
            cancel.cancel();
        }
        state.generation += 1;
        state.table = Arc::from(Vec::new());
        publish(&self.index_tx, None);
    }
}

impl Default for CursorTracker {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl Drop for CursorTracker {
    fn drop(&mut self) {
        if let Some(cancel) = self.lock().cancel.take() {
            cancel.cancel();
        }
    }
}

fn lock_state(state: &Mutex<TrackerState>) -> MutexGuard<'_, TrackerState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn publish(index_tx: &watch::Sender<Option<usize>>, index: Option<usize>) -> bool {
    index_tx.send_if_modified(|current| {
        if *current == index {
            false
        } else {
            *current = index;
            true
        }
    })
}

/// Publish `index` unless this poll task has been superseded.
fn publish_if_current(
    state: &Mutex<TrackerState>,
    index_tx: &watch::Sender<Option<usize>>,
    generation: u64,
    index: Option<usize>,
) -> bool {
    let state = lock_state(state);
    if state.generation != generation {
        return false;
    }
    publish(index_tx, index);
    true
}

async fn poll(
    interval: Duration,
    table: Arc<[TimedWord]>,
    clock: Arc<dyn AudioClock>,
    cancel: CancellationToken,
    generation: u64,
    state: Arc<Mutex<TrackerState>>,
    index_tx: Arc<watch::Sender<Option<usize>>>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let index = index_for_time(clock.current_time(), &table);
                if !publish_if_current(&state, &index_tx, generation, index) {
                    break;
                }
            }
        }
    }
    debug!("Cursor poll task for generation {generation} finished");
}
