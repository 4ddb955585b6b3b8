//! Host bridge: an actor task that owns the [`AudioCoordinator`] and
//! serializes host commands, platform notices and resume ticks into it.

use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, instrument, trace};

use crate::audio::PlaybackNotice;
use crate::coordinator::{AudioCoordinator, BridgeEvent, SlotKind};

mod command_handler;
pub mod protocol;
mod resource;
mod run_loop;
mod state;

pub use protocol::{HostRequest, ProtocolError};
pub use resource::{Resolved, Resource};
pub use state::{BridgeCommand, LoadRequest};

const BRIDGE_LOG_TARGET: &str = "soundbridge::bridge";

/// Runtime options of the service, usually derived from the settings file.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceOptions {
    /// Directory bundle resources (`name.type`) are looked up in.
    pub bundle_dir: PathBuf,
    pub max_download_bytes: u64,
    /// Drives the resume countdown on its own; `None` leaves it to host ticks.
    pub resume_tick: Option<Duration>,
    pub command_buffer: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        ServiceOptions {
            bundle_dir: PathBuf::from("."),
            max_download_bytes: 32 * 1024 * 1024,
            resume_tick: Some(Duration::from_secs(1)),
            command_buffer: 64,
        }
    }
}

/// Owns the coordinator and processes [`BridgeCommand`]s one at a time.
pub struct SoundService {
    coordinator: AudioCoordinator,
    options: ServiceOptions,
    http: reqwest::Client,

    // --- Communication ---
    command_rx: mpsc::Receiver<BridgeCommand>,
    // Weak so the loop ends once every external sender is gone.
    internal_command_tx: mpsc::WeakSender<BridgeCommand>,
    notice_rx: mpsc::UnboundedReceiver<PlaybackNotice>,
    events: broadcast::Sender<BridgeEvent>,

    /// Bumped on every load/stop per slot; in-flight fetches carrying an
    /// older value are dropped.
    load_generation: [u64; 3],
}

impl SoundService {
    /// Creates the service and the command channel sender. `events` must be
    /// the sender the coordinator was built with.
    pub fn new(
        coordinator: AudioCoordinator,
        notice_rx: mpsc::UnboundedReceiver<PlaybackNotice>,
        events: broadcast::Sender<BridgeEvent>,
        options: ServiceOptions,
    ) -> (Self, mpsc::Sender<BridgeCommand>) {
        let (command_tx, command_rx) = mpsc::channel(options.command_buffer.max(1));
        let service = SoundService {
            coordinator,
            options,
            http: reqwest::Client::new(),
            command_rx,
            internal_command_tx: command_tx.downgrade(),
            notice_rx,
            events,
            load_generation: [0; 3],
        };
        (service, command_tx)
    }

    /// Runs the command processing loop until `Shutdown` or until every
    /// command sender is dropped. Spawn this as a Tokio task.
    #[instrument(skip(self))]
    pub async fn run(&mut self) {
        run_loop::run_service_loop(self).await;
    }

    // --- Private helpers ---

    fn broadcast_event(&self, event: BridgeEvent) {
        trace!(target: BRIDGE_LOG_TARGET, "Broadcasting event: {:?}", event);
        if self.events.send(event).is_err() {
            debug!(target: BRIDGE_LOG_TARGET, "No active listeners for bridge event.");
        }
    }

    fn next_generation(&mut self, slot: SlotKind) -> u64 {
        let generation = &mut self.load_generation[slot.index()];
        *generation += 1;
        *generation
    }

    fn current_generation(&self, slot: SlotKind) -> u64 {
        self.load_generation[slot.index()]
    }
}
