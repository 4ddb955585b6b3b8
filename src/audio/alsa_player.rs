//! Slot players that decode with Symphonia and write to an ALSA device,
//! one output thread per loaded resource.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::audio::alsa_handler::AlsaPcmHandler;
use crate::audio::backend::{MediaSource, PlaybackNotice, PlaybackOutcome, PlayerFactory, SlotPlayer};
use crate::audio::decoder::SymphoniaDecoder;
use crate::audio::error::AudioError;
use crate::coordinator::SlotKind;

const LOG_TARGET: &str = "soundbridge::audio::alsa_player";

/// How long a parked output thread waits before re-checking its control channel.
const IDLE_POLL: Duration = Duration::from_millis(250);

/// Control channel poll interval while the tail of a stream plays out.
const DRAIN_POLL: Duration = Duration::from_millis(20);

/// Creates [`AlsaSlotPlayer`]s on a fixed ALSA device.
pub struct AlsaPlayerFactory {
    device_name: String,
    notices: UnboundedSender<PlaybackNotice>,
}

impl AlsaPlayerFactory {
    pub fn new(device_name: &str, notices: UnboundedSender<PlaybackNotice>) -> Self {
        AlsaPlayerFactory {
            device_name: device_name.to_string(),
            notices,
        }
    }
}

impl PlayerFactory for AlsaPlayerFactory {
    #[instrument(skip(self, source), fields(resource = %source.identity()))]
    fn open(
        &self,
        source: &MediaSource,
        slot: SlotKind,
        load_id: u64,
    ) -> Result<Box<dyn SlotPlayer>, AudioError> {
        let decoder = SymphoniaDecoder::open(source)?;
        let player = AlsaSlotPlayer::spawn(&self.device_name, decoder, slot, load_id, self.notices.clone())?;
        Ok(Box::new(player))
    }
}

#[derive(Debug)]
enum Control {
    Play,
    Pause,
    Seek(f64),
    Stop,
}

/// State shared between the player handle and its output thread.
struct SharedState {
    volume_bits: AtomicU32,
    position_bits: AtomicU64,
}

impl SharedState {
    fn volume(&self) -> f32 {
        f32::from_bits(self.volume_bits.load(Ordering::Relaxed))
    }

    fn set_position(&self, seconds: f64) {
        self.position_bits.store(seconds.to_bits(), Ordering::Relaxed);
    }
}

/// Handle to one output thread.
pub struct AlsaSlotPlayer {
    slot: SlotKind,
    control_tx: Sender<Control>,
    shared: Arc<SharedState>,
    duration: Option<f64>,
    thread: Option<JoinHandle<()>>,
}

impl AlsaSlotPlayer {
    fn spawn(
        device_name: &str,
        decoder: SymphoniaDecoder,
        slot: SlotKind,
        load_id: u64,
        notices: UnboundedSender<PlaybackNotice>,
    ) -> Result<Self, AudioError> {
        let (control_tx, control_rx) = mpsc::channel();
        let shared = Arc::new(SharedState {
            volume_bits: AtomicU32::new(1.0f32.to_bits()),
            position_bits: AtomicU64::new(0f64.to_bits()),
        });
        let duration = decoder.duration_seconds();

        let output = OutputThread {
            pcm: AlsaPcmHandler::new(device_name),
            decoder,
            control_rx,
            shared: Arc::clone(&shared),
            notices,
            slot,
            load_id,
            playing: false,
            draining: false,
            at_end: false,
        };
        let thread = thread::Builder::new()
            .name(format!("soundbridge-{}", slot))
            .spawn(move || output.run())?;

        info!(target: LOG_TARGET, slot = %slot, load_id, "Output thread started.");
        Ok(AlsaSlotPlayer {
            slot,
            control_tx,
            shared,
            duration,
            thread: Some(thread),
        })
    }

    fn send(&self, control: Control) -> Result<(), AudioError> {
        self.control_tx
            .send(control)
            .map_err(|_| AudioError::InvalidState(format!("output thread for {} slot has exited", self.slot)))
    }
}

impl SlotPlayer for AlsaSlotPlayer {
    fn play(&mut self) -> Result<(), AudioError> {
        self.send(Control::Play)
    }

    fn pause(&mut self) -> Result<(), AudioError> {
        self.send(Control::Pause)
    }

    /// Joins the output thread. It reads its control channel between writes and
    /// at least every `DRAIN_POLL` while the tail plays out, so the join is short.
    fn stop(&mut self) {
        let _ = self.control_tx.send(Control::Stop);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!(target: LOG_TARGET, slot = %self.slot, "Output thread panicked.");
            }
        }
    }

    fn seek(&mut self, seconds: f64) -> Result<(), AudioError> {
        let target = match self.duration {
            Some(duration) => seconds.clamp(0.0, duration),
            None => seconds.max(0.0),
        };
        self.shared.set_position(target);
        self.send(Control::Seek(target))
    }

    fn set_volume(&mut self, volume: f32) {
        self.shared
            .volume_bits
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    fn position(&self) -> f64 {
        f64::from_bits(self.shared.position_bits.load(Ordering::Relaxed))
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }
}

impl Drop for AlsaSlotPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

struct OutputThread {
    pcm: AlsaPcmHandler,
    decoder: SymphoniaDecoder,
    control_rx: Receiver<Control>,
    shared: Arc<SharedState>,
    notices: UnboundedSender<PlaybackNotice>,
    slot: SlotKind,
    load_id: u64,
    playing: bool,
    /// Decoding finished; written frames are still playing out.
    draining: bool,
    at_end: bool,
}

impl OutputThread {
    fn run(mut self) {
        debug!(target: LOG_TARGET, slot = %self.slot, load_id = self.load_id, "Output loop running.");
        loop {
            let control = if self.playing && !self.draining {
                match self.control_rx.try_recv() {
                    Ok(control) => Some(control),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => break,
                }
            } else {
                let wait = if self.draining { DRAIN_POLL } else { IDLE_POLL };
                match self.control_rx.recv_timeout(wait) {
                    Ok(control) => Some(control),
                    Err(RecvTimeoutError::Timeout) => {
                        if self.draining {
                            self.poll_drain();
                        }
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            };

            if let Some(control) = control {
                trace!(target: LOG_TARGET, slot = %self.slot, "Control: {:?}", control);
                let keep_running = match self.apply(control) {
                    Ok(keep_running) => keep_running,
                    Err(e) => {
                        self.fail(e);
                        false
                    }
                };
                if !keep_running {
                    break;
                }
                continue;
            }

            if let Err(e) = self.play_next_chunk() {
                self.fail(e);
                break;
            }
        }
        self.pcm.close();
        debug!(target: LOG_TARGET, slot = %self.slot, load_id = self.load_id, "Output loop finished.");
    }

    /// Returns false when the thread should exit.
    fn apply(&mut self, control: Control) -> Result<bool, AudioError> {
        match control {
            Control::Play => {
                if self.at_end {
                    debug!(target: LOG_TARGET, slot = %self.slot, "Play ignored at end of stream; seek first.");
                    return Ok(true);
                }
                if !self.pcm.is_open() {
                    self.pcm.open(self.decoder.spec())?;
                }
                self.playing = true;
            }
            Control::Pause => {
                // Paused players release the device so an interrupting call can take it.
                self.pcm.close();
                self.playing = false;
                self.draining = false;
            }
            Control::Seek(seconds) => {
                let reached = self.decoder.seek(seconds)?;
                self.pcm.discard()?;
                self.shared.set_position(reached);
                self.draining = false;
                self.at_end = false;
            }
            Control::Stop => return Ok(false),
        }
        Ok(true)
    }

    fn play_next_chunk(&mut self) -> Result<(), AudioError> {
        match self.decoder.next_chunk()? {
            Some(mut chunk) => {
                apply_gain(&mut chunk.samples, self.shared.volume());
                self.pcm.write_all(&chunk.samples)?;
                self.shared.set_position(chunk.start_seconds);
            }
            None => {
                debug!(target: LOG_TARGET, slot = %self.slot, "Decoding finished, playing out buffered frames.");
                self.draining = true;
            }
        }
        Ok(())
    }

    fn poll_drain(&mut self) {
        match self.pcm.pending_output() {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => warn!(target: LOG_TARGET, slot = %self.slot, "Drain failed at end of stream: {}", e),
        }
        self.pcm.close();
        self.playing = false;
        self.draining = false;
        self.at_end = true;
        if let Some(duration) = self.decoder.duration_seconds() {
            self.shared.set_position(duration);
        }
        self.notify(PlaybackOutcome::Finished);
    }

    fn fail(&mut self, e: AudioError) {
        error!(target: LOG_TARGET, slot = %self.slot, load_id = self.load_id, "Playback failed: {}", e);
        self.playing = false;
        self.notify(PlaybackOutcome::Failed(e.to_string()));
    }

    fn notify(&self, outcome: PlaybackOutcome) {
        let notice = PlaybackNotice {
            slot: self.slot,
            load_id: self.load_id,
            outcome,
        };
        if self.notices.send(notice).is_err() {
            debug!(target: LOG_TARGET, slot = %self.slot, "No listener for playback notice.");
        }
    }
}

/// Scales interleaved samples by `volume` (0.0..=1.0).
pub fn apply_gain(samples: &mut [i16], volume: f32) {
    if volume >= 1.0 {
        return;
    }
    let volume = volume.max(0.0);
    for sample in samples.iter_mut() {
        *sample = (*sample as f32 * volume) as i16;
    }
}
