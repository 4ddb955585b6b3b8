use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::audio::{AudioError, SlotPlayer};

const LOG_TARGET: &str = "soundbridge::coordinator::slot";

/// The three independently managed playback slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    Looping,
    Queued,
    Alert,
}

impl SlotKind {
    pub const ALL: [SlotKind; 3] = [SlotKind::Looping, SlotKind::Queued, SlotKind::Alert];

    /// Slot a `play` request lands in: infinite loops use the looping slot,
    /// finite sequences the queued slot.
    pub fn for_loops(loops: LoopSpec) -> Self {
        match loops {
            LoopSpec::Infinite => SlotKind::Looping,
            LoopSpec::Count(_) => SlotKind::Queued,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            SlotKind::Looping => 0,
            SlotKind::Queued => 1,
            SlotKind::Alert => 2,
        }
    }
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SlotKind::Looping => "looping",
            SlotKind::Queued => "queued",
            SlotKind::Alert => "alert",
        };
        f.write_str(name)
    }
}

/// How many times a host asked a resource to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopSpec {
    Infinite,
    /// Total number of plays; 0 is treated as 1.
    Count(u32),
}

impl LoopSpec {
    /// Host loop counts: negative means loop forever.
    pub fn from_loop_count(count: i64) -> Self {
        if count < 0 {
            LoopSpec::Infinite
        } else {
            LoopSpec::Count(count.min(u32::MAX as i64) as u32)
        }
    }
}

/// Repeat policy carried by a loaded slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatPolicy {
    Forever,
    Times(u32),
}

impl RepeatPolicy {
    /// Whether another play should start after `completed` plays.
    pub fn should_restart(self, completed: u32) -> bool {
        match self {
            RepeatPolicy::Forever => true,
            RepeatPolicy::Times(total) => completed < total,
        }
    }
}

impl From<LoopSpec> for RepeatPolicy {
    fn from(loops: LoopSpec) -> Self {
        match loops {
            LoopSpec::Infinite => RepeatPolicy::Forever,
            LoopSpec::Count(n) => RepeatPolicy::Times(n.max(1)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Empty,
    Playing,
    Paused,
}

/// A resource loaded into a slot by one play/load request.
pub(crate) struct LoadedAudio {
    resource: String,
    load_id: u64,
    player: Box<dyn SlotPlayer>,
    repeat: RepeatPolicy,
    plays_completed: u32,
    playing: bool,
}

impl LoadedAudio {
    pub(crate) fn new(resource: String, load_id: u64, player: Box<dyn SlotPlayer>, repeat: RepeatPolicy) -> Self {
        LoadedAudio {
            resource,
            load_id,
            player,
            repeat,
            plays_completed: 0,
            playing: false,
        }
    }
}

/// One playback slot. Empty until a play/load installs a resource.
pub struct PlaybackSlot {
    kind: SlotKind,
    loaded: Option<LoadedAudio>,
}

impl PlaybackSlot {
    pub fn new(kind: SlotKind) -> Self {
        PlaybackSlot { kind, loaded: None }
    }

    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    pub fn status(&self) -> SlotStatus {
        match &self.loaded {
            None => SlotStatus::Empty,
            Some(audio) if audio.playing => SlotStatus::Playing,
            Some(_) => SlotStatus::Paused,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.status() == SlotStatus::Playing
    }

    pub fn resource(&self) -> Option<&str> {
        self.loaded.as_ref().map(|audio| audio.resource.as_str())
    }

    pub fn load_id(&self) -> Option<u64> {
        self.loaded.as_ref().map(|audio| audio.load_id)
    }

    pub fn repeat(&self) -> Option<RepeatPolicy> {
        self.loaded.as_ref().map(|audio| audio.repeat)
    }

    pub fn plays_completed(&self) -> u32 {
        self.loaded.as_ref().map_or(0, |audio| audio.plays_completed)
    }

    pub fn position(&self) -> f64 {
        self.loaded.as_ref().map_or(0.0, |audio| audio.player.position())
    }

    pub fn duration(&self) -> Option<f64> {
        self.loaded.as_ref().and_then(|audio| audio.player.duration())
    }

    /// Replaces the slot's content, releasing the previous occupant first.
    pub(crate) fn install(&mut self, audio: LoadedAudio) {
        self.release();
        self.loaded = Some(audio);
    }

    /// Stops and drops the loaded resource. Returns its identity, or `None`
    /// when the slot was already empty.
    pub(crate) fn release(&mut self) -> Option<String> {
        let mut audio = self.loaded.take()?;
        audio.player.stop();
        debug!(target: LOG_TARGET, slot = %self.kind, load_id = audio.load_id, "Released {}", audio.resource);
        Some(audio.resource)
    }

    pub(crate) fn play(&mut self) -> Result<(), AudioError> {
        let audio = self.loaded_mut()?;
        if !audio.playing {
            audio.player.play()?;
            audio.playing = true;
        }
        Ok(())
    }

    pub(crate) fn pause(&mut self) -> Result<(), AudioError> {
        let audio = self.loaded_mut()?;
        if audio.playing {
            audio.player.pause()?;
            audio.playing = false;
        }
        Ok(())
    }

    pub(crate) fn seek(&mut self, seconds: f64) -> Result<(), AudioError> {
        self.loaded_mut()?.player.seek(seconds.max(0.0))
    }

    pub(crate) fn set_volume(&mut self, volume: f32) {
        if let Some(audio) = self.loaded.as_mut() {
            audio.player.set_volume(volume);
        }
    }

    pub(crate) fn set_repeat(&mut self, repeat: RepeatPolicy) {
        if let Some(audio) = self.loaded.as_mut() {
            audio.repeat = repeat;
        }
    }

    /// Records one finished play-through. Returns true when the repeat policy
    /// asks for another one. The player has stopped producing sound either way.
    pub(crate) fn complete_play(&mut self) -> bool {
        match self.loaded.as_mut() {
            Some(audio) => {
                audio.plays_completed = audio.plays_completed.saturating_add(1);
                audio.playing = false;
                audio.repeat.should_restart(audio.plays_completed)
            }
            None => false,
        }
    }

    /// Rewinds for the next repetition, starting playback when `start` is set.
    pub(crate) fn restart(&mut self, start: bool) -> Result<(), AudioError> {
        self.seek(0.0)?;
        if start {
            self.play()?;
        }
        Ok(())
    }

    fn loaded_mut(&mut self) -> Result<&mut LoadedAudio, AudioError> {
        let kind = self.kind;
        self.loaded
            .as_mut()
            .ok_or_else(|| AudioError::InvalidState(format!("{} slot is empty", kind)))
    }
}

impl fmt::Debug for PlaybackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSlot")
            .field("kind", &self.kind)
            .field("status", &self.status())
            .field("resource", &self.resource())
            .field("load_id", &self.load_id())
            .finish()
    }
}
