//! Seams between the coordinator and the platform audio stack.

use bytes::Bytes;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::audio::error::AudioError;
use crate::coordinator::SlotKind;

/// Audio data ready to be handed to a [`PlayerFactory`].
#[derive(Clone)]
pub enum MediaSource {
    /// A file on disk (plain path or resolved bundle resource).
    File(PathBuf),
    /// Bytes already fetched from `origin` (usually a URL).
    Memory { origin: String, bytes: Bytes },
}

impl MediaSource {
    /// Identity reported to the host in loading/finished events.
    pub fn identity(&self) -> String {
        match self {
            MediaSource::File(path) => path.display().to_string(),
            MediaSource::Memory { origin, .. } => origin.clone(),
        }
    }

    /// File extension used as a probe hint, if one can be derived.
    pub fn extension(&self) -> Option<String> {
        let path = match self {
            MediaSource::File(path) => path.as_path(),
            MediaSource::Memory { origin, .. } => {
                let trimmed = origin.split(['?', '#']).next().unwrap_or(origin);
                return Path::new(trimmed)
                    .extension()
                    .map(|ext| ext.to_string_lossy().to_lowercase());
            }
        };
        path.extension().map(|ext| ext.to_string_lossy().to_lowercase())
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, MediaSource::Memory { .. })
    }
}

impl fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaSource::File(path) => f.debug_tuple("File").field(path).finish(),
            MediaSource::Memory { origin, bytes } => f
                .debug_struct("Memory")
                .field("origin", origin)
                .field("len", &bytes.len())
                .finish(),
        }
    }
}

/// Outcome of one play-through reported by a platform player.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackOutcome {
    Finished,
    Failed(String),
}

/// Completion callback from a platform player, tagged with the load it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackNotice {
    pub slot: SlotKind,
    pub load_id: u64,
    pub outcome: PlaybackOutcome,
}

/// A loaded platform player resource occupying one slot.
///
/// Implementations report each natural end of the resource exactly once as a
/// [`PlaybackNotice`]; after that the player stays loaded and may be restarted
/// with `seek(0.0)` followed by `play()`.
pub trait SlotPlayer: Send {
    fn play(&mut self) -> Result<(), AudioError>;
    fn pause(&mut self) -> Result<(), AudioError>;
    /// Halts output and releases the underlying device. Must be safe to call twice.
    fn stop(&mut self);
    fn seek(&mut self, seconds: f64) -> Result<(), AudioError>;
    fn set_volume(&mut self, volume: f32);
    /// Current play-position in seconds.
    fn position(&self) -> f64;
    /// Total duration in seconds, when the container reports one.
    fn duration(&self) -> Option<f64>;
}

/// Opens media sources into slot players.
pub trait PlayerFactory: Send {
    /// Returns a loaded, paused player or [`AudioError::ResourceLoad`].
    fn open(
        &self,
        source: &MediaSource,
        slot: SlotKind,
        load_id: u64,
    ) -> Result<Box<dyn SlotPlayer>, AudioError>;
}
