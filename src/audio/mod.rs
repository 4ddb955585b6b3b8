//! Platform audio layer: player seams, Symphonia decoding and ALSA output

pub mod alsa_handler;
pub mod alsa_player;
pub mod backend;
pub mod decoder;
pub mod error;
#[cfg(test)]
pub(crate) mod mock;
pub mod session;
pub mod stream_wrapper;

pub use alsa_player::AlsaPlayerFactory;
pub use backend::{MediaSource, PlaybackNotice, PlaybackOutcome, PlayerFactory, SlotPlayer};
pub use error::AudioError;
pub use session::{AlsaSession, AudioSession, SessionOptions};
