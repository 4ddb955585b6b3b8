use std::error::Error;
use std::io;
use symphonia::core::errors::Error as SymphoniaError;

use crate::coordinator::OutputRoute;

/// Error types specific to audio playback.
#[derive(Debug)]
pub enum AudioError {
    /// The resource is missing or cannot be decoded.
    ResourceLoad(String),
    /// The requested output route is not present on the session.
    RouteUnavailable(OutputRoute),
    /// The interrupting call still holds the audio session.
    InterruptionRace(String),
    AlsaError(String),
    DecodingError(String),
    SymphoniaError(SymphoniaError),
    IoError(io::Error),
    NetworkError(reqwest::Error),
    InvalidState(String),
    UnsupportedFormat(String),
    MissingCodecParams(&'static str),
}

impl AudioError {
    /// True for errors that mean the resource itself could not be loaded.
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            AudioError::ResourceLoad(_)
                | AudioError::SymphoniaError(_)
                | AudioError::IoError(_)
                | AudioError::NetworkError(_)
                | AudioError::UnsupportedFormat(_)
                | AudioError::MissingCodecParams(_)
        )
    }
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::ResourceLoad(e) => write!(f, "Resource load error: {}", e),
            AudioError::RouteUnavailable(route) => write!(f, "Route unavailable: {}", route),
            AudioError::InterruptionRace(e) => write!(f, "Interruption race: {}", e),
            AudioError::AlsaError(e) => write!(f, "ALSA error: {}", e),
            AudioError::DecodingError(e) => write!(f, "Decoding error: {}", e),
            AudioError::SymphoniaError(e) => write!(f, "Symphonia error: {}", e),
            AudioError::IoError(e) => write!(f, "I/O error: {}", e),
            AudioError::NetworkError(e) => write!(f, "Network error: {}", e),
            AudioError::InvalidState(s) => write!(f, "Invalid state: {}", s),
            AudioError::UnsupportedFormat(s) => write!(f, "Unsupported format: {}", s),
            AudioError::MissingCodecParams(s) => write!(f, "Missing codec parameters: {}", s),
        }
    }
}

impl Error for AudioError {}

// --- From Implementations for AudioError ---

impl From<alsa::Error> for AudioError {
    fn from(e: alsa::Error) -> Self {
        AudioError::AlsaError(e.to_string())
    }
}

impl From<SymphoniaError> for AudioError {
    fn from(e: SymphoniaError) -> Self {
        AudioError::SymphoniaError(e)
    }
}

impl From<io::Error> for AudioError {
    fn from(e: io::Error) -> Self {
        AudioError::IoError(e)
    }
}

impl From<reqwest::Error> for AudioError {
    fn from(e: reqwest::Error) -> Self {
        AudioError::NetworkError(e)
    }
}
