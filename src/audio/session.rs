use alsa::nix::errno::Errno;
use alsa::pcm::PCM;
use alsa::Direction;
use std::ffi::CString;
use tracing::{debug, info, instrument, warn};

use crate::audio::error::AudioError;
use crate::coordinator::OutputRoute;

const LOG_TARGET: &str = "soundbridge::audio::session";

/// Options applied when the audio session is (re)activated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Play alongside other applications instead of taking exclusive output.
    pub mix_with_others: bool,
}

/// The platform audio session: output activation and route selection.
pub trait AudioSession: Send {
    /// Activates output. Fails with [`AudioError::InterruptionRace`] while an
    /// interrupting call still holds the device.
    fn activate(&mut self, options: SessionOptions) -> Result<(), AudioError>;

    fn is_route_available(&self, route: OutputRoute) -> bool;

    /// Requests that output be forced onto `route`.
    fn override_route(&mut self, route: OutputRoute) -> Result<(), AudioError>;
}

/// ALSA-backed session. Routes are declared by configuration since ALSA has
/// no notion of a headphone jack; activation probes the PCM device.
pub struct AlsaSession {
    device_name: String,
    available_routes: Vec<OutputRoute>,
}

impl AlsaSession {
    pub fn new(device_name: &str, available_routes: Vec<OutputRoute>) -> Self {
        info!(target: LOG_TARGET, "Creating ALSA session for device {} (routes: {:?})", device_name, available_routes);
        AlsaSession {
            device_name: device_name.to_string(),
            available_routes,
        }
    }
}

impl AudioSession for AlsaSession {
    #[instrument(skip(self), fields(device = %self.device_name))]
    fn activate(&mut self, options: SessionOptions) -> Result<(), AudioError> {
        let device = CString::new(self.device_name.clone())
            .map_err(|e| AudioError::InvalidState(format!("Invalid device name: {}", e)))?;

        // Non-blocking open so a device still held elsewhere reports EBUSY instead of waiting.
        match PCM::open(&device, Direction::Playback, true) {
            Ok(pcm) => {
                drop(pcm);
                debug!(target: LOG_TARGET, "ALSA device available (mix_with_others={}).", options.mix_with_others);
                Ok(())
            }
            Err(e) if e.errno() == Errno::EBUSY => {
                warn!(target: LOG_TARGET, "ALSA device {} busy during activation.", self.device_name);
                Err(AudioError::InterruptionRace(format!("device {} busy", self.device_name)))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn is_route_available(&self, route: OutputRoute) -> bool {
        self.available_routes.contains(&route)
    }

    fn override_route(&mut self, route: OutputRoute) -> Result<(), AudioError> {
        if !self.is_route_available(route) {
            return Err(AudioError::RouteUnavailable(route));
        }
        // A single PCM serves every declared route, so there is nothing to switch.
        debug!(target: LOG_TARGET, "Output route forced to {}.", route);
        Ok(())
    }
}
