use crate::audio::error::AudioError;
use alsa::nix::errno::Errno;
use alsa::pcm::{Access, Format, HwParams, State as PcmState, PCM};
use alsa::{Direction, ValueOr};
use std::ffi::CString;
use symphonia::core::audio::SignalSpec;
use tracing::{debug, error, info, instrument, warn};

const LOG_TARGET: &str = "soundbridge::audio::alsa_handler";

/// Consecutive zero-frame writes tolerated before a write is abandoned.
const MAX_EMPTY_WRITES: usize = 8;

/// Owns one ALSA PCM playback handle for a single slot player.
pub struct AlsaPcmHandler {
    device_name: String,
    pcm: Option<PCM>,
    channels: usize,
}

impl AlsaPcmHandler {
    pub fn new(device_name: &str) -> Self {
        debug!(target: LOG_TARGET, "Creating AlsaPcmHandler for device: {}", device_name);
        AlsaPcmHandler {
            device_name: device_name.to_string(),
            pcm: None,
            channels: 2,
        }
    }

    pub fn is_open(&self) -> bool {
        self.pcm.is_some()
    }

    /// Opens the device for S16 interleaved output matching `spec`.
    /// Any previously opened handle is closed first.
    #[instrument(skip(self, spec), fields(device = %self.device_name, rate = spec.rate, channels = spec.channels.count()))]
    pub fn open(&mut self, spec: SignalSpec) -> Result<(), AudioError> {
        self.close();

        let device = CString::new(self.device_name.clone())
            .map_err(|e| AudioError::InvalidState(format!("Invalid device name: {}", e)))?;
        let pcm = PCM::open(&device, Direction::Playback, false).map_err(|e| {
            if e.errno() == Errno::EBUSY {
                AudioError::InterruptionRace(format!("device {} busy", self.device_name))
            } else {
                AudioError::from(e)
            }
        })?;

        {
            let hwp = HwParams::any(&pcm)?;
            hwp.set_access(Access::RWInterleaved)?;
            hwp.set_format(Format::s16())?;
            hwp.set_channels(spec.channels.count() as u32)?;
            hwp.set_rate_near(spec.rate, ValueOr::Nearest)?;
            let actual_rate = hwp.get_rate()?;
            if actual_rate != spec.rate {
                // No resampling here: playback runs slightly fast or slow rather than failing.
                warn!(target: LOG_TARGET, "ALSA rate negotiation: requested={}, actual={}", spec.rate, actual_rate);
            }
            pcm.hw_params(&hwp)?;

            let swp = pcm.sw_params_current()?;
            let buffer_size = hwp.get_buffer_size()?;
            let period_size = hwp.get_period_size()?;
            swp.set_start_threshold(buffer_size - period_size)?;
            pcm.sw_params(&swp)?;
            debug!(target: LOG_TARGET, "ALSA parameters applied (buffer={}, period={}).", buffer_size, period_size);
        }

        self.channels = spec.channels.count();
        self.pcm = Some(pcm);
        info!(target: LOG_TARGET, "ALSA device {} opened.", self.device_name);
        Ok(())
    }

    /// Writes all interleaved samples, recovering from underruns.
    pub fn write_all(&self, samples: &[i16]) -> Result<(), AudioError> {
        let pcm = self
            .pcm
            .as_ref()
            .ok_or(AudioError::InvalidState("PCM not opened for writing".to_string()))?;
        let io = pcm.io_i16()?;
        let channels = self.channels.max(1);

        let mut offset = 0;
        let mut empty_writes = 0;
        while offset < samples.len() {
            match io.writei(&samples[offset..]) {
                Ok(0) => {
                    empty_writes += 1;
                    if empty_writes > MAX_EMPTY_WRITES {
                        return Err(AudioError::AlsaError("device accepted no frames".to_string()));
                    }
                }
                Ok(frames) => {
                    empty_writes = 0;
                    offset += frames * channels;
                }
                Err(e) if e.errno() == Errno::EPIPE => {
                    warn!(target: LOG_TARGET, "ALSA buffer underrun, recovering.");
                    pcm.recover(libc::EPIPE, true)?;
                }
                Err(e) => {
                    error!(target: LOG_TARGET, "ALSA write error: {}", e);
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    /// Non-blocking check whether frames written so far are still playing out.
    /// Starts a stream that never reached its start threshold.
    pub fn pending_output(&self) -> Result<bool, AudioError> {
        let Some(pcm) = &self.pcm else {
            return Ok(false);
        };
        match pcm.state() {
            PcmState::Prepared => {
                pcm.start()?;
                Ok(true)
            }
            PcmState::Running | PcmState::Draining => Ok(pcm.delay()? > 0),
            _ => Ok(false),
        }
    }

    /// Discards queued frames without closing the device (used on seek).
    pub fn discard(&self) -> Result<(), AudioError> {
        if let Some(pcm) = &self.pcm {
            if matches!(pcm.state(), PcmState::Running | PcmState::Paused) {
                pcm.drop()?;
                pcm.prepare()?;
            }
        }
        Ok(())
    }

    pub fn close(&mut self) {
        if let Some(pcm) = self.pcm.take() {
            if matches!(pcm.state(), PcmState::Running | PcmState::Prepared | PcmState::Paused) {
                if let Err(e) = pcm.drop() {
                    warn!(target: LOG_TARGET, "Error dropping ALSA buffer during close (ignored): {}", e);
                }
            }
            debug!(target: LOG_TARGET, "ALSA PCM closed.");
        }
    }
}

impl Drop for AlsaPcmHandler {
    fn drop(&mut self) {
        self.close();
    }
}
