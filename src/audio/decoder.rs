use crate::audio::backend::MediaSource;
use crate::audio::error::AudioError;
use std::fs::File;
use std::io::{self, Cursor};
use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::{Error as SymphoniaError, SeekErrorKind};
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource as SymphoniaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};
use tracing::{debug, info, trace, warn};

const LOG_TARGET: &str = "soundbridge::audio::decoder";

/// A chunk of decoded, interleaved S16 samples and the time it starts at.
#[derive(Debug)]
pub struct DecodedChunk {
    pub samples: Vec<i16>,
    pub start_seconds: f64,
}

/// Manages Symphonia format reading and decoding for one resource.
pub struct SymphoniaDecoder {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    track_time_base: Option<TimeBase>,
    spec: SignalSpec,
    duration_seconds: Option<f64>,
    sample_buf: Option<SampleBuffer<i16>>,
    /// Set by a seek at or past the end; cleared by the next in-range seek.
    exhausted: bool,
}

impl SymphoniaDecoder {
    /// Opens and probes `source`. Any failure is a [`AudioError::ResourceLoad`].
    pub fn open(source: &MediaSource) -> Result<Self, AudioError> {
        let identity = source.identity();
        let media: Box<dyn SymphoniaSource> = match source {
            MediaSource::File(path) => {
                let file = File::open(path).map_err(|e| {
                    AudioError::ResourceLoad(format!("cannot open {}: {}", identity, e))
                })?;
                Box::new(file)
            }
            MediaSource::Memory { bytes, .. } => Box::new(Cursor::new(bytes.clone())),
        };

        let mut hint = Hint::new();
        if let Some(ext) = source.extension() {
            hint.with_extension(&ext);
        }

        Self::probe(MediaSourceStream::new(media, Default::default()), &hint)
            .map_err(|e| AudioError::ResourceLoad(format!("cannot decode {}: {}", identity, e)))
    }

    fn probe(mss: MediaSourceStream, hint: &Hint) -> Result<Self, AudioError> {
        debug!(target: LOG_TARGET, "Setting up Symphonia format reader and decoder...");
        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();

        let probed = symphonia::default::get_probe().format(hint, mss, &fmt_opts, &meta_opts)?;
        let format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(AudioError::UnsupportedFormat("No suitable audio track found".to_string()))?
            .clone();

        debug!(target: LOG_TARGET, "Found suitable audio track: ID={}, Codec={:?}", track.id, track.codec_params.codec);

        let decoder = symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

        let spec = SignalSpec::new(
            track.codec_params.sample_rate.ok_or(AudioError::MissingCodecParams("sample rate"))?,
            track.codec_params.channels.ok_or(AudioError::MissingCodecParams("channels map"))?,
        );

        let time_base = track.codec_params.time_base;
        let duration_seconds = match (time_base, track.codec_params.n_frames) {
            (Some(tb), Some(frames)) => Some(time_to_seconds(tb.calc_time(frames))),
            _ => None,
        };

        info!(target: LOG_TARGET, "Decoder ready: rate={}, channels={}, duration={:?}", spec.rate, spec.channels.count(), duration_seconds);

        Ok(Self {
            format_reader,
            decoder,
            track_id: track.id,
            track_time_base: time_base,
            spec,
            duration_seconds,
            sample_buf: None,
            exhausted: false,
        })
    }

    /// Signal specification of the selected track.
    pub fn spec(&self) -> SignalSpec {
        self.spec
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration_seconds
    }

    /// Decodes the next packet of the selected track.
    /// Returns `Ok(None)` at end of stream.
    pub fn next_chunk(&mut self) -> Result<Option<DecodedChunk>, AudioError> {
        if self.exhausted {
            return Ok(None);
        }
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    debug!(target: LOG_TARGET, "End of stream reached.");
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    warn!(target: LOG_TARGET, "Decoder reset required, resetting and continuing.");
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != self.track_id {
                trace!(target: LOG_TARGET, "Skipping packet for track {}", packet.track_id());
                continue;
            }

            let start_seconds = self
                .track_time_base
                .map(|tb| time_to_seconds(tb.calc_time(packet.ts())))
                .unwrap_or(0.0);

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    if decoded.spec() != &self.spec {
                        return Err(AudioError::UnsupportedFormat("Dynamic spec change".to_string()));
                    }
                    let spec = self.spec;
                    let frames = decoded.capacity() as u64;
                    let fits = self
                        .sample_buf
                        .as_ref()
                        .map_or(false, |b| b.capacity() as u64 >= frames * spec.channels.count() as u64);
                    if !fits {
                        self.sample_buf = None;
                    }
                    let buf = self
                        .sample_buf
                        .get_or_insert_with(|| SampleBuffer::<i16>::new(frames, spec));
                    buf.copy_interleaved_ref(decoded);
                    return Ok(Some(DecodedChunk {
                        samples: buf.samples().to_vec(),
                        start_seconds,
                    }));
                }
                Err(SymphoniaError::DecodeError(err)) => {
                    warn!(target: LOG_TARGET, "Symphonia decode error (skipping packet): {}", err);
                }
                Err(e) => return Err(AudioError::DecodingError(e.to_string())),
            }
        }
    }

    /// Seeks the selected track to `seconds` and resets the decoder.
    ///
    /// Targets at or past the end leave the decoder at end of stream instead of
    /// failing. Returns the position actually reached.
    pub fn seek(&mut self, seconds: f64) -> Result<f64, AudioError> {
        let seconds = seconds.max(0.0);
        if let Some(duration) = self.duration_seconds {
            if seconds >= duration {
                debug!(target: LOG_TARGET, "Seek to {:.2}s is past the end ({:.2}s).", seconds, duration);
                self.exhausted = true;
                return Ok(duration);
            }
        }

        let time = Time::new(seconds.trunc() as u64, seconds.fract());
        match self.format_reader.seek(
            SeekMode::Accurate,
            SeekTo::Time { time, track_id: Some(self.track_id) },
        ) {
            Ok(_) => {}
            Err(SymphoniaError::SeekError(SeekErrorKind::OutOfRange)) => {
                debug!(target: LOG_TARGET, "Seek to {:.2}s is out of range; at end of stream.", seconds);
                self.exhausted = true;
                return Ok(self.duration_seconds.unwrap_or(seconds));
            }
            Err(e) => return Err(e.into()),
        }
        self.decoder.reset();
        self.exhausted = false;
        debug!(target: LOG_TARGET, "Seeked to {:.2}s.", seconds);
        Ok(seconds)
    }
}

fn time_to_seconds(time: Time) -> f64 {
    time.seconds as f64 + time.frac
}
