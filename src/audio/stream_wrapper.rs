use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use reqwest::Client;
use tracing::{debug, info, instrument, trace};

use crate::audio::backend::MediaSource;
use crate::audio::error::AudioError;

const LOG_TARGET: &str = "soundbridge::audio::stream_wrapper";

/// Downloads a remote resource into memory so Symphonia gets a seekable
/// source. Bodies larger than `max_bytes` are rejected as unloadable.
#[instrument(skip(client), fields(url = %url))]
pub async fn download(client: &Client, url: &str, max_bytes: u64) -> Result<MediaSource, AudioError> {
    debug!(target: LOG_TARGET, "Downloading remote resource into memory...");
    let response = client.get(url).send().await?.error_for_status()?;

    if let Some(len) = response.content_length() {
        if len > max_bytes {
            return Err(AudioError::ResourceLoad(format!(
                "{} is {} bytes, limit is {}",
                url, len, max_bytes
            )));
        }
    }

    let mut buffer = BytesMut::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk: Bytes = chunk?;
        if (buffer.len() + chunk.len()) as u64 > max_bytes {
            return Err(AudioError::ResourceLoad(format!(
                "{} exceeds the download limit of {} bytes",
                url, max_bytes
            )));
        }
        buffer.extend_from_slice(&chunk);
        trace!(target: LOG_TARGET, "Downloaded {} bytes (total {})", chunk.len(), buffer.len());
    }
    info!(target: LOG_TARGET, "Download complete ({} bytes).", buffer.len());

    Ok(MediaSource::Memory {
        origin: url.to_string(),
        bytes: buffer.freeze(),
    })
}
