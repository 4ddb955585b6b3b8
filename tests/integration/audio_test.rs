//! Integration tests for audio functionality
//!
//! Decoding runs everywhere; real ALSA output is ignored by default since it
//! needs a sound card.

use soundbridge::audio::decoder::SymphoniaDecoder;
use soundbridge::audio::{AlsaPlayerFactory, AudioError, MediaSource, PlaybackOutcome, PlayerFactory};
use soundbridge::coordinator::SlotKind;
use std::error::Error;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::mpsc;

#[cfg(test)]
mod audio_integration_tests {
    use super::*;

    #[test]
    fn test_decode_wav_file() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("tone.wav");
        crate::test_utils::write_silent_wav(&path, 44_100, 4_410)?;

        let mut decoder = SymphoniaDecoder::open(&MediaSource::File(path))?;
        assert_eq!(decoder.spec().rate, 44_100);
        assert_eq!(decoder.spec().channels.count(), 2);

        let mut samples = 0;
        while let Some(chunk) = decoder.next_chunk()? {
            samples += chunk.samples.len();
        }
        assert_eq!(samples, 4_410 * 2);
        Ok(())
    }

    #[test]
    fn test_decode_rejects_non_audio_file() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "just text")?;

        assert!(matches!(
            SymphoniaDecoder::open(&MediaSource::File(path)),
            Err(AudioError::ResourceLoad(_))
        ));
        Ok(())
    }

    /// Plays a short silent clip on the default ALSA device and waits for completion.
    #[tokio::test]
    #[ignore]
    async fn test_alsa_playback_completes() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("tone.wav");
        crate::test_utils::write_silent_wav(&path, 44_100, 22_050)?;

        let (notice_tx, mut notice_rx) = mpsc::unbounded_channel();
        let factory = AlsaPlayerFactory::new("default", notice_tx);
        let mut player = factory.open(&MediaSource::File(path), SlotKind::Alert, 7)?;
        player.set_volume(0.2);
        player.play()?;

        let notice = tokio::time::timeout(Duration::from_secs(5), notice_rx.recv())
            .await?
            .ok_or("player dropped its notice channel")?;
        assert_eq!(notice.load_id, 7);
        assert_eq!(notice.outcome, PlaybackOutcome::Finished);

        player.stop();
        Ok(())
    }

    /// Stopping while buffered frames play out returns without waiting for them.
    #[tokio::test]
    #[ignore]
    async fn test_alsa_stop_during_tail_is_prompt() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("tone.wav");
        crate::test_utils::write_silent_wav(&path, 44_100, 44_100)?;

        let (notice_tx, mut notice_rx) = mpsc::unbounded_channel();
        let factory = AlsaPlayerFactory::new("default", notice_tx);
        let mut player = factory.open(&MediaSource::File(path), SlotKind::Looping, 1)?;
        player.set_volume(0.0);
        player.seek(0.9)?;
        player.play()?;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = std::time::Instant::now();
        player.stop();
        assert!(started.elapsed() < Duration::from_millis(200));
        assert!(notice_rx.try_recv().is_err());
        Ok(())
    }
}
