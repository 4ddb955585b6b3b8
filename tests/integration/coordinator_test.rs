//! Integration tests for the audio output coordinator
//!
//! These drive complete host scenarios through the public coordinator API
//! against the fake platform from `test_utils`.

use crate::test_utils::FakePlatform;
use soundbridge::audio::MediaSource;
use soundbridge::coordinator::{
    AudioCoordinator, BridgeEvent, CallId, CallState, CoordinatorConfig, CoordinatorState, LoopSpec, OutputRoute,
    ResumePolicy, SlotKind, VolumeProfile,
};
use std::path::PathBuf;
use tokio::sync::broadcast;

#[cfg(test)]
mod coordinator_integration_tests {
    use super::*;

    fn setup(config: CoordinatorConfig) -> (AudioCoordinator, FakePlatform, broadcast::Receiver<BridgeEvent>) {
        let platform = FakePlatform::new();
        let (events_tx, events_rx) = broadcast::channel(64);
        let coordinator = AudioCoordinator::new(platform.factory(), platform.session(), config, events_tx);
        (coordinator, platform, events_rx)
    }

    fn sound(name: &str) -> MediaSource {
        MediaSource::File(PathBuf::from(name))
    }

    fn events(rx: &mut broadcast::Receiver<BridgeEvent>) -> Vec<BridgeEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    /// A load followed by a failed load never leaves the old resource audible.
    #[test]
    fn test_no_stale_playback() {
        let (mut coordinator, platform, _rx) = setup(CoordinatorConfig::default());
        platform.refuse("corrupt");

        coordinator.play(sound("a.mp3"), LoopSpec::Infinite).unwrap();
        coordinator.play(sound("b.mp3"), LoopSpec::Infinite).unwrap();
        assert_eq!(platform.audible(), vec!["b.mp3".to_string()]);

        assert!(coordinator.play(sound("corrupt.mp3"), LoopSpec::Infinite).is_err());
        assert!(platform.audible().is_empty());
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
    }

    #[test]
    fn test_three_slots_are_independent() {
        let (mut coordinator, platform, _rx) = setup(CoordinatorConfig::default());
        coordinator.play(sound("ambience.mp3"), LoopSpec::Infinite).unwrap();
        coordinator.play(sound("intro.mp3"), LoopSpec::Count(2)).unwrap();
        coordinator.play_alert(sound("ding.wav")).unwrap();

        assert_eq!(
            platform.audible(),
            vec!["ambience.mp3".to_string(), "ding.wav".to_string(), "intro.mp3".to_string()]
        );

        coordinator.stop(SlotKind::Queued);
        assert_eq!(platform.audible(), vec!["ambience.mp3".to_string(), "ding.wav".to_string()]);
    }

    /// setVolume(0.8, headphone) while on speaker, then the headphones are plugged in.
    #[test]
    fn test_volume_follows_route() {
        let (mut coordinator, platform, _rx) = setup(CoordinatorConfig {
            volume: VolumeProfile::new(0.5, 1.0, OutputRoute::Speaker),
            ..Default::default()
        });
        coordinator.play(sound("a.mp3"), LoopSpec::Infinite).unwrap();
        let id = coordinator.slot(SlotKind::Looping).load_id().unwrap();
        assert_eq!(platform.player(id).volume, 0.5);

        coordinator.set_volume(OutputRoute::Headphone, 0.8);
        assert_eq!(platform.player(id).volume, 0.5);
        assert_eq!(coordinator.volume().volume(), 0.5);

        coordinator.on_route_changed(OutputRoute::Headphone);
        assert!((platform.player(id).volume - 0.8).abs() < f32::EPSILON);

        coordinator.on_route_changed(OutputRoute::Speaker);
        assert_eq!(platform.player(id).volume, 0.5);
    }

    #[test]
    fn test_route_fallback_when_headphones_missing() {
        let (mut coordinator, platform, _rx) = setup(CoordinatorConfig::default());
        platform.set_routes(vec![OutputRoute::Speaker]);

        coordinator.set_speaker(false);
        assert_eq!(coordinator.volume().active_route(), OutputRoute::Speaker);
        coordinator.on_route_changed(OutputRoute::Headphone);
        assert_eq!(coordinator.volume().active_route(), OutputRoute::Speaker);
    }

    #[test]
    fn test_call_while_idle_changes_nothing() {
        let (mut coordinator, _platform, mut rx) = setup(CoordinatorConfig::default());
        coordinator.on_call_state_changed(CallId::new("1"), CallState::Connected);
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
        assert!(events(&mut rx).is_empty());
    }

    /// play(A, loop) at 12.5s, call connects, call ends, countdown elapses.
    #[test]
    fn test_call_interruption_round_trip() {
        let (mut coordinator, platform, mut rx) = setup(CoordinatorConfig::default());
        coordinator.play(sound("A.mp3"), LoopSpec::Infinite).unwrap();
        let id = coordinator.slot(SlotKind::Looping).load_id().unwrap();
        platform.set_position(id, 12.5);
        events(&mut rx);

        coordinator.on_call_state_changed(CallId::new("call"), CallState::Connected);
        assert_eq!(coordinator.state(), CoordinatorState::InterruptedPaused);
        assert!(platform.audible().is_empty());

        coordinator.on_call_state_changed(CallId::new("call"), CallState::Ended);
        assert_eq!(coordinator.state(), CoordinatorState::ResumePending);
        coordinator.tick();
        assert!(platform.audible().is_empty());
        coordinator.tick();

        assert_eq!(coordinator.state(), CoordinatorState::Playing);
        assert_eq!(platform.audible(), vec!["A.mp3".to_string()]);
        assert_eq!(platform.player(id).position, 12.5);
        assert_eq!(platform.player(id).starts, 2);
        assert_eq!(
            events(&mut rx),
            vec![
                BridgeEvent::AudioInterrupted { interrupted: true },
                BridgeEvent::AudioInterrupted { interrupted: false },
            ]
        );

        // Extra ticks never resume twice.
        coordinator.tick();
        coordinator.tick();
        assert_eq!(platform.player(id).starts, 2);
        assert_eq!(platform.activations(), 1);
    }

    #[test]
    fn test_busy_device_delays_resume() {
        let (mut coordinator, platform, _rx) = setup(CoordinatorConfig {
            resume: ResumePolicy { countdown: 1, max_retries: 3 },
            ..Default::default()
        });
        platform.busy_for(2);
        coordinator.play(sound("A.mp3"), LoopSpec::Infinite).unwrap();
        coordinator.on_call_state_changed(CallId::new("call"), CallState::Connected);
        coordinator.on_call_state_changed(CallId::new("call"), CallState::Ended);

        coordinator.tick();
        coordinator.tick();
        assert!(platform.audible().is_empty());
        coordinator.tick();
        assert_eq!(platform.audible(), vec!["A.mp3".to_string()]);
        assert_eq!(platform.activations(), 3);
    }

    #[test]
    fn test_single_play_finishes_and_reports() {
        let (mut coordinator, platform, mut rx) = setup(CoordinatorConfig::default());
        coordinator.play(sound("short.wav"), LoopSpec::Count(1)).unwrap();
        let id = coordinator.slot(SlotKind::Queued).load_id().unwrap();
        events(&mut rx);

        coordinator.on_playback_finished(SlotKind::Queued, id);
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
        assert!(platform.player(id).released);
        assert_eq!(
            events(&mut rx),
            vec![BridgeEvent::FinishedPlaying { slot: SlotKind::Queued, success: true }]
        );
    }

    #[test]
    fn test_info_reports_position() {
        let (mut coordinator, platform, _rx) = setup(CoordinatorConfig::default());
        coordinator.play_alert(sound("ding.wav")).unwrap();
        let id = coordinator.slot(SlotKind::Alert).load_id().unwrap();
        platform.set_position(id, 0.75);

        let info = coordinator.info(None).unwrap();
        assert_eq!(info.slot, SlotKind::Alert);
        assert_eq!(info.current_time, 0.75);
        assert_eq!(info.duration, Some(60.0));
    }
}
