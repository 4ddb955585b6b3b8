//! Audio output coordinator: three playback slots, per-route volume and
//! phone-call interruption handling.
//!
//! The coordinator is a plain synchronous state owner. Whoever wires it to
//! the host (see [`crate::bridge`]) must serialize calls into it; platform
//! collaborators are reached through [`PlayerFactory`] and [`AudioSession`].

mod interruption;
mod slot;
mod state;
mod volume;

pub use interruption::{CallId, CallState, Interruption, ResumePolicy};
pub use slot::{LoopSpec, PlaybackSlot, RepeatPolicy, SlotKind, SlotStatus};
pub use state::{BridgeEvent, CoordinatorSnapshot, CoordinatorState, PlaybackInfo, SlotSnapshot};
pub use volume::{OutputRoute, VolumeProfile};

use std::collections::BTreeSet;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::audio::{
    AudioError, AudioSession, MediaSource, PlaybackNotice, PlaybackOutcome, PlayerFactory, SessionOptions,
};
use slot::LoadedAudio;

const LOG_TARGET: &str = "soundbridge::coordinator";

/// Construction-time settings for [`AudioCoordinator`].
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    pub volume: VolumeProfile,
    pub resume: ResumePolicy,
    pub session: SessionOptions,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            volume: VolumeProfile::default(),
            resume: ResumePolicy::default(),
            session: SessionOptions::default(),
        }
    }
}

/// Owns all playback state for one host bridge.
pub struct AudioCoordinator {
    factory: Box<dyn PlayerFactory>,
    session: Box<dyn AudioSession>,
    slots: [PlaybackSlot; 3],
    volume: VolumeProfile,
    interruption: Interruption,
    resume_policy: ResumePolicy,
    session_options: SessionOptions,
    session_active: bool,
    alert_loops: LoopSpec,
    last_loaded: Option<SlotKind>,
    next_load_id: u64,
    events: broadcast::Sender<BridgeEvent>,
}

impl AudioCoordinator {
    pub fn new(
        factory: Box<dyn PlayerFactory>,
        session: Box<dyn AudioSession>,
        config: CoordinatorConfig,
        events: broadcast::Sender<BridgeEvent>,
    ) -> Self {
        info!(
            target: LOG_TARGET,
            "Creating coordinator (route={}, volume={:.2}, countdown={}, max_retries={})",
            config.volume.active_route(),
            config.volume.volume(),
            config.resume.countdown,
            config.resume.max_retries
        );
        AudioCoordinator {
            factory,
            session,
            slots: SlotKind::ALL.map(PlaybackSlot::new),
            volume: config.volume,
            interruption: Interruption::None,
            resume_policy: config.resume,
            session_options: config.session,
            session_active: false,
            alert_loops: LoopSpec::Count(1),
            last_loaded: None,
            next_load_id: 1,
            events,
        }
    }

    // --- Queries ---

    pub fn state(&self) -> CoordinatorState {
        match self.interruption {
            Interruption::CallActive { .. } => CoordinatorState::InterruptedPaused,
            Interruption::ResumePending { .. } => CoordinatorState::ResumePending,
            Interruption::None if self.slots.iter().any(PlaybackSlot::is_playing) => CoordinatorState::Playing,
            Interruption::None => CoordinatorState::Idle,
        }
    }

    pub fn slot(&self, kind: SlotKind) -> &PlaybackSlot {
        &self.slots[kind.index()]
    }

    pub fn volume(&self) -> &VolumeProfile {
        &self.volume
    }

    pub fn interruption(&self) -> &Interruption {
        &self.interruption
    }

    pub fn is_interrupted_by_call(&self) -> bool {
        self.interruption.is_interrupted()
    }

    /// Position and duration of `slot`, or of the most recently loaded slot.
    pub fn info(&self, slot: Option<SlotKind>) -> Option<PlaybackInfo> {
        let kind = slot.or(self.last_loaded)?;
        let slot = self.slot(kind);
        if !slot.is_loaded() {
            return None;
        }
        Some(PlaybackInfo {
            slot: kind,
            current_time: slot.position(),
            duration: slot.duration(),
        })
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        CoordinatorSnapshot {
            state: self.state(),
            route: self.volume.active_route(),
            volume: self.volume.volume(),
            interrupted_by_call: self.is_interrupted_by_call(),
            countdown: self.interruption.countdown(),
            slots: self
                .slots
                .iter()
                .map(|slot| SlotSnapshot {
                    slot: slot.kind(),
                    status: slot.status(),
                    resource: slot.resource().map(str::to_string),
                    position: slot.position(),
                })
                .collect(),
        }
    }

    // --- Playback commands ---

    /// Loads `source` into the looping slot (infinite) or the queued slot
    /// (finite count) and starts it.
    #[instrument(skip(self, source), fields(resource = %source.identity()))]
    pub fn play(&mut self, source: MediaSource, loops: LoopSpec) -> Result<(), AudioError> {
        self.load_into(SlotKind::for_loops(loops), source, loops.into(), true)
    }

    /// Loads and starts the one-shot alert slot, independent of the others.
    #[instrument(skip(self, source), fields(resource = %source.identity()))]
    pub fn play_alert(&mut self, source: MediaSource) -> Result<(), AudioError> {
        self.load_into(SlotKind::Alert, source, self.alert_loops.into(), true)
    }

    /// Like [`play`](Self::play) but leaves the slot paused at the start.
    #[instrument(skip(self, source), fields(resource = %source.identity()))]
    pub fn load(&mut self, source: MediaSource, loops: LoopSpec) -> Result<(), AudioError> {
        self.load_into(SlotKind::for_loops(loops), source, loops.into(), false)
    }

    #[instrument(skip(self, source), fields(resource = %source.identity()))]
    pub fn load_alert(&mut self, source: MediaSource) -> Result<(), AudioError> {
        self.load_into(SlotKind::Alert, source, self.alert_loops.into(), false)
    }

    fn load_into(
        &mut self,
        kind: SlotKind,
        source: MediaSource,
        repeat: RepeatPolicy,
        start: bool,
    ) -> Result<(), AudioError> {
        if let Some(previous) = self.slot_mut(kind).release() {
            debug!(target: LOG_TARGET, slot = %kind, "Replacing {}", previous);
        }
        self.interruption.forget(kind);

        let load_id = self.next_load_id;
        self.next_load_id += 1;
        let identity = source.identity();

        let mut player = match self.factory.open(&source, kind, load_id) {
            Ok(player) => player,
            Err(e) => {
                if e.is_load_failure() {
                    warn!(target: LOG_TARGET, slot = %kind, "Failed to load {}: {}", identity, e);
                } else {
                    error!(target: LOG_TARGET, slot = %kind, "Output unavailable for {}: {}", identity, e);
                }
                self.emit(BridgeEvent::FinishedLoading { resource: identity, success: false });
                return Err(if matches!(e, AudioError::ResourceLoad(_)) {
                    e
                } else {
                    AudioError::ResourceLoad(e.to_string())
                });
            }
        };
        player.set_volume(self.volume.volume());
        self.slot_mut(kind)
            .install(LoadedAudio::new(identity.clone(), load_id, player, repeat));
        self.last_loaded = Some(kind);
        info!(target: LOG_TARGET, slot = %kind, load_id, "Loaded {} ({:?})", identity, repeat);

        self.emit(BridgeEvent::FinishedLoading { resource: identity.clone(), success: true });
        if source.is_remote() {
            self.emit(BridgeEvent::FinishedLoadingUrl { url: identity });
        } else {
            self.emit(BridgeEvent::FinishedLoadingFile { path: identity });
        }

        if !start {
            return Ok(());
        }
        if self.interruption.is_interrupted() {
            info!(target: LOG_TARGET, slot = %kind, "Call interruption in progress, deferring start.");
            self.interruption.suspend(kind);
            return Ok(());
        }
        if let Err(e) = self.slot_mut(kind).play() {
            self.fail_slot(kind, &e);
            return Err(e);
        }
        Ok(())
    }

    /// Halts and releases `kind`. Stopping an empty slot is a no-op.
    #[instrument(skip(self))]
    pub fn stop(&mut self, kind: SlotKind) {
        self.interruption.forget(kind);
        match self.slot_mut(kind).release() {
            Some(resource) => info!(target: LOG_TARGET, slot = %kind, "Stopped {}", resource),
            None => trace!(target: LOG_TARGET, slot = %kind, "Stop on empty slot."),
        }
    }

    pub fn stop_all(&mut self) {
        for kind in SlotKind::ALL {
            self.stop(kind);
        }
    }

    /// Pauses `slot`, or every loaded slot. A paused slot is no longer resumed
    /// automatically after a call.
    #[instrument(skip(self))]
    pub fn pause(&mut self, slot: Option<SlotKind>) {
        for kind in self.targets(slot) {
            self.interruption.forget(kind);
            if let Err(e) = self.slot_mut(kind).pause() {
                warn!(target: LOG_TARGET, slot = %kind, "Pause failed: {}", e);
            }
        }
    }

    /// Resumes `slot`, or every loaded slot. During a call the slots are only
    /// marked to resume once the interruption is over.
    #[instrument(skip(self))]
    pub fn resume(&mut self, slot: Option<SlotKind>) {
        for kind in self.targets(slot) {
            if self.interruption.is_interrupted() {
                debug!(target: LOG_TARGET, slot = %kind, "Resume deferred until the call interruption ends.");
                self.interruption.suspend(kind);
                continue;
            }
            if let Err(e) = self.slot_mut(kind).play() {
                self.fail_slot(kind, &e);
            }
        }
    }

    /// Seeks `slot`, or the most recently loaded slot.
    #[instrument(skip(self))]
    pub fn seek(&mut self, slot: Option<SlotKind>, seconds: f64) -> Result<(), AudioError> {
        let kind = slot
            .or(self.last_loaded)
            .ok_or_else(|| AudioError::InvalidState("no audio loaded".to_string()))?;
        self.slot_mut(kind).seek(seconds)
    }

    /// Alert repeat policy: negative loops forever, otherwise `loops` extra
    /// repetitions after the first play.
    pub fn set_number_of_loops(&mut self, loops: i64) {
        self.alert_loops = if loops < 0 {
            LoopSpec::Infinite
        } else {
            LoopSpec::Count(loops.saturating_add(1).min(u32::MAX as i64) as u32)
        };
        let policy = RepeatPolicy::from(self.alert_loops);
        self.slot_mut(SlotKind::Alert).set_repeat(policy);
        debug!(target: LOG_TARGET, "Alert repeat policy set to {:?}", policy);
    }

    // --- Volume and routing ---

    /// Stores `level` for `route`; applies it right away when `route` is active.
    #[instrument(skip(self))]
    pub fn set_volume(&mut self, route: OutputRoute, level: f32) {
        if self.volume.set_level(route, level) {
            self.apply_volume();
        } else {
            debug!(target: LOG_TARGET, "Stored {} level {:.2} for inactive route.", route, self.volume.level(route));
        }
    }

    /// Platform notification that the output route changed.
    #[instrument(skip(self))]
    pub fn on_route_changed(&mut self, route: OutputRoute) {
        let selected = if self.session.is_route_available(route) {
            route
        } else {
            let e = AudioError::RouteUnavailable(route);
            warn!(target: LOG_TARGET, "{}; falling back to {}", e, route.other());
            route.other()
        };
        if self.volume.select_route(selected) {
            info!(target: LOG_TARGET, "Active route is now {}", selected);
        }
        self.apply_volume();
    }

    /// Forces output to the speaker (`true`) or headphones (`false`).
    #[instrument(skip(self))]
    pub fn set_speaker(&mut self, on: bool) {
        let requested = if on { OutputRoute::Speaker } else { OutputRoute::Headphone };
        match self.session.override_route(requested) {
            Ok(()) => self.on_route_changed(requested),
            Err(e) => {
                warn!(target: LOG_TARGET, "Route override failed: {}; keeping {}", e, requested.other());
                self.volume.select_route(requested.other());
                self.apply_volume();
            }
        }
    }

    fn apply_volume(&mut self) {
        let volume = self.volume.volume();
        for slot in self.slots.iter_mut() {
            slot.set_volume(volume);
        }
        trace!(target: LOG_TARGET, "Applied effective volume {:.2}", volume);
    }

    // --- Session ---

    /// Activates the platform audio session with the current options.
    pub fn start_session(&mut self) -> Result<(), AudioError> {
        self.session.activate(self.session_options)?;
        self.session_active = true;
        info!(target: LOG_TARGET, "Audio session active ({:?})", self.session_options);
        Ok(())
    }

    pub fn set_mix_audio(&mut self, on: bool) {
        self.session_options.mix_with_others = on;
        if self.session_active {
            if let Err(e) = self.start_session() {
                warn!(target: LOG_TARGET, "Re-activating session with mix_with_others={} failed: {}", on, e);
            }
        }
    }

    // --- Platform callbacks ---

    pub fn handle_notice(&mut self, notice: PlaybackNotice) {
        match notice.outcome {
            PlaybackOutcome::Finished => self.on_playback_finished(notice.slot, notice.load_id),
            PlaybackOutcome::Failed(reason) => self.on_playback_failed(notice.slot, notice.load_id, &reason),
        }
    }

    /// One play of `kind` completed. Repeats or empties the slot.
    #[instrument(skip(self))]
    pub fn on_playback_finished(&mut self, kind: SlotKind, load_id: u64) {
        if self.slot(kind).load_id() != Some(load_id) {
            debug!(target: LOG_TARGET, slot = %kind, load_id, "Ignoring completion for a replaced resource.");
            return;
        }
        if self.slot_mut(kind).complete_play() {
            let start = !self.interruption.is_interrupted();
            trace!(target: LOG_TARGET, slot = %kind, plays = self.slot(kind).plays_completed(), "Repeating.");
            if let Err(e) = self.slot_mut(kind).restart(start) {
                self.fail_slot(kind, &e);
            }
            return;
        }
        self.slot_mut(kind).release();
        self.interruption.forget(kind);
        info!(target: LOG_TARGET, slot = %kind, "Finished playing.");
        self.emit(BridgeEvent::FinishedPlaying { slot: kind, success: true });
    }

    #[instrument(skip(self))]
    pub fn on_playback_failed(&mut self, kind: SlotKind, load_id: u64, reason: &str) {
        if self.slot(kind).load_id() != Some(load_id) {
            debug!(target: LOG_TARGET, slot = %kind, load_id, "Ignoring failure for a replaced resource.");
            return;
        }
        self.fail_slot(kind, &AudioError::DecodingError(reason.to_string()));
    }

    /// Call-observer notification.
    #[instrument(skip(self, call), fields(call = %call))]
    pub fn on_call_state_changed(&mut self, call: CallId, state: CallState) {
        match state {
            CallState::Connected => self.on_call_connected(call),
            CallState::Ended => self.on_call_ended(call),
        }
    }

    fn on_call_connected(&mut self, call: CallId) {
        match &self.interruption {
            Interruption::None => {
                let playing: BTreeSet<SlotKind> = SlotKind::ALL
                    .into_iter()
                    .filter(|kind| self.slots[kind.index()].is_playing())
                    .collect();
                if playing.is_empty() {
                    debug!(target: LOG_TARGET, "Call connected while idle; nothing to pause.");
                    return;
                }
                for kind in &playing {
                    if let Err(e) = self.slots[kind.index()].pause() {
                        warn!(target: LOG_TARGET, slot = %kind, "Pause on call failed: {}", e);
                    }
                }
                info!(target: LOG_TARGET, "Call connected; paused {:?}", playing);
                self.interruption = Interruption::CallActive { call, suspended: playing };
                self.emit(BridgeEvent::AudioInterrupted { interrupted: true });
            }
            Interruption::CallActive { call: active, .. } => {
                debug!(target: LOG_TARGET, "Already interrupted by call {}; ignoring {}", active, call);
            }
            Interruption::ResumePending { .. } => {
                let suspended = self.interruption.take_suspended();
                info!(target: LOG_TARGET, "Call connected before resume; staying paused.");
                self.interruption = Interruption::CallActive { call, suspended };
            }
        }
    }

    fn on_call_ended(&mut self, call: CallId) {
        match &self.interruption {
            Interruption::CallActive { call: active, .. } if *active == call => {
                let suspended = self.interruption.take_suspended();
                let countdown = self.resume_policy.countdown;
                info!(target: LOG_TARGET, "Call ended; resuming in {} tick(s).", countdown);
                self.interruption = Interruption::ResumePending { countdown, retries: 0, suspended };
                if countdown == 0 {
                    self.attempt_resume();
                }
            }
            _ => debug!(target: LOG_TARGET, "Ignoring end of untracked call {}", call),
        }
    }

    /// Advances the resume countdown by one step. The resume attempt happens
    /// on the tick that brings it to zero; ticks outside a pending resume are
    /// ignored.
    pub fn tick(&mut self) {
        let Interruption::ResumePending { countdown, .. } = &mut self.interruption else {
            return;
        };
        *countdown = countdown.saturating_sub(1);
        trace!(target: LOG_TARGET, "Resume countdown at {}", countdown);
        if *countdown == 0 {
            self.attempt_resume();
        }
    }

    fn attempt_resume(&mut self) {
        let Interruption::ResumePending { retries, suspended, .. } =
            std::mem::take(&mut self.interruption)
        else {
            return;
        };

        if suspended.is_empty() {
            info!(target: LOG_TARGET, "Interruption over; nothing to resume.");
            self.emit(BridgeEvent::AudioInterrupted { interrupted: false });
            return;
        }

        match self.session.activate(self.session_options) {
            Ok(()) => self.session_active = true,
            Err(AudioError::InterruptionRace(reason)) if retries < self.resume_policy.max_retries => {
                let countdown = self.resume_policy.countdown.max(1);
                warn!(
                    target: LOG_TARGET,
                    "Session not yet released ({}); retry {} of {} in {} tick(s).",
                    reason,
                    retries + 1,
                    self.resume_policy.max_retries,
                    countdown
                );
                self.interruption = Interruption::ResumePending { countdown, retries: retries + 1, suspended };
                return;
            }
            Err(e) => {
                error!(target: LOG_TARGET, "Giving up on resume after call: {}", e);
                for kind in suspended {
                    self.fail_slot(kind, &e);
                }
                self.emit(BridgeEvent::AudioInterrupted { interrupted: false });
                return;
            }
        }

        let volume = self.volume.volume();
        for kind in suspended {
            let slot = self.slot_mut(kind);
            if !slot.is_loaded() {
                continue;
            }
            slot.set_volume(volume);
            match slot.play() {
                Ok(()) => info!(target: LOG_TARGET, slot = %kind, "Resumed at {:.2}s", self.slot(kind).position()),
                Err(e) => self.fail_slot(kind, &e),
            }
        }
        self.emit(BridgeEvent::AudioInterrupted { interrupted: false });
    }

    /// Host reports that an asynchronous load (URL fetch) failed before
    /// reaching the coordinator.
    pub fn report_load_failure(&mut self, resource: &str, reason: &str) {
        warn!(target: LOG_TARGET, "Failed to load {}: {}", resource, reason);
        self.emit(BridgeEvent::FinishedLoading { resource: resource.to_string(), success: false });
    }

    /// Releases every slot; used when the bridge shuts down.
    pub fn shutdown(&mut self) {
        info!(target: LOG_TARGET, "Shutting down coordinator.");
        self.interruption = Interruption::None;
        self.stop_all();
    }

    // --- Private helpers ---

    fn slot_mut(&mut self, kind: SlotKind) -> &mut PlaybackSlot {
        &mut self.slots[kind.index()]
    }

    fn targets(&self, slot: Option<SlotKind>) -> Vec<SlotKind> {
        match slot {
            Some(kind) => vec![kind],
            None => SlotKind::ALL
                .into_iter()
                .filter(|kind| self.slot(*kind).is_loaded())
                .collect(),
        }
    }

    /// Degrades a slot to "no sound" and tells the host.
    fn fail_slot(&mut self, kind: SlotKind, e: &AudioError) {
        self.interruption.forget(kind);
        if self.slot_mut(kind).release().is_some() {
            error!(target: LOG_TARGET, slot = %kind, "Playback failed: {}", e);
            self.emit(BridgeEvent::FinishedPlaying { slot: kind, success: false });
        }
    }

    fn emit(&self, event: BridgeEvent) {
        trace!(target: LOG_TARGET, "Emitting {:?}", event);
        if self.events.send(event).is_err() {
            debug!(target: LOG_TARGET, "No active listeners for bridge event.");
        }
    }
}

impl Drop for AudioCoordinator {
    fn drop(&mut self) {
        self.stop_all();
    }
}
