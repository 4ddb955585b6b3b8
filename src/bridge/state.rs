use std::time::Duration;
use tokio::sync::oneshot;

use super::resource::Resource;
use crate::audio::{AudioError, MediaSource};
use crate::coordinator::{
    CallId, CallState, CoordinatorSnapshot, LoopSpec, OutputRoute, PlaybackInfo, SlotKind,
};

/// What to do with a resource once it is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadRequest {
    Play(LoopSpec),
    PlayAlert,
    Load(LoopSpec),
    LoadAlert,
}

impl LoadRequest {
    pub fn slot(self) -> SlotKind {
        match self {
            LoadRequest::Play(loops) | LoadRequest::Load(loops) => SlotKind::for_loops(loops),
            LoadRequest::PlayAlert | LoadRequest::LoadAlert => SlotKind::Alert,
        }
    }
}

/// Commands that can be sent to the sound service task.
#[derive(Debug)]
pub enum BridgeCommand {
    Play { resource: Resource, loops: LoopSpec },
    PlayAlert { resource: Resource },
    PlayAlertWithDelay { resource: Resource, delay: Duration },
    Load { resource: Resource, loops: LoopSpec },
    LoadAlert { resource: Resource },
    SetNumberOfLoops(i64),
    /// `None` targets every loaded slot.
    Pause(Option<SlotKind>),
    Resume(Option<SlotKind>),
    Stop(Option<SlotKind>),
    Seek { slot: Option<SlotKind>, seconds: f64 },
    /// `None` sets the level of the currently active route.
    SetVolume { route: Option<OutputRoute>, level: f32 },
    SetSpeaker(bool),
    SetMixAudio(bool),
    StartSession,
    RouteChanged(OutputRoute),
    CallStateChanged { call: CallId, state: CallState },
    Tick,
    GetInfo {
        slot: Option<SlotKind>,
        respond_to: oneshot::Sender<Option<PlaybackInfo>>,
    },
    GetState(oneshot::Sender<CoordinatorSnapshot>),
    /// A remote fetch finished. `generation` guards against later requests
    /// for the same slot having superseded it.
    UrlFetched {
        url: String,
        request: LoadRequest,
        generation: u64,
        result: Result<MediaSource, AudioError>,
    },
    Shutdown,
}

