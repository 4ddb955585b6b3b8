use serde::{Deserialize, Serialize};

use super::slot::{SlotKind, SlotStatus};
use super::volume::OutputRoute;

/// Coordinator-level playback state, derived from slots and interruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CoordinatorState {
    Idle,
    Playing,
    InterruptedPaused,
    ResumePending,
}

/// Position report for one slot (the host's `getInfo`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackInfo {
    pub slot: SlotKind,
    #[serde(rename = "currentTime")]
    pub current_time: f64,
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotSnapshot {
    pub slot: SlotKind,
    pub status: SlotStatus,
    pub resource: Option<String>,
    pub position: f64,
}

/// Full coordinator state for diagnostics and the host's state query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorSnapshot {
    pub state: CoordinatorState,
    pub route: OutputRoute,
    pub volume: f32,
    #[serde(rename = "interruptedByCall")]
    pub interrupted_by_call: bool,
    pub countdown: Option<u32>,
    pub slots: Vec<SlotSnapshot>,
}

/// Events emitted toward the host application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum BridgeEvent {
    FinishedPlaying {
        slot: SlotKind,
        success: bool,
    },
    FinishedLoading {
        resource: String,
        success: bool,
    },
    FinishedLoadingFile {
        path: String,
    },
    #[serde(rename = "FinishedLoadingURL")]
    FinishedLoadingUrl {
        url: String,
    },
    AudioInterrupted {
        interrupted: bool,
    },
    Info(PlaybackInfo),
    State(CoordinatorSnapshot),
    Error {
        message: String,
    },
}
