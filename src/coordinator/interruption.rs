use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::slot::SlotKind;

/// Opaque identity of a phone call, as delivered by the call observer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub String);

impl CallId {
    pub fn new(id: impl Into<String>) -> Self {
        CallId(id.into())
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallState {
    Connected,
    Ended,
}

/// Bounded delayed-resume policy applied after a call ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumePolicy {
    /// Ticks to wait after the call ends before resuming.
    pub countdown: u32,
    /// How many times a busy session may push the resume back.
    pub max_retries: u32,
}

impl Default for ResumePolicy {
    fn default() -> Self {
        ResumePolicy { countdown: 2, max_retries: 3 }
    }
}

/// Phone-call interruption state. The call reference only exists while the
/// call is active and the countdown only while a resume is pending.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Interruption {
    #[default]
    None,
    CallActive {
        call: CallId,
        suspended: BTreeSet<SlotKind>,
    },
    ResumePending {
        countdown: u32,
        retries: u32,
        suspended: BTreeSet<SlotKind>,
    },
}

impl Interruption {
    /// The "interrupted by phone call" flag.
    pub fn is_interrupted(&self) -> bool {
        !matches!(self, Interruption::None)
    }

    pub fn call(&self) -> Option<&CallId> {
        match self {
            Interruption::CallActive { call, .. } => Some(call),
            _ => None,
        }
    }

    pub fn countdown(&self) -> Option<u32> {
        match self {
            Interruption::ResumePending { countdown, .. } => Some(*countdown),
            _ => None,
        }
    }

    /// Adds `slot` to the resume set. No-op when not interrupted.
    pub(crate) fn suspend(&mut self, slot: SlotKind) {
        if let Interruption::CallActive { suspended, .. } | Interruption::ResumePending { suspended, .. } = self {
            suspended.insert(slot);
        }
    }

    /// Drops `slot` from the resume set. No-op when not interrupted.
    pub(crate) fn forget(&mut self, slot: SlotKind) {
        if let Interruption::CallActive { suspended, .. } | Interruption::ResumePending { suspended, .. } = self {
            suspended.remove(&slot);
        }
    }

    pub(crate) fn take_suspended(&mut self) -> BTreeSet<SlotKind> {
        match self {
            Interruption::None => BTreeSet::new(),
            Interruption::CallActive { suspended, .. } | Interruption::ResumePending { suspended, .. } => {
                std::mem::take(suspended)
            }
        }
    }
}
