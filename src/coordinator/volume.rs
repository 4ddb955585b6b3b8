use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical audio output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputRoute {
    Speaker,
    Headphone,
}

impl OutputRoute {
    pub fn other(self) -> Self {
        match self {
            OutputRoute::Speaker => OutputRoute::Headphone,
            OutputRoute::Headphone => OutputRoute::Speaker,
        }
    }
}

impl fmt::Display for OutputRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputRoute::Speaker => f.write_str("speaker"),
            OutputRoute::Headphone => f.write_str("headphone"),
        }
    }
}

/// Per-route volume levels. The effective volume is always the level of the
/// active route.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeProfile {
    speaker: f32,
    headphone: f32,
    active: OutputRoute,
}

impl VolumeProfile {
    pub fn new(speaker: f32, headphone: f32, active: OutputRoute) -> Self {
        VolumeProfile {
            speaker: clamp_level(speaker),
            headphone: clamp_level(headphone),
            active,
        }
    }

    pub fn level(&self, route: OutputRoute) -> f32 {
        match route {
            OutputRoute::Speaker => self.speaker,
            OutputRoute::Headphone => self.headphone,
        }
    }

    pub fn active_route(&self) -> OutputRoute {
        self.active
    }

    /// Effective volume applied to active slots.
    pub fn volume(&self) -> f32 {
        self.level(self.active)
    }

    /// Stores `level` for `route`. Returns true when the effective volume is
    /// affected, i.e. `route` is the active one.
    pub fn set_level(&mut self, route: OutputRoute, level: f32) -> bool {
        let level = clamp_level(level);
        match route {
            OutputRoute::Speaker => self.speaker = level,
            OutputRoute::Headphone => self.headphone = level,
        }
        route == self.active
    }

    /// Makes `route` active. Returns true when the route actually changed.
    pub fn select_route(&mut self, route: OutputRoute) -> bool {
        let changed = self.active != route;
        self.active = route;
        changed
    }
}

impl Default for VolumeProfile {
    fn default() -> Self {
        VolumeProfile::new(1.0, 1.0, OutputRoute::Speaker)
    }
}

fn clamp_level(level: f32) -> f32 {
    if level.is_nan() {
        0.0
    } else {
        level.clamp(0.0, 1.0)
    }
}
