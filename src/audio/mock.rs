//! In-memory players and session for unit tests.

use std::sync::{Arc, Mutex};

use crate::audio::{AudioError, AudioSession, MediaSource, PlayerFactory, SessionOptions, SlotPlayer};
use crate::coordinator::{OutputRoute, SlotKind};

#[derive(Debug, Default, Clone)]
pub struct PlayerRecord {
    pub resource: String,
    pub slot: Option<SlotKind>,
    pub load_id: u64,
    pub playing: bool,
    pub stopped: bool,
    pub volume: f32,
    pub position: f64,
    pub play_calls: u32,
    pub seeks: Vec<f64>,
}

/// Every player opened by a [`MockFactory`], in open order.
#[derive(Clone, Default)]
pub struct Records(Arc<Mutex<Vec<PlayerRecord>>>);

impl Records {
    pub fn get(&self, load_id: u64) -> PlayerRecord {
        self.0
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.load_id == load_id)
            .cloned()
            .expect("player was opened")
    }

    pub fn all(&self) -> Vec<PlayerRecord> {
        self.0.lock().unwrap().clone()
    }

    pub fn update(&self, load_id: u64, f: impl FnOnce(&mut PlayerRecord)) {
        let mut records = self.0.lock().unwrap();
        let record = records.iter_mut().find(|r| r.load_id == load_id).expect("player was opened");
        f(record);
    }
}

/// Opens mock players. Identities containing "broken" fail to load and ones
/// containing "nodevice" fail with an output error.
pub struct MockFactory {
    pub records: Records,
}

impl PlayerFactory for MockFactory {
    fn open(&self, source: &MediaSource, slot: SlotKind, load_id: u64) -> Result<Box<dyn SlotPlayer>, AudioError> {
        let resource = source.identity();
        if resource.contains("broken") {
            return Err(AudioError::ResourceLoad(format!("cannot decode {}", resource)));
        }
        if resource.contains("nodevice") {
            return Err(AudioError::AlsaError("no playback device".to_string()));
        }
        self.records.0.lock().unwrap().push(PlayerRecord {
            resource,
            slot: Some(slot),
            load_id,
            volume: 1.0,
            ..Default::default()
        });
        Ok(Box::new(MockPlayer { records: self.records.clone(), load_id }))
    }
}

pub struct MockPlayer {
    records: Records,
    load_id: u64,
}

impl SlotPlayer for MockPlayer {
    fn play(&mut self) -> Result<(), AudioError> {
        self.records.update(self.load_id, |r| {
            r.playing = true;
            r.play_calls += 1;
        });
        Ok(())
    }

    fn pause(&mut self) -> Result<(), AudioError> {
        self.records.update(self.load_id, |r| r.playing = false);
        Ok(())
    }

    fn stop(&mut self) {
        self.records.update(self.load_id, |r| {
            r.playing = false;
            r.stopped = true;
        });
    }

    fn seek(&mut self, seconds: f64) -> Result<(), AudioError> {
        self.records.update(self.load_id, |r| {
            r.position = seconds;
            r.seeks.push(seconds);
        });
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.records.update(self.load_id, |r| r.volume = volume);
    }

    fn position(&self) -> f64 {
        self.records.get(self.load_id).position
    }

    fn duration(&self) -> Option<f64> {
        Some(30.0)
    }
}

#[derive(Debug, Default)]
pub struct SessionLog {
    /// Activations that still fail with an interruption race.
    pub busy_remaining: u32,
    pub activations: u32,
    pub routes: Vec<OutputRoute>,
}

pub struct MockSession(pub Arc<Mutex<SessionLog>>);

impl MockSession {
    /// A session with both routes available.
    pub fn both_routes() -> (Self, Arc<Mutex<SessionLog>>) {
        let log = Arc::new(Mutex::new(SessionLog {
            routes: vec![OutputRoute::Speaker, OutputRoute::Headphone],
            ..Default::default()
        }));
        (MockSession(log.clone()), log)
    }
}

impl AudioSession for MockSession {
    fn activate(&mut self, _options: SessionOptions) -> Result<(), AudioError> {
        let mut log = self.0.lock().unwrap();
        log.activations += 1;
        if log.busy_remaining > 0 {
            log.busy_remaining -= 1;
            return Err(AudioError::InterruptionRace("call audio still active".to_string()));
        }
        Ok(())
    }

    fn is_route_available(&self, route: OutputRoute) -> bool {
        self.0.lock().unwrap().routes.contains(&route)
    }

    fn override_route(&mut self, route: OutputRoute) -> Result<(), AudioError> {
        if self.is_route_available(route) {
            Ok(())
        } else {
            Err(AudioError::RouteUnavailable(route))
        }
    }
}
