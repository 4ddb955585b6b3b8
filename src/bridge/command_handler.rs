use super::{BridgeCommand, LoadRequest, Resolved, Resource, SoundService, BRIDGE_LOG_TARGET};
use crate::audio::{stream_wrapper, AudioError, MediaSource};
use crate::coordinator::{BridgeEvent, OutputRoute, SlotKind};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

#[instrument(skip(service, resource), fields(resource = %resource.identity()))]
pub fn handle_load(service: &mut SoundService, resource: Resource, request: LoadRequest) {
    let slot = request.slot();
    let generation = service.next_generation(slot);

    match resource.resolve(&service.options.bundle_dir) {
        Ok(Resolved::Local(source)) => load_source(service, source, request),
        Ok(Resolved::Remote(url)) => {
            // The request supersedes whatever the slot holds, even before the fetch lands.
            service.coordinator.stop(slot);
            spawn_fetch(service, url, request, generation);
        }
        Err(e) => {
            service.coordinator.stop(slot);
            service.coordinator.report_load_failure(&resource.identity(), &e.to_string());
        }
    }
}

fn load_source(service: &mut SoundService, source: MediaSource, request: LoadRequest) {
    let coordinator = &mut service.coordinator;
    let result = match request {
        LoadRequest::Play(loops) => coordinator.play(source, loops),
        LoadRequest::PlayAlert => coordinator.play_alert(source),
        LoadRequest::Load(loops) => coordinator.load(source, loops),
        LoadRequest::LoadAlert => coordinator.load_alert(source),
    };
    if let Err(e) = result {
        warn!(target: BRIDGE_LOG_TARGET, "{:?} failed: {}", request, e);
    }
}

fn spawn_fetch(service: &SoundService, url: Url, request: LoadRequest, generation: u64) {
    let Some(command_tx) = service.internal_command_tx.upgrade() else {
        debug!(target: BRIDGE_LOG_TARGET, "Service is shutting down; not fetching {}", url);
        return;
    };
    let client = service.http.clone();
    let max_bytes = service.options.max_download_bytes;
    info!(target: BRIDGE_LOG_TARGET, "Fetching {} for {:?}", url, request);

    tokio::spawn(async move {
        let url = url.to_string();
        let result = stream_wrapper::download(&client, &url, max_bytes).await;
        let command = BridgeCommand::UrlFetched { url, request, generation, result };
        if command_tx.send(command).await.is_err() {
            debug!(target: BRIDGE_LOG_TARGET, "Service stopped before a fetch completed.");
        }
    });
}

#[instrument(skip(service, url, result), fields(url = %url))]
pub fn handle_url_fetched(
    service: &mut SoundService,
    url: String,
    request: LoadRequest,
    generation: u64,
    result: Result<MediaSource, AudioError>,
) {
    if generation != service.current_generation(request.slot()) {
        debug!(target: BRIDGE_LOG_TARGET, "Discarding fetch superseded by a later request.");
        return;
    }
    match result {
        Ok(source) => load_source(service, source, request),
        Err(e) => service.coordinator.report_load_failure(&url, &e.to_string()),
    }
}

#[instrument(skip(service, resource), fields(resource = %resource.identity()))]
pub fn handle_play_alert_with_delay(service: &SoundService, resource: Resource, delay: Duration) {
    let Some(command_tx) = service.internal_command_tx.upgrade() else {
        return;
    };
    debug!(target: BRIDGE_LOG_TARGET, "Scheduling alert in {:?}", delay);
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if command_tx.send(BridgeCommand::PlayAlert { resource }).await.is_err() {
            debug!(target: BRIDGE_LOG_TARGET, "Service stopped before a delayed alert fired.");
        }
    });
}

#[instrument(skip(service))]
pub fn handle_stop(service: &mut SoundService, slot: Option<SlotKind>) {
    let targets = match slot {
        Some(kind) => vec![kind],
        None => SlotKind::ALL.to_vec(),
    };
    for kind in targets {
        service.next_generation(kind);
        service.coordinator.stop(kind);
    }
}

pub fn handle_seek(service: &mut SoundService, slot: Option<SlotKind>, seconds: f64) {
    if let Err(e) = service.coordinator.seek(slot, seconds) {
        warn!(target: BRIDGE_LOG_TARGET, "Seek to {:.2}s failed: {}", seconds, e);
        service.broadcast_event(BridgeEvent::Error { message: e.to_string() });
    }
}

pub fn handle_set_volume(service: &mut SoundService, route: Option<OutputRoute>, level: f32) {
    let route = route.unwrap_or_else(|| service.coordinator.volume().active_route());
    service.coordinator.set_volume(route, level);
}

#[instrument(skip(service))]
pub fn handle_start_session(service: &mut SoundService) {
    if let Err(e) = service.coordinator.start_session() {
        warn!(target: BRIDGE_LOG_TARGET, "Starting the audio session failed: {}", e);
        service.broadcast_event(BridgeEvent::Error { message: e.to_string() });
    }
}
