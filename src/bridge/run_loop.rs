use super::{command_handler, BridgeCommand, LoadRequest, SoundService, BRIDGE_LOG_TARGET};
use crate::coordinator::CoordinatorState;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Runs the service's command processing loop.
pub async fn run_service_loop(service: &mut SoundService) {
    info!(target: BRIDGE_LOG_TARGET, "Sound service run loop started.");

    let mut resume_tick = service.options.resume_tick.and_then(resume_interval);

    loop {
        tokio::select! {
            biased; // Commands first

            command = service.command_rx.recv() => {
                let Some(command) = command else {
                    info!(target: BRIDGE_LOG_TARGET, "All command senders dropped. Exiting run loop.");
                    break;
                };
                trace!(target: BRIDGE_LOG_TARGET, "Received command: {:?}", command);
                let was_pending = service.coordinator.state() == CoordinatorState::ResumePending;
                if !handle_command(service, command) {
                    break;
                }
                // A fresh countdown waits full periods.
                if !was_pending && service.coordinator.state() == CoordinatorState::ResumePending {
                    resume_tick = service.options.resume_tick.and_then(resume_interval);
                }
            }

            Some(notice) = service.notice_rx.recv() => {
                trace!(target: BRIDGE_LOG_TARGET, "Received playback notice: {:?}", notice);
                service.coordinator.handle_notice(notice);
            }

            _ = next_tick(&mut resume_tick) => {
                if service.coordinator.state() == CoordinatorState::ResumePending {
                    debug!(target: BRIDGE_LOG_TARGET, "Resume tick.");
                    service.coordinator.tick();
                }
            }
        }
    }

    info!(target: BRIDGE_LOG_TARGET, "Sound service run loop finished. Releasing playback slots.");
    service.coordinator.shutdown();
}

/// Returns false when the loop should exit.
fn handle_command(service: &mut SoundService, command: BridgeCommand) -> bool {
    match command {
        BridgeCommand::Play { resource, loops } => {
            command_handler::handle_load(service, resource, LoadRequest::Play(loops))
        }
        BridgeCommand::PlayAlert { resource } => command_handler::handle_load(service, resource, LoadRequest::PlayAlert),
        BridgeCommand::PlayAlertWithDelay { resource, delay } => {
            command_handler::handle_play_alert_with_delay(service, resource, delay)
        }
        BridgeCommand::Load { resource, loops } => {
            command_handler::handle_load(service, resource, LoadRequest::Load(loops))
        }
        BridgeCommand::LoadAlert { resource } => command_handler::handle_load(service, resource, LoadRequest::LoadAlert),
        BridgeCommand::SetNumberOfLoops(loops) => service.coordinator.set_number_of_loops(loops),
        BridgeCommand::Pause(slot) => service.coordinator.pause(slot),
        BridgeCommand::Resume(slot) => service.coordinator.resume(slot),
        BridgeCommand::Stop(slot) => command_handler::handle_stop(service, slot),
        BridgeCommand::Seek { slot, seconds } => command_handler::handle_seek(service, slot, seconds),
        BridgeCommand::SetVolume { route, level } => command_handler::handle_set_volume(service, route, level),
        BridgeCommand::SetSpeaker(on) => service.coordinator.set_speaker(on),
        BridgeCommand::SetMixAudio(on) => service.coordinator.set_mix_audio(on),
        BridgeCommand::StartSession => command_handler::handle_start_session(service),
        BridgeCommand::RouteChanged(route) => service.coordinator.on_route_changed(route),
        BridgeCommand::CallStateChanged { call, state } => service.coordinator.on_call_state_changed(call, state),
        BridgeCommand::Tick => service.coordinator.tick(),
        BridgeCommand::GetInfo { slot, respond_to } => {
            let _ = respond_to.send(service.coordinator.info(slot)); // Ignore error if receiver dropped
        }
        BridgeCommand::GetState(respond_to) => {
            let _ = respond_to.send(service.coordinator.snapshot());
        }
        BridgeCommand::UrlFetched { url, request, generation, result } => {
            command_handler::handle_url_fetched(service, url, request, generation, result)
        }
        BridgeCommand::Shutdown => {
            info!(target: BRIDGE_LOG_TARGET, "Shutdown command received. Exiting run loop.");
            return false;
        }
    }
    true
}

/// Builds the resume tick, or `None` when `period` is zero or too far out to schedule.
pub(crate) fn resume_interval(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let Some(start) = Instant::now().checked_add(period) else {
        warn!(target: BRIDGE_LOG_TARGET, "Resume tick of {:?} cannot be scheduled. Relying on host ticks.", period);
        return None;
    };
    let mut interval = interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(interval)
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
