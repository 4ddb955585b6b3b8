//! JSON-lines transport between the host application and the service.
//!
//! Each input line is one [`HostRequest`], tagged by `"method"`. Every
//! [`BridgeEvent`] is written as one output line tagged by `"event"`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, instrument, trace, warn};

use super::{BridgeCommand, Resource};
use crate::coordinator::{BridgeEvent, CallId, CallState, LoopSpec, OutputRoute, SlotKind};

const LOG_TARGET: &str = "soundbridge::bridge::protocol";

#[derive(Debug)]
pub enum ProtocolError {
    Json(serde_json::Error),
    InvalidArgument(String),
    Io(io::Error),
    /// The sound service is no longer accepting commands.
    ServiceClosed,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Json(e) => write!(f, "Malformed request: {}", e),
            ProtocolError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            ProtocolError::Io(e) => write!(f, "Transport I/O error: {}", e),
            ProtocolError::ServiceClosed => write!(f, "Sound service is not running"),
        }
    }
}

impl Error for ProtocolError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ProtocolError::Json(e) => Some(e),
            ProtocolError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::Json(err)
    }
}

impl From<io::Error> for ProtocolError {
    fn from(err: io::Error) -> Self {
        ProtocolError::Io(err)
    }
}

fn default_loops() -> i64 {
    1
}

/// One request from the host application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum HostRequest {
    /// `loops` counts total plays; negative loops forever.
    Play {
        resource: Resource,
        #[serde(default = "default_loops")]
        loops: i64,
    },
    PlayAlert {
        resource: Resource,
    },
    /// `delay` in seconds.
    PlayAlertWithDelay {
        resource: Resource,
        delay: f64,
    },
    Load {
        resource: Resource,
        #[serde(default = "default_loops")]
        loops: i64,
    },
    LoadAlert {
        resource: Resource,
    },
    PlaySoundFile {
        name: String,
        #[serde(rename = "type")]
        ext: String,
    },
    PlaySoundFileWithDelay {
        name: String,
        #[serde(rename = "type")]
        ext: String,
        delay: f64,
    },
    LoadSoundFile {
        name: String,
        #[serde(rename = "type")]
        ext: String,
    },
    PlayUrl {
        url: String,
    },
    LoadUrl {
        url: String,
    },
    SetNumberOfLoops {
        loops: i64,
    },
    Pause {
        #[serde(default)]
        slot: Option<SlotKind>,
    },
    Resume {
        #[serde(default)]
        slot: Option<SlotKind>,
    },
    Stop {
        #[serde(default)]
        slot: Option<SlotKind>,
    },
    Seek {
        seconds: f64,
        #[serde(default)]
        slot: Option<SlotKind>,
    },
    SetVolume {
        volume: f32,
        #[serde(default)]
        route: Option<OutputRoute>,
    },
    SetSpeaker {
        on: bool,
    },
    SetMixAudio {
        on: bool,
    },
    StartSession,
    RouteChanged {
        route: OutputRoute,
    },
    CallStateChanged {
        call: CallId,
        state: CallState,
    },
    Tick,
    GetInfo {
        #[serde(default)]
        slot: Option<SlotKind>,
    },
    GetState,
    Shutdown,
}

/// How a parsed request is delivered to the service.
#[derive(Debug)]
pub enum Dispatch {
    Send(BridgeCommand),
    QueryInfo(Option<SlotKind>),
    QueryState,
}

impl HostRequest {
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(line)?)
    }

    pub fn into_dispatch(self) -> Result<Dispatch, ProtocolError> {
        let command = match self {
            HostRequest::Play { resource, loops } => BridgeCommand::Play {
                resource,
                loops: LoopSpec::from_loop_count(loops),
            },
            HostRequest::PlayAlert { resource } => BridgeCommand::PlayAlert { resource },
            HostRequest::PlayAlertWithDelay { resource, delay } => BridgeCommand::PlayAlertWithDelay {
                resource,
                delay: delay_from_seconds(delay)?,
            },
            HostRequest::Load { resource, loops } => BridgeCommand::Load {
                resource,
                loops: LoopSpec::from_loop_count(loops),
            },
            HostRequest::LoadAlert { resource } => BridgeCommand::LoadAlert { resource },
            HostRequest::PlaySoundFile { name, ext } => BridgeCommand::PlayAlert {
                resource: Resource::Bundle { name, ext },
            },
            HostRequest::PlaySoundFileWithDelay { name, ext, delay } => BridgeCommand::PlayAlertWithDelay {
                resource: Resource::Bundle { name, ext },
                delay: delay_from_seconds(delay)?,
            },
            HostRequest::LoadSoundFile { name, ext } => BridgeCommand::LoadAlert {
                resource: Resource::Bundle { name, ext },
            },
            HostRequest::PlayUrl { url } => BridgeCommand::PlayAlert { resource: Resource::Url { url } },
            HostRequest::LoadUrl { url } => BridgeCommand::LoadAlert { resource: Resource::Url { url } },
            HostRequest::SetNumberOfLoops { loops } => BridgeCommand::SetNumberOfLoops(loops),
            HostRequest::Pause { slot } => BridgeCommand::Pause(slot),
            HostRequest::Resume { slot } => BridgeCommand::Resume(slot),
            HostRequest::Stop { slot } => BridgeCommand::Stop(slot),
            HostRequest::Seek { seconds, slot } => {
                if !seconds.is_finite() {
                    return Err(ProtocolError::InvalidArgument(format!("seek position {}", seconds)));
                }
                BridgeCommand::Seek { slot, seconds }
            }
            HostRequest::SetVolume { volume, route } => BridgeCommand::SetVolume { route, level: volume },
            HostRequest::SetSpeaker { on } => BridgeCommand::SetSpeaker(on),
            HostRequest::SetMixAudio { on } => BridgeCommand::SetMixAudio(on),
            HostRequest::StartSession => BridgeCommand::StartSession,
            HostRequest::RouteChanged { route } => BridgeCommand::RouteChanged(route),
            HostRequest::CallStateChanged { call, state } => BridgeCommand::CallStateChanged { call, state },
            HostRequest::Tick => BridgeCommand::Tick,
            HostRequest::GetInfo { slot } => return Ok(Dispatch::QueryInfo(slot)),
            HostRequest::GetState => return Ok(Dispatch::QueryState),
            HostRequest::Shutdown => BridgeCommand::Shutdown,
        };
        Ok(Dispatch::Send(command))
    }
}

fn delay_from_seconds(seconds: f64) -> Result<Duration, ProtocolError> {
    Duration::try_from_secs_f64(seconds).map_err(|_| ProtocolError::InvalidArgument(format!("delay {}", seconds)))
}

/// Serves the protocol on the process's stdin/stdout.
pub async fn serve_stdio(
    commands: mpsc::Sender<BridgeCommand>,
    events: broadcast::Receiver<BridgeEvent>,
) -> Result<(), ProtocolError> {
    serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout(), commands, events).await
}

/// Forwards requests from `reader` to the service and writes events to
/// `writer` until the input ends or the service goes away. End of input
/// shuts the service down.
#[instrument(skip_all)]
pub async fn serve<R, W>(
    reader: R,
    mut writer: W,
    commands: mpsc::Sender<BridgeCommand>,
    mut events: broadcast::Receiver<BridgeEvent>,
) -> Result<(), ProtocolError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!(target: LOG_TARGET, "Serving host protocol.");
    let mut lines = reader.lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!(target: LOG_TARGET, "Host closed input. Shutting down service.");
                    if commands.send(BridgeCommand::Shutdown).await.is_err() {
                        debug!(target: LOG_TARGET, "Service already stopped.");
                    }
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                trace!(target: LOG_TARGET, "Request: {}", line);
                if let Some(reply) = handle_line(line, &commands).await? {
                    write_event(&mut writer, &reply).await?;
                }
            }

            event = events.recv() => match event {
                Ok(event) => write_event(&mut writer, &event).await?,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(target: LOG_TARGET, "Event stream lagged; {} events dropped.", skipped);
                }
                Err(RecvError::Closed) => {
                    info!(target: LOG_TARGET, "Event channel closed.");
                    break;
                }
            },
        }
    }

    writer.flush().await?;
    Ok(())
}

/// Returns the event to write back immediately, if any. Malformed requests
/// become `Error` events instead of ending the session.
async fn handle_line(
    line: &str,
    commands: &mpsc::Sender<BridgeCommand>,
) -> Result<Option<BridgeEvent>, ProtocolError> {
    let dispatch = match HostRequest::parse(line).and_then(HostRequest::into_dispatch) {
        Ok(dispatch) => dispatch,
        Err(e) => {
            warn!(target: LOG_TARGET, "Rejected request: {}", e);
            return Ok(Some(BridgeEvent::Error { message: e.to_string() }));
        }
    };

    match dispatch {
        Dispatch::Send(command) => {
            commands.send(command).await.map_err(|_| ProtocolError::ServiceClosed)?;
            Ok(None)
        }
        Dispatch::QueryInfo(slot) => {
            let (respond_to, response) = oneshot::channel();
            commands
                .send(BridgeCommand::GetInfo { slot, respond_to })
                .await
                .map_err(|_| ProtocolError::ServiceClosed)?;
            let reply = match response.await.map_err(|_| ProtocolError::ServiceClosed)? {
                Some(info) => BridgeEvent::Info(info),
                None => BridgeEvent::Error { message: "No audio loaded".to_string() },
            };
            Ok(Some(reply))
        }
        Dispatch::QueryState => {
            let (respond_to, response) = oneshot::channel();
            commands
                .send(BridgeCommand::GetState(respond_to))
                .await
                .map_err(|_| ProtocolError::ServiceClosed)?;
            let snapshot = response.await.map_err(|_| ProtocolError::ServiceClosed)?;
            Ok(Some(BridgeEvent::State(snapshot)))
        }
    }
}

async fn write_event<W: AsyncWrite + Unpin>(writer: &mut W, event: &BridgeEvent) -> Result<(), ProtocolError> {
    let mut line = serde_json::to_vec(event)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}
