//! The staged test controller.
//!
//! [`reduce`] is the only place a [`Session`] is mutated. It performs no I/O:
//! every side effect the runtime should carry out is returned as a
//! [`Command`].

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::error::ProbeError;
use crate::speedtest::{EndpointInfo, Throughput};
use crate::ticker::SPINNER_FRAMES;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    DiscoveringServer,
    TestingDownload,
    TestingUpload,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    /// The probe that must be outstanding while in this stage.
    pub fn in_flight(self) -> Option<ProbeKind> {
        match self {
            Stage::DiscoveringServer => Some(ProbeKind::Discovery),
            Stage::TestingDownload => Some(ProbeKind::Download),
            Stage::TestingUpload => Some(ProbeKind::Upload),
            Stage::Idle | Stage::Done | Stage::Failed => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    Discovery,
    Download,
    Upload,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub stage: Stage,
    pub selected_endpoint: Option<EndpointInfo>,
    pub download_result: Option<Throughput>,
    pub upload_result: Option<Throughput>,
    pub last_error: Option<ProbeError>,
    pub animation_frame: usize,
    pub cancelled: bool,
}

impl Session {
    pub fn new() -> Self {
        Self {
            stage: Stage::Idle,
            selected_endpoint: None,
            download_result: None,
            upload_result: None,
            last_error: None,
            animation_frame: 0,
            cancelled: false,
        }
    }

    pub fn spinner(&self) -> &'static str {
        SPINNER_FRAMES[self.animation_frame % SPINNER_FRAMES.len()]
    }

    /// How the run ended, or `None` while it is still going.
    pub fn outcome(&self) -> Option<Outcome> {
        if self.cancelled {
            return Some(Outcome::Cancelled);
        }
        match self.stage {
            Stage::Done => Some(Outcome::Completed),
            Stage::Failed => Some(Outcome::Failed(
                self.last_error
                    .clone()
                    .unwrap_or_else(|| ProbeError::Discovery("unknown failure".into())),
            )),
            _ => None,
        }
    }

    fn fail(&mut self, error: ProbeError) -> Command {
        tracing::warn!(stage = ?self.stage, %error, "test failed");
        self.last_error = Some(error);
        self.stage = Stage::Failed;
        Command::Quit
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StartRequested,
    EndpointFound(EndpointInfo),
    EndpointDiscoveryFailed(ProbeError),
    DownloadMeasured(Throughput),
    UploadMeasured(Throughput),
    ProbeFailed(ProbeError),
    Tick,
    CancelRequested,
}

/// Work the runtime must schedule after a state update.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    None,
    Batch(Vec<Command>),
    DiscoverEndpoint,
    MeasureDownload(EndpointInfo),
    MeasureUpload(EndpointInfo),
    ScheduleTick,
    Quit,
}

impl Command {
    /// Flattens nested batches into execution order.
    pub fn into_vec(self) -> Vec<Command> {
        match self {
            Command::None => Vec::new(),
            Command::Batch(cmds) => cmds.into_iter().flat_map(Command::into_vec).collect(),
            cmd => vec![cmd],
        }
    }

    pub fn probe(&self) -> Option<ProbeKind> {
        match self {
            Command::DiscoverEndpoint => Some(ProbeKind::Discovery),
            Command::MeasureDownload(_) => Some(ProbeKind::Download),
            Command::MeasureUpload(_) => Some(ProbeKind::Upload),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed,
    Cancelled,
    Failed(ProbeError),
}

impl Outcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Completed | Outcome::Cancelled => 0,
            Outcome::Failed(_) => 1,
        }
    }
}

/// Apply one event to the session and return the follow-up work.
///
/// Events that do not belong to the current stage are dropped without
/// touching the session, so late results from abandoned probes are harmless.
pub fn reduce(session: &mut Session, event: Event) -> Command {
    if session.cancelled {
        return Command::None;
    }

    match (session.stage, event) {
        (_, Event::CancelRequested) => {
            if !session.stage.is_terminal() {
                session.cancelled = true;
            }
            tracing::info!(stage = ?session.stage, "cancelled by user");
            Command::Quit
        }

        (stage, Event::Tick) => {
            if stage.is_terminal() {
                return Command::None;
            }
            session.animation_frame = (session.animation_frame + 1) % SPINNER_FRAMES.len();
            Command::ScheduleTick
        }

        (Stage::Idle, Event::StartRequested) => {
            session.stage = Stage::DiscoveringServer;
            Command::Batch(vec![Command::DiscoverEndpoint, Command::ScheduleTick])
        }

        (Stage::Idle | Stage::DiscoveringServer, Event::EndpointFound(endpoint)) => {
            tracing::info!(name = %endpoint.name, country = %endpoint.country, latency_ms = endpoint.latency_ms, "endpoint found");
            session.selected_endpoint = Some(endpoint.clone());
            session.stage = Stage::TestingDownload;
            Command::MeasureDownload(endpoint)
        }

        (Stage::Idle | Stage::DiscoveringServer, Event::EndpointDiscoveryFailed(error)) => {
            session.fail(error)
        }

        (Stage::TestingDownload, Event::DownloadMeasured(value)) => {
            tracing::info!(%value, bytes_per_sec = value.bytes_per_sec(), "download measured");
            session.download_result = Some(value);
            session.stage = Stage::TestingUpload;
            match session.selected_endpoint.clone() {
                Some(endpoint) => Command::MeasureUpload(endpoint),
                None => session.fail(ProbeError::Discovery("no endpoint selected".into())),
            }
        }

        (Stage::TestingUpload, Event::UploadMeasured(value)) => {
            tracing::info!(%value, bytes_per_sec = value.bytes_per_sec(), "upload measured");
            session.upload_result = Some(value);
            session.stage = Stage::Done;
            Command::Quit
        }

        (Stage::TestingDownload | Stage::TestingUpload, Event::ProbeFailed(error)) => {
            session.fail(error)
        }

        (stage, event) => {
            tracing::debug!(?stage, ?event, "ignoring event out of stage");
            Command::None
        }
    }
}

/// Maps a key press to the event it requests, if any.
pub fn key_to_event(key: KeyEvent) -> Option<Event> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => Some(Event::CancelRequested),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Event::CancelRequested)
        }
        _ => None,
    }
}
