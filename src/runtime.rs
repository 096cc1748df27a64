//! Event loop that owns the [`Session`] and carries out reducer commands.

use std::future::Future;
use std::io;
use std::sync::Arc;

use crossterm::event::Event as TermEvent;
use futures::{FutureExt, Stream, StreamExt};
use ratatui::{backend::Backend, Terminal};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::app::{key_to_event, reduce, Command, Event, ProbeKind, Session};
use crate::error::AppError;
use crate::settings::Settings;
use crate::speedtest::Probe;
use crate::ticker::Ticker;
use crate::ui::{draw_ui, ViewOptions};

pub struct Runtime {
    probe: Arc<dyn Probe>,
    ticker: Ticker,
    view: ViewOptions,
    tx: mpsc::Sender<Event>,
    rx: mpsc::Receiver<Event>,
    in_flight: Option<(ProbeKind, JoinHandle<()>)>,
}

impl Runtime {
    pub fn new(probe: Arc<dyn Probe>, settings: &Settings) -> Self {
        let (tx, rx) = mpsc::channel(32);
        Self {
            probe,
            ticker: Ticker::new(settings.tick_interval),
            view: ViewOptions::from(settings),
            tx,
            rx,
            in_flight: None,
        }
    }

    /// Handle for feeding events from outside the loop, e.g. signal handlers.
    pub fn sender(&self) -> mpsc::Sender<Event> {
        self.tx.clone()
    }

    /// Runs one test session to completion, cancellation or failure.
    pub async fn run<B, S>(&mut self, terminal: &mut Terminal<B>, mut input: S) -> Result<Session, AppError>
    where
        B: Backend,
        S: Stream<Item = io::Result<TermEvent>> + Unpin,
    {
        let mut session = Session::new();
        let mut input_open = true;
        tracing::info!(tick_ms = self.ticker.interval().as_millis() as u64, "session started");

        let mut quit = self.apply(&mut session, Event::StartRequested);

        loop {
            terminal.draw(|frame| draw_ui(frame, &session, &self.view))?;

            if quit {
                break;
            }

            let event = tokio::select! {
                Some(event) = self.rx.recv() => event,
                term = input.next(), if input_open => match term {
                    Some(Ok(TermEvent::Key(key))) => match key_to_event(key) {
                        Some(event) => event,
                        None => continue,
                    },
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        self.shutdown();
                        return Err(AppError::Terminal(e));
                    }
                    None => {
                        input_open = false;
                        continue;
                    }
                },
            };

            quit = self.apply(&mut session, event);
        }

        self.shutdown();
        tracing::info!(outcome = ?session.outcome(), "session finished");
        Ok(session)
    }

    /// Reduces one event and executes the resulting commands. Returns true
    /// once the session asked to terminate.
    fn apply(&mut self, session: &mut Session, event: Event) -> bool {
        let before = session.stage;
        let commands = reduce(session, event).into_vec();
        if session.stage != before {
            tracing::info!(from = ?before, to = ?session.stage, "stage changed");
        }

        for kind in commands.iter().filter_map(Command::probe) {
            // The probe being replaced must be the one the previous stage waited on.
            debug_assert_eq!(self.in_flight.as_ref().map(|(k, _)| *k), before.in_flight());
            debug_assert_eq!(session.stage.in_flight(), Some(kind));
        }

        self.execute(commands)
    }

    fn execute(&mut self, commands: Vec<Command>) -> bool {
        let mut quit = false;

        for command in commands {
            match command {
                Command::DiscoverEndpoint => {
                    let fut = self.probe.discover_endpoint().map(|result| match result {
                        Ok(endpoint) => Event::EndpointFound(endpoint),
                        Err(e) => Event::EndpointDiscoveryFailed(e),
                    });
                    self.spawn_probe(ProbeKind::Discovery, fut);
                }
                Command::MeasureDownload(endpoint) => {
                    let fut = self.probe.measure_download(&endpoint).map(|result| match result {
                        Ok(value) => Event::DownloadMeasured(value),
                        Err(e) => Event::ProbeFailed(e),
                    });
                    self.spawn_probe(ProbeKind::Download, fut);
                }
                Command::MeasureUpload(endpoint) => {
                    let fut = self.probe.measure_upload(&endpoint).map(|result| match result {
                        Ok(value) => Event::UploadMeasured(value),
                        Err(e) => Event::ProbeFailed(e),
                    });
                    self.spawn_probe(ProbeKind::Upload, fut);
                }
                Command::ScheduleTick => self.ticker.schedule(self.tx.clone()),
                Command::Quit => quit = true,
                Command::None | Command::Batch(_) => {}
            }
        }

        quit
    }

    fn spawn_probe<F>(&mut self, kind: ProbeKind, fut: F)
    where
        F: Future<Output = Event> + Send + 'static,
    {
        if let Some((previous, _)) = self.in_flight.take() {
            tracing::debug!(?previous, "previous probe reported");
        }

        tracing::info!(?kind, "dispatching probe");
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let event = fut.await;
            let _ = tx.send(event).await;
        });
        self.in_flight = Some((kind, handle));
    }

    fn shutdown(&mut self) {
        self.ticker.stop();
        if let Some((kind, handle)) = self.in_flight.take() {
            if !handle.is_finished() {
                tracing::info!(?kind, "abandoning probe in flight");
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use crate::speedtest::{EndpointInfo, Throughput};
    use futures::future::BoxFuture;
    use ratatui::backend::TestBackend;
    use std::time::Duration;

    struct SteadyProbe;

    fn endpoint() -> EndpointInfo {
        EndpointInfo {
            name: "X".into(),
            country: "Y".into(),
            latency_ms: 20.0,
            jitter_ms: 0.0,
            url: "http://localhost".into(),
        }
    }

    impl Probe for SteadyProbe {
        fn discover_endpoint(&self) -> BoxFuture<'static, Result<EndpointInfo, ProbeError>> {
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(endpoint())
            }
            .boxed()
        }

        fn measure_download(
            &self,
            _endpoint: &EndpointInfo,
        ) -> BoxFuture<'static, Result<Throughput, ProbeError>> {
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(Throughput::from_bytes_per_sec(1_000.0))
            }
            .boxed()
        }

        fn measure_upload(
            &self,
            _endpoint: &EndpointInfo,
        ) -> BoxFuture<'static, Result<Throughput, ProbeError>> {
            async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(Throughput::from_bytes_per_sec(1_000.0))
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn no_tick_arrives_after_done() {
        let mut runtime = Runtime::new(Arc::new(SteadyProbe), &Settings::default());
        let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();

        let session = runtime
            .run(&mut terminal, futures::stream::pending())
            .await
            .unwrap();
        assert_eq!(session.stage, crate::app::Stage::Done);
        assert!(session.animation_frame > 0);

        // Well past several tick intervals, nothing is delivered.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(runtime.rx.try_recv().is_err());
    }
}
