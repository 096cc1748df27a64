use std::fs::File;
use std::path::Path;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::EventStream;
use speedrun::app::{Event, Session, Stage};
use speedrun::error::AppError;
use speedrun::runtime::Runtime;
use speedrun::settings::{Cli, Settings};
use speedrun::speedtest::HttpProbe;
use speedrun::ui::summary;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_file.as_deref()) {
        eprintln!("Fatal error: {e:#}");
        return ExitCode::from(2);
    }

    let settings = Settings::from(&cli);

    match run(settings).await {
        Ok(session) => {
            if session.stage == Stage::Failed {
                eprintln!("{}", summary(&session));
            } else {
                println!("{}", summary(&session));
            }
            ExitCode::from(session.outcome().map_or(1, |o| o.exit_code()))
        }
        Err(e) => {
            eprintln!("Fatal error: {e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(settings: Settings) -> Result<Session> {
    let probe = HttpProbe::new(&settings).context("failed to build http client")?;
    let mut runtime = Runtime::new(Arc::new(probe), &settings);

    let cancel = runtime.sender();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel.send(Event::CancelRequested).await;
        }
    });

    let mut terminal = ratatui::try_init().map_err(AppError::InterfaceStart)?;
    if let Err(e) = terminal.clear() {
        ratatui::restore();
        return Err(AppError::InterfaceStart(e).into());
    }

    let result = runtime.run(&mut terminal, EventStream::new()).await;

    ratatui::restore();
    Ok(result?)
}

/// Logs go to a file only; the terminal belongs to the interface.
fn init_logging(path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };

    let file = File::create(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}
