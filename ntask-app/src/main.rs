use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ntask_core::{Clock, SystemClock};
use ntask_engine::{
    Command, Controller, EngineEvent, EventBus, EventLog, Procedure, TaskConfig,
};
use ntask_remote::RemoteServer;

/// Headless trial orchestration server for timed psychophysical tasks.
#[derive(Parser, Debug)]
#[command(name = "ntask", version, about)]
struct Args {
    /// JSON configuration file; built-in defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Override the remote control port from the config.
    #[arg(short, long)]
    port: Option<u16>,
    /// Override the directory finished runs are saved to.
    #[arg(long)]
    log_dir: Option<PathBuf>,
    /// Run the given setup immediately and exit when the session ends.
    #[arg(long)]
    run: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => TaskConfig::load(path)?,
        None => TaskConfig::default(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(dir) = args.log_dir {
        config.log_dir = Some(dir);
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let log = EventLog::new(Arc::clone(&clock));
    let bus = Arc::new(EventBus::new());
    let wire_events = bus.subscribe();
    let app_events = bus.subscribe();

    let port = config.port;
    let procedure = Procedure::new(config, log, bus, clock, StdRng::from_os_rng());
    let controller = Controller::spawn(procedure);
    let server = RemoteServer::spawn(port, controller.sender(), wire_events)
        .context("starting remote control server")?;
    info!(port = server.port(), "ready");

    if let Some(index) = args.run {
        controller.send(Command::Run(index));
        for event in app_events.iter() {
            match event {
                EngineEvent::Stopped { reason } => {
                    info!(?reason, "run ended");
                    // The saved-log notification follows the stop; give it a
                    // moment before shutting down.
                    if let Ok(EngineEvent::LogSaved { path }) =
                        app_events.recv_timeout(Duration::from_secs(1))
                    {
                        info!(path = %path.display(), "run log saved");
                    }
                    break;
                }
                EngineEvent::LogSaved { path } => {
                    info!(path = %path.display(), "run log saved");
                }
                _ => {}
            }
        }
        controller.send(Command::Shutdown);
    } else {
        drop(app_events);
    }

    // Runs until the remote `exit` command (or the batch run above) ends the
    // controller.
    controller.join();
    Ok(())
}
