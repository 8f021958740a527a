use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::Context;
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use ntask_engine::{Command, EngineEvent, StopReason};

use crate::protocol::{parse_line, wire_message, RemoteCommand, FIN_DELAY};

type SharedPeer = Arc<Mutex<Option<TcpStream>>>;

/// Line-oriented TCP control server. One accepted peer at a time; inbound
/// lines become controller commands, engine events become outbound lines.
/// A dropped connection is non-fatal: the listener keeps re-accepting.
pub struct RemoteServer {
    local_addr: SocketAddr,
}

impl RemoteServer {
    /// Binds the listener and spawns the accept and event-pump threads.
    /// Pass port 0 to bind an ephemeral port (tests).
    pub fn spawn(
        port: u16,
        commands: Sender<Command>,
        events: Receiver<EngineEvent>,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .with_context(|| format!("binding remote control port {port}"))?;
        let local_addr = listener.local_addr().context("remote listener address")?;
        info!(%local_addr, "remote control listening");

        let peer: SharedPeer = Arc::new(Mutex::new(None));

        {
            let peer = Arc::clone(&peer);
            thread::Builder::new()
                .name("ntask-remote-accept".to_string())
                .spawn(move || accept_loop(listener, peer, commands))
                .context("remote accept thread")?;
        }
        thread::Builder::new()
            .name("ntask-remote-events".to_string())
            .spawn(move || event_loop(events, peer))
            .context("remote event thread")?;

        Ok(Self { local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }
}

fn accept_loop(listener: TcpListener, peer: SharedPeer, commands: Sender<Command>) {
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                warn!("accept failed: {err}");
                continue;
            }
        };
        let addr = stream.peer_addr().ok();
        info!(?addr, "client connected");

        match stream.try_clone() {
            Ok(writer) => *peer.lock().unwrap() = Some(writer),
            Err(err) => {
                warn!("cannot clone client stream: {err}");
                continue;
            }
        }

        let controller_alive = serve_client(stream, &commands);
        *peer.lock().unwrap() = None;
        info!(?addr, "client disconnected");

        if !controller_alive {
            break;
        }
    }
}

/// Reads the peer line by line until it disconnects. Returns false when the
/// controller side is gone and listening is pointless.
fn serve_client(stream: TcpStream, commands: &Sender<Command>) -> bool {
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let Ok(line) = line else {
            break;
        };
        debug!(%line, "received");
        let sent = match parse_line(&line) {
            Some(RemoteCommand::Start) => commands.send(Command::RunCurrent),
            Some(RemoteCommand::Stop) => commands.send(Command::Stop(StopReason::Interrupted)),
            Some(RemoteCommand::SelectSetup(index)) => {
                commands.send(Command::SelectSetup(index))
            }
            Some(RemoteCommand::Exit) => commands
                .send(Command::Stop(StopReason::Interrupted))
                .and_then(|_| commands.send(Command::Shutdown)),
            None => {
                debug!(%line, "ignoring unrecognized command");
                Ok(())
            }
        };
        if sent.is_err() {
            return false;
        }
    }
    true
}

fn event_loop(events: Receiver<EngineEvent>, peer: SharedPeer) {
    for event in events.iter() {
        let Some(line) = wire_message(&event) else {
            continue;
        };
        // FIN trails the stop by a grace period. The wait happens off the
        // pump so events from an immediate restart are not held behind it.
        if matches!(event, EngineEvent::Stopped { .. }) {
            let peer = Arc::clone(&peer);
            thread::spawn(move || {
                thread::sleep(FIN_DELAY);
                send_line(&peer, &line);
            });
            continue;
        }
        send_line(&peer, &line);
    }
}

fn send_line(peer: &SharedPeer, line: &str) {
    let mut guard = peer.lock().unwrap();
    if let Some(stream) = guard.as_mut() {
        if let Err(err) = stream.write_all(format!("{line}\n").as_bytes()) {
            debug!("client write failed, dropping connection: {err}");
            *guard = None;
        }
    }
}
