use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{after, bounded, never, select, unbounded, Receiver, Sender};
use tracing::{debug, warn};

use crate::event::StopReason;
use crate::procedure::{Phase, Procedure, TimerOp};

/// Mutating calls accepted by the controller. Timer fires and commands are
/// serialized through one queue, so races between them (a click at the
/// moment a trial ends, a stop racing a pending phase advance) resolve in
/// arrival order.
pub enum Command {
    Run(usize),
    /// `Run` on the currently selected setup.
    RunCurrent,
    Stop(StopReason),
    Activate(usize),
    Deactivate,
    SelectSetup(usize),
    LogStimuliOrder(Vec<String>),
    Query(Sender<Status>),
    /// Stop if running, then end the controller thread.
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct Status {
    pub phase: Phase,
    pub running: bool,
    pub setup_index: usize,
    pub setup_count: usize,
    pub trial_index: Option<usize>,
}

/// Owns the controller thread; the procedure lives on that thread and is
/// only ever touched from there.
pub struct Controller {
    cmd_tx: Sender<Command>,
    handle: Option<JoinHandle<()>>,
}

impl Controller {
    pub fn spawn(procedure: Procedure) -> Self {
        let (cmd_tx, cmd_rx) = unbounded();
        let handle = thread::Builder::new()
            .name("ntask-controller".to_string())
            .spawn(move || worker(procedure, cmd_rx))
            .expect("controller thread");
        Self {
            cmd_tx,
            handle: Some(handle),
        }
    }

    pub fn sender(&self) -> Sender<Command> {
        self.cmd_tx.clone()
    }

    pub fn send(&self, command: Command) {
        let _ = self.cmd_tx.send(command);
    }

    /// Snapshot of the controller state, or `None` if the thread is gone.
    pub fn status(&self) -> Option<Status> {
        let (tx, rx) = bounded(1);
        self.cmd_tx.send(Command::Query(tx)).ok()?;
        rx.recv_timeout(Duration::from_secs(5)).ok()
    }

    /// Blocks until the controller thread ends (via `Shutdown` or all
    /// senders dropping).
    pub fn join(mut self) {
        drop(self.cmd_tx);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn worker(mut procedure: Procedure, cmd_rx: Receiver<Command>) {
    // The phase timer: one-shot, replaced on every arm/cancel so a cancelled
    // timer can never fire into a later run.
    let mut timer: Receiver<Instant> = never();

    loop {
        select! {
            recv(cmd_rx) -> msg => {
                let Ok(command) = msg else {
                    procedure.stop(StopReason::Interrupted);
                    break;
                };
                let shutdown = matches!(command, Command::Shutdown);
                apply(&mut procedure, command);
                if shutdown {
                    debug!("controller shut down");
                    break;
                }
            }
            recv(timer) -> _ => {
                timer = never();
                procedure.handle_timer();
            }
        }

        match procedure.take_timer_op() {
            Some(TimerOp::Arm(duration)) => timer = after(duration),
            Some(TimerOp::Cancel) => timer = never(),
            None => {}
        }
    }
}

fn apply(procedure: &mut Procedure, command: Command) {
    match command {
        Command::Run(index) => {
            if let Err(err) = procedure.run(index) {
                warn!("run({index}) rejected: {err}");
            }
        }
        Command::RunCurrent => {
            let index = procedure.setup_index();
            if let Err(err) = procedure.run(index) {
                warn!("run rejected: {err}");
            }
        }
        Command::Stop(reason) => procedure.stop(reason),
        Command::Activate(index) => {
            procedure.activate_stimulus(index);
        }
        Command::Deactivate => procedure.deactivate_stimulus(),
        Command::SelectSetup(index) => {
            procedure.select_setup(index);
        }
        Command::LogStimuliOrder(labels) => procedure.log_stimuli_order(&labels),
        Command::Query(tx) => {
            let _ = tx.send(Status {
                phase: procedure.phase(),
                running: procedure.is_running(),
                setup_index: procedure.setup_index(),
                setup_count: procedure.setups().len(),
                trial_index: procedure.trial_index(),
            });
        }
        Command::Shutdown => procedure.stop(StopReason::Interrupted),
    }
}
