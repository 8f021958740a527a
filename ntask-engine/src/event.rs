use std::path::PathBuf;
use std::sync::Mutex;

use crossbeam_channel::{unbounded, Receiver, Sender};

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Interrupted,
    Finished,
}

/// State-change notifications published by the engine, in the exact order
/// the state machine produces them.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Started,
    NextTrial {
        trial: usize,
        target: Option<String>,
    },
    StimuliShown {
        target: Option<String>,
    },
    /// The stimuli left the screen. `feedback` carries the trial verdict for
    /// a visible feedback phase, or `None` when feedback is disabled and the
    /// hide is announced at the start of the following blank phase.
    StimuliHidden {
        target: Option<String>,
        feedback: Option<bool>,
    },
    Activated {
        label: String,
    },
    Result {
        target: Option<String>,
        correct: bool,
    },
    Stopped {
        reason: StopReason,
    },
    SetupRequested {
        index: usize,
    },
    LogSaved {
        path: PathBuf,
    },
}

/// Ordered multicast of [`EngineEvent`]s. Each subscriber gets its own
/// unbounded channel; publishing walks the subscriber list in subscription
/// order and drops hung-up receivers.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<EngineEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    pub fn publish(&self, event: EngineEvent) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
