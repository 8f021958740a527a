use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use thiserror::Error;
use tracing::{debug, error};

use ntask_core::{Clock, LogAction, LogSource, Setup, Stimulus};

use crate::arbiter::{self, ResponsePolicy};
use crate::config::{SessionType, TaskConfig, TaskType, TrialDurationType};
use crate::event::{EngineEvent, EventBus, StopReason};
use crate::log::EventLog;
use crate::sequence::prepare_targets;

/// Procedure phase. One trial is BlankScreen → Stimuli → Info; the cycle
/// repeats until the session terminates back to Inactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Inactive,
    BlankScreen,
    Stimuli,
    Info,
}

/// Why `run` refused to start. Out-of-range and double-start rejections are
/// silent at the engine boundary (no state change); the zero-back variant is
/// the one callers surface to the operator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StartError {
    #[error("a run is already active")]
    AlreadyRunning,
    #[error("setup index {0} is out of range")]
    SetupOutOfRange(usize),
    #[error("setup '{setup}' does not include stimulus '{stimulus}'")]
    MissingZeroBackStimulus { setup: String, stimulus: String },
}

/// Timer request left behind by a state transition, picked up by the
/// controller loop after every call into the procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerOp {
    Arm(Duration),
    Cancel,
}

struct Session {
    setup: Setup,
    targets: Vec<usize>,
    trial_index: Option<usize>,
    start_ms: u64,
    lead_in_pending: bool,
}

/// The timer-driven trial state machine. Strictly single-threaded: every
/// mutating call (run, stop, activate, deactivate, timer fire) must come
/// from one execution context, which the [`Controller`](crate::Controller)
/// provides by serializing them through its command queue.
pub struct Procedure {
    config: TaskConfig,
    setups: Vec<Setup>,
    setup_index: usize,
    log: EventLog,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    rng: StdRng,
    phase: Phase,
    session: Option<Session>,
    timer_op: Option<TimerOp>,
    last_log_file: Option<PathBuf>,
}

impl Procedure {
    pub fn new(
        config: TaskConfig,
        log: EventLog,
        bus: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        rng: StdRng,
    ) -> Self {
        let setups: Vec<Setup> = config.setups.iter().map(Setup::from_data).collect();
        let setup_index = if config.setup_index < setups.len() {
            config.setup_index
        } else {
            0
        };
        Self {
            config,
            setups,
            setup_index,
            log,
            bus,
            clock,
            rng,
            phase: Phase::Inactive,
            session: None,
            timer_op: None,
            last_log_file: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase != Phase::Inactive
    }

    pub fn setups(&self) -> &[Setup] {
        &self.setups
    }

    pub fn setup_index(&self) -> usize {
        self.setup_index
    }

    pub fn current_setup(&self) -> Option<&Setup> {
        self.session.as_ref().map(|s| &s.setup)
    }

    pub fn trial_index(&self) -> Option<usize> {
        self.session.as_ref().and_then(|s| s.trial_index)
    }

    pub fn last_log_file(&self) -> Option<&Path> {
        self.last_log_file.as_deref()
    }

    /// Starts a run on the given setup. No-op (with the reason as the error)
    /// while a run is active or when the index is out of range.
    pub fn run(&mut self, setup_index: usize) -> Result<(), StartError> {
        if self.phase != Phase::Inactive {
            return Err(StartError::AlreadyRunning);
        }
        let setup = self
            .setups
            .get(setup_index)
            .ok_or(StartError::SetupOutOfRange(setup_index))?
            .clone();

        if self.config.task_type == TaskType::ZeroBack
            && setup.index_of(&self.config.zero_back_stimulus).is_none()
        {
            return Err(StartError::MissingZeroBackStimulus {
                setup: setup.name,
                stimulus: self.config.zero_back_stimulus.clone(),
            });
        }

        self.setup_index = setup_index;
        self.log.reset();
        self.log
            .add(LogSource::Experiment, LogAction::Start, vec![setup.name.clone()]);

        let targets = prepare_targets(
            setup.len(),
            self.required_trials(setup.len()),
            &mut self.rng,
        );
        debug!(setup = %setup.name, trials = targets.len(), "run started");

        self.session = Some(Session {
            setup,
            targets,
            trial_index: None,
            start_ms: self.clock.now_ms(),
            lead_in_pending: self.config.lead_in_ms > 0,
        });

        self.bus.publish(EngineEvent::Started);
        self.advance_trial();
        Ok(())
    }

    /// Cancels any pending phase timer and drops back to Inactive. No-op
    /// without a live session, so a double stop never logs twice. Guarding
    /// on the session rather than the phase matters for a zero-trial run,
    /// which terminates before the first phase is ever entered.
    pub fn stop(&mut self, reason: StopReason) {
        if self.session.is_none() {
            return;
        }
        self.timer_op = Some(TimerOp::Cancel);
        self.phase = Phase::Inactive;
        self.session = None;
        self.log.add(LogSource::Experiment, LogAction::Stop, vec![]);
        debug!(?reason, "run stopped");
        self.bus.publish(EngineEvent::Stopped { reason });
    }

    /// Routes an activation through the response policy. Returns whether it
    /// was accepted and recorded.
    pub fn activate_stimulus(&mut self, index: usize) -> bool {
        let policy = ResponsePolicy::from_config(&self.config);
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        match arbiter::arbitrate(policy, &mut session.setup, index) {
            Some(label) => {
                self.log
                    .add(LogSource::Stimulus, LogAction::Activated, vec![label.clone()]);
                debug!(%label, "stimulus activated");
                self.bus.publish(EngineEvent::Activated { label });
                true
            }
            None => false,
        }
    }

    /// Response release. Ends the stimuli phase early when the configuration
    /// says responses interrupt the trial, or when the trial has no fixed
    /// duration.
    pub fn deactivate_stimulus(&mut self) {
        if !arbiter::release_ends_trial(&self.config) {
            return;
        }
        if self.phase == Phase::Stimuli {
            self.enter(Phase::Info);
        }
    }

    /// Switches the active configuration for the next run. Rejected while a
    /// run is active or when the index is out of range.
    pub fn select_setup(&mut self, index: usize) -> bool {
        if self.phase != Phase::Inactive || index >= self.setups.len() {
            return false;
        }
        self.setup_index = index;
        self.bus.publish(EngineEvent::SetupRequested { index });
        true
    }

    /// Records the presentation order a display layer used for this trial.
    pub fn log_stimuli_order(&self, labels: &[String]) {
        self.log
            .add(LogSource::Stimuli, LogAction::Ordered, vec![labels.join(" ")]);
    }

    /// Phase timer delivery. The phase is re-checked here, not at schedule
    /// time: a fire queued behind a `stop` lands on Inactive and is dropped.
    pub fn handle_timer(&mut self) {
        match self.phase {
            Phase::BlankScreen => self.enter(Phase::Stimuli),
            Phase::Stimuli => self.enter(Phase::Info),
            Phase::Info => self.advance_trial(),
            Phase::Inactive => {}
        }
    }

    pub(crate) fn take_timer_op(&mut self) -> Option<TimerOp> {
        self.timer_op.take()
    }

    fn required_trials(&self, stimulus_count: usize) -> usize {
        match self.config.session_type {
            SessionType::Count => self.config.trial_count,
            SessionType::Duration => stimulus_count,
        }
    }

    /// The stimulus the participant is expected to activate this trial.
    fn current_target(&self) -> Option<&Stimulus> {
        let session = self.session.as_ref()?;
        match self.config.task_type {
            TaskType::ZeroBack => session
                .setup
                .stimuli()
                .iter()
                .find(|s| s.label == self.config.zero_back_stimulus),
            TaskType::NBack => {
                let trial = session.trial_index?;
                let target = *session.targets.get(trial)?;
                session.setup.stimulus(target)
            }
        }
    }

    fn target_label(&self) -> Option<String> {
        self.current_target().map(|s| s.label.clone())
    }

    /// Advances to the next trial or terminates the session.
    fn advance_trial(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.setup.reset_stimuli();

        let next = session.trial_index.map_or(0, |i| i + 1);
        session.trial_index = Some(next);

        let finished = match self.config.session_type {
            SessionType::Count => next >= self.config.trial_count,
            SessionType::Duration => {
                if next >= session.targets.len() {
                    // Lap exhausted: reshuffle a fresh pass over all stimuli.
                    let count = session.setup.len();
                    session.targets = prepare_targets(count, count, &mut self.rng);
                    session.trial_index = Some(0);
                }
                let elapsed_ms = self.clock.now_ms().saturating_sub(session.start_ms);
                elapsed_ms / 1000 >= self.config.session_duration_s
            }
        };

        if !finished {
            self.enter(Phase::BlankScreen);
        } else {
            self.stop(StopReason::Finished);
            self.save_finished_run();
        }
    }

    fn save_finished_run(&mut self) {
        let Some(dir) = self.config.log_dir.clone() else {
            return;
        };
        match self.log.save(&dir) {
            Ok(path) => {
                self.last_log_file = Some(path.clone());
                self.bus.publish(EngineEvent::LogSaved { path });
            }
            Err(err) => error!("failed to save run log: {err:#}"),
        }
    }

    /// The phase-transition handler. A missing session means an external
    /// stop got there first; there is nothing to do then.
    fn enter(&mut self, phase: Phase) {
        if self.session.is_none() {
            return;
        }
        self.phase = phase;
        let target = self.target_label();
        let target_arg = target.clone().unwrap_or_else(|| "?".to_string());

        match phase {
            Phase::BlankScreen => {
                let mut wait_ms = self.config.blank_screen_ms.max(1);
                if let Some(session) = self.session.as_mut() {
                    if session.lead_in_pending {
                        session.lead_in_pending = false;
                        wait_ms += self.config.lead_in_ms;
                    }
                }
                self.timer_op = Some(TimerOp::Arm(Duration::from_millis(wait_ms)));

                self.log
                    .add(LogSource::Stimuli, LogAction::Target, vec![target_arg]);

                // With feedback disabled the hide is announced here instead
                // of waiting out a zero-length Info phase.
                if self.config.info_ms == 0 && self.config.blank_screen_ms > 0 {
                    self.bus.publish(EngineEvent::StimuliHidden {
                        target: target.clone(),
                        feedback: None,
                    });
                }
                let trial = self.trial_index().unwrap_or(0);
                self.bus.publish(EngineEvent::NextTrial { trial, target });
            }
            Phase::Stimuli => {
                self.bus.publish(EngineEvent::StimuliShown {
                    target: target.clone(),
                });
                self.log
                    .add(LogSource::Stimuli, LogAction::Displayed, vec![target_arg]);

                match self.config.trial_duration {
                    TrialDurationType::Timed => {
                        self.timer_op = Some(TimerOp::Arm(Duration::from_millis(
                            self.config.stimulus_ms.max(1),
                        )));
                    }
                    // Infinite trials wait for the response release.
                    TrialDurationType::Infinite => {
                        self.timer_op = Some(TimerOp::Cancel);
                    }
                }
            }
            Phase::Info => {
                self.timer_op = Some(TimerOp::Arm(Duration::from_millis(
                    self.config.info_ms.max(1),
                )));

                let correct = self.current_target().is_some_and(|s| s.is_activated());
                self.log.add(LogSource::Stimuli, LogAction::Hidden, vec![]);
                self.log.add(
                    LogSource::Experiment,
                    LogAction::Result,
                    vec![if correct { "success" } else { "failure" }.to_string()],
                );
                self.bus.publish(EngineEvent::Result {
                    target: target.clone(),
                    correct,
                });
                if self.config.info_ms > 0 {
                    self.bus.publish(EngineEvent::StimuliHidden {
                        target,
                        feedback: Some(correct),
                    });
                }
            }
            Phase::Inactive => {}
        }
    }
}
