pub mod arbiter;
pub mod config;
pub mod controller;
pub mod event;
pub mod log;
pub mod procedure;
pub mod sequence;

pub use config::{SessionType, TaskConfig, TaskType, TrialDurationType};
pub use controller::{Command, Controller, Status};
pub use event::{EngineEvent, EventBus, StopReason};
pub use log::EventLog;
pub use procedure::{Phase, Procedure, StartError};
