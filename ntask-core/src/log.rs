use std::fmt;

/// Which part of the system produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    Experiment,
    Stimuli,
    Stimulus,
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogSource::Experiment => "Experiment",
            LogSource::Stimuli => "Stimuli",
            LogSource::Stimulus => "Stimulus",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogAction {
    Start,
    Stop,
    Target,
    Displayed,
    Activated,
    Hidden,
    Result,
    Ordered,
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogAction::Start => "Start",
            LogAction::Stop => "Stop",
            LogAction::Target => "Target",
            LogAction::Displayed => "Displayed",
            LogAction::Activated => "Activated",
            LogAction::Hidden => "Hidden",
            LogAction::Result => "Result",
            LogAction::Ordered => "Ordered",
        })
    }
}

/// One append-only record. The full sequence for a run is the ground truth
/// everything else (classification, remote notifications) derives from.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Milliseconds since the session started.
    pub timestamp_ms: u64,
    pub source: LogSource,
    pub action: LogAction,
    pub args: Vec<String>,
}

impl LogRecord {
    pub fn new(
        timestamp_ms: u64,
        source: LogSource,
        action: LogAction,
        args: Vec<String>,
    ) -> Self {
        Self {
            timestamp_ms,
            source,
            action,
            args,
        }
    }

    /// Tab-separated file representation.
    pub fn to_line(&self) -> String {
        let mut line = format!("{}\t{}\t{}", self.timestamp_ms, self.source, self.action);
        for arg in &self.args {
            line.push('\t');
            line.push_str(arg);
        }
        line
    }
}
