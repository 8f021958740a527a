pub mod clock;
pub mod log;
pub mod outcome;
pub mod setup;
pub mod stimulus;

pub use clock::{Clock, ManualClock, SystemClock};
pub use log::{LogAction, LogRecord, LogSource};
pub use outcome::{classify, summarize, RunSummary, TrialOutcome, TrialResult};
pub use setup::{Alignment, Setup, SetupData, StimuliOrder, StimulusData};
pub use stimulus::Stimulus;
