use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;

use ntask_core::outcome::{classify, SUMMARY_HEADER};
use ntask_core::{Clock, LogAction, LogRecord, LogSource};

struct Inner {
    records: Vec<LogRecord>,
    start_ms: u64,
}

/// Append-only record store shared between the controller (writer) and
/// save/classification (readers). Readers always work on a snapshot taken
/// under the lock, never on the live list.
#[derive(Clone)]
pub struct EventLog {
    inner: Arc<Mutex<Inner>>,
    clock: Arc<dyn Clock>,
}

impl EventLog {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let start_ms = clock.now_ms();
        Self {
            inner: Arc::new(Mutex::new(Inner {
                records: Vec::new(),
                start_ms,
            })),
            clock,
        }
    }

    /// Drops previous records and restarts the timestamp origin.
    pub fn reset(&self) {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock().unwrap();
        inner.records.clear();
        inner.start_ms = now;
    }

    pub fn add(&self, source: LogSource, action: LogAction, args: Vec<String>) {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock().unwrap();
        let timestamp_ms = now.saturating_sub(inner.start_ms);
        inner
            .records
            .push(LogRecord::new(timestamp_ms, source, action, args));
    }

    pub fn snapshot(&self) -> Vec<LogRecord> {
        self.inner.lock().unwrap().records.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes one run to a new file in `dir`: the raw records, a `#` marker,
    /// then the per-trial summary table. The in-memory records stay intact,
    /// so a failed save loses nothing.
    pub fn save(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        let records = self.snapshot();

        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let filename = dir.join(format!("ntask-{stamp}.txt"));

        let file = File::create(&filename)
            .with_context(|| format!("creating log file '{}'", filename.display()))?;
        let mut writer = BufWriter::new(file);

        for record in &records {
            writeln!(writer, "{}", record.to_line())?;
        }
        writeln!(writer, "#")?;
        writeln!(writer, "{SUMMARY_HEADER}")?;
        for result in classify(&records) {
            writeln!(writer, "{}", result.to_line())?;
        }
        writer.flush()?;

        Ok(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntask_core::ManualClock;

    #[test]
    fn timestamps_are_relative_to_the_last_reset() {
        let clock = ManualClock::new();
        let log = EventLog::new(Arc::new(clock.clone()));

        clock.advance(250);
        log.reset();
        clock.advance(40);
        log.add(LogSource::Experiment, LogAction::Start, vec!["Easy".into()]);

        let records = log.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].timestamp_ms, 40);
    }

    #[test]
    fn save_writes_records_marker_and_summary() {
        let clock = ManualClock::new();
        let log = EventLog::new(Arc::new(clock.clone()));
        log.add(LogSource::Stimuli, LogAction::Target, vec!["3".into()]);
        clock.advance(100);
        log.add(LogSource::Stimuli, LogAction::Displayed, vec!["3".into()]);
        clock.advance(200);
        log.add(LogSource::Stimulus, LogAction::Activated, vec!["3".into()]);
        clock.advance(50);
        log.add(LogSource::Stimuli, LogAction::Hidden, vec![]);

        let dir = std::env::temp_dir().join(format!("ntask-log-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = log.save(&dir).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "0\tStimuli\tTarget\t3");
        assert_eq!(lines[4], "#");
        assert_eq!(lines[5], SUMMARY_HEADER);
        assert_eq!(lines[6], "3\t3\tOK\t200\t1");

        // Saving never drains the in-memory records.
        assert_eq!(log.len(), 4);

        std::fs::remove_dir_all(&dir).ok();
    }
}
