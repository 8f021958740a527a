use std::fmt;

use crate::log::{LogAction, LogRecord, LogSource};

/// Trial outcome class: correct response, wrong response, no response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialOutcome {
    Ok,
    Fail,
    Miss,
}

impl fmt::Display for TrialOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TrialOutcome::Ok => "OK",
            TrialOutcome::Fail => "FAIL",
            TrialOutcome::Miss => "MISS",
        })
    }
}

/// One classified trial, derived from the log. Never persisted on its own;
/// always reproducible from the record sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialResult {
    pub target: String,
    /// First accepted response label, empty when none was accepted.
    pub response: String,
    pub outcome: TrialOutcome,
    /// Display-to-response interval; absent for misses.
    pub latency_ms: Option<u64>,
    pub response_count: u32,
}

pub const SUMMARY_HEADER: &str = "Target\tResponse\tResult\tInterval\tCount";

impl TrialResult {
    /// Row of the tab-separated summary table.
    pub fn to_line(&self) -> String {
        let interval = self
            .latency_ms
            .map(|ms| ms.to_string())
            .unwrap_or_default();
        format!(
            "{}\t{}\t{}\t{}\t{}",
            self.target, self.response, self.outcome, interval, self.response_count
        )
    }
}

struct Accumulator {
    target: String,
    displayed_ms: Option<u64>,
    response: Option<(String, u64)>,
    count: u32,
}

/// Reduces an ordered record sequence to one [`TrialResult`] per trial.
///
/// Single left-to-right pass; relies on the engine emitting
/// Target → Displayed → Activated* → Hidden in that relative order within
/// each trial.
pub fn classify(records: &[LogRecord]) -> Vec<TrialResult> {
    let mut results = Vec::new();
    let mut acc: Option<Accumulator> = None;

    for record in records {
        match (record.source, record.action) {
            (LogSource::Stimuli, LogAction::Target) => {
                acc = Some(Accumulator {
                    target: record.args.first().cloned().unwrap_or_default(),
                    displayed_ms: None,
                    response: None,
                    count: 0,
                });
            }
            (LogSource::Stimuli, LogAction::Displayed) => {
                if let Some(acc) = acc.as_mut() {
                    acc.displayed_ms = Some(record.timestamp_ms);
                }
            }
            (LogSource::Stimulus, LogAction::Activated) => {
                if let Some(acc) = acc.as_mut() {
                    acc.count += 1;
                    if acc.response.is_none() {
                        let label = record.args.first().cloned().unwrap_or_default();
                        acc.response = Some((label, record.timestamp_ms));
                    }
                }
            }
            (LogSource::Stimuli, LogAction::Hidden) => {
                if let Some(acc) = acc.take() {
                    let (response, response_ms) = match acc.response {
                        Some((label, ms)) => (label, Some(ms)),
                        None => (String::new(), None),
                    };
                    let outcome = if response != acc.target && acc.count == 0 {
                        TrialOutcome::Miss
                    } else if response != acc.target {
                        TrialOutcome::Fail
                    } else {
                        TrialOutcome::Ok
                    };
                    let latency_ms = match outcome {
                        TrialOutcome::Miss => None,
                        _ => response_ms
                            .zip(acc.displayed_ms)
                            .map(|(r, d)| r.saturating_sub(d)),
                    };
                    results.push(TrialResult {
                        target: acc.target,
                        response,
                        outcome,
                        latency_ms,
                        response_count: acc.count,
                    });
                }
            }
            _ => {}
        }
    }

    results
}

/// Per-run aggregate of the classified trials.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub trials: usize,
    pub ok: usize,
    pub fail: usize,
    pub miss: usize,
    pub mean_latency_ms: Option<f64>,
}

pub fn summarize(results: &[TrialResult]) -> RunSummary {
    let mut summary = RunSummary {
        trials: results.len(),
        ok: 0,
        fail: 0,
        miss: 0,
        mean_latency_ms: None,
    };
    let mut latency_sum = 0u64;
    let mut latency_count = 0usize;
    for result in results {
        match result.outcome {
            TrialOutcome::Ok => summary.ok += 1,
            TrialOutcome::Fail => summary.fail += 1,
            TrialOutcome::Miss => summary.miss += 1,
        }
        if let Some(ms) = result.latency_ms {
            latency_sum += ms;
            latency_count += 1;
        }
    }
    if latency_count > 0 {
        summary.mean_latency_ms = Some(latency_sum as f64 / latency_count as f64);
    }
    summary
}
