use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use ntask_core::SetupData;

/// How a session decides it is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SessionType {
    /// Run a fixed number of trials.
    #[default]
    Count,
    /// Run until the configured wall-clock duration elapses, regenerating
    /// the target sequence lap by lap.
    Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    /// Targets are drawn from the shuffled sequence.
    #[default]
    NBack,
    /// Every trial targets the one pre-configured stimulus.
    ZeroBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TrialDurationType {
    /// The stimuli phase ends on its own timer.
    #[default]
    Timed,
    /// The stimuli phase lasts until a response release ends it.
    Infinite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub session_type: SessionType,
    #[serde(default = "TaskConfig::default_trial_count")]
    pub trial_count: usize,
    /// Session length in seconds, duration-terminated sessions only.
    #[serde(default = "TaskConfig::default_session_duration_s")]
    pub session_duration_s: u64,
    #[serde(default)]
    pub task_type: TaskType,
    #[serde(default = "TaskConfig::default_zero_back_stimulus")]
    pub zero_back_stimulus: String,
    #[serde(default)]
    pub trial_duration: TrialDurationType,
    #[serde(default = "TaskConfig::default_blank_screen_ms")]
    pub blank_screen_ms: u64,
    #[serde(default = "TaskConfig::default_stimulus_ms")]
    pub stimulus_ms: u64,
    #[serde(default = "TaskConfig::default_info_ms")]
    pub info_ms: u64,
    /// Pause between run start and the first trial.
    #[serde(default = "TaskConfig::default_lead_in_ms")]
    pub lead_in_ms: u64,
    #[serde(default)]
    pub allow_multiple_activations: bool,
    #[serde(default)]
    pub activation_interrupts_trial: bool,
    #[serde(default)]
    pub setup_index: usize,
    #[serde(default = "SetupData::defaults")]
    pub setups: Vec<SetupData>,
    /// Where finished runs are written; `None` skips saving.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default = "TaskConfig::default_port")]
    pub port: u16,
}

impl TaskConfig {
    fn default_trial_count() -> usize {
        10
    }
    fn default_session_duration_s() -> u64 {
        60
    }
    fn default_zero_back_stimulus() -> String {
        "1".to_string()
    }
    fn default_blank_screen_ms() -> u64 {
        1000
    }
    fn default_stimulus_ms() -> u64 {
        2000
    }
    fn default_info_ms() -> u64 {
        500
    }
    fn default_lead_in_ms() -> u64 {
        500
    }
    fn default_port() -> u16 {
        8963
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config '{}'", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing config '{}'", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).with_context(|| format!("writing config '{}'", path.display()))
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            session_type: SessionType::default(),
            trial_count: Self::default_trial_count(),
            session_duration_s: Self::default_session_duration_s(),
            task_type: TaskType::default(),
            zero_back_stimulus: Self::default_zero_back_stimulus(),
            trial_duration: TrialDurationType::default(),
            blank_screen_ms: Self::default_blank_screen_ms(),
            stimulus_ms: Self::default_stimulus_ms(),
            info_ms: Self::default_info_ms(),
            lead_in_ms: Self::default_lead_in_ms(),
            allow_multiple_activations: false,
            activation_interrupts_trial: false,
            setup_index: 0,
            setups: SetupData::defaults(),
            log_dir: None,
            port: Self::default_port(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: TaskConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.session_type, SessionType::Count);
        assert_eq!(config.trial_count, 10);
        assert_eq!(config.port, 8963);
        assert_eq!(config.setups.len(), 5);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn enums_use_kebab_case() {
        let config: TaskConfig = serde_json::from_str(
            r#"{
                "session_type": "duration",
                "task_type": "zero-back",
                "trial_duration": "infinite",
                "trial_count": 5
            }"#,
        )
        .unwrap();
        assert_eq!(config.session_type, SessionType::Duration);
        assert_eq!(config.task_type, TaskType::ZeroBack);
        assert_eq!(config.trial_duration, TrialDurationType::Infinite);
        assert_eq!(config.trial_count, 5);
    }
}
