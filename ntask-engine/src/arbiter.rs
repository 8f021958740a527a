use ntask_core::Setup;

use crate::config::{TaskConfig, TrialDurationType};

/// How concurrent activations inside one trial are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponsePolicy {
    /// First responder wins: an activation is accepted only while no
    /// stimulus carries the mark.
    Single,
    /// Latest responder wins: the marks are cleared before every activation,
    /// so each one is accepted and replaces the previous.
    Latest,
}

impl ResponsePolicy {
    pub fn from_config(config: &TaskConfig) -> Self {
        if config.allow_multiple_activations
            && config.trial_duration == TrialDurationType::Timed
        {
            ResponsePolicy::Latest
        } else {
            ResponsePolicy::Single
        }
    }
}

/// Applies the policy to an activation of `index`. Returns the accepted
/// stimulus label, or `None` when the activation does not count.
pub fn arbitrate(policy: ResponsePolicy, setup: &mut Setup, index: usize) -> Option<String> {
    let accepted = match policy {
        ResponsePolicy::Latest => {
            setup.reset_stimuli();
            true
        }
        ResponsePolicy::Single => setup.active_stimulus().is_none(),
    };

    if !accepted {
        return None;
    }
    setup.mark_activated(index).map(|s| s.label.clone())
}

/// Whether a response release should end the stimuli phase early.
pub fn release_ends_trial(config: &TaskConfig) -> bool {
    config.activation_interrupts_trial || config.trial_duration == TrialDurationType::Infinite
}
