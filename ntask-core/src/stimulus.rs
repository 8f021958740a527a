/// One grid cell the participant can activate.
///
/// The `activated` flag is the only mutable piece: it marks the accepted
/// response for the running trial and is cleared by
/// [`Setup::reset_stimuli`](crate::setup::Setup::reset_stimuli) before the
/// next trial starts.
#[derive(Debug, Clone)]
pub struct Stimulus {
    pub label: String,
    /// Key of the audio cue announcing this stimulus; defaults to the label.
    pub audio_cue: String,
    activated: bool,
}

impl Stimulus {
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        let audio_cue = label.clone();
        Self {
            label,
            audio_cue,
            activated: false,
        }
    }

    pub fn with_audio_cue(label: impl Into<String>, audio_cue: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            audio_cue: audio_cue.into(),
            activated: false,
        }
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    pub fn mark_activated(&mut self) {
        self.activated = true;
    }

    pub fn clear_activated(&mut self) {
        self.activated = false;
    }
}
