use serde::{Deserialize, Serialize};

use crate::stimulus::Stimulus;

/// Presentation order of the stimuli inside the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StimuliOrder {
    #[default]
    Ordered,
    Randomized,
}

/// Horizontal placement of the grid inside the window. Carried as data for
/// the display layer; the engine never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Alignment {
    Left,
    Center,
    Right,
    #[default]
    Stretch,
}

/// Per-stimulus override inside a [`SetupData`]. When absent, stimuli are
/// labeled `1..=rows*columns` and the audio cue equals the label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StimulusData {
    pub label: String,
    #[serde(default)]
    pub audio_cue: Option<String>,
}

/// Serde-facing description of one grid configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupData {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
    #[serde(default)]
    pub alignment: Alignment,
    #[serde(default)]
    pub order: StimuliOrder,
    #[serde(default)]
    pub stimuli: Vec<StimulusData>,
}

impl SetupData {
    /// The built-in configurations used when none are configured.
    pub fn defaults() -> Vec<SetupData> {
        let preset = |name: &str, rows, columns, order| SetupData {
            name: name.to_string(),
            rows,
            columns,
            alignment: Alignment::Stretch,
            order,
            stimuli: Vec::new(),
        };
        vec![
            preset("Very Easy", 1, 2, StimuliOrder::Ordered),
            preset("Easy", 2, 2, StimuliOrder::Ordered),
            preset("Moderate", 2, 5, StimuliOrder::Ordered),
            preset("Hard", 2, 2, StimuliOrder::Randomized),
            preset("Very Hard", 2, 5, StimuliOrder::Randomized),
        ]
    }
}

impl From<&Setup> for SetupData {
    fn from(setup: &Setup) -> Self {
        SetupData {
            name: setup.name.clone(),
            rows: setup.rows,
            columns: setup.columns,
            alignment: setup.alignment,
            order: setup.order,
            stimuli: setup
                .stimuli
                .iter()
                .map(|s| StimulusData {
                    label: s.label.clone(),
                    audio_cue: if s.audio_cue == s.label {
                        None
                    } else {
                        Some(s.audio_cue.clone())
                    },
                })
                .collect(),
        }
    }
}

/// An immutable grid of stimuli for one configuration.
///
/// Invariant: `rows * columns == stimuli.len()`. Only the per-stimulus
/// activation flags change after construction.
#[derive(Debug, Clone)]
pub struct Setup {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
    pub alignment: Alignment,
    pub order: StimuliOrder,
    stimuli: Vec<Stimulus>,
}

impl Setup {
    /// Builds a grid with numbered labels `1..=rows*columns`.
    pub fn new(
        name: impl Into<String>,
        rows: usize,
        columns: usize,
        alignment: Alignment,
        order: StimuliOrder,
    ) -> Self {
        let stimuli = (1..=rows * columns)
            .map(|i| Stimulus::new(i.to_string()))
            .collect();
        Self {
            name: name.into(),
            rows,
            columns,
            alignment,
            order,
            stimuli,
        }
    }

    pub fn from_data(data: &SetupData) -> Self {
        let mut setup = Self::new(
            data.name.clone(),
            data.rows,
            data.columns,
            data.alignment,
            data.order,
        );
        if !data.stimuli.is_empty() {
            setup.stimuli = data
                .stimuli
                .iter()
                .map(|s| match &s.audio_cue {
                    Some(cue) => Stimulus::with_audio_cue(&s.label, cue),
                    None => Stimulus::new(&s.label),
                })
                .collect();
        }
        setup
    }

    pub fn stimuli(&self) -> &[Stimulus] {
        &self.stimuli
    }

    pub fn stimulus(&self, index: usize) -> Option<&Stimulus> {
        self.stimuli.get(index)
    }

    pub fn len(&self) -> usize {
        self.stimuli.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stimuli.is_empty()
    }

    /// Row-major position of a stimulus index.
    pub fn stimulus_location(&self, index: usize) -> (usize, usize) {
        (index / self.columns, index % self.columns)
    }

    /// Clears the activation marks from all stimuli.
    pub fn reset_stimuli(&mut self) {
        for stimulus in &mut self.stimuli {
            stimulus.clear_activated();
        }
    }

    /// First stimulus in set order carrying the activation mark. Set order
    /// is the tie-break when more than one flag is set.
    pub fn active_stimulus(&self) -> Option<&Stimulus> {
        self.stimuli.iter().find(|s| s.is_activated())
    }

    pub fn mark_activated(&mut self, index: usize) -> Option<&Stimulus> {
        let stimulus = self.stimuli.get_mut(index)?;
        stimulus.mark_activated();
        Some(&self.stimuli[index])
    }

    /// Index of the first stimulus with the given label.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.stimuli.iter().position(|s| s.label == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_labels_fill_the_grid() {
        let setup = Setup::new("t", 2, 5, Alignment::Stretch, StimuliOrder::Ordered);
        assert_eq!(setup.len(), 10);
        assert_eq!(setup.stimuli()[0].label, "1");
        assert_eq!(setup.stimuli()[9].label, "10");
        assert_eq!(setup.stimuli()[3].audio_cue, "4");
    }

    #[test]
    fn location_is_row_major() {
        let setup = Setup::new("t", 2, 5, Alignment::Stretch, StimuliOrder::Ordered);
        assert_eq!(setup.stimulus_location(0), (0, 0));
        assert_eq!(setup.stimulus_location(4), (0, 4));
        assert_eq!(setup.stimulus_location(5), (1, 0));
        assert_eq!(setup.stimulus_location(9), (1, 4));
    }

    #[test]
    fn active_stimulus_prefers_set_order() {
        let mut setup = Setup::new("t", 2, 2, Alignment::Stretch, StimuliOrder::Ordered);
        setup.mark_activated(3);
        setup.mark_activated(1);
        assert_eq!(setup.active_stimulus().unwrap().label, "2");
        setup.reset_stimuli();
        assert!(setup.active_stimulus().is_none());
    }

    #[test]
    fn data_round_trip_keeps_overrides() {
        let data = SetupData {
            name: "custom".into(),
            rows: 1,
            columns: 2,
            alignment: Alignment::Center,
            order: StimuliOrder::Randomized,
            stimuli: vec![
                StimulusData {
                    label: "A".into(),
                    audio_cue: Some("alpha".into()),
                },
                StimulusData {
                    label: "B".into(),
                    audio_cue: None,
                },
            ],
        };
        let setup = Setup::from_data(&data);
        assert_eq!(setup.stimuli()[0].audio_cue, "alpha");
        assert_eq!(setup.stimuli()[1].audio_cue, "B");

        let back = SetupData::from(&setup);
        assert_eq!(back.stimuli[0].audio_cue.as_deref(), Some("alpha"));
        assert_eq!(back.stimuli[1].audio_cue, None);
    }

    #[test]
    fn defaults_match_the_builtin_presets() {
        let defaults = SetupData::defaults();
        assert_eq!(defaults.len(), 5);
        assert_eq!(defaults[0].name, "Very Easy");
        assert_eq!(defaults[4].columns, 5);
        assert_eq!(defaults[3].order, StimuliOrder::Randomized);
    }
}
