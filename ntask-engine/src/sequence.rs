use rand::seq::SliceRandom;
use rand::Rng;

/// Builds the target index sequence for a run: whole passes over
/// `0..stimulus_count` concatenated until `trial_count` is reached, truncated
/// to exactly that count, then shuffled. Any prefix whose length is a
/// multiple of the stimulus count holds every index equally often.
pub fn prepare_targets(
    stimulus_count: usize,
    trial_count: usize,
    rng: &mut impl Rng,
) -> Vec<usize> {
    if stimulus_count == 0 || trial_count == 0 {
        return Vec::new();
    }

    let mut indexes = Vec::with_capacity(trial_count + stimulus_count);
    while indexes.len() < trial_count {
        indexes.extend(0..stimulus_count);
    }
    indexes.truncate(trial_count);
    indexes.shuffle(rng);
    indexes
}
