use crate::models::{ActionProfile, Instance};

/// Union value of a profile: each distinct chosen resource counts once.
///
/// Values are summed in resource order so equal coverages give bit-identical
/// scores.
pub fn evaluate(instance: &Instance, profile: &ActionProfile) -> f64 {
    let mut covered: Vec<usize> = profile
        .choices()
        .iter()
        .enumerate()
        .filter_map(|(agent, choice)| choice.map(|idx| instance.action_set(agent)[idx]))
        .collect();
    covered.sort_unstable();
    covered.dedup();

    let resources = instance.resources();
    covered.iter().map(|&pos| resources[pos].value).sum()
}
