use super::{evaluate, ProfileEnumerator};
use crate::models::{ActionProfile, Allocation, Instance};
use tracing::debug;

/// Outcome of one exhaustive search.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Highest score observed (0.0 if nothing scored above it)
    pub best_score: f64,
    /// Every allocation scoring `best_score`, in enumeration order
    pub allocations: Vec<Allocation>,
    /// Number of profiles the enumerator produced
    pub profiles_evaluated: u64,
}

/// Running maximum and the allocations achieving it.
///
/// The best score starts at 0.0, so zero-valued profiles are collected
/// until something strictly better shows up.
#[derive(Debug)]
pub struct OptimumTracker<'a> {
    instance: &'a Instance,
    best_score: f64,
    allocations: Vec<Allocation>,
    evaluated: u64,
}

impl<'a> OptimumTracker<'a> {
    pub fn new(instance: &'a Instance) -> Self {
        Self {
            instance,
            best_score: 0.0,
            allocations: Vec::new(),
            evaluated: 0,
        }
    }

    /// Score one profile and update the optimal set.
    pub fn observe(&mut self, profile: &ActionProfile) -> f64 {
        let score = evaluate(self.instance, profile);
        self.evaluated += 1;
        if score > self.best_score {
            self.best_score = score;
            self.allocations.clear();
        }
        if score >= self.best_score {
            self.allocations.push(self.instance.allocation(profile));
        }
        score
    }

    pub fn best_score(&self) -> f64 {
        self.best_score
    }

    pub fn finish(self) -> Solution {
        Solution {
            best_score: self.best_score,
            allocations: self.allocations,
            profiles_evaluated: self.evaluated,
        }
    }

    /// Drive a fresh enumerator to exhaustion.
    pub fn run(mut self) -> Solution {
        for profile in ProfileEnumerator::new(self.instance) {
            self.observe(&profile);
        }
        let solution = self.finish();
        debug!(
            profiles = solution.profiles_evaluated,
            best_score = solution.best_score,
            optimal = solution.allocations.len(),
            "Search complete"
        );
        solution
    }
}

/// Find every welfare-maximizing allocation of `instance`.
pub fn solve(instance: &Instance) -> Solution {
    OptimumTracker::new(instance).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Resource;
    use std::collections::HashSet;

    fn resources(values: &[f64]) -> Vec<Resource> {
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| Resource {
                id: format!("R{i}"),
                value,
            })
            .collect()
    }

    fn ids(allocation: &[&str]) -> Allocation {
        allocation
            .iter()
            .map(|s| if s.is_empty() { None } else { Some(s.to_string()) })
            .collect()
    }

    #[test]
    fn test_matches_brute_force_on_full_action_sets() {
        let game = Instance::new(
            vec!["A".into(), "B".into()],
            resources(&[3.0, 5.0]),
            &[
                ("A".into(), vec!["R0".into(), "R1".into()]),
                ("B".into(), vec!["R0".into(), "R1".into()]),
            ],
        )
        .unwrap();

        let mut expected = HashSet::new();
        let mut best = 0.0;
        for a in ["R0", "R1"] {
            for b in ["R0", "R1"] {
                let mut chosen = HashSet::new();
                chosen.insert(a);
                chosen.insert(b);
                let score: f64 = chosen.iter().map(|r| if *r == "R0" { 3.0 } else { 5.0 }).sum();
                if score > best {
                    best = score;
                    expected.clear();
                }
                if score >= best {
                    expected.insert(ids(&[a, b]));
                }
            }
        }

        let solution = solve(&game);
        assert_eq!(solution.best_score, 8.0);
        assert_eq!(solution.profiles_evaluated, 4);
        assert_eq!(
            solution.allocations.into_iter().collect::<HashSet<_>>(),
            expected
        );
    }

    #[test]
    fn test_ties_kept_in_enumeration_order() {
        let game = Instance::new(
            vec!["A".into(), "B".into()],
            resources(&[3.0, 5.0]),
            &[
                ("A".into(), vec!["R0".into(), "R1".into()]),
                ("B".into(), vec!["R0".into(), "R1".into()]),
            ],
        )
        .unwrap();
        let solution = solve(&game);
        assert_eq!(
            solution.allocations,
            vec![ids(&["R1", "R0"]), ids(&["R0", "R1"])]
        );
    }

    #[test]
    fn test_single_profile_with_distinct_resources() {
        let game = Instance::new(
            vec!["A".into(), "B".into()],
            resources(&[1.0, 1.0]),
            &[("A".into(), vec!["R0".into()]), ("B".into(), vec!["R1".into()])],
        )
        .unwrap();
        let solution = solve(&game);
        assert_eq!(solution.best_score, 2.0);
        assert_eq!(solution.allocations, vec![ids(&["R0", "R1"])]);
    }

    #[test]
    fn test_empty_action_set_agent_is_null_everywhere() {
        let game = Instance::new(
            vec!["A".into(), "B".into(), "C".into()],
            resources(&[1.0, 4.0, 2.0]),
            &[
                ("A".into(), vec!["R0".into(), "R2".into()]),
                ("B".into(), vec![]),
                ("C".into(), vec!["R1".into(), "R2".into()]),
            ],
        )
        .unwrap();
        let solution = solve(&game);
        assert_eq!(solution.profiles_evaluated, 4);
        assert_eq!(solution.best_score, 6.0);
        assert_eq!(solution.allocations, vec![ids(&["R2", "", "R1"])]);
        assert!(solution.allocations.iter().all(|a| a[1].is_none()));
    }

    #[test]
    fn test_all_zero_values_collect_every_profile() {
        let game = Instance::new(
            vec!["A".into(), "B".into()],
            resources(&[0.0, 0.0, 0.0]),
            &[
                ("A".into(), vec!["R0".into(), "R1".into(), "R2".into()]),
                ("B".into(), vec!["R1".into(), "R2".into()]),
            ],
        )
        .unwrap();
        let solution = solve(&game);
        assert_eq!(solution.best_score, 0.0);
        assert_eq!(solution.allocations.len(), 6);
        assert_eq!(solution.allocations[0], ids(&["R0", "R1"]));
    }

    #[test]
    fn test_all_empty_action_sets() {
        let game = Instance::new(
            vec!["A".into(), "B".into()],
            resources(&[1.0]),
            &[("A".into(), vec![]), ("B".into(), vec![])],
        )
        .unwrap();
        let solution = solve(&game);
        assert_eq!(solution.profiles_evaluated, 1);
        assert_eq!(solution.allocations, vec![vec![None, None]]);
    }

    #[test]
    fn test_strictly_better_score_clears_earlier_ties() {
        let game = Instance::new(
            vec!["A".into()],
            resources(&[0.0, 0.0, 1.0]),
            &[("A".into(), vec!["R0".into(), "R1".into(), "R2".into()])],
        )
        .unwrap();
        let mut tracker = OptimumTracker::new(&game);
        for profile in ProfileEnumerator::new(&game) {
            tracker.observe(&profile);
        }
        assert_eq!(tracker.best_score(), 1.0);
        assert_eq!(tracker.finish().allocations, vec![ids(&["R2"])]);
    }
}
