//! Random game construction.
//!
//! Epistemic foundation:
//! - K_i: Games start with every agent allowed every resource
//! - B_i: Trimming is random but never removes more entries than exist
//! - I^R: Counts and seed come from config

use crate::models::{GameConfig, Instance, Resource};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Game under construction, built top-down: resources → agents → action sets.
#[derive(Debug, Clone, Default)]
pub struct GameBuilder {
    resources: Vec<Resource>,
    agents: Vec<String>,
    action_sets: Vec<Vec<usize>>,
}

impl GameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one resource `R{i}` per value.
    pub fn create_resources(&mut self, values: &[f64]) -> &mut Self {
        let offset = self.resources.len();
        self.resources
            .extend(values.iter().enumerate().map(|(i, &value)| Resource {
                id: format!("R{}", offset + i),
                value,
            }));
        self
    }

    /// Add agents `P0..P{n-1}` with empty action sets.
    pub fn create_agents(&mut self, num_agents: usize) -> &mut Self {
        let offset = self.agents.len();
        for i in 0..num_agents {
            self.agents.push(format!("P{}", offset + i));
            self.action_sets.push(Vec::new());
        }
        self
    }

    /// Let every agent pick every resource, in resource order.
    pub fn create_action_sets(&mut self) -> &mut Self {
        let all: Vec<usize> = (0..self.resources.len()).collect();
        for actions in &mut self.action_sets {
            actions.clone_from(&all);
        }
        self
    }

    /// Remove `num_actions` random entries (capped at the total).
    ///
    /// Each step picks a random agent that still has actions, then a random
    /// action of that agent. Returns the number of entries removed.
    pub fn remove_actions<R: Rng + ?Sized>(&mut self, num_actions: usize, rng: &mut R) -> usize {
        let total: usize = self.action_sets.iter().map(Vec::len).sum();
        let to_remove = num_actions.min(total);

        let mut candidates: Vec<usize> = (0..self.action_sets.len())
            .filter(|&agent| !self.action_sets[agent].is_empty())
            .collect();

        for _ in 0..to_remove {
            let Some(&agent) = candidates.choose(rng) else {
                break;
            };
            let actions = &mut self.action_sets[agent];
            let victim = rng.gen_range(0..actions.len());
            actions.remove(victim);
            if actions.is_empty() {
                candidates.retain(|&a| a != agent);
            }
        }
        to_remove
    }

    pub fn build(self) -> Instance {
        Instance::from_positions(self.agents, self.resources, self.action_sets)
    }
}

/// Produces random games of a fixed shape.
#[derive(Debug, Clone)]
pub struct GameGenerator {
    config: GameConfig,
}

impl GameGenerator {
    pub fn new(config: GameConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Generate one game with values drawn uniformly from `[0, 1)`.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Instance {
        let values: Vec<f64> = (0..self.config.num_resources)
            .map(|_| rng.gen::<f64>())
            .collect();

        let mut builder = GameBuilder::new();
        builder
            .create_resources(&values)
            .create_agents(self.config.num_agents)
            .create_action_sets();
        let removed = builder.remove_actions(self.config.removal_count(), rng);

        let instance = builder.build();
        debug!(
            agents = instance.agent_count(),
            resources = instance.resource_count(),
            removed,
            remaining = instance.action_count(),
            "Generated game"
        );
        instance
    }

    /// Generate game `index` of a run seeded with `seed`.
    ///
    /// Each game has its own RNG stream so any game can be regenerated alone.
    pub fn generate_seeded(&self, seed: u64, index: usize) -> Instance {
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(index as u64));
        self.generate(&mut rng)
    }
}

/// Draw a fresh base seed from OS entropy.
pub fn entropy_seed() -> u64 {
    rand::thread_rng().gen()
}
