//! Game instance model.
//!
//! K_i: An instance is immutable once handed to the search. Action sets are
//! stored as resource positions so evaluation never looks names up.

use super::{CoverGameError, Result};
use std::collections::{HashMap, HashSet};

/// Agent identifier.
pub type AgentId = String;

/// Resource identifier.
pub type ResourceId = String;

/// A valued item agents may claim.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub value: f64,
}

/// One agent's choice: an index into its action set, or `None` when the
/// action set is empty.
pub type Choice = Option<usize>;

/// One simultaneous choice for every agent, in declared agent order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionProfile(pub Vec<Choice>);

impl ActionProfile {
    pub fn choices(&self) -> &[Choice] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// An action profile resolved to resource identifiers, in agent order.
pub type Allocation = Vec<Option<ResourceId>>;

/// Agents, resources and per-agent action sets of one game.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    agents: Vec<AgentId>,
    resources: Vec<Resource>,
    /// action_sets[agent][choice] = resource position
    action_sets: Vec<Vec<usize>>,
}

impl Instance {
    /// Build an instance from identifiers.
    ///
    /// `action_sets` pairs each agent with the ordered resource ids it may
    /// pick; every agent must appear exactly once.
    pub fn new(
        agents: Vec<AgentId>,
        resources: Vec<Resource>,
        action_sets: &[(AgentId, Vec<ResourceId>)],
    ) -> Result<Self> {
        let mut resource_pos = HashMap::with_capacity(resources.len());
        for (pos, resource) in resources.iter().enumerate() {
            if !resource.value.is_finite() || resource.value < 0.0 {
                return Err(CoverGameError::InvalidInput(format!(
                    "resource '{}' has invalid value {}",
                    resource.id, resource.value
                )));
            }
            if resource_pos.insert(resource.id.as_str(), pos).is_some() {
                return Err(CoverGameError::InvalidInput(format!(
                    "duplicate resource '{}'",
                    resource.id
                )));
            }
        }

        let mut seen_agents = HashSet::with_capacity(agents.len());
        for agent in &agents {
            if !seen_agents.insert(agent.as_str()) {
                return Err(CoverGameError::InvalidInput(format!(
                    "duplicate agent '{agent}'"
                )));
            }
        }

        let mut by_agent: HashMap<&str, &[ResourceId]> = HashMap::with_capacity(action_sets.len());
        for (agent, actions) in action_sets {
            if by_agent.insert(agent.as_str(), actions.as_slice()).is_some() {
                return Err(CoverGameError::InvalidInput(format!(
                    "duplicate action set for agent '{agent}'"
                )));
            }
        }
        if by_agent.len() != agents.len() {
            return Err(CoverGameError::InvalidInput(format!(
                "{} agents but {} action sets",
                agents.len(),
                by_agent.len()
            )));
        }

        let mut resolved = Vec::with_capacity(agents.len());
        for agent in &agents {
            let actions = by_agent.get(agent.as_str()).ok_or_else(|| {
                CoverGameError::InvalidInput(format!("missing action set for agent '{agent}'"))
            })?;
            let positions = actions
                .iter()
                .map(|id| {
                    resource_pos
                        .get(id.as_str())
                        .copied()
                        .ok_or_else(|| CoverGameError::UnknownResource {
                            agent: agent.clone(),
                            resource: id.clone(),
                        })
                })
                .collect::<Result<Vec<_>>>()?;
            resolved.push(positions);
        }

        Ok(Self {
            agents,
            resources,
            action_sets: resolved,
        })
    }

    /// Build an instance directly from resource positions.
    ///
    /// Positions must be valid indices into `resources`.
    pub(crate) fn from_positions(
        agents: Vec<AgentId>,
        resources: Vec<Resource>,
        action_sets: Vec<Vec<usize>>,
    ) -> Self {
        debug_assert_eq!(agents.len(), action_sets.len());
        debug_assert!(action_sets
            .iter()
            .flatten()
            .all(|&pos| pos < resources.len()));
        Self {
            agents,
            resources,
            action_sets,
        }
    }

    pub fn agents(&self) -> &[AgentId] {
        &self.agents
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Action set of the agent at `agent`, as resource positions.
    pub fn action_set(&self, agent: usize) -> &[usize] {
        &self.action_sets[agent]
    }

    pub fn action_sets(&self) -> &[Vec<usize>] {
        &self.action_sets
    }

    /// Action set of the agent at `agent`, as resource identifiers.
    pub fn action_ids(&self, agent: usize) -> impl Iterator<Item = &ResourceId> {
        self.action_sets[agent]
            .iter()
            .map(move |&pos| &self.resources[pos].id)
    }

    /// Total number of action entries over all agents.
    pub fn action_count(&self) -> usize {
        self.action_sets.iter().map(Vec::len).sum()
    }

    /// Size of the profile space: product of non-empty action set sizes.
    ///
    /// Saturates at `u128::MAX`.
    pub fn profile_count(&self) -> u128 {
        self.action_sets
            .iter()
            .filter(|actions| !actions.is_empty())
            .fold(1u128, |acc, actions| acc.saturating_mul(actions.len() as u128))
    }

    /// Resolve a profile of choice indices to resource identifiers.
    pub fn allocation(&self, profile: &ActionProfile) -> Allocation {
        profile
            .choices()
            .iter()
            .enumerate()
            .map(|(agent, choice)| {
                choice.map(|idx| self.resources[self.action_sets[agent][idx]].id.clone())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_new_resolves_positions_in_agent_order() {
        let instance = Instance::new(
            vec!["P0".into(), "P1".into()],
            resources(&[1.0, 2.0, 3.0]),
            &[
                ("P1".into(), vec!["R2".into()]),
                ("P0".into(), vec!["R1".into(), "R0".into()]),
            ],
        )
        .unwrap();

        assert_eq!(instance.action_set(0), &[1, 0]);
        assert_eq!(instance.action_set(1), &[2]);
        assert_eq!(
            instance.action_ids(0).cloned().collect::<Vec<_>>(),
            ["R1", "R0"]
        );
        assert_eq!(instance.action_count(), 3);
    }

    #[test]
    fn test_unknown_resource_is_rejected() {
        let err = Instance::new(
            vec!["P0".into()],
            resources(&[1.0]),
            &[("P0".into(), vec!["R7".into()])],
        )
        .unwrap_err();
        assert!(matches!(err, CoverGameError::UnknownResource { .. }));
    }

    #[test]
    fn test_negative_value_is_rejected() {
        let err = Instance::new(
            vec!["P0".into()],
            resources(&[-1.0]),
            &[("P0".into(), vec![])],
        )
        .unwrap_err();
        assert!(matches!(err, CoverGameError::InvalidInput(_)));
    }

    #[test]
    fn test_missing_action_set_is_rejected() {
        let err = Instance::new(
            vec!["P0".into(), "P1".into()],
            resources(&[1.0]),
            &[("P0".into(), vec![])],
        )
        .unwrap_err();
        assert!(matches!(err, CoverGameError::InvalidInput(_)));
    }

    #[test]
    fn test_duplicate_agent_is_rejected() {
        // Same count of agents and action sets, but "B" would be dropped.
        let err = Instance::new(
            vec!["A".into(), "A".into()],
            resources(&[1.0, 5.0]),
            &[("A".into(), vec!["R0".into()]), ("B".into(), vec!["R1".into()])],
        )
        .unwrap_err();
        assert!(matches!(err, CoverGameError::InvalidInput(msg) if msg.contains("duplicate agent")));
    }

    #[test]
    fn test_profile_count_skips_empty_sets() {
        let instance = Instance::from_positions(
            vec!["P0".into(), "P1".into(), "P2".into()],
            resources(&[1.0, 1.0, 1.0]),
            vec![vec![0, 1, 2], vec![], vec![0, 2]],
        );
        assert_eq!(instance.profile_count(), 6);
    }

    #[test]
    fn test_allocation_keeps_no_choice() {
        let instance = Instance::from_positions(
            vec!["P0".into(), "P1".into()],
            resources(&[1.0, 2.0]),
            vec![vec![1, 0], vec![]],
        );
        let allocation = instance.allocation(&ActionProfile(vec![Some(1), None]));
        assert_eq!(allocation, vec![Some("R0".to_string()), None]);
    }
}
