//! Game documents and run statistics.
//!
//! K_i: A game document lists agents, resource values, action sets and the
//! optimal allocations. Map keys keep their insertion order on the wire.

use super::{AgentId, Instance, Resource, ResourceId, Result};
use crate::search::Solution;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;

/// String-keyed map that serializes in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(pub Vec<(String, V)>);

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &V)> {
        self.0.iter().map(|(k, v)| (k, v))
    }
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> FromIterator<(String, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct OrderedMapVisitor<V>(PhantomData<V>);

impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
    type Value = OrderedMap<V>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map with string keys")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((k, v)) = access.next_entry::<String, V>()? {
            entries.push((k, v));
        }
        Ok(OrderedMap(entries))
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

/// One game as written to the output.
///
/// Agents without a choice appear as `null` in each optimal allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Agent identifiers in enumeration order
    pub agents: Vec<AgentId>,

    /// Resource identifier → value
    pub resources: OrderedMap<f64>,

    /// Agent identifier → permitted resource identifiers (possibly trimmed)
    pub action_set: OrderedMap<Vec<ResourceId>>,

    /// Every allocation reaching the maximum score, in enumeration order
    #[serde(default)]
    pub optimal_allocations: Vec<OrderedMap<Option<ResourceId>>>,
}

impl GameRecord {
    /// Build a record for an instance without solving it.
    pub fn from_instance(instance: &Instance) -> Self {
        let resources = instance
            .resources()
            .iter()
            .map(|r| (r.id.clone(), r.value))
            .collect();
        let action_set = instance
            .agents()
            .iter()
            .enumerate()
            .map(|(i, agent)| (agent.clone(), instance.action_ids(i).cloned().collect()))
            .collect();

        Self {
            agents: instance.agents().to_vec(),
            resources,
            action_set,
            optimal_allocations: Vec::new(),
        }
    }

    /// Build a record for a solved instance.
    pub fn from_solved(instance: &Instance, solution: &Solution) -> Self {
        let mut record = Self::from_instance(instance);
        record.optimal_allocations = solution
            .allocations
            .iter()
            .map(|allocation| {
                instance
                    .agents()
                    .iter()
                    .cloned()
                    .zip(allocation.iter().cloned())
                    .collect()
            })
            .collect();
        record
    }

    /// Validate the document and convert it into a searchable instance.
    ///
    /// `optimal_allocations` is ignored.
    pub fn to_instance(&self) -> Result<Instance> {
        let resources = self
            .resources
            .iter()
            .map(|(id, &value)| Resource {
                id: id.clone(),
                value,
            })
            .collect();
        Instance::new(self.agents.clone(), resources, &self.action_set.0)
    }
}

/// Single-document batch format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameBatch {
    pub games: Vec<GameRecord>,
}

/// Statistics for a generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Games requested
    pub total_games: usize,

    /// Games solved and written
    pub total_solved: usize,

    /// Games skipped or failed
    pub total_failed: usize,

    /// Action profiles evaluated across all solved games
    pub profiles_evaluated: u64,

    /// Optimal allocations written across all solved games
    pub optimal_allocations: usize,

    /// Total runtime in seconds
    pub runtime_secs: f64,

    /// Games per hour throughput
    pub throughput_per_hour: f64,

    /// Mean optimal allocations per solved game
    pub mean_optimal: f64,
}

impl RunStats {
    /// Fold one solved game into the totals.
    pub fn record(&mut self, solution: &Solution) {
        self.total_solved += 1;
        self.profiles_evaluated += solution.profiles_evaluated;
        self.optimal_allocations += solution.allocations.len();
    }

    /// Calculate derived stats.
    pub fn finalize(&mut self) {
        if self.total_solved > 0 {
            self.mean_optimal = self.optimal_allocations as f64 / self.total_solved as f64;
        }
        if self.runtime_secs > 0.0 {
            self.throughput_per_hour = self.total_solved as f64 / self.runtime_secs * 3600.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::solve;

    fn sample_instance() -> Instance {
        Instance::new(
            vec!["P0".into(), "P1".into()],
            vec![
                Resource {
                    id: "R0".into(),
                    value: 0.5,
                },
                Resource {
                    id: "R1".into(),
                    value: 0.25,
                },
            ],
            &[
                ("P0".into(), vec!["R1".into(), "R0".into()]),
                ("P1".into(), vec![]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_record_layout_and_null_marker() {
        let instance = sample_instance();
        let record = GameRecord::from_solved(&instance, &solve(&instance));
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"agents":["P0","P1"],"resources":{"R0":0.5,"R1":0.25},"action_set":{"P0":["R1","R0"],"P1":[]},"optimal_allocations":[{"P0":"R0","P1":null}]}"#
        );
    }

    #[test]
    fn test_key_order_survives_parsing() {
        let json = r#"{"agents":["B","A"],"resources":{"Z":1.0,"A":2.0},"action_set":{"B":["Z"],"A":["A","Z"]}}"#;
        let record: GameRecord = serde_json::from_str(json).unwrap();
        assert_eq!(
            record.resources.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            ["Z", "A"]
        );
        assert!(record.optimal_allocations.is_empty());

        let instance = record.to_instance().unwrap();
        assert_eq!(instance.agents(), ["B", "A"]);
        assert_eq!(instance.action_set(1), &[1, 0]);
    }

    #[test]
    fn test_unknown_resource_in_document() {
        let json = r#"{"agents":["P0"],"resources":{"R0":1.0},"action_set":{"P0":["R3"]}}"#;
        let record: GameRecord = serde_json::from_str(json).unwrap();
        assert!(record.to_instance().is_err());
    }

    #[test]
    fn test_run_stats_finalize() {
        let instance = sample_instance();
        let solution = solve(&instance);
        let mut stats = RunStats {
            total_games: 2,
            runtime_secs: 3600.0,
            ..Default::default()
        };
        stats.record(&solution);
        stats.record(&solution);
        stats.finalize();

        assert_eq!(stats.total_solved, 2);
        assert_eq!(stats.profiles_evaluated, 4);
        assert_eq!(stats.optimal_allocations, 2);
        assert!((stats.mean_optimal - 1.0).abs() < f64::EPSILON);
        assert!((stats.throughput_per_hour - 2.0).abs() < f64::EPSILON);
    }
}
