use crate::models::{ActionProfile, Choice, Instance};

/// Odometer state over per-agent action indices.
///
/// The first agent is the least significant digit. Agents with an empty
/// action set hold `None` for the whole enumeration and are skipped when
/// carrying. The last agent is never reset: its overflow ends the sequence.
#[derive(Debug, Clone)]
pub(crate) struct ProfileEnumeratorState {
    radices: Vec<usize>,
    started: bool,
    exhausted: bool,
}

impl ProfileEnumeratorState {
    pub(crate) fn new(radices: Vec<usize>) -> Self {
        Self {
            radices,
            started: false,
            exhausted: false,
        }
    }

    pub(crate) fn initial_profile(&self) -> Vec<Choice> {
        self.radices
            .iter()
            .map(|&radix| if radix > 0 { Some(0) } else { None })
            .collect()
    }

    /// Move `profile` to the next profile in place. Returns `false` once the
    /// sequence is exhausted; `profile` is unspecified afterwards.
    pub(crate) fn next_profile(&mut self, profile: &mut [Choice]) -> bool {
        if self.exhausted {
            return false;
        }
        if !self.started {
            self.started = true;
            return true;
        }

        let last = profile.len().saturating_sub(1);
        for (agent, choice) in profile.iter_mut().enumerate() {
            let Some(idx) = choice.as_mut() else {
                continue;
            };
            *idx += 1;
            if *idx < self.radices[agent] {
                return true;
            }
            if agent != last {
                *idx = 0;
            }
        }

        self.exhausted = true;
        false
    }
}

/// Lazy iterator over every action profile of an instance.
///
/// Restart by constructing a new enumerator; two enumerators over the same
/// instance yield the same sequence.
#[derive(Debug, Clone)]
pub struct ProfileEnumerator {
    profile: Vec<Choice>,
    state: ProfileEnumeratorState,
}

impl ProfileEnumerator {
    pub fn new(instance: &Instance) -> Self {
        Self::from_radices(instance.action_sets().iter().map(Vec::len).collect())
    }

    /// Enumerate over bare action set sizes, one per agent.
    pub fn from_radices(radices: Vec<usize>) -> Self {
        let state = ProfileEnumeratorState::new(radices);
        let profile = state.initial_profile();
        Self { profile, state }
    }

    /// Count the profiles by walking them.
    #[cfg(test)]
    fn count_profiles(radices: Vec<usize>) -> u64 {
        let mut state = ProfileEnumeratorState::new(radices);
        let mut profile = state.initial_profile();
        let mut count = 0;
        while state.next_profile(&mut profile) {
            count += 1;
        }
        count
    }
}

impl Iterator for ProfileEnumerator {
    type Item = ActionProfile;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state.next_profile(&mut self.profile) {
            Some(ActionProfile(self.profile.clone()))
        } else {
            None
        }
    }
}
