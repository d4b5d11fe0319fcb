//! Epsilon-greedy action selection over a swappable base policy.
//!
//! Exploration is both a probabilistic choice and the fallback for policy
//! gaps: when no base policy is installed, or the installed one is
//! undefined for the current state, the action is drawn uniformly from
//! the legal set regardless of epsilon.
//!
//! Randomness comes from a seeded ChaCha8 stream, so identical seeds
//! produce identical action sequences.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use tether_core::{ActionId, ConfigError, Policy, StateId};

/// Why an action was drawn at random.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExploreReason {
    /// The uniform draw fell below epsilon.
    Epsilon,
    /// No base policy is installed.
    NoBasePolicy,
    /// The base policy has no action for this state.
    Undefined,
}

/// How the most recent action was selected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Choice {
    /// The base policy's action was used.
    Exploit,
    /// A uniformly random legal action was used.
    Explore(ExploreReason),
}

/// Chooses actions by mixing a deterministic base policy with uniform
/// random exploration.
///
/// The base policy is an immutable snapshot held as `Arc<dyn Policy>`;
/// [`set_base_policy`](Self::set_base_policy) replaces it wholesale.
pub struct ExplorationPolicy {
    base: Option<Arc<dyn Policy>>,
    actions: Vec<ActionId>,
    epsilon: f64,
    rng: ChaCha8Rng,
    last_choice: Option<Choice>,
}

impl ExplorationPolicy {
    /// Create a policy over the legal `actions` with exploration rate
    /// `epsilon`, seeding the RNG from `seed`. No base policy is set, so
    /// every choice explores until one is installed.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NoActions`] if `actions` is empty,
    /// [`ConfigError::DuplicateAction`] if an action repeats, and
    /// [`ConfigError::EpsilonOutOfRange`] if `epsilon` is not in `[0, 1]`.
    pub fn new(actions: Vec<ActionId>, epsilon: f64, seed: u64) -> Result<Self, ConfigError> {
        if actions.is_empty() {
            return Err(ConfigError::NoActions);
        }
        let mut seen = HashSet::with_capacity(actions.len());
        for &action in &actions {
            if !seen.insert(action) {
                return Err(ConfigError::DuplicateAction { action });
            }
        }
        check_epsilon(epsilon)?;
        Ok(Self {
            base: None,
            actions,
            epsilon,
            rng: ChaCha8Rng::seed_from_u64(seed),
            last_choice: None,
        })
    }

    /// Builder-style variant of [`set_base_policy`](Self::set_base_policy).
    pub fn with_base_policy(mut self, policy: Arc<dyn Policy>) -> Self {
        self.base = Some(policy);
        self
    }

    /// Choose an action for `state`.
    pub fn choose_action(&mut self, state: StateId) -> ActionId {
        let draw: f64 = self.rng.random();
        let choice = if draw < self.epsilon {
            Err(ExploreReason::Epsilon)
        } else {
            match &self.base {
                None => Err(ExploreReason::NoBasePolicy),
                Some(policy) => policy.action_for(state).ok_or(ExploreReason::Undefined),
            }
        };
        match choice {
            Ok(action) => {
                self.last_choice = Some(Choice::Exploit);
                action
            }
            Err(reason) => {
                self.last_choice = Some(Choice::Explore(reason));
                self.random_action()
            }
        }
    }

    /// A legal action drawn uniformly at random.
    pub fn random_action(&mut self) -> ActionId {
        let idx = self.rng.random_range(0..self.actions.len());
        self.actions[idx]
    }

    /// Replace the base policy snapshot. `None` reverts to pure exploration.
    pub fn set_base_policy(&mut self, policy: Option<Arc<dyn Policy>>) {
        self.base = policy;
    }

    /// The currently installed base policy.
    pub fn base_policy(&self) -> Option<&Arc<dyn Policy>> {
        self.base.as_ref()
    }

    /// Update the exploration rate.
    ///
    /// # Errors
    ///
    /// [`ConfigError::EpsilonOutOfRange`] if `epsilon` is not in `[0, 1]`;
    /// the previous rate is kept.
    pub fn set_epsilon(&mut self, epsilon: f64) -> Result<(), ConfigError> {
        check_epsilon(epsilon)?;
        self.epsilon = epsilon;
        Ok(())
    }

    /// Current exploration rate.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// The legal action set, in construction order.
    pub fn actions(&self) -> &[ActionId] {
        &self.actions
    }

    /// How the most recent [`choose_action`](Self::choose_action) call
    /// decided, or `None` before the first call.
    pub fn last_choice(&self) -> Option<Choice> {
        self.last_choice
    }

    /// Restart the random stream from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }
}

impl fmt::Debug for ExplorationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExplorationPolicy")
            .field("has_base", &self.base.is_some())
            .field("actions", &self.actions)
            .field("epsilon", &self.epsilon)
            .field("last_choice", &self.last_choice)
            .finish()
    }
}

fn check_epsilon(epsilon: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&epsilon) {
        return Err(ConfigError::EpsilonOutOfRange { value: epsilon });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::TablePolicy;

    fn actions(n: u32) -> Vec<ActionId> {
        (0..n).map(ActionId).collect()
    }

    /// Policy defined on every state: action = state mod 4.
    fn modulo_policy() -> Arc<dyn Policy> {
        Arc::new(|s: StateId| Some(ActionId((s.0 % 4) as u32)))
    }

    #[test]
    fn rejects_empty_action_set() {
        assert_eq!(
            ExplorationPolicy::new(Vec::new(), 0.1, 0).unwrap_err(),
            ConfigError::NoActions
        );
    }

    #[test]
    fn rejects_duplicate_actions() {
        let err = ExplorationPolicy::new(vec![ActionId(1), ActionId(1)], 0.1, 0).unwrap_err();
        assert_eq!(err, ConfigError::DuplicateAction { action: ActionId(1) });
    }

    #[test]
    fn rejects_epsilon_outside_unit_interval() {
        for bad in [-0.1, 1.5, f64::NAN] {
            assert!(matches!(
                ExplorationPolicy::new(actions(2), bad, 0),
                Err(ConfigError::EpsilonOutOfRange { .. })
            ));
        }
        let mut p = ExplorationPolicy::new(actions(2), 0.3, 0).unwrap();
        assert!(p.set_epsilon(2.0).is_err());
        assert_eq!(p.epsilon(), 0.3);
        p.set_epsilon(1.0).unwrap();
        assert_eq!(p.epsilon(), 1.0);
    }

    #[test]
    fn zero_epsilon_always_exploits_defined_policy() {
        let mut p = ExplorationPolicy::new(actions(4), 0.0, 7)
            .unwrap()
            .with_base_policy(modulo_policy());
        for i in 0..10_000u64 {
            let state = StateId(i % 97);
            assert_eq!(p.choose_action(state), ActionId((state.0 % 4) as u32));
            assert_eq!(p.last_choice(), Some(Choice::Exploit));
        }
    }

    #[test]
    fn full_epsilon_is_uniform_over_actions() {
        let mut p = ExplorationPolicy::new(actions(4), 1.0, 11)
            .unwrap()
            .with_base_policy(Arc::new(|_s: StateId| Some(ActionId(0))));
        let trials = 40_000;
        let mut counts = [0usize; 4];
        for _ in 0..trials {
            counts[p.choose_action(StateId(0)).0 as usize] += 1;
        }
        let expected = trials as f64 / 4.0;
        for (action, &count) in counts.iter().enumerate() {
            let deviation = (count as f64 - expected).abs() / expected;
            assert!(
                deviation < 0.05,
                "action {action} drawn {count} times, expected ~{expected}"
            );
        }
        assert_eq!(p.last_choice(), Some(Choice::Explore(ExploreReason::Epsilon)));
    }

    #[test]
    fn missing_base_policy_always_explores() {
        let mut p = ExplorationPolicy::new(actions(3), 0.0, 3).unwrap();
        let mut seen = [false; 3];
        for _ in 0..1_000 {
            let a = p.choose_action(StateId(1));
            seen[a.0 as usize] = true;
            assert_eq!(
                p.last_choice(),
                Some(Choice::Explore(ExploreReason::NoBasePolicy))
            );
        }
        assert!(seen.iter().all(|&s| s), "all actions should appear");
    }

    #[test]
    fn undefined_state_falls_back_to_exploration() {
        let mut table = TablePolicy::new();
        table.insert(StateId(0), ActionId(2));
        let mut p = ExplorationPolicy::new(actions(3), 0.0, 5)
            .unwrap()
            .with_base_policy(Arc::new(table));

        assert_eq!(p.choose_action(StateId(0)), ActionId(2));
        assert_eq!(p.last_choice(), Some(Choice::Exploit));

        p.choose_action(StateId(1));
        assert_eq!(
            p.last_choice(),
            Some(Choice::Explore(ExploreReason::Undefined))
        );
    }

    #[test]
    fn replacing_base_policy_takes_effect_immediately() {
        let mut p = ExplorationPolicy::new(actions(4), 0.0, 1)
            .unwrap()
            .with_base_policy(Arc::new(|_s: StateId| Some(ActionId(1))));
        assert_eq!(p.choose_action(StateId(0)), ActionId(1));
        p.set_base_policy(Some(Arc::new(|_s: StateId| Some(ActionId(3)))));
        assert_eq!(p.choose_action(StateId(0)), ActionId(3));
        p.set_base_policy(None);
        assert!(p.base_policy().is_none());
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = ExplorationPolicy::new(actions(8), 0.5, 42).unwrap();
        let mut b = ExplorationPolicy::new(actions(8), 0.5, 42).unwrap();
        let sa: Vec<ActionId> = (0..200).map(|i| a.choose_action(StateId(i))).collect();
        let sb: Vec<ActionId> = (0..200).map(|i| b.choose_action(StateId(i))).collect();
        assert_eq!(sa, sb);

        a.reseed(42);
        let again: Vec<ActionId> = (0..200).map(|i| a.choose_action(StateId(i))).collect();
        assert_eq!(again, sa);
    }
}
