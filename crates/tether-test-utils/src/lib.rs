//! Test utilities and mock types for Tether development.
//!
//! Provides a scripted [`Environment`] implementation, a trivial
//! [`Learner`], and encoder/policy fixtures shared by the engine and link
//! integration suites.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::collections::HashMap;
use std::sync::Arc;

use tether_core::{ActionId, Experience, Observation, Policy, StateId, TablePolicy};
use tether_encode::StateIdEncoder;
use tether_engine::{Environment, Learner};

pub use fixtures::{fixed_policy, grid_encoder, unit_encoder};

/// Environment that replays a fixed list of observations in a loop and
/// records every action it is asked to perform.
///
/// Actions can be made to take `polls_per_action` calls to
/// `is_completed()` before they report done.
pub struct ScriptedEnvironment {
    script: Vec<Observation>,
    cursor: usize,
    performed: Vec<ActionId>,
    polls_per_action: u32,
    pending_polls: u32,
    observations_served: u64,
}

impl ScriptedEnvironment {
    /// Replay `script` forever. An empty script serves empty observations.
    pub fn new(script: Vec<Vec<f64>>) -> Self {
        Self {
            script: script.into_iter().map(Observation::new).collect(),
            cursor: 0,
            performed: Vec::new(),
            polls_per_action: 0,
            pending_polls: 0,
            observations_served: 0,
        }
    }

    /// Make each action report incomplete for `polls` polls.
    pub fn with_action_delay(mut self, polls: u32) -> Self {
        self.polls_per_action = polls;
        self
    }

    /// Actions performed so far, in order.
    pub fn performed(&self) -> &[ActionId] {
        &self.performed
    }

    /// Number of `observe()` calls.
    pub fn observations_served(&self) -> u64 {
        self.observations_served
    }
}

impl Environment for ScriptedEnvironment {
    fn observe(&mut self) -> Observation {
        self.observations_served += 1;
        if self.script.is_empty() {
            return Observation::new(Vec::new());
        }
        let obs = self.script[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.script.len();
        obs
    }

    fn perform(&mut self, action: ActionId) {
        self.performed.push(action);
        self.pending_polls = self.polls_per_action;
    }

    fn is_completed(&mut self) -> bool {
        if self.pending_polls == 0 {
            return true;
        }
        self.pending_polls -= 1;
        false
    }
}

/// Learner that tallies actions per encoded state and publishes the
/// majority action table every `publish_every` experiences.
///
/// Not a real RL algorithm; it exists so tests can observe a learned
/// policy flowing back into the control loop.
pub struct MajorityLearner {
    encoder: StateIdEncoder,
    counts: HashMap<StateId, HashMap<ActionId, u64>>,
    publish_every: u64,
    seen: u64,
    history: Vec<Experience>,
}

impl MajorityLearner {
    pub fn new(encoder: StateIdEncoder, publish_every: u64) -> Self {
        Self {
            encoder,
            counts: HashMap::new(),
            publish_every: publish_every.max(1),
            seen: 0,
            history: Vec::new(),
        }
    }

    /// Every experience learned from, in arrival order.
    pub fn history(&self) -> &[Experience] {
        &self.history
    }

    /// The current majority table. Ties go to the lower action id.
    pub fn table(&self) -> TablePolicy {
        let mut states: Vec<_> = self.counts.keys().copied().collect();
        states.sort_unstable();
        states
            .into_iter()
            .filter_map(|state| {
                let tally = &self.counts[&state];
                tally
                    .iter()
                    .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
                    .map(|(action, _)| (state, *action))
            })
            .collect()
    }
}

impl Learner for MajorityLearner {
    fn learn(&mut self, batch: &[Experience]) -> Option<Arc<dyn Policy>> {
        let before = self.seen;
        for exp in batch {
            if let Ok(state) = self.encoder.encode(exp.observation()) {
                *self
                    .counts
                    .entry(state)
                    .or_default()
                    .entry(exp.action())
                    .or_default() += 1;
            }
            self.history.push(exp.clone());
            self.seen += 1;
        }
        if self.seen / self.publish_every > before / self.publish_every {
            Some(Arc::new(self.table()))
        } else {
            None
        }
    }
}
