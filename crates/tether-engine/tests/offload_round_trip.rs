//! Integration test: control loop and learner loop joined by the shared
//! primitives.
//!
//! Covers the end-to-end flow (observe, choose, perform, record, learn,
//! publish, swap) and checks that a stalled learner never stalls the
//! control loop.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use tether_core::{ActionId, Experience, Policy, StateId};
use tether_engine::{
    ControlConfig, ControlLoop, ExperienceChannel, Learner, LearnerConfig, LearnerLoop,
    LocalActionSource, PolicyMailbox, Termination,
};
use tether_policy::ExplorationPolicy;
use tether_test_utils::{fixed_policy, unit_encoder, MajorityLearner, ScriptedEnvironment};

fn script() -> Vec<Vec<f64>> {
    vec![vec![0.1], vec![0.4], vec![0.6], vec![0.9]]
}

fn local_source(epsilon: f64) -> LocalActionSource {
    let policy = ExplorationPolicy::new(vec![ActionId(0), ActionId(1), ActionId(2)], epsilon, 42)
        .unwrap();
    LocalActionSource::new(unit_encoder(4), policy)
}

#[test]
fn every_performed_action_reaches_the_learner_in_order() {
    let channel = Arc::new(ExperienceChannel::new());
    let mailbox: Arc<PolicyMailbox> = Arc::new(PolicyMailbox::new());
    let learner = LearnerLoop::spawn(
        MajorityLearner::new(unit_encoder(4), 25),
        Arc::clone(&channel),
        Arc::clone(&mailbox),
        LearnerConfig::default(),
    )
    .unwrap();

    let config = ControlConfig {
        max_cycles: Some(200),
        ..Default::default()
    };
    let mut control = ControlLoop::new(
        ScriptedEnvironment::new(script()).with_action_delay(1),
        local_source(1.0),
        config,
    )
    .unwrap()
    .with_experience_channel(Arc::clone(&channel))
    .with_mailbox(Arc::clone(&mailbox));

    let report = control.run();
    assert!(matches!(report.termination, Termination::CycleLimit));
    assert_eq!(report.cycles, 200);
    assert_eq!(report.experiences_published, 200);
    assert!(report.clean_disconnect);

    let (learner, learned) = learner.shutdown().unwrap();
    assert_eq!(learned.experiences, 200);
    assert!(learned.policies_published >= 1);

    let performed: Vec<ActionId> = control.environment().performed().to_vec();
    let recorded: Vec<ActionId> = learner.history().iter().map(Experience::action).collect();
    assert_eq!(recorded, performed);

    // Every published policy was either swapped in or is still waiting.
    let waiting = u64::from(mailbox.is_available());
    assert!(report.policy_swaps + waiting <= learned.policies_published);
    assert!(report.policy_swaps + waiting >= 1);
}

#[test]
fn learned_policy_is_followed_after_swap() {
    let mailbox: Arc<PolicyMailbox> = Arc::new(PolicyMailbox::new());
    mailbox.publish(fixed_policy(2));

    let config = ControlConfig {
        max_cycles: Some(20),
        ..Default::default()
    };
    let mut control = ControlLoop::new(ScriptedEnvironment::new(script()), local_source(0.0), config)
        .unwrap()
        .with_mailbox(Arc::clone(&mailbox));
    let report = control.run();

    assert_eq!(report.policy_swaps, 1);
    // The first cycle runs before the mailbox is checked and has no base
    // policy, so it explores; everything after follows the published one.
    let performed = control.environment().performed();
    assert!(performed[1..].iter().all(|&a| a == ActionId(2)));
}

/// A learner that blocks inside `learn()` until the test releases it.
struct Stalled {
    gate: Arc<Mutex<mpsc::Receiver<()>>>,
    seen: usize,
}

impl Learner for Stalled {
    fn learn(&mut self, batch: &[Experience]) -> Option<Arc<dyn Policy>> {
        if self.seen == 0 {
            let gate = self.gate.lock().unwrap();
            gate.recv().unwrap();
        }
        self.seen += batch.len();
        Some(Arc::new(|_s: StateId| None))
    }
}

#[test]
fn stalled_learner_does_not_block_control_loop() {
    let (release, gate) = mpsc::channel();
    let channel = Arc::new(ExperienceChannel::new());
    let mailbox: Arc<PolicyMailbox> = Arc::new(PolicyMailbox::new());
    let learner = LearnerLoop::spawn(
        Stalled {
            gate: Arc::new(Mutex::new(gate)),
            seen: 0,
        },
        Arc::clone(&channel),
        Arc::clone(&mailbox),
        LearnerConfig::default(),
    )
    .unwrap();

    let config = ControlConfig {
        max_cycles: Some(500),
        ..Default::default()
    };
    let mut control = ControlLoop::new(ScriptedEnvironment::new(script()), local_source(0.3), config)
        .unwrap()
        .with_experience_channel(Arc::clone(&channel))
        .with_mailbox(Arc::clone(&mailbox));

    // The learner is parked in its first learn() call for the whole run.
    let report = control.run();
    assert_eq!(report.cycles, 500);
    assert_eq!(report.experiences_published, 500);
    assert_eq!(report.policy_swaps, 0);

    release.send(()).unwrap();
    let (stalled, learned) = learner.shutdown().unwrap();
    assert_eq!(stalled.seen, 500);
    assert_eq!(learned.experiences, 500);
}

#[test]
fn stop_handle_stops_a_free_running_loop() {
    let mut control = ControlLoop::new(
        ScriptedEnvironment::new(script()),
        local_source(0.5),
        ControlConfig::default(),
    )
    .unwrap();
    let stop = control.stop_handle();

    let stopper = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(20));
        stop.stop();
    });
    let report = control.run();
    stopper.join().unwrap();

    assert!(matches!(report.termination, Termination::StopRequested));
    assert!(report.cycles > 0);
    assert_eq!(control.state(), tether_engine::LoopState::Disconnected);
}
