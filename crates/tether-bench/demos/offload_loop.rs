//! End-to-end offloaded control example.
//!
//! Demonstrates: device ControlLoop → LinkClient → (in-process link) →
//! host LinkServer → ExperienceChannel → LearnerLoop → PolicyMailbox →
//! back into the host's action selection.
//!
//! Run with `RUST_LOG=debug` to see policy swaps and per-session logs.

use std::sync::Arc;
use std::thread;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tether_bench::{reference_encoder, reference_observations, REFERENCE_ACTIONS, REFERENCE_DIMS};
use tether_core::ActionId;
use tether_engine::{
    ControlConfig, ControlLoop, ExperienceChannel, LearnerConfig, LearnerLoop, PolicyMailbox,
};
use tether_link::{memory_pair, LinkClient, LinkServer};
use tether_policy::ExplorationPolicy;
use tether_test_utils::{MajorityLearner, ScriptedEnvironment};

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    println!("=== Tether Offload Example ===\n");

    let (device_end, host_end) = memory_pair();

    // --- Host: learner + link server ---
    let experiences = Arc::new(ExperienceChannel::new());
    let mailbox: Arc<PolicyMailbox> = Arc::new(PolicyMailbox::new());
    let learner = LearnerLoop::spawn(
        MajorityLearner::new(reference_encoder(), 100),
        Arc::clone(&experiences),
        Arc::clone(&mailbox),
        LearnerConfig::default(),
    )
    .unwrap();

    let actions = (0..REFERENCE_ACTIONS).map(ActionId).collect();
    let host_policy = ExplorationPolicy::new(actions, 0.2, 42).unwrap();
    let mut server = LinkServer::new(host_end, reference_encoder(), host_policy)
        .unwrap()
        .with_experience_channel(Arc::clone(&experiences))
        .with_mailbox(Arc::clone(&mailbox));
    let host = thread::spawn(move || server.serve());

    // --- Device: scripted sensor stream + control loop ---
    let script = reference_observations(64, 7)
        .into_iter()
        .map(|o| o.as_slice().to_vec())
        .collect();
    let config = ControlConfig {
        max_cycles: Some(1_000),
        ..Default::default()
    };
    let mut control = ControlLoop::new(
        ScriptedEnvironment::new(script),
        LinkClient::new(device_end, REFERENCE_DIMS),
        config,
    )
    .unwrap();
    let report = control.run();

    println!(
        "Device: {} cycles, terminated by {}, clean disconnect: {}",
        report.cycles, report.termination, report.clean_disconnect
    );

    let session = host.join().unwrap().unwrap();
    println!(
        "Host:   {} exchanges, {} policy swaps, session end {:?}",
        session.exchanges, session.policy_swaps, session.end
    );

    let (learner, learned) = learner.shutdown().unwrap();
    println!(
        "Learner: {} experiences in {} batches, {} policies published, {} states mapped",
        learned.experiences,
        learned.batches,
        learned.policies_published,
        learner.table().len()
    );
    info!("example finished");
}
