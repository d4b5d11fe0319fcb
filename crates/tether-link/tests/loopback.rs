//! Integration test: control loop driven across the link.
//!
//! Runs a device-side [`ControlLoop`] whose action source is a
//! [`LinkClient`], against a host [`LinkServer`] feeding a learner, over
//! both the in-process transport and real TCP sockets.

use std::io::Read;
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tether_core::{ActionId, ConfigError, Experience, LinkError, StateId, TablePolicy};
use tether_engine::{
    ControlConfig, ControlLoop, ExperienceChannel, LearnerConfig, LearnerLoop, LocalActionSource,
    LoopState, PolicyMailbox, Termination,
};
use tether_link::codec::{self, Opcode};
use tether_link::{
    memory_pair, LinkClient, LinkServer, PolicyFeed, PolicySender, RetryPolicy, SessionEnd,
    StreamTransport, Transport,
};
use tether_policy::ExplorationPolicy;
use tether_test_utils::{grid_encoder, MajorityLearner, ScriptedEnvironment};

fn script() -> Vec<Vec<f64>> {
    vec![vec![0.1, 0.9], vec![0.6, 0.2], vec![0.9, 0.9], vec![0.3, 0.4]]
}

fn host_policy(epsilon: f64) -> ExplorationPolicy {
    ExplorationPolicy::new(vec![ActionId(0), ActionId(1), ActionId(2)], epsilon, 7).unwrap()
}

fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_backoff: Duration::from_millis(1),
        backoff_factor: 2.0,
        max_backoff: Duration::from_millis(5),
    }
}

#[test]
fn remote_loop_over_memory_feeds_host_learner() {
    let (device, host) = memory_pair();

    let channel = Arc::new(ExperienceChannel::new());
    let mailbox: Arc<PolicyMailbox> = Arc::new(PolicyMailbox::new());
    let learner = LearnerLoop::spawn(
        MajorityLearner::new(grid_encoder(&[4, 4]), 10),
        Arc::clone(&channel),
        Arc::clone(&mailbox),
        LearnerConfig::default(),
    )
    .unwrap();

    let mut server = LinkServer::new(host, grid_encoder(&[4, 4]), host_policy(0.5))
        .unwrap()
        .with_experience_channel(Arc::clone(&channel))
        .with_mailbox(Arc::clone(&mailbox));
    let serving = thread::spawn(move || server.serve());

    let config = ControlConfig {
        max_cycles: Some(100),
        ..Default::default()
    };
    let mut control = ControlLoop::new(
        ScriptedEnvironment::new(script()),
        LinkClient::new(device, 2),
        config,
    )
    .unwrap();
    let report = control.run();

    assert!(matches!(report.termination, Termination::CycleLimit));
    assert!(report.clean_disconnect);
    assert_eq!(control.state(), LoopState::Disconnected);
    assert_eq!(control.source().exchanges(), 100);

    let session = serving.join().unwrap().unwrap();
    assert_eq!(session.end, SessionEnd::PeerDisconnected);
    assert_eq!(session.exchanges, 100);
    assert_eq!(session.experiences_published, 100);

    let (learner, learned) = learner.shutdown().unwrap();
    assert_eq!(learned.experiences, 100);
    let recorded: Vec<ActionId> = learner.history().iter().map(Experience::action).collect();
    assert_eq!(recorded, control.environment().performed());
}

#[test]
fn remote_loop_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let serving = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut server =
            LinkServer::new(StreamTransport::new(stream), grid_encoder(&[4, 4]), host_policy(1.0))
                .unwrap();
        server.serve()
    });

    let transport = StreamTransport::connect_tcp(addr, &fast_retry(5)).unwrap();
    let config = ControlConfig {
        max_cycles: Some(25),
        ..Default::default()
    };
    let mut control = ControlLoop::new(
        ScriptedEnvironment::new(script()),
        LinkClient::new(transport, 2),
        config,
    )
    .unwrap();
    let report = control.run();
    assert!(report.clean_disconnect);
    assert!(control
        .environment()
        .performed()
        .iter()
        .all(|a| a.0 < 3));

    let session = serving.join().unwrap().unwrap();
    assert_eq!(session.exchanges, 25);
    assert_eq!(session.end, SessionEnd::PeerDisconnected);
}

#[test]
fn host_vanishing_mid_session_stops_the_loop() {
    let (device, mut host) = memory_pair();
    let answering = thread::spawn(move || {
        for _ in 0..5 {
            assert_eq!(codec::read_opcode(&mut host).unwrap(), Opcode::SendPerceptReceiveAction);
            codec::read_percept_body(&mut host, 2).unwrap();
            host.send(&codec::encode_action(ActionId(1)).unwrap()).unwrap();
        }
        // Dropping the host end simulates a lost link.
    });

    let mut control = ControlLoop::new(
        ScriptedEnvironment::new(script()),
        LinkClient::new(device, 2),
        ControlConfig::default(),
    )
    .unwrap();
    let report = control.run();
    answering.join().unwrap();

    match &report.termination {
        Termination::LinkFailed(e) => assert!(e.is_disconnect()),
        other => panic!("expected LinkFailed, got {other:?}"),
    }
    assert_eq!(control.environment().performed().len(), 5);
    assert!(!report.clean_disconnect);
    assert_eq!(control.state(), LoopState::Disconnected);
}

#[test]
fn connect_gives_up_after_bounded_retries() {
    // Bind then drop to find a port with nothing listening.
    let addr = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();
    match StreamTransport::connect_tcp(addr, &fast_retry(2)) {
        Err(LinkError::RetriesExhausted { attempts, .. }) => assert_eq!(attempts, 2),
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
}

#[test]
fn connect_rejects_invalid_retry_policy() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let mut retry = fast_retry(3);
    retry.backoff_factor = 0.5;
    match StreamTransport::connect_tcp(addr, &retry) {
        Err(LinkError::Config(ConfigError::InvalidRetry { .. })) => {}
        other => panic!("expected InvalidRetry, got {other:?}"),
    }
}

#[test]
fn device_stops_feed_while_host_keeps_side_channel_open() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    // The host never sends DISCONNECT; it just waits for the device to go.
    let host = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = [0u8; 1];
        stream.read(&mut buf).unwrap_or(0)
    });

    let transport = StreamTransport::connect_tcp(addr, &fast_retry(5)).unwrap();
    let feed = PolicyFeed::spawn(transport, Arc::new(PolicyMailbox::new())).unwrap();
    thread::sleep(Duration::from_millis(20));
    assert!(!feed.is_finished());

    let report = feed.shutdown().unwrap();
    assert!(report.stopped);
    assert!(!report.clean_disconnect);
    assert_eq!(host.join().unwrap(), 0);
}

#[test]
fn side_channel_policy_drives_local_selection() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let host = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut sender = PolicySender::new(StreamTransport::new(stream));
        let table: TablePolicy = (0..16).map(|s| (StateId(s), ActionId(2))).collect();
        sender.send(&table).unwrap();
        sender.close().unwrap();
    });

    let mailbox: Arc<PolicyMailbox> = Arc::new(PolicyMailbox::new());
    let transport = StreamTransport::connect_tcp(addr, &fast_retry(5)).unwrap();
    let feed = PolicyFeed::spawn(transport, Arc::clone(&mailbox)).unwrap();
    host.join().unwrap();
    let feed_report = feed.join().unwrap();
    assert_eq!(feed_report.received, 1);
    assert!(feed_report.clean_disconnect);

    let source = LocalActionSource::new(grid_encoder(&[4, 4]), host_policy(0.0));
    let config = ControlConfig {
        max_cycles: Some(10),
        ..Default::default()
    };
    let mut control = ControlLoop::new(ScriptedEnvironment::new(script()), source, config)
        .unwrap()
        .with_mailbox(mailbox);
    let report = control.run();

    assert_eq!(report.policy_swaps, 1);
    let performed = control.environment().performed();
    assert!(performed[1..].iter().all(|&a| a == ActionId(2)));
}
