//! Integration test: many producers, one consumer, no loss or reordering.
//!
//! Four producer threads each push 10 000 experiences tagged with
//! `(producer, sequence)`. A consumer drains until the channel is closed
//! and empty. Every experience must arrive exactly once, and each
//! producer's experiences must arrive in the order they were pushed.

use std::sync::Arc;
use std::thread;

use tether_core::{ActionId, Experience, Observation};
use tether_engine::ExperienceChannel;

const PRODUCERS: u32 = 4;
const PER_PRODUCER: u32 = 10_000;

fn tagged(producer: u32, seq: u32) -> Experience {
    Experience::new(
        Observation::new(vec![f64::from(producer), f64::from(seq)]),
        ActionId(producer),
    )
}

#[test]
fn multi_producer_single_consumer_preserves_everything() {
    let channel = Arc::new(ExperienceChannel::new());

    let consumer = {
        let channel = Arc::clone(&channel);
        thread::spawn(move || {
            let mut received = Vec::new();
            while let Some(exp) = channel.take_one() {
                received.push(exp);
            }
            received
        })
    };

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let channel = Arc::clone(&channel);
            thread::spawn(move || {
                for seq in 0..PER_PRODUCER {
                    channel.push(tagged(p, seq)).unwrap();
                }
            })
        })
        .collect();
    for h in producers {
        h.join().unwrap();
    }
    channel.close();

    let received = consumer.join().unwrap();
    assert_eq!(received.len(), (PRODUCERS * PER_PRODUCER) as usize);
    assert_eq!(channel.pushed_total(), u64::from(PRODUCERS * PER_PRODUCER));

    let mut next = vec![0u32; PRODUCERS as usize];
    for exp in &received {
        let producer = exp.observation()[0] as u32;
        let seq = exp.observation()[1] as u32;
        assert_eq!(exp.action(), ActionId(producer));
        assert_eq!(seq, next[producer as usize], "producer {producer} out of order");
        next[producer as usize] += 1;
    }
    assert!(next.iter().all(|&n| n == PER_PRODUCER));
}

#[test]
fn batch_drains_interleave_with_pushes_without_loss() {
    let channel = Arc::new(ExperienceChannel::new());
    let producer = {
        let channel = Arc::clone(&channel);
        thread::spawn(move || {
            for seq in 0..PER_PRODUCER {
                channel.push(tagged(0, seq)).unwrap();
            }
            channel.close();
        })
    };

    let mut received = Vec::new();
    loop {
        let closed = channel.is_closed();
        channel.drain_into(&mut received);
        if closed && channel.is_empty() {
            break;
        }
        thread::yield_now();
    }
    producer.join().unwrap();

    let seqs: Vec<u32> = received
        .iter()
        .map(|e| e.observation()[1] as u32)
        .collect();
    assert_eq!(seqs, (0..PER_PRODUCER).collect::<Vec<_>>());
}
