//! Multi-thread, multi-channel scenarios that don't fit naturally as a
//! single module's unit tests (spec "Concrete scenarios").

use std::thread;
use std::time::Duration;

use wishchan::{select, Channel, RecvError, SelectError, SelectOutcome, SendError};

#[test]
fn fan_in_conservation_across_many_producers() {
    const PRODUCERS: usize = 8;
    const PER_PRODUCER: usize = 50;

    let sink: Channel<usize> = Channel::new(16);
    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let sink = sink.clone();
            thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    sink.send(p * PER_PRODUCER + i, None).unwrap();
                }
            })
        })
        .collect();

    let mut received = Vec::with_capacity(PRODUCERS * PER_PRODUCER);
    for _ in 0..PRODUCERS * PER_PRODUCER {
        received.push(sink.receive(None).unwrap());
    }
    for p in producers {
        p.join().unwrap();
    }

    received.sort();
    assert_eq!(received, (0..PRODUCERS * PER_PRODUCER).collect::<Vec<_>>());
}

#[test]
fn select_timeout_leaves_no_residue_on_any_candidate() {
    let a: Channel<i32> = Channel::new(0);
    let b: Channel<i32> = Channel::new(0);
    let c: Channel<i32> = Channel::new(0);

    let err = select(
        &[a.clone(), b.clone()],
        vec![(c.clone(), 42)],
        Some(Duration::from_millis(10)),
    );
    assert_eq!(err, Err(SelectError::Timeout));

    // A timed-out select must not leave any wish stranded on any of its
    // candidate channels: an immediate, separately-timed-out op on each
    // must also time out, never silently succeed against a leftover wish.
    assert_eq!(a.send(1, Some(Duration::ZERO)), Err(SendError::Timeout(1)));
    assert_eq!(b.send(2, Some(Duration::ZERO)), Err(SendError::Timeout(2)));
    assert_eq!(c.receive(Some(Duration::ZERO)), Err(RecvError::Timeout));
}

#[test]
fn fan_in_over_closing_channels_yields_every_value_once() {
    let a: Channel<i32> = Channel::new(0);
    let b: Channel<i32> = Channel::new(0);
    let c: Channel<i32> = Channel::new(0);

    let producers: Vec<_> = [
        (a.clone(), [0, 1, 2]),
        (b.clone(), [3, 4, 5]),
        (c.clone(), [6, 7, 8]),
    ]
    .into_iter()
    .map(|(chan, values)| {
        thread::spawn(move || {
            for v in values {
                chan.send(v, None).unwrap();
            }
            chan.close();
        })
    })
    .collect();

    let mut inflight = vec![a, b, c];
    let mut collected = Vec::new();
    let mut closed_seen: Vec<Channel<i32>> = Vec::new();
    while !inflight.is_empty() {
        match select(&inflight, vec![], None) {
            Ok(SelectOutcome::Received(_, value)) => collected.push(value),
            Err(SelectError::Closed(chan)) => {
                assert!(
                    !closed_seen.contains(&chan),
                    "each channel should be observed closed exactly once"
                );
                closed_seen.push(chan.clone());
                inflight.retain(|c| *c != chan);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    for p in producers {
        p.join().unwrap();
    }

    collected.sort();
    assert_eq!(collected, (0..9).collect::<Vec<_>>());
    assert_eq!(closed_seen.len(), 3);
}

#[test]
fn select_fairness_distributes_roughly_evenly() {
    const TRIALS: usize = 600;
    let mut counts = [0usize; 3];

    for _ in 0..TRIALS {
        let chans: Vec<Channel<i32>> = (0..3).map(|_| Channel::new(1)).collect();
        for c in &chans {
            c.send(1, None).unwrap();
        }
        match select(&chans, vec![], None).unwrap() {
            SelectOutcome::Received(chan, _) => {
                let idx = chans.iter().position(|c| *c == chan).unwrap();
                counts[idx] += 1;
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    // With 3 equally-ready candidates over many trials, no candidate
    // should dominate; a 10x skew would indicate broken shuffling.
    for count in counts {
        assert!(
            count > TRIALS / 10,
            "candidate starved under fair selection: {counts:?}"
        );
    }
}
