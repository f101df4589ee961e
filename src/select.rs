//! The select operator: atomically commits to exactly one of a set of
//! pending send/receive candidates (spec §4.3).

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::MutexGuard;
use rand::seq::SliceRandom;

use crate::channel::{try_receive_locked, try_send_locked, Channel, ChannelState};
use crate::error::SelectError;
use crate::wish::{sweep_wish, Wish, WishGroup, WishKind};

/// The result of a successful select: either a value received from a
/// channel, or confirmation that a value was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome<T> {
    Received(Channel<T>, T),
    Sent(Channel<T>),
}

struct Candidate<T> {
    kind: WishKind,
    channel: Channel<T>,
    /// `Some` for a `Send` candidate until it commits; `None` for
    /// `Receive` candidates.
    value: Option<T>,
}

/// Atomically commits to exactly one of `receivers` (candidate receives)
/// or `senders` (candidate sends, each paired with the value to offer).
///
/// Blocks until a candidate is ready, `timeout` elapses, or a candidate's
/// channel is closed. `timeout = None` blocks indefinitely;
/// `Some(Duration::ZERO)` never blocks.
pub fn select<T>(
    receivers: &[Channel<T>],
    senders: Vec<(Channel<T>, T)>,
    timeout: Option<Duration>,
) -> Result<SelectOutcome<T>, SelectError<T>> {
    let mut candidates: Vec<Candidate<T>> = receivers
        .iter()
        .cloned()
        .map(|channel| Candidate {
            kind: WishKind::Receive,
            channel,
            value: None,
        })
        .collect();
    candidates.extend(senders.into_iter().map(|(channel, value)| Candidate {
        kind: WishKind::Send,
        channel,
        value: Some(value),
    }));

    assert!(
        !candidates.is_empty(),
        "select requires at least one receive or send candidate"
    );

    // Per-call fairness: each simultaneously-ready candidate has equal
    // odds of being picked (spec §4.3 step 2).
    candidates.shuffle(&mut rand::thread_rng());

    // Distinct channels, locked in a total order (by assigned id) so that
    // concurrent selects over overlapping channel sets can't deadlock.
    let mut channels: Vec<Channel<T>> = candidates.iter().map(|c| c.channel.clone()).collect();
    channels.sort_by_key(|c| c.id());
    channels.dedup_by(|a, b| a.id() == b.id());

    let locate = |channels: &[Channel<T>], id: u64| {
        channels
            .iter()
            .position(|c| c.id() == id)
            .expect("candidate channel must be present in the locked set")
    };

    let mut guards: Vec<MutexGuard<'_, ChannelState<T>>> =
        channels.iter().map(|c| c.inner.state.lock()).collect();

    // Step 4a: closure is observable immediately, even if a ready
    // operation also exists.
    for cand in &candidates {
        let idx = locate(&channels, cand.channel.id());
        if guards[idx].closed {
            drop(guards);
            return Err(SelectError::Closed(cand.channel.clone()));
        }
    }

    // Step 4b: the first candidate (in randomized order) that can commit
    // immediately wins.
    for cand in &mut candidates {
        let idx = locate(&channels, cand.channel.id());
        match cand.kind {
            WishKind::Receive => {
                if let Ok(value) = try_receive_locked(&mut guards[idx]) {
                    let channel = cand.channel.clone();
                    drop(guards);
                    return Ok(SelectOutcome::Received(channel, value));
                }
            }
            WishKind::Send => {
                let value = cand.value.take().expect("send candidate missing its value");
                match try_send_locked(&mut guards[idx], value) {
                    Ok(()) => {
                        let channel = cand.channel.clone();
                        drop(guards);
                        return Ok(SelectOutcome::Sent(channel));
                    }
                    Err(v) => cand.value = Some(v),
                }
            }
        }
    }

    if timeout == Some(Duration::ZERO) {
        drop(guards);
        return Err(SelectError::Timeout);
    }

    // Step 4d: nothing is ready, enqueue every wish, then wait.
    let group = Arc::new(WishGroup::new());
    let mut wishes: Vec<Arc<Wish<T>>> = Vec::with_capacity(candidates.len());
    for cand in candidates {
        let idx = locate(&channels, cand.channel.id());
        let wish = match cand.kind {
            WishKind::Receive => Wish::new_receive(cand.channel, Arc::clone(&group)),
            WishKind::Send => Wish::new_send(
                cand.channel,
                cand.value.expect("send candidate missing its value"),
                Arc::clone(&group),
            ),
        };
        match wish.kind {
            WishKind::Send => guards[idx].waiting_senders.push_back(Arc::clone(&wish)),
            WishKind::Receive => guards[idx].waiting_receivers.push_back(Arc::clone(&wish)),
        }
        wishes.push(wish);
    }
    drop(guards);

    let deadline = timeout.map(|d| Instant::now() + d);
    group.wait(deadline);

    // Step 6: sweep every wish from its queue, tolerating absence.
    let mut guards: Vec<MutexGuard<'_, ChannelState<T>>> =
        channels.iter().map(|c| c.inner.state.lock()).collect();
    for wish in &wishes {
        let idx = locate(&channels, wish.channel.id());
        match wish.kind {
            WishKind::Send => sweep_wish(&mut guards[idx].waiting_senders, wish),
            WishKind::Receive => sweep_wish(&mut guards[idx].waiting_receivers, wish),
        }
    }
    drop(guards);

    match group.take_commit() {
        None => Err(SelectError::Timeout),
        Some(commit) => {
            if commit.closed {
                Err(SelectError::Closed(commit.channel))
            } else {
                match commit.value {
                    Some(value) => Ok(SelectOutcome::Received(commit.channel, value)),
                    None => Ok(SelectOutcome::Sent(commit.channel)),
                }
            }
        }
    }
}
