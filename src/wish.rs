//! A wish is one pending intent to send or receive one value on one
//! channel; a wish group is the set of wishes issued by a single caller for
//! one operation (a plain `send`/`receive` has a group of one, `select` a
//! group of many). Exactly one wish in a group is ever committed.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::channel::Channel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WishKind {
    Send,
    Receive,
}

/// The outcome recorded by whichever wish in a group commits first.
pub(crate) struct CommitRecord<T> {
    pub(crate) channel: Channel<T>,
    pub(crate) kind: WishKind,
    /// `Some` for a committed receive; `None` for a committed send or a
    /// commit that only carries `closed`.
    pub(crate) value: Option<T>,
    pub(crate) closed: bool,
}

pub(crate) struct WishGroup<T> {
    state: Mutex<Option<CommitRecord<T>>>,
    cond: Condvar,
}

impl<T> WishGroup<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(None),
            cond: Condvar::new(),
        }
    }

    /// Blocks until a wish in this group commits or `deadline` passes.
    /// `None` deadline blocks forever.
    pub(crate) fn wait(&self, deadline: Option<Instant>) {
        let mut state = self.state.lock();
        loop {
            if state.is_some() {
                return;
            }
            match deadline {
                None => self.cond.wait(&mut state),
                Some(dl) => {
                    let now = Instant::now();
                    if now >= dl {
                        return;
                    }
                    self.cond.wait_for(&mut state, dl - now);
                }
            }
        }
    }

    /// Takes the commit record, if any. Used once all participating
    /// channels' wishes have been swept from their queues.
    pub(crate) fn take_commit(&self) -> Option<CommitRecord<T>> {
        self.state.lock().take()
    }
}

/// One pending send or receive intent, bound to a group.
pub(crate) struct Wish<T> {
    pub(crate) kind: WishKind,
    pub(crate) channel: Channel<T>,
    /// The outgoing payload for a `Send` wish; unused for `Receive`.
    outgoing: Mutex<Option<T>>,
    group: Arc<WishGroup<T>>,
}

impl<T> Wish<T> {
    pub(crate) fn new_receive(channel: Channel<T>, group: Arc<WishGroup<T>>) -> Arc<Self> {
        Arc::new(Self {
            kind: WishKind::Receive,
            channel,
            outgoing: Mutex::new(None),
            group,
        })
    }

    pub(crate) fn new_send(channel: Channel<T>, value: T, group: Arc<WishGroup<T>>) -> Arc<Self> {
        Arc::new(Self {
            kind: WishKind::Send,
            channel,
            outgoing: Mutex::new(Some(value)),
            group,
        })
    }

    /// Commits this (a `Send` wish) against a peer receiver, handing back
    /// the outgoing payload. `group` must not already be locked by the
    /// caller. Returns `None` if another wish in the group already won,
    /// the peer should discard this wish and keep walking its queue.
    pub(crate) fn commit_as_sender(self: &Arc<Self>) -> Option<T> {
        debug_assert_eq!(self.kind, WishKind::Send);
        let mut state = self.group.state.lock();
        if state.is_some() {
            return None;
        }
        let value = self
            .outgoing
            .lock()
            .take()
            .expect("send wish committed twice");
        *state = Some(CommitRecord {
            channel: self.channel.clone(),
            kind: WishKind::Send,
            value: None,
            closed: false,
        });
        self.group.cond.notify_one();
        Some(value)
    }

    /// Commits this (a `Receive` wish) against a peer sender delivering
    /// `value`. Returns the value back on `Err` if another wish in the
    /// group already won, so the caller can offer it to the next queue
    /// head.
    pub(crate) fn commit_as_receiver(self: &Arc<Self>, value: T) -> Result<(), T> {
        debug_assert_eq!(self.kind, WishKind::Receive);
        let mut state = self.group.state.lock();
        if state.is_some() {
            return Err(value);
        }
        *state = Some(CommitRecord {
            channel: self.channel.clone(),
            kind: WishKind::Receive,
            value: Some(value),
            closed: false,
        });
        self.group.cond.notify_one();
        Ok(())
    }

    /// Commits this wish as closed, carrying no value. Called while
    /// sweeping a channel's waiting queues during `close()`.
    pub(crate) fn commit_closed(self: &Arc<Self>) {
        let mut state = self.group.state.lock();
        if state.is_some() {
            return;
        }
        *state = Some(CommitRecord {
            channel: self.channel.clone(),
            kind: self.kind,
            value: None,
            closed: true,
        });
        self.group.cond.notify_one();
    }

    pub(crate) fn group(&self) -> &Arc<WishGroup<T>> {
        &self.group
    }

    /// Takes back the outgoing payload of an uncommitted `Send` wish.
    /// Used when a send times out or is swept after a group commits
    /// elsewhere (select): the value was never handed to a peer.
    pub(crate) fn take_outgoing(&self) -> Option<T> {
        self.outgoing.lock().take()
    }
}

/// Removes `target` from `queue` by pointer identity, tolerating its
/// absence, a peer may have already popped and committed it.
pub(crate) fn sweep_wish<T>(queue: &mut std::collections::VecDeque<Arc<Wish<T>>>, target: &Arc<Wish<T>>) {
    if let Some(pos) = queue.iter().position(|w| Arc::ptr_eq(w, target)) {
        queue.remove(pos);
    }
}
