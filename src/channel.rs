//! The channel object: a lock, an optional ring buffer, a closed flag, and
//! two FIFO queues of waiting wishes (senders, receivers).

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{RecvError, SendError};
use crate::ring::RingBuffer;
use crate::wish::{sweep_wish, Wish, WishGroup};

/// Assigns every channel a distinct, monotonically increasing id at
/// construction. Select uses this as the total order for multi-lock
/// acquisition (spec §4.3, §9 "lock identity total order").
static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) struct ChannelState<T> {
    pub(crate) closed: bool,
    pub(crate) buffer: Option<RingBuffer<T>>,
    pub(crate) waiting_senders: VecDeque<Arc<Wish<T>>>,
    pub(crate) waiting_receivers: VecDeque<Arc<Wish<T>>>,
}

pub(crate) struct ChannelInner<T> {
    pub(crate) id: u64,
    pub(crate) state: Mutex<ChannelState<T>>,
}

/// A channel. Cheap to clone, clones share the same underlying queues and
/// buffer, like cloning a Go channel value.
pub struct Channel<T> {
    pub(crate) inner: Arc<ChannelInner<T>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Channel<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Eq for Channel<T> {}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Channel#{}", self.inner.id)
    }
}

impl<T> Channel<T> {
    /// Creates a channel. `buflen == 0` is unbuffered (every send
    /// rendezvouses with a receiver); `buflen > 0` backs the channel with a
    /// ring buffer of that capacity.
    pub fn new(buflen: usize) -> Self {
        let buffer = if buflen > 0 {
            Some(RingBuffer::new(buflen))
        } else {
            None
        };
        let inner = ChannelInner {
            id: NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(ChannelState {
                closed: false,
                buffer,
                waiting_senders: VecDeque::new(),
                waiting_receivers: VecDeque::new(),
            }),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.inner.id
    }

    /// Sends `value`, blocking until it is committed to a receiver or the
    /// buffer. `timeout = None` blocks indefinitely; `Some(Duration::ZERO)`
    /// never blocks.
    pub fn send(&self, value: T, timeout: Option<Duration>) -> Result<(), SendError<T>> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(SendError::Closed(value));
        }
        let v = match try_send_locked(&mut state, value) {
            Ok(()) => return Ok(()),
            Err(v) => v,
        };

        if timeout == Some(Duration::ZERO) {
            return Err(SendError::Timeout(v));
        }
        let group = Arc::new(WishGroup::new());
        let wish = Wish::new_send(self.clone(), v, group);
        state.waiting_senders.push_back(Arc::clone(&wish));
        drop(state);

        let deadline = timeout.map(|d| Instant::now() + d);
        wish.group().wait(deadline);

        let mut state = self.inner.state.lock();
        sweep_wish(&mut state.waiting_senders, &wish);
        drop(state);

        match wish.group().take_commit() {
            None => Err(SendError::Timeout(wish_into_send_value(&wish))),
            Some(commit) => {
                if commit.closed {
                    Err(SendError::Closed(wish_into_send_value(&wish)))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Receives the next value, blocking until one commits. Closure is
    /// only raised once the buffer is empty and no sender is waiting.
    pub fn receive(&self, timeout: Option<Duration>) -> Result<T, RecvError> {
        let mut state = self.inner.state.lock();
        if let Ok(value) = try_receive_locked(&mut state) {
            return Ok(value);
        }
        if state.closed {
            return Err(RecvError::Closed);
        }
        if timeout == Some(Duration::ZERO) {
            return Err(RecvError::Timeout);
        }
        let group = Arc::new(WishGroup::new());
        let wish = Wish::new_receive(self.clone(), group);
        state.waiting_receivers.push_back(Arc::clone(&wish));
        drop(state);

        let deadline = timeout.map(|d| Instant::now() + d);
        wish.group().wait(deadline);

        let mut state = self.inner.state.lock();
        sweep_wish(&mut state.waiting_receivers, &wish);
        drop(state);

        match wish.group().take_commit() {
            None => Err(RecvError::Timeout),
            Some(commit) => {
                if commit.closed {
                    Err(RecvError::Closed)
                } else {
                    Ok(commit.value.expect("committed receive carries a value"))
                }
            }
        }
    }

    /// Closes the channel. Every currently waiting wish, on both queues,
    /// is committed with `closed = true` after the channel lock is
    /// released, one group lock at a time.
    ///
    /// # Panics
    ///
    /// Panics if the channel is already closed. Double-close is a
    /// programmer error, not a recoverable outcome.
    pub fn close(&self) {
        let waiting = {
            let mut state = self.inner.state.lock();
            assert!(!state.closed, "channel double-closed");
            state.closed = true;
            let mut waiting: Vec<Arc<Wish<T>>> = Vec::with_capacity(
                state.waiting_senders.len() + state.waiting_receivers.len(),
            );
            waiting.extend(state.waiting_senders.drain(..));
            waiting.extend(state.waiting_receivers.drain(..));
            waiting
        };

        for wish in waiting {
            wish.commit_closed();
        }
    }

    /// Reports closed **and** no pending sender is still enqueued, so
    /// buffered data can still be drained. Advisory only, route
    /// correctness through `receive`'s `Closed` error.
    pub fn is_closed(&self) -> bool {
        let state = self.inner.state.lock();
        state.closed && state.waiting_senders.is_empty()
    }

    /// Returns an iterator that yields received values until `Closed`.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter { channel: self }
    }
}

fn wish_into_send_value<T>(wish: &Arc<Wish<T>>) -> T {
    wish.take_outgoing()
        .expect("uncommitted send wish must still hold its payload")
}

/// Attempts a non-blocking receive. Assumes the channel lock is held.
///
/// If the buffer is non-empty, pops one value and, as a cycling step,
/// tries to commit one waiting sender's value into the freed slot. If the
/// buffer is empty or absent, walks the waiting-sender queue for a live
/// wish to commit.
pub(crate) fn try_receive_locked<T>(state: &mut ChannelState<T>) -> Result<T, ()> {
    if let Some(buf) = state.buffer.as_mut() {
        if !buf.is_empty() {
            let value = buf.pop().expect("buffer checked non-empty");
            while let Some(wish) = state.waiting_senders.pop_front() {
                if let Some(cycled) = wish.commit_as_sender() {
                    buf.push(cycled).expect("freed slot must accept a push");
                    break;
                }
                // Dead wish (already committed elsewhere); keep walking.
            }
            return Ok(value);
        }
    }

    while let Some(wish) = state.waiting_senders.pop_front() {
        if let Some(value) = wish.commit_as_sender() {
            return Ok(value);
        }
    }
    Err(())
}

/// Attempts a non-blocking send. Assumes the channel lock is held.
///
/// Walks the waiting-receiver queue for a live wish to commit directly;
/// failing that, pushes into the buffer if not full. Returns the value
/// back on failure (`Full`).
pub(crate) fn try_send_locked<T>(state: &mut ChannelState<T>, mut value: T) -> Result<(), T> {
    while let Some(wish) = state.waiting_receivers.pop_front() {
        match wish.commit_as_receiver(value) {
            Ok(()) => return Ok(()),
            Err(v) => {
                value = v;
                continue;
            }
        }
    }

    if let Some(buf) = state.buffer.as_mut() {
        if !buf.is_full() {
            buf.push(value).expect("checked not full");
            return Ok(());
        }
    }

    Err(value)
}

/// Iterator over received values, terminating cleanly on `Closed`.
pub struct Iter<'a, T> {
    channel: &'a Channel<T>,
}

impl<T> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.channel.receive(None).ok()
    }
}

impl<'a, T> IntoIterator for &'a Channel<T> {
    type Item = T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An owning iterator, for `for value in channel { .. }` without an
/// explicit `&`.
pub struct IntoIter<T> {
    channel: Channel<T>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.channel.receive(None).ok()
    }
}

impl<T> IntoIterator for Channel<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter { channel: self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn unbuffered_rendezvous() {
        let c = Channel::new(0);
        let sender = c.clone();
        let handle = thread::spawn(move || {
            sender.send("Hello".to_string(), None).unwrap();
        });
        assert_eq!(c.receive(None).unwrap(), "Hello");
        handle.join().unwrap();
    }

    #[test]
    fn buffered_overfull_drains_in_order() {
        let c = Channel::new(5);
        let sender = c.clone();
        let handle = thread::spawn(move || {
            for i in 0..20 {
                sender.send(i, None).unwrap();
            }
            sender.close();
        });

        let mut received = Vec::new();
        loop {
            match c.receive(None) {
                Ok(v) => received.push(v),
                Err(RecvError::Closed) => break,
                Err(RecvError::Timeout) => unreachable!("no timeout used"),
            }
        }
        handle.join().unwrap();
        assert_eq!(received, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn close_drains_buffer_before_closed() {
        let c = Channel::new(5);
        for i in 0..5 {
            c.send(i, None).unwrap();
        }
        c.close();

        let values: Vec<_> = c.iter().collect();
        assert_eq!(values, (0..5).collect::<Vec<_>>());
        assert_eq!(c.receive(None), Err(RecvError::Closed));
    }

    #[test]
    #[should_panic(expected = "double-closed")]
    fn double_close_panics() {
        let c: Channel<i32> = Channel::new(1);
        c.close();
        c.close();
    }

    #[test]
    fn timeout_on_empty_receive_leaves_no_residue() {
        let c: Channel<i32> = Channel::new(0);
        assert_eq!(c.receive(Some(Duration::ZERO)), Err(RecvError::Timeout));
        assert_eq!(
            c.inner.state.lock().waiting_receivers.len(),
            0,
            "timed-out receive must not leave a stranded wish"
        );
    }

    #[test]
    fn timeout_on_full_unbuffered_send_leaves_no_residue() {
        let c: Channel<i32> = Channel::new(0);
        assert_eq!(c.send(1, Some(Duration::ZERO)), Err(SendError::Timeout(1)));
        assert_eq!(
            c.inner.state.lock().waiting_senders.len(),
            0,
            "timed-out send must not leave a stranded wish"
        );
    }

    #[test]
    fn send_after_close_fails() {
        let c: Channel<i32> = Channel::new(1);
        c.close();
        assert_eq!(c.send(1, None), Err(SendError::Closed(1)));
    }

    #[test]
    fn receive_after_close_fails_once_buffer_drained() {
        let c: Channel<i32> = Channel::new(1);
        c.send(1, None).unwrap();
        c.close();
        assert_eq!(c.receive(None), Ok(1));
        assert_eq!(c.receive(None), Err(RecvError::Closed));
    }

    #[test]
    fn cloning_shares_the_same_channel() {
        let a = Channel::new(1);
        let b = a.clone();
        assert_eq!(a, b);
        b.send(7, None).unwrap();
        assert_eq!(a.receive(None).unwrap(), 7);
    }

    #[test]
    fn many_senders_one_receiver() {
        let c = Channel::new(10);
        let senders: Vec<_> = (0..3)
            .map(|i| {
                let c = c.clone();
                thread::spawn(move || c.send(i, None).unwrap())
            })
            .collect();
        for s in senders {
            s.join().unwrap();
        }
        let mut values: Vec<i32> = (0..3).map(|_| c.receive(None).unwrap()).collect();
        values.sort();
        assert_eq!(values, vec![0, 1, 2]);
    }
}
