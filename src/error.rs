//! Error types surfaced by channel operations.
//!
//! `Closed` and `Timeout` are ordinary, recoverable outcomes.
//! Double-close and internal invariant violations are programmer errors
//! and are raised as panics rather than `Result`s, see `Channel::close`.

use std::fmt;

use crate::channel::Channel;

/// Failure of a `send`, carrying the value back so the caller can reuse
/// or drop it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError<T> {
    /// The channel was already closed, or closed while waiting.
    Closed(T),
    /// The deadline elapsed before a peer committed.
    Timeout(T),
}

impl<T> SendError<T> {
    /// Extracts the value that could not be sent.
    pub fn into_inner(self) -> T {
        match self {
            SendError::Closed(v) | SendError::Timeout(v) => v,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, SendError::Closed(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SendError::Timeout(_))
    }
}

impl<T> fmt::Display for SendError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Closed(_) => write!(f, "channel closed"),
            SendError::Timeout(_) => write!(f, "send operation timed out"),
        }
    }
}

impl<T: fmt::Debug> std::error::Error for SendError<T> {}

/// Failure of a `receive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RecvError {
    /// The channel's buffer is empty, it is closed, and no sender is
    /// waiting to hand off a value.
    #[error("channel closed")]
    Closed,
    /// The deadline elapsed before a value was available.
    #[error("receive operation timed out")]
    Timeout,
}

impl RecvError {
    pub fn is_closed(&self) -> bool {
        matches!(self, RecvError::Closed)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RecvError::Timeout)
    }
}

/// Failure of a `select` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectError<T> {
    /// The named candidate channel is closed and was chosen; callers
    /// typically prune it from the candidate set and select again.
    Closed(Channel<T>),
    /// The deadline elapsed with no candidate ready.
    Timeout,
}

impl<T> SelectError<T> {
    pub fn is_closed(&self) -> bool {
        matches!(self, SelectError::Closed(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SelectError::Timeout)
    }
}

impl<T> fmt::Display for SelectError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectError::Closed(_) => write!(f, "channel closed"),
            SelectError::Timeout => write!(f, "select operation timed out"),
        }
    }
}

impl<T: fmt::Debug> std::error::Error for SelectError<T> {}
