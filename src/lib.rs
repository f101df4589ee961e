//! # wishchan
//!
//! CSP-style rendezvous channels with a multi-way `select` operator, in the
//! spirit of Go channels and Python's `stuglaser/pychan`.
//!
//! A [`Channel<T>`] is a cloneable handle onto a shared queue. With
//! `buflen == 0` it is a pure rendezvous: `send` and `receive` each block
//! until the other side is present. With `buflen > 0` it is backed by a
//! fixed-size ring buffer, and `send` only blocks once the buffer is full.
//!
//! [`select`] picks exactly one ready candidate out of a set of pending
//! sends and receives across possibly many channels, fairly and without
//! deadlocking against concurrent selects over overlapping channel sets.
//!
//! ## Example
//!
//! ```rust
//! use wishchan::Channel;
//!
//! let c = Channel::new(0);
//! let sender = c.clone();
//! std::thread::spawn(move || {
//!     sender.send(42, None).unwrap();
//! });
//! assert_eq!(c.receive(None).unwrap(), 42);
//! ```

mod channel;
mod error;
mod ring;
mod select;
mod wish;

pub use channel::{Channel, IntoIter, Iter};
pub use error::{RecvError, SelectError, SendError};
pub use select::{select, SelectOutcome};
