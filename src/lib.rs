//! An unbounded, lock-free, multi-producer multi-consumer FIFO queue, usable
//! as the core of an in-process message channel.
//!
//! Producers call [`UnboundedChannel::enqueue`], consumers call
//! [`UnboundedChannel::dequeue`]. Neither takes a lock: both are CAS retry
//! loops, and threads that find the tail lagging help it forward. Nodes
//! detached from the head are reclaimed through `crossbeam-epoch`.
//!
//! A consumer that finds the queue empty does not park on an OS primitive.
//! What it does between attempts is a [`WaitStrategy`]: [`BusySpin`] by
//! default, or [`Backoff`] / [`SpinThenPark`] to give CPU back.
//!
//! ```
//! use unbounded_channel::{Backoff, UnboundedChannel};
//!
//! let channel = UnboundedChannel::with_wait_strategy(Backoff);
//! channel.enqueue("a");
//! channel.enqueue("b");
//! assert_eq!(channel.dequeue(), "a");
//! assert_eq!(channel.try_dequeue(), Some("b"));
//! assert_eq!(channel.try_dequeue(), None);
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod structures;
pub mod trace;

pub use structures::unbounded_channel::UnboundedChannel;
pub use structures::wait::{Backoff, BusySpin, SpinThenPark, WaitStrategy, Waiter};
