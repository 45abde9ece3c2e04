//! The queue and the pieces it is built from.

mod reclaim;
pub mod unbounded_channel;
pub mod wait;
