//! Deferred reclamation of nodes detached from a queue.
//!
//! A node swung out of `head` may still be read by a thread that loaded it
//! before the swing (a stale enqueue reading `tail.next`, a stale dequeue
//! reading `head.next`). Nodes are therefore never freed on detach: they are
//! retired into the `crossbeam-epoch` collector and destroyed only after
//! every thread that was pinned at retirement time has unpinned.
//!
//! Retirement frees memory only. Payload ownership has already moved to the
//! dequeuer that won the `head` CAS, so node types stored here keep their
//! payload in `MaybeUninit` and never drop it themselves.

use crossbeam_epoch::{self as epoch, Guard, Shared};

/// Pins the current thread. Node references loaded under the returned guard
/// stay valid until it is dropped.
#[inline]
pub(crate) fn pin() -> Guard {
    epoch::pin()
}

/// Returns a guard for paths with exclusive access to the structure.
///
/// # Safety
///
/// No other thread may access the nodes loaded under this guard.
#[inline]
pub(crate) unsafe fn unprotected() -> &'static Guard {
    // SAFETY: forwarded to the caller.
    unsafe { epoch::unprotected() }
}

/// Schedules `node` for destruction once no pinned thread can still hold it.
///
/// # Safety
///
/// `node` must be unreachable from the structure for every thread that pins
/// after this call, and must be retired at most once.
#[inline]
pub(crate) unsafe fn retire<N>(guard: &Guard, node: Shared<'_, N>) {
    debug_assert!(!node.is_null(), "retiring a null node");
    // SAFETY: forwarded to the caller.
    unsafe { guard.defer_destroy(node) }
}

/// Destroys `node` immediately.
///
/// # Safety
///
/// The caller must have exclusive access to `node`, and it must not be
/// retired or reclaimed again.
#[inline]
pub(crate) unsafe fn reclaim_now<N>(node: Shared<'_, N>) {
    debug_assert!(!node.is_null(), "reclaiming a null node");
    // SAFETY: forwarded to the caller.
    drop(unsafe { node.into_owned() });
}
