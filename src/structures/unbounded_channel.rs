//! The unbounded lock-free MPMC queue behind the channel.
//!
//! A Michael-Scott style linked queue: `head` always points at a dummy node
//! whose payload is never handed out, the first real element is `head.next`,
//! and `tail` points at the last node or lags exactly one link behind it.
//! Any thread that sees the lag swings `tail` forward before retrying.

use core::fmt;
use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::ptr;
use core::sync::atomic::Ordering;

use crossbeam::utils::CachePadded;
use crossbeam_epoch::{Atomic, Guard, Owned, Shared};

use super::reclaim;
use super::wait::{BusySpin, WaitStrategy, Waiter};
use crate::trace::{debug, trace};

/// Tag carried by the null pointer that means "nothing follows me yet".
///
/// An untagged null is never a valid link; seeing one is a bug.
const NO_SUCCESSOR_TAG: usize = 1;

/// The no-successor marker. Compared by identity, pointer and tag together.
#[inline]
fn no_successor<'g, T>() -> Shared<'g, Node<T>> {
    Shared::null().with_tag(NO_SUCCESSOR_TAG)
}

/// One cell of the list.
///
/// `value` is written once before the node is published and read at most once,
/// by the dequeuer whose CAS turns this node into the new dummy. `next` moves
/// exactly once, from the no-successor marker to a real node.
struct Node<T> {
    value: MaybeUninit<T>,
    next: Atomic<Node<T>>,
    #[cfg(test)]
    live: Option<std::sync::Arc<core::sync::atomic::AtomicUsize>>,
}

impl<T> Node<T> {
    fn dummy() -> Owned<Self> {
        Owned::new(Node {
            value: MaybeUninit::uninit(),
            next: Atomic::from(no_successor::<T>()),
            #[cfg(test)]
            live: None,
        })
    }

    fn new(value: T) -> Owned<Self> {
        Owned::new(Node {
            value: MaybeUninit::new(value),
            next: Atomic::from(no_successor::<T>()),
            #[cfg(test)]
            live: None,
        })
    }
}

#[cfg(test)]
impl<T> Drop for Node<T> {
    fn drop(&mut self) {
        if let Some(live) = &self.live {
            live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// A decoded `next` field.
enum Link<'g, T> {
    NoSuccessor,
    Pointer(Shared<'g, Node<T>>),
}

impl<'g, T> Link<'g, T> {
    #[inline]
    fn load(next: &Atomic<Node<T>>, guard: &'g Guard) -> Self {
        let raw = next.load(Ordering::Acquire, guard);
        if raw == no_successor() {
            Link::NoSuccessor
        } else {
            debug_assert!(!raw.is_null(), "unset link observed in a published node");
            Link::Pointer(raw)
        }
    }
}

/// An unbounded, lock-free, multi-producer multi-consumer FIFO queue.
///
/// [`enqueue`](Self::enqueue) never blocks and never fails.
/// [`dequeue`](Self::dequeue) waits for an element using the queue's
/// [`WaitStrategy`] (a busy spin by default) and never parks on a lock.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
/// use unbounded_channel::UnboundedChannel;
///
/// let channel = Arc::new(UnboundedChannel::new());
///
/// let producer = {
///     let channel = Arc::clone(&channel);
///     thread::spawn(move || {
///         for i in 0..3 {
///             channel.enqueue(i);
///         }
///     })
/// };
///
/// assert_eq!(channel.dequeue(), 0);
/// assert_eq!(channel.dequeue(), 1);
/// assert_eq!(channel.dequeue(), 2);
/// producer.join().unwrap();
/// ```
pub struct UnboundedChannel<T, W = BusySpin> {
    head: CachePadded<Atomic<Node<T>>>,
    tail: CachePadded<Atomic<Node<T>>>,
    wait: W,
    /// Nodes allocated by this queue and not yet destroyed.
    #[cfg(test)]
    live_nodes: std::sync::Arc<core::sync::atomic::AtomicUsize>,
    _marker: PhantomData<T>,
}

// SAFETY: payloads move between threads by value and are never shared, so
// `T: Send` is enough. Nodes are only touched through atomics and the epoch
// collector.
unsafe impl<T: Send, W: Send> Send for UnboundedChannel<T, W> {}
// SAFETY: see above; `W` is only ever used through `&W`.
unsafe impl<T: Send, W: Sync> Sync for UnboundedChannel<T, W> {}

impl<T> UnboundedChannel<T> {
    /// Creates an empty queue that busy-spins in [`dequeue`](Self::dequeue).
    pub fn new() -> Self {
        Self::with_wait_strategy(BusySpin)
    }
}

impl<T> Default for UnboundedChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, W: WaitStrategy> UnboundedChannel<T, W> {
    /// Creates an empty queue that waits on emptiness using `wait`.
    pub fn with_wait_strategy(wait: W) -> Self {
        let channel = UnboundedChannel {
            head: CachePadded::new(Atomic::null()),
            tail: CachePadded::new(Atomic::null()),
            wait,
            #[cfg(test)]
            live_nodes: Default::default(),
            _marker: PhantomData,
        };
        // SAFETY: the queue is not shared yet.
        unsafe {
            let dummy = channel.track(Node::dummy()).into_shared(reclaim::unprotected());
            channel.head.store(dummy, Ordering::Relaxed);
            channel.tail.store(dummy, Ordering::Relaxed);
        }
        debug!("created unbounded channel");
        channel
    }

    #[cfg(not(test))]
    #[inline]
    fn track(&self, node: Owned<Node<T>>) -> Owned<Node<T>> {
        node
    }

    #[cfg(test)]
    fn track(&self, mut node: Owned<Node<T>>) -> Owned<Node<T>> {
        self.live_nodes.fetch_add(1, Ordering::SeqCst);
        node.live = Some(self.live_nodes.clone());
        node
    }

    /// Returns the strategy used while waiting on an empty queue.
    pub fn wait_strategy(&self) -> &W {
        &self.wait
    }

    /// Appends `value` at the tail. Never blocks, never fails.
    pub fn enqueue(&self, value: T) {
        let guard = &reclaim::pin();
        let node = self.track(Node::new(value)).into_shared(guard);

        loop {
            let tail = self.tail.load(Ordering::Acquire, guard);
            // SAFETY: `tail` is never null once constructed, and the guard
            // keeps it alive even if it has since been detached.
            let tail_ref = unsafe { tail.deref() };
            let next = Link::load(&tail_ref.next, guard);

            if tail != self.tail.load(Ordering::Acquire, guard) {
                continue;
            }

            match next {
                Link::NoSuccessor => {
                    if tail_ref
                        .next
                        .compare_exchange(
                            no_successor(),
                            node,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                            guard,
                        )
                        .is_ok()
                    {
                        // Best effort: losing means someone already helped.
                        let _ = self.tail.compare_exchange(
                            tail,
                            node,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                            guard,
                        );
                        return;
                    }
                }
                Link::Pointer(next) => {
                    trace!("enqueue: tail lags, advancing");
                    let _ = self.tail.compare_exchange(
                        tail,
                        next,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                        guard,
                    );
                }
            }
        }
    }

    /// Removes and returns the head element, waiting until one exists.
    ///
    /// Never parks on a lock; see [`WaitStrategy`] for what happens between
    /// attempts while the queue is empty.
    pub fn dequeue(&self) -> T {
        let mut waiter = self.wait.waiter();
        loop {
            if let Some(value) = self.try_dequeue() {
                return value;
            }
            waiter.wait();
        }
    }

    /// Removes and returns the head element, or `None` if the queue was
    /// observed empty.
    ///
    /// Contention is retried internally; `None` is only returned for a
    /// genuinely empty snapshot.
    pub fn try_dequeue(&self) -> Option<T> {
        let guard = &reclaim::pin();
        // SAFETY: the guard is held for the whole call.
        unsafe { self.pop(guard) }
    }

    /// Returns `true` if the queue was empty at the moment of the check.
    pub fn is_empty(&self) -> bool {
        let guard = &reclaim::pin();
        let head = self.head.load(Ordering::Acquire, guard);
        // SAFETY: `head` is never null and the guard keeps it alive.
        let head_ref = unsafe { head.deref() };
        matches!(Link::load(&head_ref.next, guard), Link::NoSuccessor)
    }

    /// One dequeue under `guard`, retrying until it either takes an element
    /// or sees a genuinely empty queue.
    ///
    /// # Safety
    ///
    /// `guard` must pin this thread, or the caller must have exclusive access.
    unsafe fn pop(&self, guard: &Guard) -> Option<T> {
        loop {
            let head = self.head.load(Ordering::Acquire, guard);
            let tail = self.tail.load(Ordering::Acquire, guard);
            // SAFETY: `head` is never null and the guard keeps it alive.
            let first = Link::load(unsafe { &head.deref().next }, guard);

            if head != self.head.load(Ordering::Acquire, guard) {
                continue;
            }

            if head == tail {
                match first {
                    Link::NoSuccessor => return None,
                    Link::Pointer(first) => {
                        trace!("dequeue: tail lags, advancing");
                        let _ = self.tail.compare_exchange(
                            tail,
                            first,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                            guard,
                        );
                    }
                }
                continue;
            }

            // `tail` is ahead of an unchanged `head`, so `head.next` is set.
            let Link::Pointer(first) = first else {
                debug_assert!(false, "head behind tail without a successor");
                continue;
            };
            if self
                .head
                .compare_exchange(head, first, Ordering::AcqRel, Ordering::Acquire, guard)
                .is_ok()
            {
                // SAFETY: winning the CAS made `first` the new dummy, so its
                // payload is ours alone and is never read again. The old
                // dummy is unreachable for anyone who pins from now on.
                unsafe {
                    let value = ptr::read(first.deref().value.as_ptr());
                    reclaim::retire(guard, head);
                    return Some(value);
                }
            }
        }
    }
}

impl<T, W> Drop for UnboundedChannel<T, W> {
    #[cfg_attr(not(feature = "tracing"), allow(unused_variables, unused_assignments))]
    fn drop(&mut self) {
        // SAFETY: `&mut self` gives exclusive access to every node. Each node
        // after the dummy still owns its payload.
        unsafe {
            let guard = reclaim::unprotected();
            let mut drained = 0usize;
            let mut node = self.head.load(Ordering::Relaxed, guard);
            let mut is_dummy = true;
            loop {
                let next = node.deref().next.load(Ordering::Relaxed, guard);
                if !is_dummy {
                    ptr::drop_in_place(node.deref_mut().value.as_mut_ptr());
                    drained += 1;
                }
                reclaim::reclaim_now(node);
                if next == no_successor() {
                    break;
                }
                node = next;
                is_dummy = false;
            }
            debug!(drained, "dropped unbounded channel");
        }
    }
}

impl<T, W: fmt::Debug> fmt::Debug for UnboundedChannel<T, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnboundedChannel")
            .field("wait", &self.wait)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
impl<T, W: WaitStrategy> UnboundedChannel<T, W> {
    /// Links `value` after the current tail without swinging `tail`, leaving
    /// the queue exactly as an enqueuer stalled between its two CASes would.
    fn link_without_advancing(&self, value: T) {
        let guard = &reclaim::pin();
        let node = self.track(Node::new(value)).into_shared(guard);
        loop {
            let tail = self.tail.load(Ordering::Acquire, guard);
            let tail_ref = unsafe { tail.deref() };
            match Link::load(&tail_ref.next, guard) {
                Link::NoSuccessor => {
                    if tail_ref
                        .next
                        .compare_exchange(
                            no_successor(),
                            node,
                            Ordering::AcqRel,
                            Ordering::Acquire,
                            guard,
                        )
                        .is_ok()
                    {
                        return;
                    }
                }
                Link::Pointer(next) => {
                    let _ = self.tail.compare_exchange(
                        tail,
                        next,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                        guard,
                    );
                }
            }
        }
    }

    fn head_is_tail(&self) -> bool {
        let guard = &reclaim::pin();
        self.head.load(Ordering::Acquire, guard) == self.tail.load(Ordering::Acquire, guard)
    }

    fn live_nodes(&self) -> std::sync::Arc<core::sync::atomic::AtomicUsize> {
        self.live_nodes.clone()
    }

    fn tail_lags(&self) -> bool {
        let guard = &reclaim::pin();
        let tail = self.tail.load(Ordering::Acquire, guard);
        matches!(
            Link::load(unsafe { &tail.deref().next }, guard),
            Link::Pointer(_)
        )
    }
}
