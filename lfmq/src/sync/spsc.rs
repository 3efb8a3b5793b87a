//! Lock-free SPSC queue for in-process (inter-thread) communication.
//!
//! A wait-free bounded queue over a fixed array of `N` slots with two atomic
//! indices. One slot is always kept free, so at most `N - 1` elements fit.
//!
//! # Overview
//!
//! - [`Queue`] - The storage. Owns all `N` slots, pre-filled with `T::default()`
//! - [`Producer`] - Write end (single producer per queue)
//! - [`Consumer`] - Read end (single consumer per queue)
//! - Lock-free, wait-free: no mutexes, syscalls or allocation in the hot path
//!
//! Handles come in pairs, either heap-backed via [`channel`] or borrowed from a
//! [`Queue`] via [`Queue::split`]. A full queue hands the value back from
//! [`Producer::push`] and an empty one yields `None`; what to do then (drop,
//! retry, back off) is up to the caller.
//!
//! # Example
//!
//! ```
//! use lfmq::sync::spsc;
//!
//! let (producer, mut consumer) = spsc::channel::<u64, 4>();
//!
//! // Producer thread
//! producer.push(1).expect("Queue full");
//! producer.push(2).expect("Queue full");
//! producer.push(3).expect("Queue full");
//! assert_eq!(producer.push(4), Err(4));
//!
//! // Consumer thread
//! assert_eq!(consumer.pop(), Some(1));
//! ```
//!
//! Capacities of two or less are rejected at compile time:
//!
//! ```compile_fail
//! let (_tx, _rx) = lfmq::sync::spsc::channel::<u64, 2>();
//! ```

use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

use crate::spsc::ring::Ring;
use crate::trace::debug;

struct CapacityCheck<const N: usize>;

impl<const N: usize> CapacityCheck<N> {
    /// Compile-time assertion that the ring can tell full from empty.
    const OK: () = assert!(N > 2, "Queue capacity must be greater than 2");
}

/// Fixed-capacity SPSC ring buffer storage.
///
/// The queue itself exposes only read-only queries. Pushing and popping go
/// through the [`Producer`] and [`Consumer`] handles obtained from
/// [`Queue::split`] (borrowed) or [`channel`] (shared through an `Arc`).
///
/// The slot array is stored inline, so a `Queue<T, N>` is roughly
/// `N * size_of::<T>()` bytes.
pub struct Queue<T, const N: usize> {
    ring: Ring<T, N>,
}

impl<T: Default, const N: usize> Queue<T, N> {
    /// Creates a queue with every slot set to `T::default()`.
    ///
    /// The queue is built by value, so the whole slot array passes through the
    /// stack. Use [`Queue::boxed`] for large queues.
    ///
    /// Fails to compile if `N <= 2`.
    #[must_use]
    pub fn new() -> Self {
        let () = CapacityCheck::<N>::OK;

        Self { ring: Ring::new() }
    }

    /// Creates a queue directly on the heap.
    ///
    /// Slots are initialized in place, so stack usage does not grow with `N`.
    ///
    /// Fails to compile if `N <= 2`.
    #[must_use]
    pub fn boxed() -> Box<Self> {
        let () = CapacityCheck::<N>::OK;

        let mut queue = Box::<Self>::new_uninit();
        // SAFETY: the allocation is fresh, aligned and exclusively ours, and
        // `init_in_place` writes every field of the ring, which is the only
        // field of `Queue`.
        unsafe {
            Ring::init_in_place(&raw mut (*queue.as_mut_ptr()).ring);
            queue.assume_init()
        }
    }
}

impl<T: Default, const N: usize> Default for Queue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Queue<T, N> {
    /// Total number of slots (`N`).
    pub const CAPACITY: usize = N;

    /// Returns `N`, the number of slots.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Returns `N - 1`, the number of elements the queue can hold at once.
    #[inline]
    #[must_use]
    pub const fn usable_capacity(&self) -> usize {
        N - 1
    }

    /// Returns `true` if the read and write indices are equal.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Returns the number of queued elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Splits the queue into its producer and consumer handles.
    ///
    /// The exclusive borrow guarantees that only one pair is alive at a time.
    /// Elements left in the queue when the handles are dropped stay queued
    /// and are visible to the next pair.
    ///
    /// # Example
    ///
    /// ```
    /// use lfmq::sync::spsc::Queue;
    ///
    /// let mut queue = Queue::<u32, 8>::new();
    /// let (producer, mut consumer) = queue.split();
    ///
    /// std::thread::scope(|s| {
    ///     s.spawn(move || producer.push(7).unwrap());
    /// });
    /// assert_eq!(consumer.pop(), Some(7));
    /// ```
    pub fn split(&mut self) -> (Producer<T, N, &Self>, Consumer<T, N, &Self>) {
        debug!(
            capacity = N,
            slot_size = std::mem::size_of::<T>(),
            "spsc queue split"
        );

        let queue: &Self = self;
        (Producer::new(queue), Consumer::new(queue))
    }
}

impl<T, const N: usize> fmt::Debug for Queue<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("capacity", &N)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// Creates a new heap-backed SPSC channel with `N` slots.
///
/// Returns a `(Producer, Consumer)` pair. The producer and consumer can be
/// sent to different threads. This is the only allocation the queue performs,
/// and the slots are initialized directly in it (see [`Queue::boxed`]).
///
/// Fails to compile if `N <= 2`.
///
/// # Example
///
/// ```
/// use lfmq::sync::spsc;
///
/// let (tx, mut rx) = spsc::channel::<String, 16>();
///
/// tx.push("hello".to_string()).unwrap();
/// assert_eq!(rx.pop(), Some("hello".to_string()));
/// ```
#[must_use]
pub fn channel<T: Default + Send, const N: usize>() -> (Producer<T, N>, Consumer<T, N>) {
    let queue: Arc<Queue<T, N>> = Arc::from(Queue::boxed());

    debug!(
        capacity = N,
        slot_size = std::mem::size_of::<T>(),
        "spsc channel created"
    );

    (Producer::new(Arc::clone(&queue)), Consumer::new(queue))
}

/// Marker type to opt-out of `Sync` while remaining `Send`.
type PhantomUnsync = PhantomData<Cell<&'static ()>>;

/// Write end of the SPSC queue.
///
/// `Q` is the way the handle reaches its queue: `Arc<Queue>` for [`channel`],
/// `&Queue` for [`Queue::split`].
///
/// # Thread Safety
///
/// `Producer` is [`Send`] but **not** [`Sync`]:
/// - Can transfer ownership to another thread
/// - Cannot share `&Producer` (no concurrent `push()`)
pub struct Producer<T, const N: usize, Q = Arc<Queue<T, N>>>
where
    Q: Deref<Target = Queue<T, N>>,
{
    queue: Q,
    _unsync: PhantomUnsync,
}

impl<T, const N: usize, Q> Producer<T, N, Q>
where
    Q: Deref<Target = Queue<T, N>>,
{
    const fn new(queue: Q) -> Self {
        Self {
            queue,
            _unsync: PhantomData,
        }
    }

    /// Attempts to push an item onto the queue (wait-free).
    ///
    /// # Errors
    ///
    /// Returns `Err(item)` if the queue is full, allowing retry.
    #[inline]
    pub fn push(&self, item: T) -> Result<(), T> {
        // SAFETY: this handle is the only producer for the queue (one pair per
        // `channel`/`split`, and `Producer` is !Sync).
        unsafe { self.queue.ring.push(item) }
    }

    /// Returns `true` if a push would currently fail.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.queue.len() == N - 1
    }

    /// Returns `true` if the consumer has drained everything pushed so far.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns the number of queued elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `N`, the number of slots.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<T, const N: usize, Q> fmt::Debug for Producer<T, N, Q>
where
    Q: Deref<Target = Queue<T, N>>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("capacity", &N)
            .finish_non_exhaustive()
    }
}

/// Read end of the SPSC queue.
///
/// Operations that release a slot take `&mut self`, so a reference returned
/// by [`Consumer::front`] cannot be held across a pop.
/// See [`Producer`] for thread safety details (same semantics apply).
pub struct Consumer<T, const N: usize, Q = Arc<Queue<T, N>>>
where
    Q: Deref<Target = Queue<T, N>>,
{
    queue: Q,
    _unsync: PhantomUnsync,
}

impl<T, const N: usize, Q> Consumer<T, N, Q>
where
    Q: Deref<Target = Queue<T, N>>,
{
    const fn new(queue: Q) -> Self {
        Self {
            queue,
            _unsync: PhantomData,
        }
    }

    /// Attempts to pop an item from the queue (wait-free).
    ///
    /// The item is cloned out; the slot keeps its old value until the
    /// producer wraps around to it. Returns `None` if the queue is empty.
    #[inline]
    #[must_use]
    pub fn pop(&mut self) -> Option<T>
    where
        T: Clone,
    {
        // SAFETY: this handle is the only consumer for the queue.
        unsafe { self.queue.ring.consume(|slot| slot.clone()) }
    }

    /// Pops the oldest item into `out`.
    ///
    /// Returns `false` and leaves `out` untouched if the queue is empty.
    #[inline]
    pub fn pop_into(&mut self, out: &mut T) -> bool
    where
        T: Clone,
    {
        // SAFETY: this handle is the only consumer for the queue.
        unsafe { self.queue.ring.consume(|slot| out.clone_from(slot)) }.is_some()
    }

    /// Discards the oldest item without copying it out.
    ///
    /// Returns `false` if the queue is empty.
    #[inline]
    pub fn skip(&mut self) -> bool {
        // SAFETY: this handle is the only consumer for the queue.
        unsafe { self.queue.ring.consume(|_| ()) }.is_some()
    }

    /// Moves the oldest item out, leaving `T::default()` in its slot.
    #[inline]
    #[must_use]
    pub fn take(&mut self) -> Option<T>
    where
        T: Default,
    {
        // SAFETY: this handle is the only consumer for the queue.
        unsafe { self.queue.ring.consume(std::mem::take) }
    }

    /// Returns the oldest item without removing it.
    #[inline]
    #[must_use]
    pub fn front(&self) -> Option<&T> {
        // SAFETY: this handle is the only consumer for the queue. The returned
        // borrow ties up `self`, so `advance` cannot run while it is alive.
        unsafe {
            let index = self.queue.ring.peek_index()?;
            Some(self.queue.ring.slot(index))
        }
    }

    /// Returns the oldest item mutably without removing it.
    #[inline]
    #[must_use]
    pub fn front_mut(&mut self) -> Option<&mut T> {
        // SAFETY: see `front`; `&mut self` rules out any other slot borrow.
        unsafe {
            let index = self.queue.ring.peek_index()?;
            Some(self.queue.ring.slot_mut(index))
        }
    }

    /// Returns the slot at the read index without checking for emptiness.
    ///
    /// # Safety
    ///
    /// The queue must be non-empty (e.g. [`Consumer::is_empty`] returned
    /// `false` since the last pop). On an empty queue the read slot is the one
    /// the producer writes next, and reading it races with that write.
    #[inline]
    #[must_use]
    pub unsafe fn front_unchecked(&self) -> &T {
        let index = self
            .queue
            .ring
            .consumer
            .read
            .load(std::sync::atomic::Ordering::Relaxed);
        // SAFETY: non-emptiness is guaranteed by the caller, which makes the
        // slot consumer-owned until the next pop.
        unsafe { self.queue.ring.slot(index) }
    }

    /// Returns `true` if there is nothing to pop.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns the number of queued elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `N`, the number of slots.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<T, const N: usize, Q> fmt::Debug for Consumer<T, N, Q>
where
    Q: Deref<Target = Queue<T, N>>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("capacity", &N)
            .finish_non_exhaustive()
    }
}
