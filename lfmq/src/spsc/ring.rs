//! Core lock-free SPSC ring buffer algorithm.
//!
//! Both indices live in `[0, N)` and one slot is always left unused, so the
//! queue is empty when `read == write` and full when `bump(write) == read`.
//! No element counter is shared between the two sides.
//!
//! # Safety
//!
//! The types in this module have unsafe APIs because they require the caller to
//! uphold the SPSC invariant: exactly one producer and one consumer, with no
//! concurrent access to either role. [`crate::sync::spsc`] wraps them in
//! handles that enforce this through the type system.

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Role marker: Fields with this role are owned exclusively by the producer.
pub struct ProducerRole;

/// Role marker: Fields with this role are owned exclusively by the consumer.
pub struct ConsumerRole;

/// Role marker: Buffer slots whose ownership transfers via the SPSC protocol.
pub struct SlotRole;

/// Interior-mutable cell with a role marker for nominal type safety.
///
/// The `Role` doesn't affect runtime behavior. It only makes the producer's
/// cache, the consumer's cache and the slots distinct types.
#[repr(transparent)]
pub struct SpscCell<T, Role>(UnsafeCell<T>, PhantomData<Role>);

impl<T, Role> SpscCell<T, Role> {
    pub const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value), PhantomData)
    }

    pub const fn get(&self) -> *mut T {
        self.0.get()
    }
}

// SAFETY: each slot is either being written (by producer) or read (by
// consumer), never both. The atomic read/write indices with Release/Acquire
// ordering provide the synchronization barrier between the two.
unsafe impl<T: Send, Role> Sync for SpscCell<T, Role> {}
unsafe impl<T: Send, Role> Send for SpscCell<T, Role> {}

/// Cache cell owned exclusively by the producer.
pub type ProducerCache<T> = SpscCell<T, ProducerRole>;

/// Cache cell owned exclusively by the consumer.
pub type ConsumerCache<T> = SpscCell<T, ConsumerRole>;

/// Buffer slot cell with ownership governed by the SPSC protocol.
pub type SlotCell<T> = SpscCell<T, SlotRole>;

/// Producer-side state: write index and cached read index.
#[repr(C)]
#[repr(align(64))]
pub struct ProducerState {
    /// Next slot to write to, in `[0, N)`.
    /// Owned by producer, read by consumer.
    pub write: AtomicUsize,

    /// Last read index observed by the producer.
    pub cached_read: ProducerCache<usize>,
}

impl ProducerState {
    pub const fn new() -> Self {
        Self {
            write: AtomicUsize::new(0),
            cached_read: ProducerCache::new(0),
        }
    }
}

impl Default for ProducerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer-side state: read index and cached write index.
#[repr(C)]
#[repr(align(64))]
pub struct ConsumerState {
    /// Next slot to read from, in `[0, N)`.
    /// Owned by consumer, read by producer.
    pub read: AtomicUsize,

    /// Last write index observed by the consumer.
    pub cached_write: ConsumerCache<usize>,
}

impl ConsumerState {
    pub const fn new() -> Self {
        Self {
            read: AtomicUsize::new(0),
            cached_write: ConsumerCache::new(0),
        }
    }
}

impl Default for ConsumerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed arena of `N` slots plus the two role-partitioned index blocks.
///
/// Slots always hold a live `T`. They start as `T::default()` and are
/// overwritten in place by `push`; a popped value stays in its slot until the
/// producer wraps around to it again.
#[repr(C)]
pub struct Ring<T, const N: usize> {
    pub producer: ProducerState,
    pub consumer: ConsumerState,
    pub buffer: [SlotCell<T>; N],
}

impl<T: Default, const N: usize> Ring<T, N> {
    pub fn new() -> Self {
        Self {
            producer: ProducerState::new(),
            consumer: ConsumerState::new(),
            buffer: std::array::from_fn(|_| SlotCell::new(T::default())),
        }
    }

    /// Initializes a ring in place, one slot at a time.
    ///
    /// Large rings never exist as a whole on the stack this way.
    ///
    /// # Safety
    ///
    /// `dst` must be valid for writes and properly aligned. Any previous
    /// contents are overwritten without being dropped.
    pub unsafe fn init_in_place(dst: *mut Self) {
        // SAFETY: `dst` is valid and aligned per the caller contract, so each
        // field pointer is too, and `[SlotCell<T>; N]` is `N` contiguous cells.
        unsafe {
            (&raw mut (*dst).producer).write(ProducerState::new());
            (&raw mut (*dst).consumer).write(ConsumerState::new());

            let slots = (&raw mut (*dst).buffer).cast::<SlotCell<T>>();
            for i in 0..N {
                slots.add(i).write(SlotCell::new(T::default()));
            }
        }
    }
}

impl<T, const N: usize> Ring<T, N> {
    /// Advances a cursor to the next slot index, wrapping to 0 at capacity.
    ///
    /// This is equivalent to `(cursor + 1) % N` but avoids the division instruction,
    /// using a comparison and conditional move instead.
    #[inline]
    pub const fn bump_cursor(cursor: usize) -> usize {
        let next = cursor + 1;
        if next == N { 0 } else { next }
    }

    /// Number of occupied slots for a given pair of indices.
    #[inline]
    pub const fn distance(read: usize, write: usize) -> usize {
        if write >= read { write - read } else { N - read + write }
    }

    /// Attempts to push an item onto the queue.
    ///
    /// # Safety
    ///
    /// Caller must ensure only one thread calls producer methods.
    #[inline]
    pub unsafe fn push(&self, item: T) -> Result<(), T> {
        // Only the producer stores `write`, relaxed is fine
        let write = self.producer.write.load(Ordering::Relaxed);
        let next = Self::bump_cursor(write);

        // SAFETY: Producer has exclusive access to cached_read
        let mut cached_read = unsafe { *self.producer.cached_read.get() };

        if next == cached_read {
            // Acquire pairs with the consumer's Release in `advance`: the
            // consumer is done with the slot before we may overwrite it.
            cached_read = self.consumer.read.load(Ordering::Acquire);
            // SAFETY: Producer has exclusive write access to its cached_read field
            unsafe {
                *self.producer.cached_read.get() = cached_read;
            }

            if next == cached_read {
                return Err(item); // Queue is full
            }
        }

        // SAFETY: The producer owns the slot at `write` because:
        // - `write` hasn't been published yet (store happens after this write)
        // - `next != read`, so the consumer is not looking at this slot
        // - `write` is in [0, N) since it only ever moves through bump_cursor
        unsafe {
            *self.buffer[write].get() = item;
        }

        // Publish (release to sync with consumer)
        self.producer.write.store(next, Ordering::Release);

        Ok(())
    }

    /// Returns the index of the oldest element, or `None` if the queue is empty.
    ///
    /// # Safety
    ///
    /// Caller must ensure only one thread calls consumer methods.
    #[inline]
    pub unsafe fn peek_index(&self) -> Option<usize> {
        // Only the consumer stores `read`, relaxed is fine
        let read = self.consumer.read.load(Ordering::Relaxed);

        // SAFETY: Consumer has exclusive access to cached_write
        let mut cached_write = unsafe { *self.consumer.cached_write.get() };

        if cached_write == read {
            // Acquire pairs with the producer's Release in `push`: the
            // element write happens-before our read of the slot.
            cached_write = self.producer.write.load(Ordering::Acquire);
            // SAFETY: Consumer has exclusive write access to its cached_write field
            unsafe {
                *self.consumer.cached_write.get() = cached_write;
            }

            if cached_write == read {
                return None; // Queue is empty
            }
        }

        Some(read)
    }

    /// Shared reference to the slot at `index`.
    ///
    /// # Safety
    ///
    /// `index` must come from [`Ring::peek_index`] on the consumer thread and
    /// the reference must be dropped before [`Ring::advance`] is called.
    #[inline]
    pub unsafe fn slot(&self, index: usize) -> &T {
        // SAFETY: guaranteed by the caller, see above
        unsafe { &*self.buffer[index].get() }
    }

    /// Mutable reference to the slot at `index`.
    ///
    /// # Safety
    ///
    /// Same as [`Ring::slot`], and no other reference to the slot may exist.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn slot_mut(&self, index: usize) -> &mut T {
        // SAFETY: guaranteed by the caller, see above
        unsafe { &mut *self.buffer[index].get() }
    }

    /// Releases the slot at `index` back to the producer.
    ///
    /// # Safety
    ///
    /// `index` must be the current read index returned by
    /// [`Ring::peek_index`], and no reference into the slot may outlive this call.
    #[inline]
    pub unsafe fn advance(&self, index: usize) {
        // Publish the new read index (release to sync with producer)
        self.consumer
            .read
            .store(Self::bump_cursor(index), Ordering::Release);
    }

    /// Runs `f` on the oldest element and then releases its slot.
    ///
    /// # Safety
    ///
    /// Caller must ensure only one thread calls consumer methods.
    #[inline]
    pub unsafe fn consume<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        // SAFETY: forwarded consumer exclusivity
        let index = unsafe { self.peek_index() }?;

        // SAFETY: The consumer owns the slot at `index` because:
        // - `index != write`, so the producer has published it
        // - `read` hasn't advanced yet, so the producer won't overwrite it
        // - the reference is confined to `f` and dropped before `advance`
        let out = f(unsafe { self.slot_mut(index) });

        // SAFETY: `index` is the read index we just consumed
        unsafe { self.advance(index) };

        Some(out)
    }

    /// Snapshot check for emptiness, callable from either side.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.consumer.read.load(Ordering::Acquire) == self.producer.write.load(Ordering::Acquire)
    }

    /// Snapshot of the number of queued elements, callable from either side.
    #[inline]
    pub fn len(&self) -> usize {
        let read = self.consumer.read.load(Ordering::Acquire);
        let write = self.producer.write.load(Ordering::Acquire);
        Self::distance(read, write)
    }
}

// SAFETY: Ring is Send because all fields are Send (AtomicUsize, SpscCell).
unsafe impl<T: Send, const N: usize> Send for Ring<T, N> {}

// SAFETY: Ring is Sync because concurrent access is mediated by atomics:
// - read/write are AtomicUsize with Release/Acquire ordering
// - Buffer slots are protected by the SPSC invariant (see SpscCell)
unsafe impl<T: Send, const N: usize> Sync for Ring<T, N> {}
