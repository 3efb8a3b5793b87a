//! Types whose raw bytes may travel inside a [`Message`](super::Message).
//!
//! The trait is implemented for primitives, arrays of payloads and pointer-like
//! types. For custom types, use the `#[derive(Payload)]` macro:
//!
//! ```
//! use lfmq::Payload;
//!
//! #[derive(Payload, Clone, Copy)]
//! #[repr(C)]
//! struct Pan {
//!     channel: u32,
//!     position: f32,
//! }
//! ```
//!
//! The derive macro checks at compile time:
//! - `#[repr(C)]` or `#[repr(transparent)]` is present (integer repr for fieldless enums)
//! - No references, heap, reference-counted or lock types
//! - All fields implement `Payload`
//! - The type fits in [`MAX_PAYLOAD_SIZE`](super::MAX_PAYLOAD_SIZE) bytes and has no padding

use std::ptr::NonNull;

/// Plain-data types that can be copied byte-for-byte into an envelope.
///
/// # Safety
///
/// Implementers must ensure:
/// - **No padding**: every byte of the value is initialized, so viewing it as
///   `[u8; size_of::<Self>()]` is sound
/// - **No ownership**: the value owns no resources (guaranteed by `Copy`), so a
///   byte copy is a complete copy
/// - **Stable layout**: `#[repr(C)]`, `#[repr(transparent)]` or a primitive
///
/// Reading bytes back as `Self` is a separate, caller-checked step (see
/// [`Message::payload`](super::Message::payload)): this trait does not
/// promise that every bit pattern is a valid `Self`.
///
/// ```compile_fail
/// use lfmq::Message;
/// use lfmq::message::MessageType;
///
/// // Oversized payloads are rejected when the call is monomorphized.
/// let _ = Message::new(MessageType::Resize, [0u8; 513]);
/// ```
pub unsafe trait Payload: Copy + 'static {
    /// `true` when every byte of `Self` belongs to a field.
    ///
    /// Generated by `#[derive(Payload)]` and checked wherever a payload is
    /// written, so generic payloads are checked once their parameters are
    /// known.
    #[doc(hidden)]
    const __NO_PADDING: bool = true;

    /// Returns `true` if this is a pointer-like value holding null.
    ///
    /// A null payload is the one construction error a size check can't catch.
    #[inline]
    fn is_null(&self) -> bool {
        false
    }
}

// Manual implementations for primitives
macro_rules! impl_payload {
    ($($t:ty),* $(,)?) => {
        $(
            // SAFETY: primitive with no padding and no ownership
            unsafe impl Payload for $t {}
        )*
    };
}

impl_payload! {
    // Signed integers
    i8, i16, i32, i64, i128, isize,

    // Unsigned integers
    u8, u16, u32, u64, u128, usize,

    // Floats
    f32, f64,

    // Others
    bool, char, (),
}

// SAFETY: arrays have no padding between elements (size is a multiple of align)
unsafe impl<T: Payload, const N: usize> Payload for [T; N] {
    const __NO_PADDING: bool = T::__NO_PADDING;
}

// SAFETY: a thin pointer is a single address-sized integer
unsafe impl<T: 'static> Payload for *const T {
    #[inline]
    fn is_null(&self) -> bool {
        <*const T>::is_null(*self)
    }
}

// SAFETY: a thin pointer is a single address-sized integer
unsafe impl<T: 'static> Payload for *mut T {
    #[inline]
    fn is_null(&self) -> bool {
        <*mut T>::is_null(*self)
    }
}

// SAFETY: NonNull<T> is repr(transparent) over a thin pointer
unsafe impl<T: 'static> Payload for NonNull<T> {}

// SAFETY: Option<NonNull<T>> has the same layout as *mut T (null niche)
unsafe impl<T: 'static> Payload for Option<NonNull<T>> {
    #[inline]
    fn is_null(&self) -> bool {
        self.is_none()
    }
}
