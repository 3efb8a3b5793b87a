//! Fixed-size, type-tagged message envelopes.
//!
//! A [`Message`] is a plain value: a [`MessageType`] tag, a 512-byte payload
//! buffer and the number of bytes in use. It is `Copy` and `Default`, which is
//! what [`Queue`](crate::sync::spsc::Queue) slots need.
//!
//! The payload is raw bytes. Reading it back with [`Message::payload`] is
//! unchecked: the caller must know, usually from the tag, which type was
//! stored. [`Command`] wraps this in a typed enum with one arm per tag and is
//! the safe way to build and read envelopes.
//!
//! # Example
//!
//! ```
//! use lfmq::Message;
//! use lfmq::message::MessageType;
//!
//! let msg = Message::new(MessageType::Volume, 0.5f32)?;
//! assert_eq!(msg.message_type(), MessageType::Volume);
//! assert_eq!(msg.payload_size(), 4);
//!
//! // SAFETY: the payload was written as an f32 above
//! let gain = unsafe { msg.payload::<f32>() };
//! assert_eq!(gain, 0.5);
//! # Ok::<(), lfmq::message::MessageError>(())
//! ```

pub mod command;
pub mod payload;
pub mod types;

use std::fmt;
use std::marker::PhantomData;
use std::mem::size_of;

use thiserror::Error;

pub use command::{Command, CommandError};
pub use payload::Payload;
pub use types::{InvalidMessageType, MessageMetadata, MessageType};

/// Maximum payload size in bytes.
pub const MAX_PAYLOAD_SIZE: usize = 512;

/// Errors returned when writing a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MessageError {
    /// A pointer-like payload was null.
    #[error("null pointer passed as payload")]
    NullPayload,
    /// The payload does not fit in the envelope.
    #[error("payload of {len} bytes exceeds the {cap}-byte envelope")]
    PayloadTooLarge { len: usize, cap: usize },
}

struct PayloadCheck<T>(PhantomData<T>);

impl<T: Payload> PayloadCheck<T> {
    /// Compile-time assertion that `T` fits in an envelope and has no padding.
    const OK: () = {
        assert!(
            size_of::<T>() <= MAX_PAYLOAD_SIZE,
            "Payload type does not fit in MAX_PAYLOAD_SIZE bytes"
        );
        assert!(T::__NO_PADDING, "Payload type has padding bytes");
    };
}

/// Views a payload value as its raw bytes.
fn payload_bytes_of<T: Payload>(value: &T) -> &[u8] {
    let () = PayloadCheck::<T>::OK;

    // SAFETY: `T` has no padding bytes (checked above for derived types and
    // required of manual impls), so all `size_of::<T>()` bytes behind `value`
    // are initialized.
    unsafe { std::slice::from_raw_parts((value as *const T).cast::<u8>(), size_of::<T>()) }
}

/// Type-tagged envelope with a fixed 512-byte payload buffer.
#[derive(Clone, Copy)]
#[repr(C)]
pub struct Message {
    metadata: MessageMetadata,
    payload: [u8; MAX_PAYLOAD_SIZE],
    payload_size: usize,
}

impl Message {
    /// Builds an envelope holding the raw bytes of `payload`.
    ///
    /// `T` must fit in [`MAX_PAYLOAD_SIZE`] bytes; larger types fail to compile.
    ///
    /// # Errors
    ///
    /// [`MessageError::NullPayload`] if `payload` is a null pointer-like value.
    pub fn new<T: Payload>(
        metadata: impl Into<MessageMetadata>,
        payload: T,
    ) -> Result<Self, MessageError> {
        let mut msg = Self::from(metadata.into());
        msg.set_payload(payload)?;
        Ok(msg)
    }

    /// Builds an envelope from a payload that can never be null.
    pub(crate) fn encode<T: Payload>(ty: MessageType, payload: &T) -> Self {
        let () = PayloadCheck::<T>::OK;

        let mut msg = Self::from(MessageMetadata::new(ty));
        let bytes = payload_bytes_of(payload);
        msg.payload[..bytes.len()].copy_from_slice(bytes);
        msg.payload_size = bytes.len();
        msg
    }

    #[inline]
    #[must_use]
    pub const fn metadata(&self) -> &MessageMetadata {
        &self.metadata
    }

    #[inline]
    pub fn set_metadata(&mut self, metadata: impl Into<MessageMetadata>) {
        self.metadata = metadata.into();
    }

    /// Shorthand for `self.metadata().message_type()`.
    #[inline]
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        self.metadata.message_type()
    }

    /// Replaces the payload with the raw bytes of `value`.
    ///
    /// # Errors
    ///
    /// [`MessageError::NullPayload`] if `value` is a null pointer-like value.
    /// The envelope is left unchanged on error.
    pub fn set_payload<T: Payload>(&mut self, value: T) -> Result<(), MessageError> {
        let () = PayloadCheck::<T>::OK;

        if value.is_null() {
            return Err(MessageError::NullPayload);
        }
        self.set_payload_bytes(payload_bytes_of(&value))
    }

    /// Replaces the payload with a copy of `bytes`.
    ///
    /// # Errors
    ///
    /// [`MessageError::PayloadTooLarge`] if `bytes` is longer than
    /// [`MAX_PAYLOAD_SIZE`]. The envelope is left unchanged on error.
    pub fn set_payload_bytes(&mut self, bytes: &[u8]) -> Result<(), MessageError> {
        if bytes.len() > MAX_PAYLOAD_SIZE {
            return Err(MessageError::PayloadTooLarge {
                len: bytes.len(),
                cap: MAX_PAYLOAD_SIZE,
            });
        }

        self.payload[..bytes.len()].copy_from_slice(bytes);
        self.payload_size = bytes.len();
        Ok(())
    }

    /// Replaces the payload with `len` bytes read from `data`.
    ///
    /// # Errors
    ///
    /// [`MessageError::NullPayload`] if `data` is null and
    /// [`MessageError::PayloadTooLarge`] if `len` exceeds [`MAX_PAYLOAD_SIZE`].
    /// The envelope is left unchanged on error.
    ///
    /// # Safety
    ///
    /// If non-null, `data` must be valid for reads of `len` initialized bytes.
    pub unsafe fn set_payload_raw(&mut self, data: *const u8, len: usize) -> Result<(), MessageError> {
        if data.is_null() {
            return Err(MessageError::NullPayload);
        }
        if len > MAX_PAYLOAD_SIZE {
            return Err(MessageError::PayloadTooLarge {
                len,
                cap: MAX_PAYLOAD_SIZE,
            });
        }

        // SAFETY: non-null, and readable for `len` bytes per the caller contract
        let bytes = unsafe { std::slice::from_raw_parts(data, len) };
        self.set_payload_bytes(bytes)
    }

    /// Marks the payload as empty. Old bytes stay in the buffer.
    #[inline]
    pub fn clear_payload(&mut self) {
        self.payload_size = 0;
    }

    /// Number of payload bytes in use.
    #[inline]
    #[must_use]
    pub const fn payload_size(&self) -> usize {
        self.payload_size
    }

    /// The payload bytes in use.
    #[inline]
    #[must_use]
    pub fn payload_bytes(&self) -> &[u8] {
        &self.payload[..self.payload_size]
    }

    /// The whole payload buffer, including stale bytes past [`Message::payload_size`].
    #[inline]
    #[must_use]
    pub const fn raw_payload(&self) -> &[u8; MAX_PAYLOAD_SIZE] {
        &self.payload
    }

    /// Reinterprets the payload buffer as a `T`.
    ///
    /// Nothing ties the tag to a payload type, and this method checks neither
    /// the tag nor the payload size. Prefer [`Command::try_from`] where possible.
    ///
    /// # Safety
    ///
    /// The payload must have been written from a `T` (or a type with an
    /// identical layout whose bytes are valid for `T`). Anything else produces
    /// garbage or an invalid value.
    #[inline]
    #[must_use]
    pub unsafe fn payload<T: Payload>(&self) -> T {
        let () = PayloadCheck::<T>::OK;

        // SAFETY: the buffer holds at least size_of::<T>() bytes (checked
        // above), the read is unaligned-tolerant, and validity of the bytes
        // as a `T` is the caller's obligation.
        unsafe { std::ptr::read_unaligned(self.payload.as_ptr().cast::<T>()) }
    }

    /// Exchanges tag, payload bytes and payload size with `other`.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(&mut self.metadata, &mut other.metadata);
        std::mem::swap(&mut self.payload, &mut other.payload);
        std::mem::swap(&mut self.payload_size, &mut other.payload_size);
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::from(MessageMetadata::default())
    }
}

/// An envelope with the given tag and an empty payload.
impl From<MessageMetadata> for Message {
    fn from(metadata: MessageMetadata) -> Self {
        Self {
            metadata,
            payload: [0; MAX_PAYLOAD_SIZE],
            payload_size: 0,
        }
    }
}

impl From<MessageType> for Message {
    fn from(ty: MessageType) -> Self {
        Self::from(MessageMetadata::new(ty))
    }
}

/// Stale bytes past the payload size don't take part in comparisons.
impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.metadata == other.metadata && self.payload_bytes() == other.payload_bytes()
    }
}

impl Eq for Message {}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("type", &self.message_type())
            .field("payload_size", &self.payload_size)
            .field("payload", &self.payload_bytes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Payload;

    #[derive(Payload, Debug, Clone, Copy, PartialEq)]
    #[repr(C)]
    struct Stereo {
        left: f32,
        right: f32,
        frames: u64,
    }

    #[derive(Payload, Debug, Clone, Copy, PartialEq)]
    #[repr(C)]
    struct Tagged<T: Payload> {
        tag: u8,
        value: T,
    }

    #[derive(Payload, Debug, Clone, Copy, PartialEq)]
    #[repr(C)]
    struct Both<T: Payload> {
        left: T,
        right: T,
    }

    #[test]
    fn test_generic_payload_padding_depends_on_parameter() {
        assert!(<Tagged<u8> as Payload>::__NO_PADDING);
        assert!(!<Tagged<u32> as Payload>::__NO_PADDING);
        assert!(!<[Tagged<u64>; 2] as Payload>::__NO_PADDING);
        assert!(!<Both<Tagged<u16>> as Payload>::__NO_PADDING);
        assert!(<Both<Tagged<u8>> as Payload>::__NO_PADDING);
    }

    #[test]
    fn test_generic_payload_roundtrip() {
        let pair = Both {
            left: 0.5f32,
            right: -0.5f32,
        };
        let msg = Message::new(MessageType::Volume, pair).unwrap();

        assert_eq!(msg.payload_size(), 8);
        assert_eq!(unsafe { msg.payload::<Both<f32>>() }, pair);
    }

    #[test]
    fn test_default_is_empty_unknown() {
        let msg = Message::default();
        assert_eq!(msg.message_type(), MessageType::Unknown);
        assert_eq!(msg.payload_size(), 0);
        assert!(msg.payload_bytes().is_empty());
        assert!(msg.raw_payload().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_volume_roundtrip_is_bit_identical() {
        let gain = -0.0f32;
        let msg = Message::new(MessageType::Volume, gain).unwrap();

        assert_eq!(msg.message_type(), MessageType::Volume);
        assert_eq!(msg.payload_size(), 4);
        let back = unsafe { msg.payload::<f32>() };
        assert_eq!(back.to_bits(), gain.to_bits());
    }

    #[test]
    fn test_struct_payload_roundtrip() {
        let stereo = Stereo {
            left: 0.25,
            right: 0.75,
            frames: 48_000,
        };
        let msg = Message::new(MessageType::Volume, stereo).unwrap();

        assert_eq!(msg.payload_size(), size_of::<Stereo>());
        assert_eq!(unsafe { msg.payload::<Stereo>() }, stereo);
    }

    #[test]
    fn test_full_size_payload() {
        let bytes = [0xabu8; MAX_PAYLOAD_SIZE];
        let msg = Message::new(MessageType::Resize, bytes).unwrap();

        assert_eq!(msg.payload_size(), MAX_PAYLOAD_SIZE);
        assert_eq!(msg.payload_bytes(), &bytes[..]);
    }

    #[test]
    fn test_null_pointer_construction_fails() {
        let null: *const Stereo = std::ptr::null();
        assert_eq!(
            Message::new(MessageType::EffectAdded, null),
            Err(MessageError::NullPayload)
        );
    }

    #[test]
    fn test_pointer_payload_roundtrip() {
        let stereo = Stereo {
            left: 1.0,
            right: 0.0,
            frames: 1,
        };
        let ptr: *const Stereo = &stereo;
        let msg = Message::new(MessageType::EffectAdded, ptr).unwrap();

        assert_eq!(msg.payload_size(), size_of::<*const Stereo>());
        let back = unsafe { msg.payload::<*const Stereo>() };
        assert_eq!(back, ptr);
        assert_eq!(unsafe { *back }, stereo);
    }

    #[test]
    fn test_null_set_payload_leaves_state_unchanged() {
        let mut msg = Message::new(MessageType::PlayAt, 1234u64).unwrap();
        let before = msg;

        assert_eq!(
            msg.set_payload(std::ptr::null_mut::<u8>()),
            Err(MessageError::NullPayload)
        );
        assert_eq!(
            msg.set_payload(None::<std::ptr::NonNull<u8>>),
            Err(MessageError::NullPayload)
        );
        assert_eq!(msg, before);
        assert_eq!(unsafe { msg.payload::<u64>() }, 1234);
    }

    #[test]
    fn test_set_payload_bytes_rejects_oversized() {
        let mut msg = Message::new(MessageType::Resize, 7u32).unwrap();
        let big = vec![1u8; MAX_PAYLOAD_SIZE + 1];

        assert_eq!(
            msg.set_payload_bytes(&big),
            Err(MessageError::PayloadTooLarge {
                len: MAX_PAYLOAD_SIZE + 1,
                cap: MAX_PAYLOAD_SIZE,
            })
        );
        assert_eq!(msg.payload_size(), 4);
        assert_eq!(unsafe { msg.payload::<u32>() }, 7);
    }

    #[test]
    fn test_set_payload_raw() {
        let mut msg = Message::default();
        let data = [1u8, 2, 3];

        assert_eq!(
            unsafe { msg.set_payload_raw(std::ptr::null(), 3) },
            Err(MessageError::NullPayload)
        );
        assert_eq!(
            unsafe { msg.set_payload_raw(data.as_ptr(), MAX_PAYLOAD_SIZE + 1) },
            Err(MessageError::PayloadTooLarge {
                len: MAX_PAYLOAD_SIZE + 1,
                cap: MAX_PAYLOAD_SIZE,
            })
        );
        assert_eq!(msg.payload_size(), 0);

        unsafe { msg.set_payload_raw(data.as_ptr(), data.len()) }.unwrap();
        assert_eq!(msg.payload_bytes(), &data);
    }

    #[test]
    fn test_shorter_payload_leaves_stale_bytes() {
        let mut msg = Message::new(MessageType::PlayAt, u64::MAX).unwrap();
        msg.set_payload(0u16).unwrap();

        assert_eq!(msg.payload_bytes(), &[0, 0]);
        assert_eq!(&msg.raw_payload()[2..8], &[0xff; 6]);

        msg.clear_payload();
        assert!(msg.payload_bytes().is_empty());
    }

    #[test]
    fn test_set_metadata() {
        let mut msg = Message::from(MessageType::Pause);
        assert_eq!(msg.message_type(), MessageType::Pause);

        msg.set_metadata(MessageType::Resume);
        assert_eq!(msg.metadata().message_type(), MessageType::Resume);
    }

    #[test]
    fn test_swap_exchanges_everything() {
        let mut a = Message::new(MessageType::Volume, 0.5f32).unwrap();
        let mut b = Message::new(MessageType::PlayAt, 96_000u64).unwrap();

        a.swap(&mut b);

        assert_eq!(a.message_type(), MessageType::PlayAt);
        assert_eq!(a.payload_size(), 8);
        assert_eq!(unsafe { a.payload::<u64>() }, 96_000);

        assert_eq!(b.message_type(), MessageType::Volume);
        assert_eq!(b.payload_size(), 4);
        assert_eq!(unsafe { b.payload::<f32>() }, 0.5);
    }

    #[test]
    fn test_equality_ignores_stale_bytes() {
        let mut a = Message::new(MessageType::Volume, u32::MAX).unwrap();
        a.set_payload(1u8).unwrap();
        let b = Message::new(MessageType::Volume, 1u8).unwrap();

        assert_ne!(a.raw_payload(), b.raw_payload());
        assert_eq!(a, b);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            MessageError::NullPayload.to_string(),
            "null pointer passed as payload"
        );
        assert_eq!(
            MessageError::PayloadTooLarge { len: 600, cap: 512 }.to_string(),
            "payload of 600 bytes exceeds the 512-byte envelope"
        );
    }
}
