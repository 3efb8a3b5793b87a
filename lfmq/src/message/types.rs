//! Message tags carried in every envelope.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of control message, used by the consumer to interpret the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    /// Unset or unrecognised message.
    #[default]
    Unknown = 0,
    /// Resume the audio stream.
    Resume = 1,
    /// Pause the audio stream.
    Pause = 2,
    /// Stop playback and shut down the processing thread.
    Stop = 3,
    /// Adjust the output volume.
    Volume = 4,
    /// A buffer shared with the processing thread was resized by the controller.
    Resize = 5,
    /// An effect was added to the chain.
    EffectAdded = 6,
    /// An effect was removed from the chain.
    EffectRemoved = 7,
    /// Enable an effect.
    EffectEnabled = 8,
    /// Disable an effect.
    EffectDisabled = 9,
    /// Begin playing at a specific frame.
    PlayAt = 10,
}

impl MessageType {
    /// Every tag, in discriminant order.
    pub const ALL: [Self; 11] = [
        Self::Unknown,
        Self::Resume,
        Self::Pause,
        Self::Stop,
        Self::Volume,
        Self::Resize,
        Self::EffectAdded,
        Self::EffectRemoved,
        Self::EffectEnabled,
        Self::EffectDisabled,
        Self::PlayAt,
    ];

    /// Lowercase name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Resume => "resume",
            Self::Pause => "pause",
            Self::Stop => "stop",
            Self::Volume => "volume",
            Self::Resize => "resize",
            Self::EffectAdded => "effect_added",
            Self::EffectRemoved => "effect_removed",
            Self::EffectEnabled => "effect_enabled",
            Self::EffectDisabled => "effect_disabled",
            Self::PlayAt => "play_at",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A byte that is not a valid [`MessageType`] discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid message type discriminant {0}")]
pub struct InvalidMessageType(pub u8);

impl TryFrom<u8> for MessageType {
    type Error = InvalidMessageType;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(InvalidMessageType(value))
    }
}

impl From<MessageType> for u8 {
    fn from(ty: MessageType) -> Self {
        ty as u8
    }
}

/// Envelope header. Currently just the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(C)]
pub struct MessageMetadata {
    ty: MessageType,
}

impl MessageMetadata {
    #[must_use]
    pub const fn new(ty: MessageType) -> Self {
        Self { ty }
    }

    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        self.ty
    }

    pub fn set_type(&mut self, ty: MessageType) {
        self.ty = ty;
    }
}

impl From<MessageType> for MessageMetadata {
    fn from(ty: MessageType) -> Self {
        Self::new(ty)
    }
}
