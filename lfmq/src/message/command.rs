//! Typed control commands.
//!
//! [`Command`] carries one strongly-typed payload per [`MessageType`], so the
//! consumer never has to guess which type the envelope bytes hold. Commands
//! convert into envelopes for the queue and back out on the processing thread:
//!
//! ```
//! use lfmq::message::command::{Command, Volume};
//! use lfmq::Message;
//!
//! let msg = Message::from(Command::Volume(Volume { gain: 0.8 }));
//! assert_eq!(Command::try_from(&msg), Ok(Command::Volume(Volume { gain: 0.8 })));
//! ```
//!
//! Every payload struct here is built from integers and floats only, so any
//! bytes of the right length decode to a valid value.

use std::mem::size_of;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Message, MessageType};
use crate::Payload;
use crate::trace::debug;

/// Output gain change.
#[derive(Payload, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct Volume {
    /// Linear gain (0.0 = silent, 1.0 = unity).
    pub gain: f32,
}

/// A controller-owned buffer was resized.
#[derive(Payload, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(C)]
pub struct Resize {
    /// Which buffer changed.
    pub buffer: u32,
    /// New length in frames.
    pub frames: u32,
}

/// Identifies an effect in the processing chain.
#[derive(Payload, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct EffectId(pub u32);

/// Start playback at a frame index.
#[derive(Payload, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(C)]
pub struct PlayAt {
    pub frame: u64,
}

/// A control command with its typed payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Resume,
    Pause,
    Stop,
    Volume(Volume),
    Resize(Resize),
    EffectAdded(EffectId),
    EffectRemoved(EffectId),
    EffectEnabled(EffectId),
    EffectDisabled(EffectId),
    PlayAt(PlayAt),
}

impl Command {
    /// The envelope tag this command travels under.
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::Resume => MessageType::Resume,
            Self::Pause => MessageType::Pause,
            Self::Stop => MessageType::Stop,
            Self::Volume(_) => MessageType::Volume,
            Self::Resize(_) => MessageType::Resize,
            Self::EffectAdded(_) => MessageType::EffectAdded,
            Self::EffectRemoved(_) => MessageType::EffectRemoved,
            Self::EffectEnabled(_) => MessageType::EffectEnabled,
            Self::EffectDisabled(_) => MessageType::EffectDisabled,
            Self::PlayAt(_) => MessageType::PlayAt,
        }
    }
}

/// Why an envelope could not be read as a [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The envelope is tagged [`MessageType::Unknown`].
    #[error("message has no type")]
    UnknownType,
    /// The payload length doesn't match the tag's payload type.
    #[error("{ty} payload must be {expected} bytes, got {actual}")]
    PayloadSize {
        ty: MessageType,
        expected: usize,
        actual: usize,
    },
}

impl From<Command> for Message {
    fn from(cmd: Command) -> Self {
        let ty = cmd.message_type();
        match cmd {
            Command::Resume | Command::Pause | Command::Stop => Self::from(ty),
            Command::Volume(v) => Self::encode(ty, &v),
            Command::Resize(r) => Self::encode(ty, &r),
            Command::EffectAdded(id)
            | Command::EffectRemoved(id)
            | Command::EffectEnabled(id)
            | Command::EffectDisabled(id) => Self::encode(ty, &id),
            Command::PlayAt(p) => Self::encode(ty, &p),
        }
    }
}

impl TryFrom<&Message> for Command {
    type Error = CommandError;

    fn try_from(msg: &Message) -> Result<Self, Self::Error> {
        let ty = msg.message_type();
        let cmd = match ty {
            MessageType::Unknown => return Err(CommandError::UnknownType),
            // Signals carry no payload; whatever is there is ignored.
            MessageType::Resume => Self::Resume,
            MessageType::Pause => Self::Pause,
            MessageType::Stop => Self::Stop,
            MessageType::Volume => Self::Volume(decode(msg)?),
            MessageType::Resize => Self::Resize(decode(msg)?),
            MessageType::EffectAdded => Self::EffectAdded(decode(msg)?),
            MessageType::EffectRemoved => Self::EffectRemoved(decode(msg)?),
            MessageType::EffectEnabled => Self::EffectEnabled(decode(msg)?),
            MessageType::EffectDisabled => Self::EffectDisabled(decode(msg)?),
            MessageType::PlayAt => Self::PlayAt(decode(msg)?),
        };
        Ok(cmd)
    }
}

impl TryFrom<Message> for Command {
    type Error = CommandError;

    fn try_from(msg: Message) -> Result<Self, Self::Error> {
        Self::try_from(&msg)
    }
}

/// Reads one of the payload structs above after checking its length.
///
/// Only call with types whose every bit pattern is valid.
fn decode<T: Payload>(msg: &Message) -> Result<T, CommandError> {
    let expected = size_of::<T>();
    let actual = msg.payload_size();
    if actual != expected {
        debug!(ty = %msg.message_type(), expected, actual, "payload size mismatch");
        return Err(CommandError::PayloadSize {
            ty: msg.message_type(),
            expected,
            actual,
        });
    }

    // SAFETY: the payload holds exactly size_of::<T>() bytes and T is one of
    // the integer/float structs in this module, valid for any bit pattern.
    Ok(unsafe { msg.payload::<T>() })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_commands() -> [Command; 10] {
        [
            Command::Resume,
            Command::Pause,
            Command::Stop,
            Command::Volume(Volume { gain: 0.25 }),
            Command::Resize(Resize {
                buffer: 2,
                frames: 4096,
            }),
            Command::EffectAdded(EffectId(1)),
            Command::EffectRemoved(EffectId(2)),
            Command::EffectEnabled(EffectId(3)),
            Command::EffectDisabled(EffectId(4)),
            Command::PlayAt(PlayAt { frame: 44_100 }),
        ]
    }

    #[test]
    fn test_every_command_survives_envelope() {
        for cmd in all_commands() {
            let msg = Message::from(cmd);
            assert_eq!(msg.message_type(), cmd.message_type());
            assert_eq!(Command::try_from(&msg), Ok(cmd));
        }
    }

    #[test]
    fn test_every_tag_but_unknown_has_a_command() {
        let tags: Vec<_> = all_commands().iter().map(Command::message_type).collect();
        for ty in MessageType::ALL {
            assert_eq!(tags.contains(&ty), ty != MessageType::Unknown, "{ty}");
        }
    }

    #[test]
    fn test_signals_have_empty_payload() {
        assert_eq!(Message::from(Command::Stop).payload_size(), 0);
    }

    #[test]
    fn test_payload_sizes() {
        assert_eq!(Message::from(Command::Volume(Volume { gain: 1.0 })).payload_size(), 4);
        assert_eq!(
            Message::from(Command::Resize(Resize { buffer: 0, frames: 0 })).payload_size(),
            8
        );
        assert_eq!(Message::from(Command::EffectAdded(EffectId(9))).payload_size(), 4);
        assert_eq!(Message::from(Command::PlayAt(PlayAt { frame: 0 })).payload_size(), 8);
    }

    #[test]
    fn test_unknown_is_rejected() {
        assert_eq!(
            Command::try_from(Message::default()),
            Err(CommandError::UnknownType)
        );
    }

    #[test]
    fn test_size_mismatch_is_rejected() {
        let msg = Message::new(MessageType::PlayAt, 7u32).unwrap();
        let err = Command::try_from(&msg).unwrap_err();

        assert_eq!(
            err,
            CommandError::PayloadSize {
                ty: MessageType::PlayAt,
                expected: 8,
                actual: 4,
            }
        );
        assert_eq!(err.to_string(), "play_at payload must be 8 bytes, got 4");
    }

    #[test]
    fn test_raw_envelope_decodes_as_command() {
        let msg = Message::new(MessageType::Volume, 0.5f32).unwrap();
        assert_eq!(
            Command::try_from(&msg),
            Ok(Command::Volume(Volume { gain: 0.5 }))
        );

        let msg = Message::new(MessageType::Pause, 99u8).unwrap();
        assert_eq!(Command::try_from(&msg), Ok(Command::Pause));
    }
}
