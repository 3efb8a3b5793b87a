//! Lock-free single-producer/single-consumer control-message queue.
//!
//! - [`sync::spsc`] - Fixed-capacity SPSC ring buffer with producer/consumer handles
//! - [`message`] - Fixed-size, type-tagged [`Message`] envelopes and typed [`Command`]s
//!
//! A controller thread builds envelopes and pushes them; a real-time thread
//! pops them without locking, blocking or allocating:
//!
//! ```
//! use lfmq::message::command::{Command, Volume};
//! use lfmq::sync::spsc;
//! use lfmq::Message;
//!
//! let (tx, mut rx) = spsc::channel::<Message, 8>();
//!
//! tx.push(Command::Volume(Volume { gain: 0.5 }).into()).unwrap();
//! tx.push(Command::Pause.into()).unwrap();
//!
//! while let Some(msg) = rx.pop() {
//!     match Command::try_from(&msg) {
//!         Ok(Command::Volume(v)) => assert_eq!(v.gain, 0.5),
//!         Ok(Command::Pause) => {}
//!         other => panic!("unexpected {other:?}"),
//!     }
//! }
//! ```

// Allow the crate to reference itself as ::lfmq for derive macro usage
extern crate self as lfmq;

pub mod message;
mod spsc;
pub mod sync;
mod trace;

pub use message::{Command, Message};
pub use trace::init_tracing;

#[doc(inline)]
pub use lfmq_derive::Payload;

#[doc(inline)]
pub use message::payload::Payload;

// Hidden re-exports for the derive macro
#[doc(hidden)]
pub use message::payload::Payload as __PayloadPrivate;
#[doc(hidden)]
pub use message::MAX_PAYLOAD_SIZE as __MAX_PAYLOAD_SIZE;
