//! Wire format for the Saltline session layer.
//!
//! Defines the fixed binary message headers that frame every decrypted
//! packet and container item, the envelope discriminator tags that identify
//! payload kinds, and the service notifications the session layer consumes
//! (session creation, ignored-message errors).
//!
//! All multi-byte integers are little-endian per protocol convention.
//! Headers have no variable-length fields; the only decode failure is
//! [`ProtocolError::Truncated`].
//!
//! Payload schemas beyond the service notifications are out of scope: the
//! session layer correlates raw result bytes with requests and leaves their
//! interpretation to the typed RPC layer above.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod errors;
mod header;
mod service;
mod tags;
mod wire;

pub use errors::{ProtocolError, Result};
pub use header::{FullMessageHeader, MessageHeader};
pub use service::{IgnoredMessageNotification, NotificationCode, SessionCreated};
pub use tags::{CURRENT_LAYER, EnvelopeTag, INIT_CONNECTION, INVOKE_WITH_LAYER};
pub use wire::{Reader, Writer};
