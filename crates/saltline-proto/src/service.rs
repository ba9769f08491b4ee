//! Service notification payloads.
//!
//! The two notification shapes the session layer decodes itself: the
//! new-session notice and the ignored-message error that drives salt
//! recovery. Both are ephemeral values, decoded once and consumed.

use crate::{errors::Result, wire::Reader};

/// `new_session_created` notification.
///
/// Informational: it reports the salt the server chose for the new session
/// but does not by itself change live session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionCreated {
    /// Id of the first message the server saw in the new session.
    pub first_message_id: u64,
    /// Server-chosen unique id of the session instance.
    pub unique_id: u64,
    /// Salt the server expects for the session.
    pub server_salt: u64,
}

impl SessionCreated {
    /// Decode the notification body (after the envelope tag).
    pub fn read(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(Self {
            first_message_id: reader.read_u64()?,
            unique_id: reader.read_u64()?,
            server_salt: reader.read_u64()?,
        })
    }
}

/// Error codes carried by ignored-message notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCode {
    /// Message id too low (client clock behind).
    MessageIdTooLow,
    /// Message id too high (client clock ahead).
    MessageIdTooHigh,
    /// Sequence number too low.
    SequenceNumberTooLow,
    /// Sequence number too high.
    SequenceNumberTooHigh,
    /// Message sent under a stale server salt; recoverable by resend.
    IncorrectServerSalt,
    /// Invalid container.
    InvalidContainer,
    /// Any code this layer has no name for.
    Unknown(u32),
}

impl NotificationCode {
    /// Map a raw error code to a known variant.
    #[must_use]
    pub fn from_u32(value: u32) -> Self {
        match value {
            16 => Self::MessageIdTooLow,
            17 => Self::MessageIdTooHigh,
            32 => Self::SequenceNumberTooLow,
            33 => Self::SequenceNumberTooHigh,
            48 => Self::IncorrectServerSalt,
            64 => Self::InvalidContainer,
            other => Self::Unknown(other),
        }
    }
}

/// `bad_msg_notification` / `bad_server_salt` body.
///
/// References the outgoing message the server refused to process. The
/// `bad_server_salt` constructor additionally carries the salt the server
/// now expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IgnoredMessageNotification {
    /// Id of the refused outgoing message.
    pub message_id: u64,
    /// Sequence number of the refused message.
    pub sequence_number: u32,
    /// Why the message was ignored.
    pub error_code: NotificationCode,
    /// Replacement salt; present only for `bad_server_salt`.
    pub new_server_salt: Option<u64>,
}

impl IgnoredMessageNotification {
    /// Decode the notification body (after the envelope tag).
    ///
    /// `carries_salt` selects the `bad_server_salt` shape.
    pub fn read(reader: &mut Reader<'_>, carries_salt: bool) -> Result<Self> {
        let message_id = reader.read_u64()?;
        let sequence_number = reader.read_u32()?;
        let error_code = NotificationCode::from_u32(reader.read_u32()?);
        let new_server_salt = if carries_salt { Some(reader.read_u64()?) } else { None };
        Ok(Self { message_id, sequence_number, error_code, new_server_salt })
    }
}
