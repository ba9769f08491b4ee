//! Fixed-layout message headers with zero-copy parsing.
//!
//! Two header shapes exist on the wire, both little-endian with fixed field
//! order and no variable-length fields:
//!
//! - [`MessageHeader`] (16 bytes) prefixes each inner message inside a
//!   container.
//! - [`FullMessageHeader`] (32 bytes) prefixes a decrypted top-level packet;
//!   it is produced by the transport/crypto boundary and consumed once per
//!   packet.
//!
//! Fields are stored as raw byte arrays to avoid alignment issues; the
//! `#[repr(C, packed)]` layout with zerocopy traits makes every byte pattern
//! a valid header, so casting untrusted bytes cannot cause undefined
//! behavior. The only decode failure is a short buffer.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    errors::{ProtocolError, Result},
    wire::Reader,
};

/// 16-byte header prefixed to each message inside a container.
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct MessageHeader {
    message_id: [u8; 8],
    sequence_number: [u8; 4],
    content_length: [u8; 4],
}

impl MessageHeader {
    /// Size of the serialized header (16 bytes).
    pub const SIZE: usize = 16;

    /// Build a header from typed field values.
    #[must_use]
    pub fn new(message_id: u64, sequence_number: u32, content_length: u32) -> Self {
        Self {
            message_id: message_id.to_le_bytes(),
            sequence_number: sequence_number.to_le_bytes(),
            content_length: content_length.to_le_bytes(),
        }
    }

    /// Parse a header from the start of `bytes` (zero-copy).
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Truncated`] if fewer than [`Self::SIZE`] bytes remain.
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        Ok(Self::ref_from_prefix(bytes)
            .map_err(|_| ProtocolError::Truncated { needed: Self::SIZE, available: bytes.len() })?
            .0)
    }

    /// Consume a header from a cursor.
    pub fn read(reader: &mut Reader<'_>) -> Result<Self> {
        let raw = reader.read_bytes(Self::SIZE)?;
        Ok(*Self::from_bytes(raw)?)
    }

    /// Serialize the header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let bytes = IntoBytes::as_bytes(self);
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(bytes);
        arr
    }

    /// Message identifier assigned by the sender.
    #[must_use]
    pub fn message_id(&self) -> u64 {
        u64::from_le_bytes(self.message_id)
    }

    /// Per-session outgoing sequence number.
    #[must_use]
    pub fn sequence_number(&self) -> u32 {
        u32::from_le_bytes(self.sequence_number)
    }

    /// Length in bytes of the message body that follows the header.
    #[must_use]
    pub fn content_length(&self) -> u32 {
        u32::from_le_bytes(self.content_length)
    }
}

// Manual Debug implementation (can't derive due to packed repr)
impl std::fmt::Debug for MessageHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageHeader")
            .field("message_id", &self.message_id())
            .field("sequence_number", &self.sequence_number())
            .field("content_length", &self.content_length())
            .finish()
    }
}

// Manual PartialEq implementation (can't derive due to packed repr)
impl PartialEq for MessageHeader {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for MessageHeader {}

/// 32-byte header prefixed to a decrypted top-level packet.
///
/// The leading `server_salt` and `session_id` fields bind the packet to the
/// continuity scope the session layer tracks; the trailing fields match
/// [`MessageHeader`].
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FullMessageHeader {
    server_salt: [u8; 8],
    session_id: [u8; 8],
    message_id: [u8; 8],
    sequence_number: [u8; 4],
    content_length: [u8; 4],
}

impl FullMessageHeader {
    /// Size of the serialized header (32 bytes).
    pub const SIZE: usize = 32;

    /// Build a header from typed field values.
    #[must_use]
    pub fn new(
        server_salt: u64,
        session_id: u64,
        message_id: u64,
        sequence_number: u32,
        content_length: u32,
    ) -> Self {
        Self {
            server_salt: server_salt.to_le_bytes(),
            session_id: session_id.to_le_bytes(),
            message_id: message_id.to_le_bytes(),
            sequence_number: sequence_number.to_le_bytes(),
            content_length: content_length.to_le_bytes(),
        }
    }

    /// Parse a header from the start of `bytes` (zero-copy).
    ///
    /// # Errors
    ///
    /// [`ProtocolError::Truncated`] if fewer than [`Self::SIZE`] bytes remain.
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        Ok(Self::ref_from_prefix(bytes)
            .map_err(|_| ProtocolError::Truncated { needed: Self::SIZE, available: bytes.len() })?
            .0)
    }

    /// Serialize the header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let bytes = IntoBytes::as_bytes(self);
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(bytes);
        arr
    }

    /// Salt the server expects mixed into packet authentication.
    #[must_use]
    pub fn server_salt(&self) -> u64 {
        u64::from_le_bytes(self.server_salt)
    }

    /// Session the packet belongs to.
    #[must_use]
    pub fn session_id(&self) -> u64 {
        u64::from_le_bytes(self.session_id)
    }

    /// Message identifier assigned by the sender.
    #[must_use]
    pub fn message_id(&self) -> u64 {
        u64::from_le_bytes(self.message_id)
    }

    /// Per-session outgoing sequence number.
    #[must_use]
    pub fn sequence_number(&self) -> u32 {
        u32::from_le_bytes(self.sequence_number)
    }

    /// Length in bytes of the payload that follows the header.
    #[must_use]
    pub fn content_length(&self) -> u32 {
        u32::from_le_bytes(self.content_length)
    }
}

// Manual Debug implementation (can't derive due to packed repr)
impl std::fmt::Debug for FullMessageHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FullMessageHeader")
            .field("server_salt", &format_args!("{:#018x}", self.server_salt()))
            .field("session_id", &format_args!("{:#018x}", self.session_id()))
            .field("message_id", &self.message_id())
            .field("sequence_number", &self.sequence_number())
            .field("content_length", &self.content_length())
            .finish()
    }
}

// Manual PartialEq implementation (can't derive due to packed repr)
impl PartialEq for FullMessageHeader {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for FullMessageHeader {}
