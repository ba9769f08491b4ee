//! Envelope discriminators.
//!
//! Every decrypted payload starts with a 32-bit constructor id that
//! identifies its kind. The session layer consumes this tag before any
//! type-specific fields and routes on it; tags it does not recognize are
//! reported back as unprocessed, never treated as fatal.

/// Schema layer version declared by the connection-init prefix.
pub const CURRENT_LAYER: u32 = 72;

/// Constructor id of the `invokeWithLayer` wrapper.
pub const INVOKE_WITH_LAYER: u32 = 0xda9b_0d0d;

/// Constructor id of the `initConnection` wrapper.
pub const INIT_CONNECTION: u32 = 0x6979_6de9;

/// Leading discriminator of a decoded envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeTag {
    /// Server opened a new session; carries the salt it chose.
    NewSessionCreated,
    /// Container holding multiple framed sub-messages.
    MsgContainer,
    /// Reply correlated to an outstanding request by message id.
    RpcResult,
    /// Acknowledgement of received message ids.
    MsgsAck,
    /// The server ignored a message; carries an error code.
    BadMsgNotification,
    /// The server ignored a message sent under a stale salt.
    BadServerSalt,
    /// Gzip-compressed payload; inflated at the codec boundary.
    GzipPacked,
    /// Keep-alive reply.
    Pong,
}

impl EnvelopeTag {
    /// Map a raw constructor id to a known tag. `None` if unrecognized.
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0x9ec2_0908 => Some(Self::NewSessionCreated),
            0x73f1_f8dc => Some(Self::MsgContainer),
            0xf35c_6d01 => Some(Self::RpcResult),
            0x62d6_b459 => Some(Self::MsgsAck),
            0xa7ef_f811 => Some(Self::BadMsgNotification),
            0xedab_447b => Some(Self::BadServerSalt),
            0x3072_cfa1 => Some(Self::GzipPacked),
            0x3477_73c5 => Some(Self::Pong),
            _ => None,
        }
    }

    /// Raw constructor id of this tag.
    #[must_use]
    pub fn to_u32(self) -> u32 {
        match self {
            Self::NewSessionCreated => 0x9ec2_0908,
            Self::MsgContainer => 0x73f1_f8dc,
            Self::RpcResult => 0xf35c_6d01,
            Self::MsgsAck => 0x62d6_b459,
            Self::BadMsgNotification => 0xa7ef_f811,
            Self::BadServerSalt => 0xedab_447b,
            Self::GzipPacked => 0x3072_cfa1,
            Self::Pong => 0x3477_73c5,
        }
    }
}
