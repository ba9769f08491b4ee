//! Boundary to the encrypted transport.
//!
//! The session layer never touches sockets or key-exchange crypto. Framing,
//! sequencing, encryption, and message-id assignment all happen behind
//! [`SendHelper`]; the layer consumes the assigned id and tracks the rest.

use bytes::Bytes;

/// Which side of the shared packet-framing implementation is sending.
///
/// The framing code is shared with the server; the session layer always
/// sends as [`SendMode::Client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    /// Client-to-server sequencing rules.
    Client,
    /// Server-to-client sequencing rules.
    Server,
}

/// Send primitive and salt/key state owned by the transport.
pub trait SendHelper {
    /// Frame, sequence, encrypt, and enqueue `payload`.
    ///
    /// Non-blocking: returns the message id the transport assigned, or 0 to
    /// signal transport failure. Ids are monotonic and never reused within
    /// a connection.
    fn send_package(&mut self, payload: &[u8], mode: SendMode) -> u64;

    /// Salt currently mixed into outgoing packet authentication.
    fn server_salt(&self) -> u64;

    /// Replace the active salt for all future sends.
    fn set_server_salt(&mut self, salt: u64);

    /// Identity of the underlying connection, recorded for diagnostics.
    fn connection_id(&self) -> u64;

    /// Client-side key-derivation material (pass-through).
    fn client_key_part(&self) -> Bytes;

    /// Server-side key-derivation material (pass-through).
    fn server_key_part(&self) -> Bytes;
}
