//! Terminal failure values delivered through operation handles.
//!
//! Callers observe failures only through the handle's state transition;
//! transport-internal decode failures never surface here. Log-only
//! conditions (unknown operations, session mismatches, unhandled
//! notification codes) are reported as unprocessed envelopes instead.

use thiserror::Error;

/// Why a pending operation will never receive its reply.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcFailure {
    /// The connection failed while the request was in flight. Connection
    /// loss is terminal for every outstanding operation.
    #[error("connection failed")]
    ConnectionFailed,

    /// The transport refused to accept the outgoing request, so no message
    /// id was ever assigned.
    #[error("send rejected by transport")]
    SendRejected,
}
