//! Client-side transport/session layer.
//!
//! Turns the decrypted byte stream delivered by the transport into
//! correlated request/response pairs and keeps the session usable across
//! server-salt renegotiation.
//!
//! # Architecture
//!
//! The layer is sans-IO and single-threaded: [`RpcLayer`] owns the session
//! state and the pending-operation table, and all dispatch runs
//! synchronously inside the method invoked on packet arrival. Sockets,
//! sequencing, and encryption live behind the [`SendHelper`] trait; message
//! ids are assigned there, never here.
//!
//! # Components
//!
//! - [`RpcLayer`]: envelope dispatcher, container unpacker, resend
//!   controller, and outbound request encoder
//! - [`PendingRpcOperation`] / [`RpcHandle`]: an in-flight request and the
//!   caller's observation-only view of its terminal transition
//! - [`SessionState`]: session id, observed salt, and the one-shot
//!   connection-init marker
//! - [`SendHelper`]: boundary to the encrypted transport

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod app_info;
mod error;
mod operation;
mod rpc;
mod session;
mod transport;

pub use app_info::AppInformation;
pub use error::RpcFailure;
pub use operation::{PendingRpcOperation, RpcHandle, RpcState};
pub use rpc::RpcLayer;
pub use session::{SessionPhase, SessionState};
pub use transport::{SendHelper, SendMode};
