//! Pending request tracking.
//!
//! A [`PendingRpcOperation`] is created when a request is serialized and
//! owned by the session layer's table from the moment the transport accepts
//! it. The caller keeps an [`RpcHandle`]: an observation-only view that sees
//! exactly one terminal transition and nothing else. Mutation rights over
//! table membership stay with the layer.

use std::{cell::RefCell, fmt, rc::Rc};

use bytes::Bytes;
use tracing::warn;

use crate::error::RpcFailure;

/// Lifecycle of a request awaiting its reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcState {
    /// Sent (or about to be sent); no terminal event yet.
    Pending,
    /// The matching reply arrived; carries the raw result bytes.
    Finished(Bytes),
    /// No reply will ever arrive.
    Failed(RpcFailure),
}

/// Observation-only view of an operation's terminal transition.
///
/// Handles stay valid across salt-recovery resends: the layer re-registers
/// the same operation under the new message id, so the handle still
/// resolves when the reply eventually arrives.
#[derive(Clone)]
pub struct RpcHandle {
    state: Rc<RefCell<RpcState>>,
}

impl RpcHandle {
    /// True once the operation reached a terminal state.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        !matches!(*self.state.borrow(), RpcState::Pending)
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> RpcState {
        self.state.borrow().clone()
    }

    /// Reply bytes, if the operation finished successfully.
    #[must_use]
    pub fn reply_data(&self) -> Option<Bytes> {
        match &*self.state.borrow() {
            RpcState::Finished(reply) => Some(reply.clone()),
            RpcState::Pending | RpcState::Failed(_) => None,
        }
    }

    /// Failure details, if the operation failed.
    #[must_use]
    pub fn failure(&self) -> Option<RpcFailure> {
        match *self.state.borrow() {
            RpcState::Failed(failure) => Some(failure),
            RpcState::Pending | RpcState::Finished(_) => None,
        }
    }
}

impl fmt::Debug for RpcHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RpcHandle").field(&*self.state.borrow()).finish()
    }
}

/// An in-flight request.
///
/// Retains the serialized request payload so the salt-recovery path can
/// resubmit it unchanged under a fresh message id.
pub struct PendingRpcOperation {
    request_data: Bytes,
    request_id: u64,
    connection_id: u64,
    state: Rc<RefCell<RpcState>>,
}

impl PendingRpcOperation {
    /// Wrap a serialized request. The message id is assigned on send.
    pub fn new(request_data: impl Into<Bytes>) -> Self {
        Self {
            request_data: request_data.into(),
            request_id: 0,
            connection_id: 0,
            state: Rc::new(RefCell::new(RpcState::Pending)),
        }
    }

    /// Caller-side view of the eventual completion.
    #[must_use]
    pub fn handle(&self) -> RpcHandle {
        RpcHandle { state: Rc::clone(&self.state) }
    }

    /// Serialized request payload.
    #[must_use]
    pub fn request_data(&self) -> &Bytes {
        &self.request_data
    }

    /// Message id the request is currently registered under (0 before the
    /// first send; updated by every resend).
    #[must_use]
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    /// Connection the request was last sent on, kept for diagnostics.
    #[must_use]
    pub fn connection_id(&self) -> u64 {
        self.connection_id
    }

    /// True once the operation reached a terminal state.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        !matches!(*self.state.borrow(), RpcState::Pending)
    }

    pub(crate) fn set_request_id(&mut self, request_id: u64) {
        self.request_id = request_id;
    }

    pub(crate) fn set_connection_id(&mut self, connection_id: u64) {
        self.connection_id = connection_id;
    }

    pub(crate) fn finish_with_reply(&self, reply: Bytes) {
        self.transition(RpcState::Finished(reply));
    }

    pub(crate) fn finish_with_error(&self, failure: RpcFailure) {
        self.transition(RpcState::Failed(failure));
    }

    /// Terminal transition, applied at most once.
    fn transition(&self, next: RpcState) {
        let mut state = self.state.borrow_mut();
        if !matches!(*state, RpcState::Pending) {
            warn!("Dropping duplicate terminal transition for message {}", self.request_id);
            return;
        }
        *state = next;
    }
}

impl fmt::Debug for PendingRpcOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRpcOperation")
            .field("request_id", &self.request_id)
            .field("connection_id", &self.connection_id)
            .field("request_bytes", &self.request_data.len())
            .field("state", &*self.state.borrow())
            .finish()
    }
}
