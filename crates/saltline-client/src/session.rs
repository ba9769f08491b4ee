//! Session continuity state.

/// Marker for the one-time connection-init prefix.
///
/// An explicit two-state marker rather than "sequence counter is zero": the
/// counter lives with the transport and may be reset by recovery logic, so
/// its initial value is not a reliable first-message signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Nothing sent yet; the next request carries the init prefix.
    #[default]
    NotStarted,
    /// At least one request was accepted by the transport.
    Active,
}

/// State scoped to one session id.
///
/// Exclusively owned by the session layer and mutated only from its
/// single-threaded dispatch path. The active salt and the outgoing sequence
/// counter live behind the transport boundary, not here.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub(crate) session_id: u64,
    pub(crate) observed_salt: Option<u64>,
    pub(crate) phase: SessionPhase,
}

impl SessionState {
    /// Session identifier packets must carry to be accepted.
    #[must_use]
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Salt most recently declared by the server but not yet committed.
    ///
    /// Divergence from the active salt is recorded here without switching
    /// behavior; reconciliation is explicit, driven by `bad_server_salt`.
    #[must_use]
    pub fn observed_salt(&self) -> Option<u64> {
        self.observed_salt
    }

    /// Whether the connection-init prefix is still owed.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Reset to the start of a new session.
    pub(crate) fn restart(&mut self, session_id: u64) {
        *self = Self { session_id, ..Self::default() };
    }

    pub(crate) fn observe_salt(&mut self, salt: u64) {
        self.observed_salt = Some(salt);
    }

    /// Most recently observed salt, consumed on commit.
    pub(crate) fn take_observed_salt(&mut self) -> Option<u64> {
        self.observed_salt.take()
    }

    pub(crate) fn mark_active(&mut self) {
        self.phase = SessionPhase::Active;
    }
}
