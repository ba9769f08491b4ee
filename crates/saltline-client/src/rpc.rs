//! Client RPC session layer.
//!
//! The [`RpcLayer`] is the single owner of session/salt state and the
//! pending-operation table. It decodes incoming envelopes, matches replies
//! to outstanding requests by message id, recovers from stale-salt errors
//! by resending the affected request, and wraps a session's first outgoing
//! request in the connection-init prefix.
//!
//! All processing is synchronous and sequential. Container items in
//! particular are never reordered: a later item may depend on a state
//! mutation (a salt correction, typically) made by an earlier one.

use std::collections::HashMap;

use bytes::Bytes;
use saltline_proto::{
    CURRENT_LAYER, EnvelopeTag, FullMessageHeader, INIT_CONNECTION, INVOKE_WITH_LAYER,
    IgnoredMessageNotification, MessageHeader, NotificationCode, Reader, SessionCreated, Writer,
};
use tracing::{debug, warn};

use crate::{
    app_info::AppInformation,
    error::RpcFailure,
    operation::PendingRpcOperation,
    session::{SessionPhase, SessionState},
    transport::{SendHelper, SendMode},
};

/// Defensive cap on container nesting; the wire format itself does not
/// bound it.
const MAX_CONTAINER_DEPTH: usize = 8;

/// Client-side session layer over an encrypted transport.
///
/// Generic over the [`SendHelper`] so production transports and test
/// doubles share one code path.
pub struct RpcLayer<S> {
    send_helper: S,
    app_info: Option<AppInformation>,
    session: SessionState,
    operations: HashMap<u64, PendingRpcOperation>,
}

impl<S: SendHelper> RpcLayer<S> {
    /// Create a layer over `send_helper` with a fresh session.
    pub fn new(send_helper: S) -> Self {
        Self {
            send_helper,
            app_info: None,
            session: SessionState::default(),
            operations: HashMap::new(),
        }
    }

    /// Supply the application identity for the connection-init prefix.
    pub fn set_app_info(&mut self, app_info: AppInformation) {
        self.app_info = Some(app_info);
    }

    /// Switch to a new session id.
    ///
    /// A new session starts over: the next request carries the init prefix
    /// again, and any salt observed under the old session is discarded.
    pub fn set_session_id(&mut self, session_id: u64) {
        self.session.restart(session_id);
    }

    /// Current session state (read-only).
    #[must_use]
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Number of requests still awaiting a reply.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.operations.len()
    }

    /// The transport boundary this layer sends through.
    #[must_use]
    pub fn send_helper(&self) -> &S {
        &self.send_helper
    }

    /// Mutable access to the transport boundary.
    pub fn send_helper_mut(&mut self) -> &mut S {
        &mut self.send_helper
    }

    /// Client-side key-derivation material (pass-through).
    #[must_use]
    pub fn client_key_part(&self) -> Bytes {
        self.send_helper.client_key_part()
    }

    /// Server-side key-derivation material (pass-through).
    #[must_use]
    pub fn server_key_part(&self) -> Bytes {
        self.send_helper.server_key_part()
    }

    /// Process one decrypted top-level packet.
    ///
    /// Returns whether the packet was fully processed. Malformed packets
    /// and envelopes this layer does not understand are reported here but
    /// never abort unrelated work.
    pub fn process_packet(&mut self, bytes: &[u8]) -> bool {
        let header = match FullMessageHeader::from_bytes(bytes) {
            Ok(header) => *header,
            Err(error) => {
                debug!("Dropping packet with short header: {error}");
                return false;
            },
        };

        if !self.process_full_header(&header) {
            return false;
        }

        let content_length = header.content_length() as usize;
        let Some(content) =
            bytes.get(FullMessageHeader::SIZE..FullMessageHeader::SIZE + content_length)
        else {
            debug!(
                "Packet for message {} shorter than declared content ({content_length} bytes)",
                header.message_id()
            );
            return false;
        };

        self.process_envelope(content, header.message_id(), 0)
    }

    /// Session check and salt observation for a decrypted packet header.
    ///
    /// A diverging salt is recorded as observed without switching behavior;
    /// committing it is the recovery controller's explicit decision.
    fn process_full_header(&mut self, header: &FullMessageHeader) -> bool {
        if self.send_helper.server_salt() != header.server_salt() {
            debug!(
                "Received different server salt: {:#x} (remote) vs {:#x} (local)",
                header.server_salt(),
                self.send_helper.server_salt()
            );
            self.session.observe_salt(header.server_salt());
        }

        if self.session.session_id != header.session_id() {
            warn!(
                "Session id mismatch: {:#x} (remote) vs {:#x} (local), dropping packet",
                header.session_id(),
                self.session.session_id
            );
            return false;
        }

        true
    }

    /// Route one envelope by its leading discriminator.
    ///
    /// The returned "fully processed" flag propagates through container
    /// recursion; one branch's failure is reported, never escalated.
    fn process_envelope(&mut self, data: &[u8], server_message_id: u64, depth: usize) -> bool {
        if depth > MAX_CONTAINER_DEPTH {
            warn!("Container nesting exceeds depth cap ({MAX_CONTAINER_DEPTH}), dropping item");
            return false;
        }

        let mut reader = Reader::new(data);
        let raw_tag = match reader.read_u32() {
            Ok(raw_tag) => raw_tag,
            Err(error) => {
                debug!("Envelope {server_message_id} too short for a discriminator: {error}");
                return false;
            },
        };

        match EnvelopeTag::from_u32(raw_tag) {
            Some(EnvelopeTag::NewSessionCreated) => self.process_session_created(&mut reader),
            Some(EnvelopeTag::MsgContainer) => self.process_container(&mut reader, depth),
            Some(EnvelopeTag::RpcResult) => self.process_rpc_result(&mut reader),
            Some(EnvelopeTag::MsgsAck) => {
                // No table mutation at this layer
                debug!("Messages acknowledged (envelope {server_message_id})");
                true
            },
            Some(tag @ (EnvelopeTag::BadMsgNotification | EnvelopeTag::BadServerSalt)) => {
                self.process_ignored_message_notification(&mut reader, tag)
            },
            Some(EnvelopeTag::GzipPacked) => {
                // Decompression belongs to the codec boundary; only the tag
                // is recognized here
                debug!("Gzip-packed payload (envelope {server_message_id})");
                true
            },
            Some(EnvelopeTag::Pong) => {
                debug!("Pong (envelope {server_message_id})");
                true
            },
            None => {
                debug!("Unhandled envelope tag {raw_tag:#010x} (envelope {server_message_id})");
                false
            },
        }
    }

    /// Decode `new_session_created`.
    ///
    /// Informational only: live salt state changes when a packet header or
    /// `bad_server_salt` reports divergence, not here.
    fn process_session_created(&mut self, reader: &mut Reader<'_>) -> bool {
        match SessionCreated::read(reader) {
            Ok(notification) => {
                debug!(
                    "New session created: first message {}, unique id {:#x}, salt {:#x}",
                    notification.first_message_id, notification.unique_id, notification.server_salt
                );
                true
            },
            Err(error) => {
                debug!("Short new_session_created notification: {error}");
                false
            },
        }
    }

    /// Unpack a `msg_container`, redispatching every item in order.
    ///
    /// Item failures accumulate into the overall flag without aborting
    /// siblings. A truncated item header or body is different: the cursor
    /// is unusable past it, so the rest of this container is dropped.
    fn process_container(&mut self, reader: &mut Reader<'_>, depth: usize) -> bool {
        let count = match reader.read_u32() {
            Ok(count) => count,
            Err(error) => {
                debug!("Short container header: {error}");
                return false;
            },
        };
        debug!("Unpacking container with {count} items at depth {depth}");

        let mut processed = true;
        for _ in 0..count {
            let header = match MessageHeader::read(reader) {
                Ok(header) => header,
                Err(error) => {
                    debug!("Truncated container item header: {error}");
                    return false;
                },
            };
            let body = match reader.read_bytes(header.content_length() as usize) {
                Ok(body) => body,
                Err(error) => {
                    debug!("Truncated body for container item {}: {error}", header.message_id());
                    return false;
                },
            };
            processed = self.process_envelope(body, header.message_id(), depth + 1) && processed;
        }
        processed
    }

    /// Settle the pending operation a `rpc_result` replies to.
    fn process_rpc_result(&mut self, reader: &mut Reader<'_>) -> bool {
        let request_id = match reader.read_u64() {
            Ok(request_id) => request_id,
            Err(error) => {
                debug!("Short rpc_result: {error}");
                return false;
            },
        };

        let Some(operation) = self.operations.remove(&request_id) else {
            warn!("Unhandled operation {request_id}");
            return false;
        };

        let reply = Bytes::copy_from_slice(reader.read_to_end());
        debug!("Answer for message {request_id}: {} reply bytes", reply.len());
        operation.finish_with_reply(reply);
        true
    }

    /// React to `bad_msg_notification` / `bad_server_salt`.
    ///
    /// An incorrect-salt error commits the most recently observed salt as
    /// active for all future sends, then resends the refused request. Any
    /// other code is an unhandled protocol error: logged, reported as an
    /// unprocessed envelope, no automatic recovery.
    fn process_ignored_message_notification(
        &mut self,
        reader: &mut Reader<'_>,
        tag: EnvelopeTag,
    ) -> bool {
        let carries_salt = tag == EnvelopeTag::BadServerSalt;
        let notification = match IgnoredMessageNotification::read(reader, carries_salt) {
            Ok(notification) => notification,
            Err(error) => {
                debug!("Short ignored-message notification: {error}");
                return false;
            },
        };

        // The replacement salt the server names is itself an observation
        if let Some(salt) = notification.new_server_salt {
            self.session.observe_salt(salt);
        }

        match notification.error_code {
            NotificationCode::IncorrectServerSalt => {
                if let Some(salt) = self.session.take_observed_salt() {
                    self.send_helper.set_server_salt(salt);
                    debug!("Local server salt fixed to {salt:#x}");
                }
                self.resend_rpc(notification.message_id)
            },
            code => {
                warn!(
                    "Unhandled ignored-message error {code:?} for message {}",
                    notification.message_id
                );
                false
            },
        }
    }

    /// Resubmit the request registered under `message_id`.
    ///
    /// Best-effort and single-shot: the operation moves to a brand-new
    /// message id (ids are never reused) while the caller's handle keeps
    /// observing it. A missing entry is reported, never synthesized.
    fn resend_rpc(&mut self, message_id: u64) -> bool {
        let Some(operation) = self.operations.remove(&message_id) else {
            warn!("Unable to find the message to resend: {message_id}");
            return false;
        };
        debug!("Resending message {message_id}");
        self.send_rpc(operation)
    }

    /// Serialize and send a request, registering it in the table.
    ///
    /// The session's first request (and only it) is wrapped in the
    /// connection-init prefix. Sequencing and encryption are delegated to
    /// the transport, which assigns the message id; 0 means the transport
    /// failed and nothing was registered. The resend path reuses this exact
    /// contract.
    pub fn send_rpc(&mut self, mut operation: PendingRpcOperation) -> bool {
        let message_id = if self.session.phase == SessionPhase::NotStarted {
            let Some(prefix) = self.init_connection_prefix() else {
                warn!("Cannot send the session's first request without application identity");
                operation.finish_with_error(RpcFailure::SendRejected);
                return false;
            };
            let mut framed = Vec::with_capacity(prefix.len() + operation.request_data().len());
            framed.extend_from_slice(&prefix);
            framed.extend_from_slice(operation.request_data());
            self.send_helper.send_package(&framed, SendMode::Client)
        } else {
            self.send_helper.send_package(operation.request_data(), SendMode::Client)
        };

        if message_id == 0 {
            // The transport assigned no id, so the table cannot track the
            // request; fail it so the caller's handle still terminates
            operation.finish_with_error(RpcFailure::SendRejected);
            return false;
        }

        self.session.mark_active();
        operation.set_request_id(message_id);
        operation.set_connection_id(self.send_helper.connection_id());
        debug!("Request registered under message {message_id}");
        self.operations.insert(message_id, operation);
        true
    }

    /// Fail every outstanding operation; connection loss is terminal.
    pub fn on_connection_lost(&mut self) {
        let count = self.operations.len();
        for (_, operation) in self.operations.drain() {
            if !operation.is_finished() {
                operation.finish_with_error(RpcFailure::ConnectionFailed);
            }
        }
        if count > 0 {
            debug!("Failed {count} outstanding operations after connection loss");
        }
    }

    /// One-time connection-initialization block.
    ///
    /// `invokeWithLayer` and `initConnection` wrap the first request with
    /// the layer version and application identity. `None` until
    /// [`RpcLayer::set_app_info`] supplies the identity.
    fn init_connection_prefix(&self) -> Option<Bytes> {
        let app_info = self.app_info.as_ref()?;
        let mut writer = Writer::new();
        writer.write_u32(INVOKE_WITH_LAYER);
        writer.write_u32(CURRENT_LAYER);
        writer.write_u32(INIT_CONNECTION);
        writer.write_u32(app_info.app_id);
        writer.write_tl_string(&app_info.device_info);
        writer.write_tl_string(&app_info.os_info);
        writer.write_tl_string(&app_info.app_version);
        writer.write_tl_string(&app_info.language_code); // system language
        writer.write_tl_string(""); // language pack
        writer.write_tl_string(&app_info.language_code);
        Some(writer.into_bytes())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::ProptestConfig;
    use proptest::proptest;

    use super::*;
    use crate::operation::RpcState;

    const SESSION_ID: u64 = 0x5e55_10f1;
    const INITIAL_SALT: u64 = 0x1111_2222_3333_4444;

    struct MockSendHelper {
        next_message_id: u64,
        server_salt: u64,
        sent: Vec<Vec<u8>>,
        fail_sends: bool,
    }

    impl MockSendHelper {
        fn new() -> Self {
            Self {
                next_message_id: 100,
                server_salt: INITIAL_SALT,
                sent: Vec::new(),
                fail_sends: false,
            }
        }
    }

    impl SendHelper for MockSendHelper {
        fn send_package(&mut self, payload: &[u8], _mode: SendMode) -> u64 {
            if self.fail_sends {
                return 0;
            }
            self.sent.push(payload.to_vec());
            let id = self.next_message_id;
            self.next_message_id += 1;
            id
        }

        fn server_salt(&self) -> u64 {
            self.server_salt
        }

        fn set_server_salt(&mut self, salt: u64) {
            self.server_salt = salt;
        }

        fn connection_id(&self) -> u64 {
            7
        }

        fn client_key_part(&self) -> Bytes {
            Bytes::from_static(b"client-key")
        }

        fn server_key_part(&self) -> Bytes {
            Bytes::from_static(b"server-key")
        }
    }

    fn app_info() -> AppInformation {
        AppInformation {
            app_id: 42,
            device_info: "pc".to_string(),
            os_info: "linux".to_string(),
            app_version: "0.1".to_string(),
            language_code: "en".to_string(),
        }
    }

    fn layer() -> RpcLayer<MockSendHelper> {
        let mut layer = RpcLayer::new(MockSendHelper::new());
        layer.set_app_info(app_info());
        layer.set_session_id(SESSION_ID);
        layer
    }

    fn rpc_result(request_id: u64, reply: &[u8]) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.write_u32(EnvelopeTag::RpcResult.to_u32());
        writer.write_u64(request_id);
        writer.write_raw(reply);
        writer.into_bytes().to_vec()
    }

    fn bad_server_salt(message_id: u64, new_salt: u64) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.write_u32(EnvelopeTag::BadServerSalt.to_u32());
        writer.write_u64(message_id);
        writer.write_u32(1); // seq_no
        writer.write_u32(48); // incorrect server salt
        writer.write_u64(new_salt);
        writer.into_bytes().to_vec()
    }

    fn bad_msg_notification(message_id: u64, code: u32) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.write_u32(EnvelopeTag::BadMsgNotification.to_u32());
        writer.write_u64(message_id);
        writer.write_u32(1);
        writer.write_u32(code);
        writer.into_bytes().to_vec()
    }

    fn pong() -> Vec<u8> {
        EnvelopeTag::Pong.to_u32().to_le_bytes().to_vec()
    }

    fn container(items: &[(u64, Vec<u8>)]) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.write_u32(EnvelopeTag::MsgContainer.to_u32());
        writer.write_u32(items.len() as u32);
        for (message_id, body) in items {
            writer.write_raw(&MessageHeader::new(*message_id, 1, body.len() as u32).to_bytes());
            writer.write_raw(body);
        }
        writer.into_bytes().to_vec()
    }

    fn full_packet(server_salt: u64, session_id: u64, content: &[u8]) -> Vec<u8> {
        let header =
            FullMessageHeader::new(server_salt, session_id, 9000, 1, content.len() as u32);
        let mut packet = header.to_bytes().to_vec();
        packet.extend_from_slice(content);
        packet
    }

    #[test]
    fn send_registers_pending_operation() {
        let mut layer = layer();
        let operation = PendingRpcOperation::new(&b"getConfig"[..]);
        let handle = operation.handle();

        assert!(layer.send_rpc(operation));

        assert_eq!(layer.pending_count(), 1);
        assert!(!handle.is_finished());
        assert_eq!(layer.session().phase(), SessionPhase::Active);
    }

    #[test]
    fn first_request_carries_init_prefix_and_later_ones_do_not() {
        let mut layer = layer();

        assert!(layer.send_rpc(PendingRpcOperation::new(&b"first"[..])));
        assert!(layer.send_rpc(PendingRpcOperation::new(&b"second"[..])));

        let sent = &layer.send_helper().sent;
        assert_eq!(sent.len(), 2);
        assert_eq!(&sent[0][..4], &INVOKE_WITH_LAYER.to_le_bytes());
        assert_eq!(&sent[0][4..8], &CURRENT_LAYER.to_le_bytes());
        assert_eq!(&sent[0][8..12], &INIT_CONNECTION.to_le_bytes());
        assert!(sent[0].ends_with(b"first"));
        assert_eq!(sent[1].as_slice(), b"second");
    }

    #[test]
    fn first_send_without_app_info_is_rejected() {
        let mut layer = RpcLayer::new(MockSendHelper::new());
        layer.set_session_id(SESSION_ID);
        let operation = PendingRpcOperation::new(&b"req"[..]);
        let handle = operation.handle();

        assert!(!layer.send_rpc(operation));

        assert_eq!(layer.pending_count(), 0);
        assert_eq!(handle.failure(), Some(RpcFailure::SendRejected));
    }

    #[test]
    fn transport_failure_registers_nothing() {
        let mut layer = layer();
        layer.send_helper_mut().fail_sends = true;
        let operation = PendingRpcOperation::new(&b"req"[..]);
        let handle = operation.handle();

        assert!(!layer.send_rpc(operation));

        assert_eq!(layer.pending_count(), 0);
        assert_eq!(handle.failure(), Some(RpcFailure::SendRejected));
        // The init prefix is still owed: the transport accepted nothing
        assert_eq!(layer.session().phase(), SessionPhase::NotStarted);
    }

    #[test]
    fn rpc_result_finishes_operation_with_reply_bytes() {
        let mut layer = layer();
        let operation = PendingRpcOperation::new(&b"payloadA"[..]);
        let handle = operation.handle();
        assert!(layer.send_rpc(operation)); // id 100

        assert!(layer.process_envelope(&rpc_result(100, b"X"), 9000, 0));

        assert_eq!(handle.reply_data(), Some(Bytes::from_static(b"X")));
        assert_eq!(layer.pending_count(), 0);
    }

    #[test]
    fn rpc_result_for_unknown_id_reports_failure() {
        let mut layer = layer();

        assert!(!layer.process_envelope(&rpc_result(12345, b"X"), 9000, 0));

        // Never fabricate an operation
        assert_eq!(layer.pending_count(), 0);
    }

    #[test]
    fn duplicate_rpc_result_is_not_matched_twice() {
        let mut layer = layer();
        let operation = PendingRpcOperation::new(&b"payloadA"[..]);
        let handle = operation.handle();
        assert!(layer.send_rpc(operation));

        assert!(layer.process_envelope(&rpc_result(100, b"X"), 9000, 0));
        assert!(!layer.process_envelope(&rpc_result(100, b"Y"), 9000, 0));

        assert_eq!(handle.reply_data(), Some(Bytes::from_static(b"X")));
    }

    #[test]
    fn service_envelopes_are_recognized() {
        let mut layer = layer();

        let mut ack = Writer::new();
        ack.write_u32(EnvelopeTag::MsgsAck.to_u32());
        assert!(layer.process_envelope(&ack.into_bytes(), 9000, 0));

        assert!(layer.process_envelope(&pong(), 9001, 0));

        let mut gzip = Writer::new();
        gzip.write_u32(EnvelopeTag::GzipPacked.to_u32());
        assert!(layer.process_envelope(&gzip.into_bytes(), 9002, 0));

        let mut created = Writer::new();
        created.write_u32(EnvelopeTag::NewSessionCreated.to_u32());
        created.write_u64(1);
        created.write_u64(2);
        created.write_u64(3);
        assert!(layer.process_envelope(&created.into_bytes(), 9003, 0));
        // Informational only: no live salt change
        assert_eq!(layer.send_helper().server_salt(), INITIAL_SALT);
        assert_eq!(layer.session().observed_salt(), None);
    }

    #[test]
    fn unknown_tag_reports_failure_for_itself_only() {
        let mut layer = layer();
        let unknown = 0xdead_beefu32.to_le_bytes().to_vec();

        assert!(!layer.process_envelope(&unknown, 9000, 0));
    }

    #[test]
    fn container_failure_does_not_abort_siblings() {
        let mut layer = layer();
        let operation = PendingRpcOperation::new(&b"payloadA"[..]);
        let handle = operation.handle();
        assert!(layer.send_rpc(operation)); // id 100

        let unknown = 0xdead_beefu32.to_le_bytes().to_vec();
        let envelope = container(&[(1, unknown), (2, rpc_result(100, b"ok"))]);

        // Overall result reports the unknown item...
        assert!(!layer.process_envelope(&envelope, 9000, 0));
        // ...but the sibling was still dispatched
        assert_eq!(handle.reply_data(), Some(Bytes::from_static(b"ok")));
    }

    #[test]
    fn truncated_container_item_drops_the_rest() {
        let mut layer = layer();
        let operation = PendingRpcOperation::new(&b"payloadA"[..]);
        let handle = operation.handle();
        assert!(layer.send_rpc(operation)); // id 100

        // Item claims 64 bytes of body but the buffer ends early
        let mut writer = Writer::new();
        writer.write_u32(EnvelopeTag::MsgContainer.to_u32());
        writer.write_u32(2);
        writer.write_raw(&MessageHeader::new(1, 1, 64).to_bytes());
        writer.write_raw(&[0, 0]);

        assert!(!layer.process_envelope(&writer.into_bytes(), 9000, 0));
        assert!(!handle.is_finished());
    }

    #[test]
    fn nested_containers_dispatch_in_flattened_order() {
        let mut layer = layer();
        let operation = PendingRpcOperation::new(&b"payloadA"[..]);
        let handle = operation.handle();
        assert!(layer.send_rpc(operation)); // id 100

        // Item 1 (nested one level down) corrects the salt and resends the
        // request, which the mock registers under id 101. Item 2 then
        // answers id 101 - which only works if items run strictly in order.
        let inner = container(&[(5, bad_server_salt(100, 0xabcd))]);
        let envelope = container(&[(6, inner), (7, rpc_result(101, b"replayed"))]);

        assert!(layer.process_envelope(&envelope, 9000, 0));

        assert_eq!(layer.send_helper().server_salt(), 0xabcd);
        assert_eq!(handle.reply_data(), Some(Bytes::from_static(b"replayed")));
        assert_eq!(layer.pending_count(), 0);
    }

    #[test]
    fn container_nesting_beyond_depth_cap_is_dropped() {
        let mut layer = layer();

        let mut envelope = pong();
        for _ in 0..(MAX_CONTAINER_DEPTH + 1) {
            envelope = container(&[(1, envelope)]);
        }

        assert!(!layer.process_envelope(&envelope, 9000, 0));
    }

    #[test]
    fn bad_server_salt_commits_salt_and_resends_under_new_id() {
        let mut layer = layer();
        let operation = PendingRpcOperation::new(&b"payloadA"[..]);
        let handle = operation.handle();
        assert!(layer.send_rpc(operation)); // id 100

        assert!(layer.process_envelope(&bad_server_salt(100, 0x5a17), 9000, 0));

        // Active salt now matches the most recently observed value
        assert_eq!(layer.send_helper().server_salt(), 0x5a17);
        assert_eq!(layer.session().observed_salt(), None);

        // Resent under a fresh id, same payload, handle still live
        assert_eq!(layer.pending_count(), 1);
        assert_eq!(layer.send_helper().sent.len(), 2);
        assert!(layer.send_helper().sent[1].ends_with(b"payloadA"));
        assert!(!handle.is_finished());

        // The reply to the new id resolves the original handle
        assert!(layer.process_envelope(&rpc_result(101, b"done"), 9001, 0));
        assert_eq!(handle.reply_data(), Some(Bytes::from_static(b"done")));
    }

    #[test]
    fn packet_header_salt_is_observed_but_not_committed() {
        let mut layer = layer();
        let operation = PendingRpcOperation::new(&b"payloadA"[..]);
        assert!(layer.send_rpc(operation)); // id 100

        // A packet header declares a diverging salt; recorded, not committed
        let packet = full_packet(0xfeed, SESSION_ID, &pong());
        assert!(layer.process_packet(&packet));
        assert_eq!(layer.session().observed_salt(), Some(0xfeed));
        assert_eq!(layer.send_helper().server_salt(), INITIAL_SALT);

        // The salt error commits what was observed
        assert!(layer.process_envelope(&bad_server_salt(100, 0xfeed), 9000, 0));
        assert_eq!(layer.send_helper().server_salt(), 0xfeed);
    }

    #[test]
    fn other_notification_codes_are_unhandled_protocol_errors() {
        let mut layer = layer();
        let operation = PendingRpcOperation::new(&b"payloadA"[..]);
        let handle = operation.handle();
        assert!(layer.send_rpc(operation)); // id 100

        // Reported as unprocessed, whether bare or inside a full packet
        assert!(!layer.process_envelope(&bad_msg_notification(100, 17), 9000, 0));
        let packet = full_packet(INITIAL_SALT, SESSION_ID, &bad_msg_notification(100, 33));
        assert!(!layer.process_packet(&packet));

        // No automatic recovery: nothing resent, operation untouched
        assert_eq!(layer.send_helper().sent.len(), 1);
        assert_eq!(layer.pending_count(), 1);
        assert!(!handle.is_finished());
    }

    #[test]
    fn resend_of_unknown_message_reports_failure() {
        let mut layer = layer();
        // Prime the session so the notification path is reachable
        assert!(layer.send_rpc(PendingRpcOperation::new(&b"x"[..])));

        assert!(!layer.process_envelope(&bad_server_salt(9999, 0x5a17), 9000, 0));

        // Never synthesize a request
        assert_eq!(layer.send_helper().sent.len(), 1);
    }

    #[test]
    fn connection_loss_fails_every_pending_operation() {
        let mut layer = layer();
        let handles: Vec<_> = (0..3)
            .map(|i| {
                let operation = PendingRpcOperation::new(format!("req-{i}").into_bytes());
                let handle = operation.handle();
                assert!(layer.send_rpc(operation));
                handle
            })
            .collect();
        assert_eq!(layer.pending_count(), 3);

        layer.on_connection_lost();

        assert_eq!(layer.pending_count(), 0);
        for handle in handles {
            assert_eq!(handle.failure(), Some(RpcFailure::ConnectionFailed));
        }
    }

    #[test]
    fn session_mismatch_drops_packet_but_still_observes_salt() {
        let mut layer = layer();
        let operation = PendingRpcOperation::new(&b"payloadA"[..]);
        let handle = operation.handle();
        assert!(layer.send_rpc(operation)); // id 100

        let packet = full_packet(0xfeed, SESSION_ID ^ 1, &rpc_result(100, b"X"));
        assert!(!layer.process_packet(&packet));

        // Fatal to that packet only: content was never dispatched
        assert!(!handle.is_finished());
        assert_eq!(layer.session().observed_salt(), Some(0xfeed));
    }

    #[test]
    fn packet_shorter_than_declared_content_is_dropped() {
        let mut layer = layer();

        let header = FullMessageHeader::new(INITIAL_SALT, SESSION_ID, 9000, 1, 100);
        let packet = header.to_bytes().to_vec();

        assert!(!layer.process_packet(&packet));
    }

    #[test]
    fn set_session_id_restarts_the_session() {
        let mut layer = layer();
        assert!(layer.send_rpc(PendingRpcOperation::new(&b"first"[..])));
        assert_eq!(layer.session().phase(), SessionPhase::Active);

        layer.set_session_id(SESSION_ID + 1);

        assert_eq!(layer.session().phase(), SessionPhase::NotStarted);
        assert!(layer.send_rpc(PendingRpcOperation::new(&b"again"[..])));
        // The new session's first request carries the prefix again
        assert_eq!(&layer.send_helper().sent[1][..4], &INVOKE_WITH_LAYER.to_le_bytes());
    }

    #[test]
    fn key_parts_pass_through() {
        let layer = layer();
        assert_eq!(layer.client_key_part(), Bytes::from_static(b"client-key"));
        assert_eq!(layer.server_key_part(), Bytes::from_static(b"server-key"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn reply_bytes_reach_the_handle_unchanged(
            reply in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..512),
        ) {
            let mut layer = layer();
            let operation = PendingRpcOperation::new(&b"payloadA"[..]);
            let handle = operation.handle();
            assert!(layer.send_rpc(operation)); // id 100

            assert!(layer.process_envelope(&rpc_result(100, &reply), 9000, 0));
            assert_eq!(handle.state(), RpcState::Finished(Bytes::from(reply)));
        }

        #[test]
        fn any_observed_salt_is_committed_on_salt_error(salt in proptest::prelude::any::<u64>()) {
            let mut layer = layer();
            assert!(layer.send_rpc(PendingRpcOperation::new(&b"payloadA"[..]))); // id 100

            assert!(layer.process_envelope(&bad_server_salt(100, salt), 9000, 0));
            assert_eq!(layer.send_helper().server_salt(), salt);
        }
    }
}
