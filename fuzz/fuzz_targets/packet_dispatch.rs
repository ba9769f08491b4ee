//! Fuzz target for the session layer's packet dispatch
//!
//! This fuzzer drives a live RpcLayer with interleaved sends and arbitrary
//! incoming packets to find:
//! - Panics in envelope dispatch or container unpacking
//! - Unbounded recursion through nested containers
//! - Pending-table corruption (operations settled more than once)
//!
//! The layer should absorb any byte sequence without panicking; malformed
//! packets only produce a "not processed" result.

#![no_main]

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use saltline_client::{AppInformation, PendingRpcOperation, RpcLayer, SendHelper, SendMode};

#[derive(Debug, Arbitrary)]
enum Step {
    Send { payload: Vec<u8> },
    Receive { packet: Vec<u8> },
    ConnectionLost,
    SwitchSession { session_id: u64 },
}

struct NullTransport {
    next_message_id: u64,
    server_salt: u64,
}

impl SendHelper for NullTransport {
    fn send_package(&mut self, _payload: &[u8], _mode: SendMode) -> u64 {
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
        1
    }

    fn client_key_part(&self) -> Bytes {
        Bytes::new()
    }

    fn server_key_part(&self) -> Bytes {
        Bytes::new()
    }
}

fuzz_target!(|steps: Vec<Step>| {
    let mut layer = RpcLayer::new(NullTransport { next_message_id: 1, server_salt: 0 });
    layer.set_app_info(AppInformation {
        app_id: 1,
        device_info: "fuzz".to_string(),
        os_info: "fuzz".to_string(),
        app_version: "0".to_string(),
        language_code: "en".to_string(),
    });
    layer.set_session_id(0x5e55);

    let mut handles = Vec::new();
    for step in steps {
        match step {
            Step::Send { payload } => {
                let operation = PendingRpcOperation::new(payload);
                handles.push(operation.handle());
                let _ = layer.send_rpc(operation);
            }
            Step::Receive { packet } => {
                let _ = layer.process_packet(&packet);
            }
            Step::ConnectionLost => {
                layer.on_connection_lost();
                // Everything in the table must have terminated
                assert_eq!(layer.pending_count(), 0);
            }
            Step::SwitchSession { session_id } => {
                layer.set_session_id(session_id);
            }
        }
    }

    // Reading a handle never panics, whatever state it ended in
    for handle in handles {
        let _ = handle.is_finished();
        let _ = handle.reply_data();
        let _ = handle.failure();
    }
});
