//! Fuzz target for wire header and notification decoding
//!
//! This fuzzer feeds arbitrary byte sequences to every decoder in
//! saltline-proto to find:
//! - Parser panics on short or misaligned input
//! - Buffer over-reads in the cursor
//! - Length fields that bypass bounds checks
//!
//! Decoders should NEVER panic. All invalid inputs must return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use saltline_proto::{
    FullMessageHeader, IgnoredMessageNotification, MessageHeader, Reader, SessionCreated,
};

fuzz_target!(|data: &[u8]| {
    let _ = MessageHeader::from_bytes(data);
    let _ = FullMessageHeader::from_bytes(data);

    let _ = MessageHeader::read(&mut Reader::new(data));
    let _ = SessionCreated::read(&mut Reader::new(data));
    let _ = IgnoredMessageNotification::read(&mut Reader::new(data), false);
    let _ = IgnoredMessageNotification::read(&mut Reader::new(data), true);

    // The cursor itself must stay in bounds regardless of requested length
    let mut reader = Reader::new(data);
    if let Some(first) = data.first() {
        let _ = reader.read_bytes(usize::from(*first));
    }
    let _ = reader.read_to_end();
});
