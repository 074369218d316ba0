//! Fuzz target: descriptor decoding
//!
//! Arbitrary bytes must decode to a descriptor or fail cleanly, in both
//! encodings. A decoded descriptor must survive a JSON round trip unchanged.

#![no_main]

use canopy_proto::{codec, Descriptor};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(descriptor) = codec::from_cbor::<Descriptor>(data) {
        let json = codec::to_json(&descriptor).expect("decoded descriptor encodes");
        let again: Descriptor = codec::from_json(&json).expect("encoded descriptor decodes");
        assert_eq!(descriptor, again);
    }

    if let Ok(text) = std::str::from_utf8(data) {
        let _ = codec::from_json::<Descriptor>(text);
    }
});
