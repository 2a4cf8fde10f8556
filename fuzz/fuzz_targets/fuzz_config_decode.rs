//! Fuzz target: stored configuration blob decoding
//!
//! Feeds arbitrary bytes to `decode_config` and verifies:
//! - No panics under arbitrary byte inputs
//! - Anything that decodes also passes validation
//! - A decoded config re-encodes to a blob that decodes to the same value
//!
//! cargo fuzz run fuzz_config_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use tankwatch::adapters::nvs::{decode_config, encode_config};

fuzz_target!(|data: &[u8]| {
    if let Ok(cfg) = decode_config(data) {
        assert!(cfg.validate().is_ok());
        let bytes = encode_config(&cfg).expect("valid config must encode");
        assert_eq!(decode_config(&bytes).ok(), Some(cfg));
    }
});
