//! Fuzz target for signature envelope decoding
//!
//! Both the binary form and the armored form are attacker-controlled when
//! verifying. Decoding must never panic, and a decoded envelope must encode
//! back to the same bytes.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ssign::{HashAlgorithm, SignatureEnvelope};

fuzz_target!(|data: &[u8]| {
    if let Ok(envelope) = SignatureEnvelope::from_bytes(data) {
        assert_eq!(envelope.to_bytes(), data);
        let _ = envelope.public_key();
        let _ = HashAlgorithm::from_name(&envelope.hash_algorithm);

        let armored = envelope.to_pem();
        let decoded = SignatureEnvelope::from_pem(armored.as_bytes()).expect("armor round trip");
        assert_eq!(decoded, envelope);
    }

    let _ = SignatureEnvelope::from_pem(data);
});
