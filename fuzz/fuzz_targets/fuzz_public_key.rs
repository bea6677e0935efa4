//! Fuzz target for public key parsing
//!
//! Covers the SSH wire format, `authorized_keys` lines and auto-detection.
//! Every key that parses must decode to the same key after re-encoding.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ssign::{PublicKey, SshVerifier};

fuzz_target!(|data: &[u8]| {
    if let Ok(pk) = PublicKey::from_wire(data) {
        let wire = pk.to_wire();
        assert_eq!(PublicKey::from_wire(&wire).ok(), Some(pk.clone()));
        let _ = pk.fingerprint();

        // Any signature blob must be rejected without panicking
        let _ = pk.verify_blob(b"data", data);
    }

    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(pk) = PublicKey::from_openssh(s) {
            let line = pk.to_openssh();
            assert_eq!(PublicKey::from_openssh(&line).ok(), Some(pk));
        }
    }

    let _ = PublicKey::from_any(data);
});
