//! Fuzz target for private key loading
//!
//! Only the passphrase-less path is exercised: with a passphrase, the input
//! controls the bcrypt round count.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ssign::PrivateKey;

fuzz_target!(|data: &[u8]| {
    if let Ok(sk) = PrivateKey::from_any(data) {
        let _ = sk.public_key().to_wire();
    }
});
