//! Sign and verify files with SSH keys.
//!
//! Signatures follow the SSHSIG format used by `ssh-keygen -Y sign`, so files
//! signed here can be checked with `ssh-keygen -Y verify` and the other way round.

// `sign()` / `verify()` work on any `SshSigner` / `SshVerifier`; `PrivateKey` and
// `PublicKey` cover Ed25519, ECDSA P-256 and RSA keys stored in OpenSSH formats.

#![forbid(unsafe_code)]

mod error;
mod signature;

/// SSH wire encoding helpers, for implementing `SshSigner` outside of this crate
pub mod wire;

/// Defaults for namespaces, hash algorithms and file locations
pub mod config;

/// Permission-checked key reads and atomic signature writes
///
/// Private keys readable by other users are loaded with a warning. Signature
/// files are replaced atomically, so a failed write leaves no partial artifact.
pub mod secure_file;

#[allow(unused_imports)]
pub use error::*;
#[allow(unused_imports)]
pub use signature::*;

pub mod reexports {
    pub use {ct_codecs, log, pem, thiserror};
}
