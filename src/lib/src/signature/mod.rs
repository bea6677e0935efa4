mod envelope;
mod hash;
mod keys;
mod openssh;
mod sshsig;

pub use envelope::*;
pub use hash::*;
pub use keys::*;
pub use sshsig::{sign, signed_data, verify, verify_envelope};
