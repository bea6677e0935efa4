use crate::error::*;

use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::str::FromStr;

/// Hash functions an SSH signature may declare.
///
/// This is an allow-list: names outside of it are rejected before any
/// cryptographic work happens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha256,
    #[default]
    Sha512,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 2] = [HashAlgorithm::Sha256, HashAlgorithm::Sha512];

    /// The name stored in signature envelopes.
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    /// Look up an algorithm by its exact envelope name.
    pub fn from_name(name: &str) -> Result<Self, SSError> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.name() == name)
            .ok_or_else(|| {
                SSError::ValidationError(format!("unsupported hash algorithm: {:?}", name))
            })
    }

    /// Size of the digest in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha512 => 64,
        }
    }

    pub fn digest(&self, data: impl AsRef<[u8]>) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha256 => Sha256::digest(data.as_ref()).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data.as_ref()).to_vec(),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = SSError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(HashAlgorithm::Sha256.name(), "sha256");
        assert_eq!(HashAlgorithm::Sha512.name(), "sha512");
        assert_eq!(HashAlgorithm::Sha512.to_string(), "sha512");
    }

    #[test]
    fn test_default_is_sha512() {
        assert_eq!(HashAlgorithm::default(), HashAlgorithm::Sha512);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(HashAlgorithm::from_name("sha256").unwrap(), HashAlgorithm::Sha256);
        assert_eq!("sha512".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha512);
    }

    #[test]
    fn test_rejects_weak_and_unknown() {
        for name in ["md5", "sha1", "SHA256", "sha384", "", "sha256 "] {
            let result = HashAlgorithm::from_name(name);
            assert!(
                matches!(result, Err(SSError::ValidationError(_))),
                "{:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_digest_sha256() {
        let digest = HashAlgorithm::Sha256.digest(b"abc");
        assert_eq!(digest.len(), 32);
        assert_eq!(
            digest[..4],
            [0xba, 0x78, 0x16, 0xbf],
            "SHA-256(\"abc\") starts with ba7816bf"
        );
    }

    #[test]
    fn test_digest_sha512() {
        let digest = HashAlgorithm::Sha512.digest(b"abc");
        assert_eq!(digest.len(), HashAlgorithm::Sha512.output_len());
        assert_eq!(digest[..4], [0xdd, 0xaf, 0x35, 0xa1]);
    }

    #[test]
    fn test_digest_different_inputs() {
        let alg = HashAlgorithm::Sha256;
        assert_ne!(alg.digest(b"input1"), alg.digest(b"input2"));
        assert_eq!(alg.digest(b"same"), alg.digest(b"same"));
    }
}
