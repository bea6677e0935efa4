//! Signing and verification of SSHSIG detached signatures.
//!
//! The key never signs the message itself. It signs
//!
//! ```text
//! byte[6] "SSHSIG"
//! string  namespace
//! string  reserved (empty)
//! string  hash algorithm
//! string  H(message)
//! ```
//!
//! which ties every signature to a namespace and to the hash function that
//! produced the digest.

use crate::signature::envelope::{SIG_MAGIC, SignatureEnvelope};
use crate::signature::hash::HashAlgorithm;
use crate::signature::keys::*;
use crate::wire;

use log::*;

/// Build the byte sequence that is actually signed.
pub fn signed_data(namespace: &str, hash_algorithm: HashAlgorithm, message: &[u8]) -> Vec<u8> {
    let digest = hash_algorithm.digest(message);
    let mut buf = Vec::with_capacity(
        SIG_MAGIC.len() + 16 + namespace.len() + hash_algorithm.name().len() + digest.len(),
    );
    buf.extend_from_slice(SIG_MAGIC);
    wire::put_string(&mut buf, namespace);
    wire::put_string(&mut buf, b"");
    wire::put_string(&mut buf, hash_algorithm.name());
    wire::put_string(&mut buf, digest);
    buf
}

/// Sign `message` under `namespace`.
pub fn sign<S>(
    signer: &S,
    message: &[u8],
    namespace: &str,
    hash_algorithm: HashAlgorithm,
) -> Result<SignatureEnvelope, SSError>
where
    S: SshSigner + ?Sized,
{
    if namespace.is_empty() {
        return Err(SSError::ValidationError(
            "namespace must not be empty".to_string(),
        ));
    }
    let data = signed_data(namespace, hash_algorithm, message);
    let signature = signer.sign_blob(&data)?;
    debug!(
        "Signed {} bytes with {} ({}), namespace {:?}",
        message.len(),
        signer.algorithm(),
        hash_algorithm,
        namespace
    );
    Ok(SignatureEnvelope {
        public_key: signer.public_key_blob(),
        namespace: namespace.to_string(),
        reserved: vec![],
        hash_algorithm: hash_algorithm.name().to_string(),
        signature,
    })
}

/// Verify an armored signature over `message`.
pub fn verify<V>(
    verifier: &V,
    message: &[u8],
    armored: &[u8],
    namespace: &str,
) -> Result<(), SSError>
where
    V: SshVerifier + ?Sized,
{
    let envelope = SignatureEnvelope::from_pem(armored)?;
    verify_envelope(verifier, message, &envelope, namespace)
}

/// Verify a decoded signature over `message`.
///
/// The key embedded in the envelope is ignored; only `verifier` is trusted.
pub fn verify_envelope<V>(
    verifier: &V,
    message: &[u8],
    envelope: &SignatureEnvelope,
    namespace: &str,
) -> Result<(), SSError>
where
    V: SshVerifier + ?Sized,
{
    if namespace.is_empty() {
        return Err(SSError::ValidationError(
            "namespace must not be empty".to_string(),
        ));
    }
    if envelope.namespace != namespace {
        debug!(
            "Namespace mismatch: signature has {:?}, expected {:?}",
            envelope.namespace, namespace
        );
        return Err(SSError::ValidationError(format!(
            "namespace mismatch: signature was made for {:?}",
            envelope.namespace
        )));
    }
    let hash_algorithm = HashAlgorithm::from_name(&envelope.hash_algorithm)?;
    let data = signed_data(namespace, hash_algorithm, message);
    verifier.verify_blob(&data, &envelope.signature)?;
    debug!(
        "Valid {} signature ({}) over {} bytes",
        verifier.algorithm(),
        hash_algorithm,
        message.len()
    );
    Ok(())
}

impl PrivateKey {
    /// Sign `message` under `namespace` and return the envelope.
    pub fn sign_message(
        &self,
        message: &[u8],
        namespace: &str,
        hash_algorithm: HashAlgorithm,
    ) -> Result<SignatureEnvelope, SSError> {
        sign(self, message, namespace, hash_algorithm)
    }
}

impl PublicKey {
    /// Verify an armored signature over `message` made by this key.
    pub fn verify_message(
        &self,
        message: &[u8],
        armored: &[u8],
        namespace: &str,
    ) -> Result<(), SSError> {
        verify(self, message, armored, namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::SigningKey as P256SigningKey;

    const NS: &str = "ssign@becker.software";

    fn keys() -> Vec<PrivateKey> {
        vec![
            PrivateKey::Ed25519(ed25519_compact::KeyPair::generate()),
            PrivateKey::EcdsaP256(
                P256SigningKey::from_slice(&[0x11; 32]).expect("valid scalar"),
            ),
        ]
    }

    #[test]
    fn test_signed_data_layout() {
        let data = signed_data("file", HashAlgorithm::Sha256, b"hello\n");
        let mut expected = b"SSHSIG".to_vec();
        wire::put_string(&mut expected, "file");
        wire::put_string(&mut expected, "");
        wire::put_string(&mut expected, "sha256");
        wire::put_string(&mut expected, HashAlgorithm::Sha256.digest(b"hello\n"));
        assert_eq!(data, expected);
    }

    #[test]
    fn test_sign_verify() {
        for key in keys() {
            for hash in HashAlgorithm::ALL {
                let envelope = key.sign_message(b"hello\n", NS, hash).unwrap();
                assert_eq!(envelope.hash_algorithm, hash.name());
                assert_eq!(envelope.namespace, NS);
                assert!(envelope.reserved.is_empty());
                assert_eq!(envelope.public_key().unwrap(), key.public_key());

                let armored = envelope.to_pem();
                key.public_key()
                    .verify_message(b"hello\n", armored.as_bytes(), NS)
                    .unwrap();
            }
        }
    }

    #[test]
    fn test_sign_empty_namespace() {
        let key = &keys()[0];
        let err = sign(key, b"msg", "", HashAlgorithm::Sha512).unwrap_err();
        assert!(matches!(err, SSError::ValidationError(_)));
    }

    #[test]
    fn test_verify_empty_namespace() {
        let key = &keys()[0];
        let envelope = sign(key, b"msg", NS, HashAlgorithm::Sha512).unwrap();
        let err = verify_envelope(&key.public_key(), b"msg", &envelope, "").unwrap_err();
        assert!(matches!(err, SSError::ValidationError(_)));
    }

    #[test]
    fn test_tampered_message() {
        let key = &keys()[0];
        let envelope = sign(key, b"hello\n", NS, HashAlgorithm::Sha256).unwrap();
        let message = b"hello\n";
        for i in 0..message.len() {
            let mut tampered = message.to_vec();
            tampered[i] ^= 0x01;
            let err = verify_envelope(&key.public_key(), &tampered, &envelope, NS).unwrap_err();
            assert!(matches!(err, SSError::VerificationFailed));
        }
    }

    #[test]
    fn test_tampered_signature() {
        let key = &keys()[0];
        let pk = key.public_key();
        let envelope = sign(key, b"hello\n", NS, HashAlgorithm::Sha512).unwrap();
        for i in 0..envelope.signature.len() {
            let mut tampered = envelope.clone();
            tampered.signature[i] ^= 0x01;
            let err = verify_envelope(&pk, b"hello\n", &tampered, NS).unwrap_err();
            assert!(matches!(err, SSError::VerificationFailed), "byte {}", i);
        }
    }

    #[test]
    fn test_tampered_namespace() {
        let key = &keys()[0];
        let pk = key.public_key();
        let mut envelope = sign(key, b"hello\n", NS, HashAlgorithm::Sha512).unwrap();
        envelope.namespace = "ssign@becker.softwarf".to_string();

        // Rewriting the namespace to match what the verifier expects does not
        // help: the signature covers the original one.
        let err = verify_envelope(&pk, b"hello\n", &envelope, "ssign@becker.softwarf").unwrap_err();
        assert!(matches!(err, SSError::VerificationFailed));
    }

    #[test]
    fn test_namespace_binding() {
        let key = &keys()[1];
        let armored = sign(key, b"msg", "A", HashAlgorithm::Sha512)
            .unwrap()
            .to_pem();
        let err = verify(&key.public_key(), b"msg", armored.as_bytes(), "B").unwrap_err();
        assert!(matches!(err, SSError::ValidationError(_)));

        // Byte-exact comparison only.
        let armored = sign(key, b"msg", "file", HashAlgorithm::Sha512)
            .unwrap()
            .to_pem();
        for other in ["File", "fil", "file ", "file\0"] {
            let err = verify(&key.public_key(), b"msg", armored.as_bytes(), other).unwrap_err();
            assert!(matches!(err, SSError::ValidationError(_)), "{:?}", other);
        }
    }

    #[test]
    fn test_downgrade_rejected() {
        // A signature over an md5-labelled to-be-signed blob that is otherwise
        // internally consistent.
        let PrivateKey::Ed25519(kp) = &keys()[0] else {
            unreachable!()
        };
        let mut data = SIG_MAGIC.to_vec();
        wire::put_string(&mut data, NS);
        wire::put_string(&mut data, "");
        wire::put_string(&mut data, "md5");
        wire::put_string(&mut data, [0u8; 16]);
        let mut signature = vec![];
        wire::put_string(&mut signature, SSH_ED25519);
        wire::put_string(&mut signature, &kp.sk.sign(&data, None)[..]);

        let pk = PublicKey::Ed25519(kp.pk);
        for name in ["md5", "sha1", "SHA512", "sha384", ""] {
            let envelope = SignatureEnvelope {
                public_key: pk.to_wire(),
                namespace: NS.to_string(),
                reserved: vec![],
                hash_algorithm: name.to_string(),
                signature: signature.clone(),
            };
            let err = verify_envelope(&pk, b"msg", &envelope, NS).unwrap_err();
            assert!(matches!(err, SSError::ValidationError(_)), "{:?}", name);
        }
    }

    #[test]
    fn test_wrong_key() {
        let signer = &keys()[0];
        let armored = sign(signer, b"msg", NS, HashAlgorithm::Sha512)
            .unwrap()
            .to_pem();
        for other in keys() {
            let err = verify(&other.public_key(), b"msg", armored.as_bytes(), NS).unwrap_err();
            assert!(matches!(err, SSError::VerificationFailed));
        }
    }

    #[test]
    fn test_malformed_armor() {
        let key = &keys()[0];
        let armored = sign(key, b"msg", NS, HashAlgorithm::Sha512)
            .unwrap()
            .to_pem();
        let truncated = &armored.as_bytes()[..armored.len() / 2];
        let err = verify(&key.public_key(), b"msg", truncated, NS).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_dyn_signer() {
        let key = keys().remove(0);
        let signer: &dyn SshSigner = &key;
        let verifier: &dyn SshVerifier = &key.public_key();
        let envelope = sign(signer, b"msg", NS, HashAlgorithm::default()).unwrap();
        assert_eq!(envelope.hash_algorithm, "sha512");
        verify_envelope(verifier, b"msg", &envelope, NS).unwrap();
    }
}
