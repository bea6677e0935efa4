pub use crate::error::*;

use crate::secure_file;
use crate::wire::{self, Reader};

use ct_codecs::{Base64, Base64NoPadding, Decoder, Encoder};
use ecdsa::signature::{SignatureEncoding, Signer, Verifier};
use log::*;
use p256::ecdsa::{
    Signature as P256Signature, SigningKey as P256SigningKey, VerifyingKey as P256VerifyingKey,
};
use p256::pkcs8::DecodePrivateKey as _;
use rsa::pkcs1::DecodeRsaPrivateKey as _;
use rsa::pkcs1v15;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use sha2::{Sha256, Sha512};
use std::path::Path;
use std::{fmt, str};

pub const SSH_ED25519: &str = "ssh-ed25519";
pub const ECDSA_SHA2_NISTP256: &str = "ecdsa-sha2-nistp256";
pub const SSH_RSA: &str = "ssh-rsa";
pub const RSA_SHA2_256: &str = "rsa-sha2-256";
pub const RSA_SHA2_512: &str = "rsa-sha2-512";

pub(crate) const NISTP256: &str = "nistp256";

// Same bounds as OpenSSH.
const RSA_MIN_BITS: usize = 1024;
const RSA_MAX_BITS: usize = 16384;

/// Something that has an SSH public key.
pub trait SshKey {
    /// SSH key type name, e.g. `ssh-ed25519`.
    fn algorithm(&self) -> &str;

    /// Public key in SSH wire format.
    fn public_key_blob(&self) -> Vec<u8>;
}

/// A key that can produce SSH signature blobs.
///
/// Implement this for keys that live outside of the process (agents, tokens).
pub trait SshSigner: SshKey {
    /// Sign `data` and return the signature in SSH wire format
    /// (`string algorithm || string signature`).
    fn sign_blob(&self, data: &[u8]) -> Result<Vec<u8>, SSError>;
}

/// A key that can check SSH signature blobs.
pub trait SshVerifier: SshKey {
    /// Check an SSH wire-format signature over `data`.
    ///
    /// Every reason for rejection is reported as [`SSError::VerificationFailed`].
    fn verify_blob(&self, data: &[u8], signature: &[u8]) -> Result<(), SSError>;
}

/// An SSH public key.
#[derive(Clone, PartialEq, Eq)]
pub enum PublicKey {
    Ed25519(ed25519_compact::PublicKey),
    EcdsaP256(P256VerifyingKey),
    Rsa(RsaPublicKey),
}

impl PublicKey {
    /// SSH key type name.
    pub fn algorithm(&self) -> &'static str {
        match self {
            PublicKey::Ed25519(_) => SSH_ED25519,
            PublicKey::EcdsaP256(_) => ECDSA_SHA2_NISTP256,
            PublicKey::Rsa(_) => SSH_RSA,
        }
    }

    /// Decode a public key from its SSH wire format.
    pub fn from_wire(blob: &[u8]) -> Result<Self, SSError> {
        Self::read_wire(blob).map_err(SSError::into_key_error)
    }

    fn read_wire(blob: &[u8]) -> Result<Self, SSError> {
        let mut reader = Reader::new(blob);
        let pk = match reader.read_utf8("key type")? {
            SSH_ED25519 => {
                let raw = reader.read_string("ed25519 public key")?;
                PublicKey::Ed25519(ed25519_compact::PublicKey::from_slice(raw)?)
            }
            ECDSA_SHA2_NISTP256 => {
                let curve = reader.read_utf8("curve")?;
                if curve != NISTP256 {
                    return Err(SSError::KeyError(format!(
                        "curve {} does not match key type {}",
                        curve, ECDSA_SHA2_NISTP256
                    )));
                }
                let point = reader.read_string("ecdsa public point")?;
                let vk = P256VerifyingKey::from_sec1_bytes(point)
                    .map_err(|_| SSError::KeyError("invalid P-256 public point".to_string()))?;
                PublicKey::EcdsaP256(vk)
            }
            SSH_RSA => {
                let e = reader.read_mpint("rsa exponent")?;
                let n = reader.read_mpint("rsa modulus")?;
                PublicKey::Rsa(rsa_public_key(n, e)?)
            }
            other => return Err(SSError::UnsupportedKeyType(other.to_string())),
        };
        reader.finish("public key")?;
        Ok(pk)
    }

    /// Encode the public key in SSH wire format.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = vec![];
        wire::put_string(&mut buf, self.algorithm());
        match self {
            PublicKey::Ed25519(pk) => wire::put_string(&mut buf, &pk[..]),
            PublicKey::EcdsaP256(vk) => {
                wire::put_string(&mut buf, NISTP256);
                wire::put_string(&mut buf, vk.to_encoded_point(false).as_bytes());
            }
            PublicKey::Rsa(pk) => {
                wire::put_mpint(&mut buf, &pk.e().to_bytes_be());
                wire::put_mpint(&mut buf, &pk.n().to_bytes_be());
            }
        }
        buf
    }

    /// Parse the first usable key from `authorized_keys` / `.pub` formatted text.
    ///
    /// Leading options and trailing comments are allowed.
    pub fn from_openssh(lines: &str) -> Result<Self, SSError> {
        for line in lines.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            for pair in fields.windows(2) {
                let Ok(blob) = Base64::decode_to_vec(pair[1], None) else {
                    continue;
                };
                if Reader::new(&blob).read_utf8("key type").ok() != Some(pair[0]) {
                    continue;
                }
                return Self::from_wire(&blob);
            }
        }
        Err(SSError::KeyError("no OpenSSH public key found".to_string()))
    }

    /// Encode the key as a single `authorized_keys` line, without comment.
    pub fn to_openssh(&self) -> String {
        format!(
            "{} {}",
            self.algorithm(),
            Base64::encode_to_string(self.to_wire()).unwrap_or_default()
        )
    }

    /// Try to guess the public key format: OpenSSH text first, raw wire format second.
    pub fn from_any(data: &[u8]) -> Result<Self, SSError> {
        let text_err = match str::from_utf8(data) {
            Ok(s) => match Self::from_openssh(s) {
                Ok(pk) => return Ok(pk),
                Err(e) => Some(e),
            },
            Err(_) => None,
        };
        Self::from_wire(data).map_err(|e| text_err.unwrap_or(e))
    }

    /// Load a public key from a file, trying to guess its format.
    pub fn from_file(file: impl AsRef<Path>) -> Result<Self, SSError> {
        let file = file.as_ref();
        let data = std::fs::read(file).map_err(|e| SSError::file(file, e))?;
        Self::from_any(&data)
    }

    /// `SHA256:` fingerprint, as printed by `ssh-keygen -l`.
    pub fn fingerprint(&self) -> String {
        let digest = hmac_sha256::Hash::hash(&self.to_wire());
        format!(
            "SHA256:{}",
            Base64NoPadding::encode_to_string(digest).unwrap_or_default()
        )
    }

    fn check_signature(&self, data: &[u8], signature: &[u8]) -> Result<(), String> {
        let mut reader = Reader::new(signature);
        let alg = reader
            .read_utf8("signature type")
            .map_err(|e| e.to_string())?;
        let raw = reader.read_string("signature").map_err(|e| e.to_string())?;
        reader.finish("signature").map_err(|e| e.to_string())?;

        match (self, alg) {
            (PublicKey::Ed25519(pk), SSH_ED25519) => {
                let sig = ed25519_compact::Signature::from_slice(raw).map_err(|e| e.to_string())?;
                pk.verify(data, &sig).map_err(|e| e.to_string())
            }
            (PublicKey::EcdsaP256(vk), ECDSA_SHA2_NISTP256) => {
                let sig = decode_ecdsa_signature(raw)?;
                vk.verify(data, &sig).map_err(|e| e.to_string())
            }
            (PublicKey::Rsa(pk), RSA_SHA2_256) => {
                let sig = pkcs1v15::Signature::try_from(raw).map_err(|e| e.to_string())?;
                pkcs1v15::VerifyingKey::<Sha256>::new(pk.clone())
                    .verify(data, &sig)
                    .map_err(|e| e.to_string())
            }
            (PublicKey::Rsa(pk), RSA_SHA2_512) => {
                let sig = pkcs1v15::Signature::try_from(raw).map_err(|e| e.to_string())?;
                pkcs1v15::VerifyingKey::<Sha512>::new(pk.clone())
                    .verify(data, &sig)
                    .map_err(|e| e.to_string())
            }
            (_, alg) => Err(format!(
                "{} signature cannot be checked with a {} key",
                alg,
                self.algorithm()
            )),
        }
    }
}

impl SshKey for PublicKey {
    fn algorithm(&self) -> &str {
        PublicKey::algorithm(self)
    }

    fn public_key_blob(&self) -> Vec<u8> {
        self.to_wire()
    }
}

impl SshVerifier for PublicKey {
    fn verify_blob(&self, data: &[u8], signature: &[u8]) -> Result<(), SSError> {
        self.check_signature(data, signature).map_err(|reason| {
            debug!("Signature rejected: {}", reason);
            SSError::VerificationFailed
        })
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PublicKey {{ {} {} }}",
            self.algorithm(),
            self.fingerprint()
        )
    }
}

fn rsa_public_key(n: &[u8], e: &[u8]) -> Result<RsaPublicKey, SSError> {
    let pk = RsaPublicKey::new_with_max_size(
        BigUint::from_bytes_be(n),
        BigUint::from_bytes_be(e),
        RSA_MAX_BITS,
    )
    .map_err(|e| SSError::KeyError(format!("rsa: {}", e)))?;
    if pk.size() * 8 < RSA_MIN_BITS {
        return Err(SSError::KeyError(format!(
            "rsa: modulus of {} bits is too small",
            pk.size() * 8
        )));
    }
    Ok(pk)
}

fn decode_ecdsa_signature(raw: &[u8]) -> Result<P256Signature, String> {
    let mut reader = Reader::new(raw);
    let r = reader.read_mpint("ecdsa r").map_err(|e| e.to_string())?;
    let s = reader.read_mpint("ecdsa s").map_err(|e| e.to_string())?;
    reader.finish("ecdsa signature").map_err(|e| e.to_string())?;
    if r.len() > 32 || s.len() > 32 {
        return Err("ecdsa signature scalar out of range".to_string());
    }
    let mut bytes = [0u8; 64];
    bytes[32 - r.len()..32].copy_from_slice(r);
    bytes[64 - s.len()..].copy_from_slice(s);
    P256Signature::from_slice(&bytes).map_err(|e| e.to_string())
}

/// An SSH private key.
#[derive(Clone)]
pub enum PrivateKey {
    Ed25519(ed25519_compact::KeyPair),
    EcdsaP256(P256SigningKey),
    Rsa(Box<RsaPrivateKey>),
}

impl PrivateKey {
    /// SSH key type name.
    pub fn algorithm(&self) -> &'static str {
        match self {
            PrivateKey::Ed25519(_) => SSH_ED25519,
            PrivateKey::EcdsaP256(_) => ECDSA_SHA2_NISTP256,
            PrivateKey::Rsa(_) => SSH_RSA,
        }
    }

    /// Return the public half of the key.
    pub fn public_key(&self) -> PublicKey {
        match self {
            PrivateKey::Ed25519(kp) => PublicKey::Ed25519(kp.pk),
            PrivateKey::EcdsaP256(sk) => PublicKey::EcdsaP256(sk.verifying_key().clone()),
            PrivateKey::Rsa(sk) => PublicKey::Rsa(sk.to_public_key()),
        }
    }

    /// Parse a private key, guessing its format.
    ///
    /// Encrypted OpenSSH keys fail with [`SSError::PassphraseRequired`]; retry
    /// with [`PrivateKey::from_any_with_passphrase`].
    pub fn from_any(data: &[u8]) -> Result<Self, SSError> {
        Self::load(data, None)
    }

    /// Parse a private key that may be protected by a passphrase.
    pub fn from_any_with_passphrase(data: &[u8], passphrase: &[u8]) -> Result<Self, SSError> {
        Self::load(data, Some(passphrase))
    }

    /// Read a private key from a file, guessing its format.
    ///
    /// A warning is logged if the file is readable by other users.
    pub fn from_file(file: impl AsRef<Path>) -> Result<Self, SSError> {
        let data = secure_file::read_secure(file.as_ref())?;
        Self::from_any(&data)
    }

    fn load(data: &[u8], passphrase: Option<&[u8]>) -> Result<Self, SSError> {
        let text = str::from_utf8(data)
            .map_err(|_| SSError::KeyError("private key is not PEM text".to_string()))?;
        let block =
            pem::parse(text).map_err(|e| SSError::KeyError(format!("invalid PEM: {}", e)))?;
        match block.tag() {
            super::openssh::OPENSSH_PEM_TAG => Self::from_openssh_bin(block.contents(), passphrase),
            "PRIVATE KEY" => Self::from_pkcs8_pem(text),
            "EC PRIVATE KEY" => {
                let sk = p256::SecretKey::from_sec1_pem(text)
                    .map_err(|e| SSError::KeyError(format!("ecdsa: {}", e)))?;
                Ok(PrivateKey::EcdsaP256(P256SigningKey::from(sk)))
            }
            "RSA PRIVATE KEY" => {
                let sk = RsaPrivateKey::from_pkcs1_pem(text)
                    .map_err(|e| SSError::KeyError(format!("rsa: {}", e)))?;
                Ok(PrivateKey::Rsa(Box::new(sk)))
            }
            "ENCRYPTED PRIVATE KEY" => Err(SSError::KeyError(
                "encrypted PKCS#8 keys are not supported".to_string(),
            )),
            other => Err(SSError::UnsupportedKeyType(other.to_string())),
        }
    }

    fn from_pkcs8_pem(text: &str) -> Result<Self, SSError> {
        if let Ok(sk) = ed25519_compact::SecretKey::from_pem(text) {
            return Ok(PrivateKey::Ed25519(ed25519_compact::KeyPair {
                pk: sk.public_key(),
                sk,
            }));
        }
        if let Ok(sk) = p256::SecretKey::from_pkcs8_pem(text) {
            return Ok(PrivateKey::EcdsaP256(P256SigningKey::from(sk)));
        }
        if let Ok(sk) = RsaPrivateKey::from_pkcs8_pem(text) {
            return Ok(PrivateKey::Rsa(Box::new(sk)));
        }
        Err(SSError::UnsupportedKeyType("PKCS#8 key".to_string()))
    }
}

impl SshKey for PrivateKey {
    fn algorithm(&self) -> &str {
        PrivateKey::algorithm(self)
    }

    fn public_key_blob(&self) -> Vec<u8> {
        self.public_key().to_wire()
    }
}

impl SshSigner for PrivateKey {
    fn sign_blob(&self, data: &[u8]) -> Result<Vec<u8>, SSError> {
        let mut buf = vec![];
        match self {
            PrivateKey::Ed25519(kp) => {
                let sig = kp.sk.sign(data, None);
                wire::put_string(&mut buf, SSH_ED25519);
                wire::put_string(&mut buf, &sig[..]);
            }
            PrivateKey::EcdsaP256(sk) => {
                let sig: P256Signature = sk
                    .try_sign(data)
                    .map_err(|e| SSError::KeyError(format!("ecdsa signing failed: {}", e)))?;
                let (r, s) = sig.split_bytes();
                let mut inner = vec![];
                wire::put_mpint(&mut inner, &r);
                wire::put_mpint(&mut inner, &s);
                wire::put_string(&mut buf, ECDSA_SHA2_NISTP256);
                wire::put_string(&mut buf, inner);
            }
            PrivateKey::Rsa(sk) => {
                let signer = pkcs1v15::SigningKey::<Sha512>::new(sk.as_ref().clone());
                let sig = signer
                    .try_sign(data)
                    .map_err(|e| SSError::KeyError(format!("rsa signing failed: {}", e)))?;
                wire::put_string(&mut buf, RSA_SHA2_512);
                wire::put_string(&mut buf, sig.to_vec());
            }
        }
        Ok(buf)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "PrivateKey {{ {} {} }}",
            self.algorithm(),
            self.public_key().fingerprint()
        )
    }
}
