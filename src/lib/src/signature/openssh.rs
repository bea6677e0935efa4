//! OpenSSH private key container (`openssh-key-v1`).
//!
//! ```text
//! "openssh-key-v1\0"
//! string ciphername
//! string kdfname
//! string kdfoptions      (bcrypt: string salt, uint32 rounds)
//! uint32 number of keys  (always 1)
//! string public key
//! string private section (possibly encrypted)
//! ```
//!
//! The private section holds two equal check integers, the key itself, a
//! comment and deterministic padding (1, 2, 3, ...) up to the cipher block size.

use crate::signature::keys::*;
use crate::wire::Reader;

use ctr::cipher::{KeyIvInit, StreamCipher};
use log::*;
use p256::ecdsa::SigningKey as P256SigningKey;
use rsa::{BigUint, RsaPrivateKey};
use zeroize::Zeroizing;

pub(crate) const OPENSSH_PEM_TAG: &str = "OPENSSH PRIVATE KEY";

const AUTH_MAGIC: &[u8] = b"openssh-key-v1\0";
const KDF_NONE: &str = "none";
const KDF_BCRYPT: &str = "bcrypt";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Cipher {
    None,
    Aes128Ctr,
    Aes192Ctr,
    Aes256Ctr,
}

impl Cipher {
    fn from_name(name: &str) -> Result<Self, SSError> {
        match name {
            "none" => Ok(Cipher::None),
            "aes128-ctr" => Ok(Cipher::Aes128Ctr),
            "aes192-ctr" => Ok(Cipher::Aes192Ctr),
            "aes256-ctr" => Ok(Cipher::Aes256Ctr),
            other => Err(SSError::KeyError(format!(
                "unsupported private key cipher: {}",
                other
            ))),
        }
    }

    fn key_len(&self) -> usize {
        match self {
            Cipher::None => 0,
            Cipher::Aes128Ctr => 16,
            Cipher::Aes192Ctr => 24,
            Cipher::Aes256Ctr => 32,
        }
    }

    fn block_size(&self) -> usize {
        match self {
            Cipher::None => 8,
            _ => 16,
        }
    }

    fn decrypt(
        &self,
        data: &[u8],
        passphrase: &[u8],
        salt: &[u8],
        rounds: u32,
    ) -> Result<Zeroizing<Vec<u8>>, SSError> {
        let key_len = self.key_len();
        let mut derived = Zeroizing::new(vec![0u8; key_len + 16]);
        bcrypt_pbkdf::bcrypt_pbkdf(passphrase, salt, rounds, &mut derived[..])
            .map_err(|e| SSError::KeyError(format!("bcrypt-pbkdf: {}", e)))?;
        let (key, iv) = derived.split_at(key_len);

        let mut out = Zeroizing::new(data.to_vec());
        match self {
            Cipher::None => {}
            Cipher::Aes128Ctr => apply_keystream::<ctr::Ctr128BE<aes::Aes128>>(key, iv, &mut out)?,
            Cipher::Aes192Ctr => apply_keystream::<ctr::Ctr128BE<aes::Aes192>>(key, iv, &mut out)?,
            Cipher::Aes256Ctr => apply_keystream::<ctr::Ctr128BE<aes::Aes256>>(key, iv, &mut out)?,
        }
        Ok(out)
    }
}

fn apply_keystream<C: KeyIvInit + StreamCipher>(
    key: &[u8],
    iv: &[u8],
    buf: &mut [u8],
) -> Result<(), SSError> {
    let mut cipher = C::new_from_slices(key, iv)
        .map_err(|_| SSError::InternalError("cipher key/iv length".to_string()))?;
    cipher.apply_keystream(buf);
    Ok(())
}

impl PrivateKey {
    /// Parse an unencrypted OpenSSH private key.
    ///
    /// Returns [`SSError::PassphraseRequired`] if the key is encrypted.
    pub fn from_openssh(lines: &str) -> Result<Self, SSError> {
        Self::from_openssh_pem(lines, None)
    }

    /// Parse an OpenSSH private key, decrypting it with `passphrase` if needed.
    pub fn from_openssh_with_passphrase(lines: &str, passphrase: &[u8]) -> Result<Self, SSError> {
        Self::from_openssh_pem(lines, Some(passphrase))
    }

    fn from_openssh_pem(lines: &str, passphrase: Option<&[u8]>) -> Result<Self, SSError> {
        let block =
            pem::parse(lines).map_err(|e| SSError::KeyError(format!("invalid PEM: {}", e)))?;
        if block.tag() != OPENSSH_PEM_TAG {
            return Err(SSError::KeyError(format!(
                "expected {}, found {}",
                OPENSSH_PEM_TAG,
                block.tag()
            )));
        }
        Self::from_openssh_bin(block.contents(), passphrase)
    }

    pub(crate) fn from_openssh_bin(bin: &[u8], passphrase: Option<&[u8]>) -> Result<Self, SSError> {
        parse_container(bin, passphrase).map_err(SSError::into_key_error)
    }
}

fn parse_container(bin: &[u8], passphrase: Option<&[u8]>) -> Result<PrivateKey, SSError> {
    let mut reader = Reader::new(bin);
    if reader.read_raw(AUTH_MAGIC.len(), "magic")? != AUTH_MAGIC {
        return Err(SSError::KeyError(
            "not an openssh-key-v1 container".to_string(),
        ));
    }
    let cipher = Cipher::from_name(reader.read_utf8("cipher name")?)?;
    let kdf_name = reader.read_utf8("kdf name")?;
    let kdf_options = reader.read_string("kdf options")?;
    let nkeys = reader.read_u32("key count")?;
    if nkeys != 1 {
        return Err(SSError::KeyError(format!(
            "expected exactly one key, found {}",
            nkeys
        )));
    }
    let public_blob = reader.read_string("public key")?;
    let private_section = reader.read_string("private section")?;
    reader.finish("openssh private key")?;

    let plaintext = if cipher == Cipher::None {
        if kdf_name != KDF_NONE {
            return Err(SSError::KeyError(format!(
                "unexpected kdf {} for an unencrypted key",
                kdf_name
            )));
        }
        Zeroizing::new(private_section.to_vec())
    } else {
        let Some(passphrase) = passphrase else {
            debug!("Private key is encrypted with {:?}", cipher);
            return Err(SSError::PassphraseRequired);
        };
        if kdf_name != KDF_BCRYPT {
            return Err(SSError::KeyError(format!("unsupported kdf: {}", kdf_name)));
        }
        let mut kdf = Reader::new(kdf_options);
        let salt = kdf.read_string("bcrypt salt")?;
        let rounds = kdf.read_u32("bcrypt rounds")?;
        kdf.finish("kdf options")?;
        cipher.decrypt(private_section, passphrase, salt, rounds)?
    };
    if plaintext.len() % cipher.block_size() != 0 {
        return Err(SSError::KeyError(
            "private section is not a multiple of the cipher block size".to_string(),
        ));
    }

    let key = parse_private_section(&plaintext, cipher != Cipher::None)?;
    if key.public_key().to_wire() != public_blob {
        return Err(SSError::KeyError(
            "embedded public key does not match the private key".to_string(),
        ));
    }
    Ok(key)
}

fn parse_private_section(plain: &[u8], encrypted: bool) -> Result<PrivateKey, SSError> {
    let mut reader = Reader::new(plain);
    let check1 = reader.read_u32("check integer")?;
    let check2 = reader.read_u32("check integer")?;
    if check1 != check2 {
        return Err(SSError::KeyError(if encrypted {
            "incorrect passphrase".to_string()
        } else {
            "corrupt private key".to_string()
        }));
    }

    let key = match reader.read_utf8("key type")? {
        SSH_ED25519 => {
            let pk = reader.read_string("ed25519 public key")?;
            let sk = reader.read_string("ed25519 private key")?;
            if sk.len() != 64 {
                return Err(SSError::KeyError(format!(
                    "ed25519 private key has {} bytes",
                    sk.len()
                )));
            }
            let seed = ed25519_compact::Seed::from_slice(&sk[..32])?;
            let kp = ed25519_compact::KeyPair::from_seed(seed);
            if &kp.pk[..] != pk || &sk[32..] != pk {
                return Err(SSError::KeyError(
                    "ed25519 public key does not match seed".to_string(),
                ));
            }
            PrivateKey::Ed25519(kp)
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
            let scalar = reader.read_mpint("ecdsa private scalar")?;
            if scalar.len() > 32 {
                return Err(SSError::KeyError(
                    "ecdsa private scalar out of range".to_string(),
                ));
            }
            let mut bytes = Zeroizing::new([0u8; 32]);
            bytes[32 - scalar.len()..].copy_from_slice(scalar);
            let sk = P256SigningKey::from_slice(&bytes[..])
                .map_err(|_| SSError::KeyError("invalid P-256 private scalar".to_string()))?;
            if sk.verifying_key().to_encoded_point(false).as_bytes() != point {
                return Err(SSError::KeyError(
                    "ecdsa public point does not match private scalar".to_string(),
                ));
            }
            PrivateKey::EcdsaP256(sk)
        }
        SSH_RSA => {
            let n = reader.read_mpint("rsa modulus")?;
            let e = reader.read_mpint("rsa exponent")?;
            let d = reader.read_mpint("rsa private exponent")?;
            let _iqmp = reader.read_mpint("rsa iqmp")?;
            let p = reader.read_mpint("rsa prime p")?;
            let q = reader.read_mpint("rsa prime q")?;
            let sk = RsaPrivateKey::from_components(
                BigUint::from_bytes_be(n),
                BigUint::from_bytes_be(e),
                BigUint::from_bytes_be(d),
                vec![BigUint::from_bytes_be(p), BigUint::from_bytes_be(q)],
            )
            .and_then(|sk| sk.validate().map(|_| sk))
            .map_err(|e| SSError::KeyError(format!("rsa: {}", e)))?;
            PrivateKey::Rsa(Box::new(sk))
        }
        other => return Err(SSError::UnsupportedKeyType(other.to_string())),
    };

    let _comment = reader.read_string("comment")?;
    let padding = reader.remaining();
    if padding
        .iter()
        .enumerate()
        .any(|(i, &b)| b as usize != i + 1)
    {
        return Err(SSError::KeyError("invalid private key padding".to_string()));
    }
    Ok(key)
}
