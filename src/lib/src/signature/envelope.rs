use crate::error::*;
use crate::signature::keys::PublicKey;
use crate::wire::{self, Reader};

use log::*;
use pem::{EncodeConfig, LineEnding, Pem};

/// Preamble of both the envelope and the signed data.
pub const SIG_MAGIC: &[u8; 6] = b"SSHSIG";
pub const SIG_VERSION: u32 = 1;
pub const SIG_PEM_TAG: &str = "SSH SIGNATURE";

// ssh-keygen wraps armored signatures at 70 columns.
const SIG_LINE_WRAP: usize = 70;

/// A detached SSH signature, as stored in a `.ssig` file.
///
/// Decoding only checks structure. Nothing here interprets the hash algorithm
/// name or the key and signature blobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureEnvelope {
    /// Signer's public key, SSH wire format.
    pub public_key: Vec<u8>,
    pub namespace: String,
    /// Unused. Empty on everything we produce; kept as-is when decoding.
    pub reserved: Vec<u8>,
    pub hash_algorithm: String,
    /// Signature blob, SSH wire format.
    pub signature: Vec<u8>,
}

impl SignatureEnvelope {
    /// Serialize the envelope to its binary form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            SIG_MAGIC.len()
                + 4 * 6
                + self.public_key.len()
                + self.namespace.len()
                + self.reserved.len()
                + self.hash_algorithm.len()
                + self.signature.len(),
        );
        buf.extend_from_slice(SIG_MAGIC);
        wire::put_u32(&mut buf, SIG_VERSION);
        wire::put_string(&mut buf, &self.public_key);
        wire::put_string(&mut buf, &self.namespace);
        wire::put_string(&mut buf, &self.reserved);
        wire::put_string(&mut buf, &self.hash_algorithm);
        wire::put_string(&mut buf, &self.signature);
        buf
    }

    /// Parse the binary form of an envelope.
    pub fn from_bytes(bin: &[u8]) -> Result<Self, SSError> {
        let mut reader = Reader::new(bin);
        let magic = reader.read_raw(SIG_MAGIC.len(), "magic")?;
        if magic != SIG_MAGIC {
            debug!("Envelope preamble: {:02x?}", magic);
            return Err(SSError::FormatError("magic: not an SSH signature".to_string()));
        }
        let version = reader.read_u32("version")?;
        if version != SIG_VERSION {
            return Err(SSError::FormatError(format!(
                "version: unsupported signature version {}",
                version
            )));
        }
        let public_key = reader.read_string("public key")?.to_vec();
        let namespace = reader.read_utf8("namespace")?.to_string();
        let reserved = reader.read_string("reserved")?.to_vec();
        let hash_algorithm = reader.read_utf8("hash algorithm")?.to_string();
        let signature = reader.read_string("signature")?.to_vec();
        reader.finish("signature envelope")?;

        Ok(SignatureEnvelope {
            public_key,
            namespace,
            reserved,
            hash_algorithm,
            signature,
        })
    }

    /// Armor the envelope the way `ssh-keygen -Y sign` does.
    pub fn to_pem(&self) -> String {
        let block = Pem::new(SIG_PEM_TAG, self.to_bytes());
        let config = EncodeConfig::new()
            .set_line_ending(LineEnding::LF)
            .set_line_wrap(SIG_LINE_WRAP);
        pem::encode_config(&block, config)
    }

    /// Parse an armored envelope.
    pub fn from_pem(armored: &[u8]) -> Result<Self, SSError> {
        let block = pem::parse(armored)
            .map_err(|e| SSError::FormatError(format!("armor: {}", e)))?;
        if block.tag() != SIG_PEM_TAG {
            return Err(SSError::FormatError(format!(
                "armor: expected {}, found {}",
                SIG_PEM_TAG,
                block.tag()
            )));
        }
        Self::from_bytes(block.contents())
    }

    /// Parse the embedded public key.
    ///
    /// Verification does not look at this key: it is up to the caller to
    /// decide whether the signer is trusted.
    pub fn public_key(&self) -> Result<PublicKey, SSError> {
        PublicKey::from_wire(&self.public_key)
    }
}
