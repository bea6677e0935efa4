/// Broad category of an [`SSError`].
///
/// Every failure of a sign or verify operation belongs to exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed armor or binary structure.
    Format,
    /// Structurally valid input that was semantically rejected.
    Validation,
    /// Well-formed signature that does not check out.
    Verification,
    /// A key could not be loaded or cannot be used.
    Key,
    /// Anything else (I/O, usage).
    Other,
}

/// The ssign error type.
#[derive(Debug, thiserror::Error)]
pub enum SSError {
    #[error("Format error: {0}")]
    FormatError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Signature verification failed")]
    VerificationFailed,

    #[error("Key error: {0}")]
    KeyError(String),

    #[error("Passphrase required")]
    PassphraseRequired,

    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("I/O error")]
    IOError(#[from] std::io::Error),

    #[error("{0}: {1}")]
    FileError(String, #[source] std::io::Error),

    #[error("Usage error: {0}")]
    UsageError(&'static str),

    #[error("Internal error: [{0}]")]
    InternalError(String),
}

impl SSError {
    /// Return the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SSError::FormatError(_) => ErrorKind::Format,
            SSError::ValidationError(_) => ErrorKind::Validation,
            SSError::VerificationFailed => ErrorKind::Verification,
            SSError::KeyError(_) | SSError::PassphraseRequired | SSError::UnsupportedKeyType(_) => {
                ErrorKind::Key
            }
            SSError::IOError(_)
            | SSError::FileError(..)
            | SSError::UsageError(_)
            | SSError::InternalError(_) => ErrorKind::Other,
        }
    }

    /// Attach a file name to an I/O error.
    pub fn file(path: impl AsRef<std::path::Path>, err: std::io::Error) -> Self {
        SSError::FileError(path.as_ref().display().to_string(), err)
    }

    /// Name the file an error came from, keeping its kind.
    ///
    /// `VerificationFailed` stays uniform, and errors that already carry a
    /// path are returned unchanged.
    pub fn in_file(self, path: impl AsRef<std::path::Path>) -> Self {
        let path = path.as_ref().display();
        match self {
            SSError::FormatError(msg) => SSError::FormatError(format!("{}: {}", path, msg)),
            SSError::ValidationError(msg) => {
                SSError::ValidationError(format!("{}: {}", path, msg))
            }
            SSError::KeyError(msg) => SSError::KeyError(format!("{}: {}", path, msg)),
            SSError::PassphraseRequired => {
                SSError::KeyError(format!("{}: passphrase required", path))
            }
            SSError::UnsupportedKeyType(t) => {
                SSError::KeyError(format!("{}: unsupported key type {}", path, t))
            }
            SSError::InternalError(msg) => SSError::InternalError(format!("{}: {}", path, msg)),
            other => other,
        }
    }

    /// Re-tag a structural error found while reading key material.
    pub(crate) fn into_key_error(self) -> Self {
        match self {
            SSError::FormatError(msg) => SSError::KeyError(msg),
            other => other,
        }
    }
}

impl From<ed25519_compact::Error> for SSError {
    fn from(err: ed25519_compact::Error) -> Self {
        SSError::KeyError(format!("ed25519: {}", err))
    }
}
