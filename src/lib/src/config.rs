//! Defaults shared by the library and the `ssign` command

use crate::error::*;
use crate::signature::HashAlgorithm;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Namespace used when none is given.
pub const DEFAULT_NAMESPACE: &str = "ssign@becker.software";

/// Extension appended to a file name to find its signature.
pub const SIGNATURE_EXTENSION: &str = "ssig";

/// Private key used when none is given, relative to the home directory.
pub const DEFAULT_KEY_FILE: &str = ".ssh/id_ed25519";

/// Parameters of a signing operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOptions {
    /// Domain separator bound into the signature
    pub namespace: String,

    /// Hash applied to the message before signing
    pub hash_algorithm: HashAlgorithm,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            hash_algorithm: HashAlgorithm::default(),
        }
    }
}

impl SignOptions {
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_hash_algorithm(mut self, hash_algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = hash_algorithm;
        self
    }

    pub fn validate(&self) -> Result<(), SSError> {
        if self.namespace.is_empty() {
            return Err(SSError::ValidationError(
                "namespace must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// `<subject>.ssig`, next to the subject.
pub fn default_signature_path(subject: impl AsRef<Path>) -> PathBuf {
    let mut name = OsString::from(subject.as_ref().as_os_str());
    name.push(".");
    name.push(SIGNATURE_EXTENSION);
    PathBuf::from(name)
}

/// `$HOME/.ssh/id_ed25519`, if `HOME` is set.
pub fn default_private_key_path() -> Option<PathBuf> {
    home_dir().map(|home| private_key_path_in(&home))
}

/// `$HOME/.ssh/id_ed25519.pub`, if `HOME` is set.
pub fn default_public_key_path() -> Option<PathBuf> {
    home_dir().map(|home| public_key_path_in(&home))
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
}

fn private_key_path_in(home: &Path) -> PathBuf {
    home.join(DEFAULT_KEY_FILE)
}

fn public_key_path_in(home: &Path) -> PathBuf {
    let mut path = private_key_path_in(home).into_os_string();
    path.push(".pub");
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = SignOptions::default();
        assert_eq!(options.namespace, "ssign@becker.software");
        assert_eq!(options.hash_algorithm, HashAlgorithm::Sha512);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_builder() {
        let options = SignOptions::default()
            .with_namespace("file")
            .with_hash_algorithm(HashAlgorithm::Sha256);
        assert_eq!(options.namespace, "file");
        assert_eq!(options.hash_algorithm, HashAlgorithm::Sha256);
    }

    #[test]
    fn test_empty_namespace_is_invalid() {
        let err = SignOptions::default().with_namespace("").validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_default_signature_path() {
        assert_eq!(
            default_signature_path("README.md"),
            PathBuf::from("README.md.ssig")
        );
        assert_eq!(
            default_signature_path("/tmp/archive.tar.gz"),
            PathBuf::from("/tmp/archive.tar.gz.ssig")
        );
    }

    #[test]
    fn test_key_paths() {
        let home = Path::new("/home/carlos");
        assert_eq!(
            private_key_path_in(home),
            PathBuf::from("/home/carlos/.ssh/id_ed25519")
        );
        assert_eq!(
            public_key_path_in(home),
            PathBuf::from("/home/carlos/.ssh/id_ed25519.pub")
        );
    }
}
