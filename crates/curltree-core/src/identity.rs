//! Caller credentials and the fingerprint that keys profile ownership.

use base64::{engine::general_purpose, Engine};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyParseError {
    #[error("public key line is empty")]
    Empty,
    #[error("public key line has no key data")]
    MissingBlob,
    #[error("public key data is not valid base64: {0}")]
    Encoding(String),
    #[error("public key data is truncated")]
    Truncated,
    #[error("public key declares {declared} but encodes {encoded}")]
    AlgorithmMismatch { declared: String, encoded: String },
}

/// A public key in its canonical wire encoding, tagged with its algorithm.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    algorithm: String,
    blob: Vec<u8>,
}

impl PublicKey {
    /// Parses an authorized-keys style line: `<algorithm> <base64> [comment]`.
    pub fn parse_openssh(line: &str) -> Result<Self, KeyParseError> {
        let mut parts = line.split_whitespace();
        let algorithm = parts.next().ok_or(KeyParseError::Empty)?;
        let encoded = parts.next().ok_or(KeyParseError::MissingBlob)?;
        let blob = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|err| KeyParseError::Encoding(err.to_string()))?;

        let encoded_algorithm = read_string(&blob).ok_or(KeyParseError::Truncated)?;
        if encoded_algorithm != algorithm.as_bytes() {
            return Err(KeyParseError::AlgorithmMismatch {
                declared: algorithm.to_string(),
                encoded: String::from_utf8_lossy(encoded_algorithm).into_owned(),
            });
        }

        Ok(Self {
            algorithm: algorithm.to_string(),
            blob,
        })
    }

    /// Reads the key out of an sshd `ExposeAuthInfo` file. Returns `Ok(None)`
    /// when the connection did not authenticate with a public key.
    pub fn from_ssh_user_auth(contents: &str) -> Result<Option<Self>, KeyParseError> {
        for line in contents.lines() {
            if let Some(rest) = line.trim().strip_prefix("publickey ") {
                return Self::parse_openssh(rest).map(Some);
            }
        }
        Ok(None)
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn fingerprint(&self) -> String {
        format!("{}:{}", self.algorithm, sha256_hex(&self.blob))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("algorithm", &self.algorithm)
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// First length-prefixed string of an SSH wire blob.
fn read_string(blob: &[u8]) -> Option<&[u8]> {
    let len_bytes: [u8; 4] = blob.get(0..4)?.try_into().ok()?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    blob.get(4..4usize.checked_add(len)?)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut output = String::with_capacity(digest.len() * 2);
    for byte in digest {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}
