use curltree_core::{KeyParseError, Profile, PublicKey};
use curltree_storage::ProfileStore;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const SSH_USER_AUTH_ENV: &str = "SSH_USER_AUTH";

/// Where the connecting user's public key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// An authorized-keys style public key file.
    KeyFile(PathBuf),
    /// An sshd `ExposeAuthInfo` file.
    UserAuth(PathBuf),
    Absent,
}

impl CredentialSource {
    pub fn detect(key_file: Option<&Path>) -> Self {
        if let Some(path) = key_file {
            return Self::KeyFile(path.to_path_buf());
        }
        match std::env::var(SSH_USER_AUTH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::UserAuth(PathBuf::from(path)),
            _ => Self::Absent,
        }
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("failed to read credential {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid public key: {0}")]
    Key(#[from] KeyParseError),
}

pub fn read_credential(source: &CredentialSource) -> Result<Option<PublicKey>, IdentityError> {
    let read = |path: &Path| {
        std::fs::read_to_string(path).map_err(|source| IdentityError::Io {
            path: path.to_path_buf(),
            source,
        })
    };
    match source {
        CredentialSource::KeyFile(path) => {
            let contents = read(path)?;
            let line = contents
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty() && !line.starts_with('#'))
                .unwrap_or_default();
            Ok(Some(PublicKey::parse_openssh(line)?))
        }
        CredentialSource::UserAuth(path) => Ok(PublicKey::from_ssh_user_auth(&read(path)?)?),
        CredentialSource::Absent => Ok(None),
    }
}

/// What the session learns about its caller before the first keystroke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bootstrap {
    NoIdentity,
    Fault(String),
    Found { fingerprint: String, profile: Profile },
    NotRegistered { fingerprint: String },
}

pub fn resolve(key: &PublicKey, store: &dyn ProfileStore) -> Bootstrap {
    let fingerprint = key.fingerprint();
    match store.find_by_fingerprint(&fingerprint) {
        Ok(Some(profile)) => {
            info!(event = "identity_resolved", handle = %profile.handle);
            Bootstrap::Found {
                fingerprint,
                profile,
            }
        }
        Ok(None) => {
            info!(event = "identity_unregistered", algorithm = key.algorithm());
            Bootstrap::NotRegistered { fingerprint }
        }
        Err(err) => {
            warn!(event = "identity_lookup_failed", error = %err);
            Bootstrap::Fault(format!("profile lookup failed: {err}"))
        }
    }
}

pub fn bootstrap(source: &CredentialSource, store: &dyn ProfileStore) -> Bootstrap {
    match read_credential(source) {
        Ok(Some(key)) => resolve(&key, store),
        Ok(None) => {
            info!(event = "identity_missing");
            Bootstrap::NoIdentity
        }
        Err(err) => {
            warn!(event = "identity_unreadable", error = %err);
            Bootstrap::Fault(err.to_string())
        }
    }
}
